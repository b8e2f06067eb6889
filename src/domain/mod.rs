pub mod error;
pub mod reservation;

// Re-export commonly used types
pub use error::{LeaseError, LeaseResult};
pub use reservation::model::{
    LeasePhase, LeaseState, Reservation, ReservationId, ReservationStatus, TokenRef,
};
pub use reservation::transport::{
    CredentialProvider, FetchedLease, LeaseTransport, RefreshGrant,
};
