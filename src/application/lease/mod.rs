//! Lease lifecycle: countdown clock, state store, controller, token handle.

pub mod clock;
pub mod controller;
pub mod store;
pub mod token;

pub use clock::{ClockEvent, ExpiryClock};
pub use controller::LifecycleController;
pub use store::ReservationLeaseStore;
pub use token::{ShareSink, TokenArtifact};
