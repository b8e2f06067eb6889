pub mod transport;

pub use transport::http::HttpLeaseTransport;
