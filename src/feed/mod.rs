pub mod address;
pub mod buffer;
pub mod client;
pub mod decoder;
pub mod metrics;
pub mod session;
pub mod transport;
