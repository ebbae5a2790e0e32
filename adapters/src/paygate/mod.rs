pub mod client;
pub mod errors;
pub mod sign;
pub mod types;

pub use client::PayGateClient;
