pub mod client;
pub mod delivery;
pub mod error;

pub use client::BotApi;
pub use delivery::{Deliverer, Payload, RetryConfig, Transport};
pub use error::{DeliveryError, TransportError};
