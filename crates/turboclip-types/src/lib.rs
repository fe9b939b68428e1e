pub mod models;
pub mod telegram;
pub mod zone;
