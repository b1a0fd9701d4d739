pub mod binance;
pub mod messages;
pub mod settings;
pub mod traits;
