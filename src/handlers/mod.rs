pub mod health;
pub mod me;
pub mod social;

pub use health::health_check;
pub use me::me;
pub use social::{exchange_token, exchange_token_for_provider};
