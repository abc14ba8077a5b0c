pub mod balance;
pub mod checkout;
pub mod orders;
pub mod webhooks;

pub use crate::AppState;
