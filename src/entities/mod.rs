pub mod order;
pub mod provider_credential;
