pub mod api_models;
pub mod client;
pub mod executor;

pub use client::{LlmClient, ModelArguments, Provider};
pub use executor::LlmService;
