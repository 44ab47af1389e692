pub mod paths;
pub mod store;

pub use paths::{ChatPath, validate_name};
pub use store::HistoryStore;
