pub mod client;
pub mod config;
pub mod daemon;
pub mod domains;
pub mod error;
pub mod factories;
pub mod interfaces;
pub mod providers;
pub mod services;

pub use crate::client::CivicDesk;
pub use crate::config::Config;
pub use crate::error::{CivicDeskError, Result};
pub use crate::services::ingest::UploadInput;
pub use crate::services::query::RagAnswer;
