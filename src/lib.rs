pub mod backend;
pub mod config;
pub mod emit;
pub mod engine;
pub mod engine_async;
pub mod error;
pub mod executor;
pub mod i18n;
pub mod normalize;
pub mod pool;
pub mod report;
pub mod sources;
pub mod transcript;
pub mod types;
pub mod verdict;

// Re-export the localization macros
pub use crate::i18n::{t, t_with_args};
