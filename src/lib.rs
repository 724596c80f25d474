pub mod api;
pub mod codec;
pub mod config;
#[macro_use]
pub mod ensure;
pub mod error;
pub mod models;
pub mod path_ext;
pub mod processor;
pub mod queue;
pub mod rate_limit;
pub mod repository;
pub mod sandbox;
pub mod worker;
pub mod worker_registry;

pub use error::{Error, Result};
