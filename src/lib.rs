pub mod adapters;
pub mod application;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod logging;

pub use adapters::http::router;
