#[macro_use]
pub mod metrics;

pub mod aggregation;
pub mod caching;
pub mod config;
pub mod generator;
pub mod logging;
pub mod services;
pub mod store;
pub mod types;
pub mod utils;
