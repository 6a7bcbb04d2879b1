//! Provides the services behind the HTTP endpoints and a way to initialize them.
//!
//! [`create_services`] builds all services from the provided [`Config`]. They share the same record
//! store, but are otherwise independent: generating records never touches the ranking cache.

use std::sync::Arc;

use crate::config::Config;
use crate::store::JsonFileStore;

mod generate;
mod rankings;

pub use generate::{GenerateError, GeneratorService, append_records};
pub use rankings::{RankingService, compute_payload};

/// All services of a running process.
#[derive(Clone, Debug)]
pub struct Services {
    pub rankings: RankingService,
    pub generator: GeneratorService,
}

pub fn create_services(config: &Config) -> Services {
    let store = JsonFileStore::new(&config.data_path);

    let rankings = RankingService::new(Arc::new(store.clone()), config.caches);
    let generator = GeneratorService::new(store, config.generator);

    Services {
        rankings,
        generator,
    }
}
