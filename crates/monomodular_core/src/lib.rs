//! Data-access core for MonoModular.
//! Generic entity repositories over a SQLite unit of work, the system module's
//! domain model, and the explicit module bootstrapper.

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use bootstrap::{
    bootstrap_modules, builtin_modules, AppHost, AppModule, BootstrapError, ServiceCollection,
    ServiceDescriptor, ServiceLifetime, SystemModule,
};
pub use config::{AppConfig, ConfigError, DatabaseTarget};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use model::environment::{EnvironmentId, EnvironmentMetadata, EnvironmentRecord};
pub use repo::entity_repo::{EntityRepository, SqliteEntityRepository};
pub use service::environment_service::EnvironmentService;
pub use store::{
    AggregateRoot, Comparison, EntityKey, EntitySet, EntityState, Query, StorageContext,
    StoreError, StoreResult,
};
pub use tokio_util::sync::CancellationToken;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
