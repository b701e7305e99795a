//! Explicit module bootstrapper.
//!
//! # Responsibility
//! - Keep the service registration table (service -> implementation,
//!   lifetime) built once at application start.
//! - Let every module contribute its registrations through `AppModule`.
//! - Open one storage scope per unit of work from the configured database.
//!
//! # Invariants
//! - A service name is registered at most once.
//! - Modules register in the order they are given.

use crate::config::{AppConfig, DatabaseTarget};
use crate::store::{StorageContext, StoreResult};
use log::{debug, info};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// How long one resolved service instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServiceLifetime {
    /// One instance for the whole process.
    Singleton,
    /// One instance per unit of work.
    Scoped,
    /// A new instance on every resolution.
    Transient,
}

impl ServiceLifetime {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Singleton => "singleton",
            Self::Scoped => "scoped",
            Self::Transient => "transient",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub service: String,
    pub implementation: String,
    pub lifetime: ServiceLifetime,
    /// Module that contributed the registration.
    pub module: String,
}

/// Registration table keyed by service name.
#[derive(Debug, Default)]
pub struct ServiceCollection {
    entries: BTreeMap<String, ServiceDescriptor>,
    order: Vec<String>,
    current_module: Option<String>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_singleton(&mut self, service: &str, implementation: &str) -> BootstrapResult<()> {
        self.register(service, implementation, ServiceLifetime::Singleton)
    }

    pub fn add_scoped(&mut self, service: &str, implementation: &str) -> BootstrapResult<()> {
        self.register(service, implementation, ServiceLifetime::Scoped)
    }

    pub fn add_transient(&mut self, service: &str, implementation: &str) -> BootstrapResult<()> {
        self.register(service, implementation, ServiceLifetime::Transient)
    }

    pub fn register(
        &mut self,
        service: &str,
        implementation: &str,
        lifetime: ServiceLifetime,
    ) -> BootstrapResult<()> {
        let service = service.trim();
        let implementation = implementation.trim();
        if service.is_empty() || implementation.is_empty() {
            return Err(BootstrapError::InvalidDescriptor(format!(
                "service `{service}` -> implementation `{implementation}`"
            )));
        }
        if self.entries.contains_key(service) {
            return Err(BootstrapError::DuplicateService(service.to_string()));
        }

        let descriptor = ServiceDescriptor {
            service: service.to_string(),
            implementation: implementation.to_string(),
            lifetime,
            module: self
                .current_module
                .clone()
                .unwrap_or_else(|| "host".to_string()),
        };
        debug!(
            "event=service_register module=bootstrap status=ok service={} lifetime={} source={}",
            descriptor.service,
            lifetime.as_str(),
            descriptor.module
        );
        self.order.push(descriptor.service.clone());
        self.entries.insert(descriptor.service.clone(), descriptor);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, service: &str) -> Option<&ServiceDescriptor> {
        self.entries.get(service.trim())
    }

    /// Returns descriptors in registration order.
    pub fn descriptors(&self) -> Vec<&ServiceDescriptor> {
        self.order
            .iter()
            .filter_map(|service| self.entries.get(service))
            .collect()
    }

    pub fn by_lifetime(&self, lifetime: ServiceLifetime) -> Vec<&ServiceDescriptor> {
        self.descriptors()
            .into_iter()
            .filter(|descriptor| descriptor.lifetime == lifetime)
            .collect()
    }
}

/// One application module contributing service registrations.
pub trait AppModule {
    fn name(&self) -> &'static str;

    fn register(&self, services: &mut ServiceCollection, config: &AppConfig)
        -> BootstrapResult<()>;
}

/// System module: environment records and their storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemModule;

impl AppModule for SystemModule {
    fn name(&self) -> &'static str {
        "system"
    }

    fn register(
        &self,
        services: &mut ServiceCollection,
        _config: &AppConfig,
    ) -> BootstrapResult<()> {
        services.add_singleton("AppConfig", "AppConfig")?;
        services.add_scoped("StorageContext", "StorageContext")?;
        services.add_scoped(
            "EntityRepository<EnvironmentRecord, EnvironmentId>",
            "SqliteEntityRepository<EnvironmentRecord>",
        )?;
        services.add_scoped(
            "EnvironmentService",
            "EnvironmentService<SqliteEntityRepository<EnvironmentRecord>>",
        )?;
        Ok(())
    }
}

/// Modules wired into every host.
pub fn builtin_modules() -> Vec<Box<dyn AppModule>> {
    vec![Box::new(SystemModule)]
}

/// Registers every module into `services`, stopping at the first failure.
pub fn bootstrap_modules(
    services: &mut ServiceCollection,
    config: &AppConfig,
    modules: &[Box<dyn AppModule>],
) -> BootstrapResult<()> {
    for module in modules {
        let before = services.len();
        services.current_module = Some(module.name().to_string());
        let result = module.register(services, config);
        services.current_module = None;
        result.map_err(|err| BootstrapError::Module {
            module: module.name(),
            source: Box::new(err),
        })?;

        info!(
            "event=module_register module=bootstrap status=ok name={} services={}",
            module.name(),
            services.len() - before
        );
    }
    Ok(())
}

/// Bootstrapped application: configuration plus the registration table.
#[derive(Debug)]
pub struct AppHost {
    config: AppConfig,
    services: ServiceCollection,
}

impl AppHost {
    /// Builds a host with the built-in modules.
    pub fn build(config: AppConfig) -> BootstrapResult<Self> {
        Self::build_with(config, &builtin_modules())
    }

    pub fn build_with(config: AppConfig, modules: &[Box<dyn AppModule>]) -> BootstrapResult<Self> {
        let mut services = ServiceCollection::new();
        bootstrap_modules(&mut services, &config, modules)?;
        Ok(Self { config, services })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn services(&self) -> &ServiceCollection {
        &self.services
    }

    /// Opens a fresh storage context for one unit of work.
    ///
    /// In-memory targets give every scope its own empty database.
    pub fn begin_scope(&self) -> StoreResult<StorageContext> {
        match &self.config.database {
            DatabaseTarget::Memory => StorageContext::open_in_memory(),
            DatabaseTarget::File(path) => StorageContext::open(path),
        }
    }
}

pub type BootstrapResult<T> = Result<T, BootstrapError>;

#[derive(Debug)]
pub enum BootstrapError {
    InvalidDescriptor(String),
    DuplicateService(String),
    Module {
        module: &'static str,
        source: Box<BootstrapError>,
    },
}

impl Display for BootstrapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDescriptor(value) => write!(f, "invalid service descriptor: {value}"),
            Self::DuplicateService(value) => write!(f, "service already registered: {value}"),
            Self::Module { module, source } => {
                write!(f, "module `{module}` failed to register: {source}")
            }
        }
    }
}

impl Error for BootstrapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Module { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
