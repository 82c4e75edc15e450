use std::{collections::HashMap, sync::Arc};

use thiserror::Error;

use crate::{DataAvailabilityClient, MockDaClient};

/// Factory producing a fresh client instance.
pub type Constructor = Box<dyn Fn() -> Arc<dyn DataAvailabilityClient> + Send + Sync>;

/// Returned when a constructor name is claimed twice.
#[derive(Debug, Error)]
#[error("DA client {name:?} is already registered")]
pub struct AlreadyRegistered {
    pub name: String,
}

/// Named DA client constructors.
///
/// Deployments pick a backend by name from configuration; the registry maps
/// that name to a constructor. Names are claimed exactly once.
pub struct Registry {
    constructors: HashMap<String, Constructor>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self { constructors: HashMap::new() }
    }

    /// Registry with the built-in clients: currently only `"mock"`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register("mock", Box::new(|| Arc::new(MockDaClient::new())))
            .expect("empty registry accepts the default constructor");
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        constructor: Constructor,
    ) -> Result<(), AlreadyRegistered> {
        let name = name.into();
        if self.constructors.contains_key(&name) {
            return Err(AlreadyRegistered { name });
        }
        self.constructors.insert(name, constructor);
        Ok(())
    }

    /// Constructs a client by name, or `None` for an unknown name.
    pub fn client(&self, name: &str) -> Option<Arc<dyn DataAvailabilityClient>> {
        self.constructors.get(name).map(|constructor| constructor())
    }

    pub fn registered_clients(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
