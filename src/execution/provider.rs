//! Execution providers.
//!
//! A provider contributes a set of kernels and accepts flat string options.
//! Sessions ask the [`ProviderRegistry`] to turn the caller's ordered list of
//! [`ProviderConfig`]s into configured providers, then assign every node to
//! the first provider whose registry has a kernel for it.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::ops::activations::Relu;
use crate::ops::identity::Identity;
use crate::ops::registry::OperatorRegistry;

use super::context::{ProviderConfig, ProviderOptions};

pub const CPU_PROVIDER: &str = "CPUExecutionProvider";
pub const IN_TREE_PROVIDER: &str = "InTreeExecutionProvider";
pub const CUDA_PROVIDER: &str = "CUDAExecutionProvider";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable(String),
}

pub trait ExecutionProvider: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn availability(&self) -> Availability {
        Availability::Available
    }

    /// Apply provider options; unknown keys are ignored with a warning
    fn configure(&mut self, options: &ProviderOptions) -> Result<()>;

    /// Kernels this provider can run
    fn registry(&self) -> &OperatorRegistry;
}

fn ignore_unknown(provider: &str, key: &str) {
    warn!("{}: ignoring unknown option '{}'", provider, key);
}

/// Default provider; runs every built-in kernel
#[derive(Debug)]
pub struct CpuExecutionProvider {
    registry: OperatorRegistry,
}

impl CpuExecutionProvider {
    pub fn new() -> Result<Self> {
        Ok(Self {
            registry: OperatorRegistry::initialize_standard_operators()?,
        })
    }
}

impl ExecutionProvider for CpuExecutionProvider {
    fn name(&self) -> &str {
        CPU_PROVIDER
    }

    fn configure(&mut self, options: &ProviderOptions) -> Result<()> {
        for key in options.keys() {
            ignore_unknown(CPU_PROVIDER, key);
        }
        Ok(())
    }

    fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }
}

/// Provider used by tests; covers `Identity` and `Relu` and takes two options
#[derive(Debug)]
pub struct InTreeExecutionProvider {
    registry: OperatorRegistry,
    int_property: i64,
    str_property: String,
}

impl InTreeExecutionProvider {
    pub fn new() -> Result<Self> {
        let mut registry = OperatorRegistry::new();
        registry.register_operator("Identity", "", 1, Arc::new(Identity))?;
        registry.register_operator("Relu", "", 6, Arc::new(Relu))?;

        Ok(Self {
            registry,
            int_property: 0,
            str_property: String::new(),
        })
    }

    pub fn int_property(&self) -> i64 {
        self.int_property
    }

    pub fn str_property(&self) -> &str {
        &self.str_property
    }
}

impl ExecutionProvider for InTreeExecutionProvider {
    fn name(&self) -> &str {
        IN_TREE_PROVIDER
    }

    fn configure(&mut self, options: &ProviderOptions) -> Result<()> {
        for (key, value) in options {
            match key.as_str() {
                "int_property" => {
                    self.int_property = value.trim().parse().map_err(|_| {
                        Error::InvalidConfig(format!(
                            "{}: int_property must be an integer, got '{}'",
                            IN_TREE_PROVIDER, value
                        ))
                    })?;
                }
                "str_property" => self.str_property = value.clone(),
                _ => ignore_unknown(IN_TREE_PROVIDER, key),
            }
        }
        debug!(
            "{} configured with int_property={} str_property={:?}",
            IN_TREE_PROVIDER, self.int_property, self.str_property
        );
        Ok(())
    }

    fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }
}

/// Known to the registry but never available in this build
#[derive(Debug, Default)]
pub struct CudaExecutionProvider {
    registry: OperatorRegistry,
}

impl ExecutionProvider for CudaExecutionProvider {
    fn name(&self) -> &str {
        CUDA_PROVIDER
    }

    fn availability(&self) -> Availability {
        Availability::Unavailable("built without CUDA support".to_string())
    }

    fn configure(&mut self, _options: &ProviderOptions) -> Result<()> {
        Ok(())
    }

    fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }
}

fn create_cpu() -> Result<Box<dyn ExecutionProvider>> {
    Ok(Box::new(CpuExecutionProvider::new()?))
}

fn create_in_tree() -> Result<Box<dyn ExecutionProvider>> {
    Ok(Box::new(InTreeExecutionProvider::new()?))
}

fn create_cuda() -> Result<Box<dyn ExecutionProvider>> {
    Ok(Box::new(CudaExecutionProvider::default()))
}

pub type ProviderFactory = fn() -> Result<Box<dyn ExecutionProvider>>;

/// Provider constructors by name
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the CPU, in-tree and CUDA providers
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(CPU_PROVIDER, create_cpu);
        registry.register(IN_TREE_PROVIDER, create_in_tree);
        registry.register(CUDA_PROVIDER, create_cuda);
        registry
    }

    pub fn register(&mut self, name: &str, factory: ProviderFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn ExecutionProvider>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::UnknownProvider(name.to_string()))?;
        factory()
    }

    /// Instantiate and configure the requested providers in order.
    ///
    /// Unknown names fail; unavailable providers are skipped with a warning.
    /// An empty request falls back to the CPU provider, and the CPU provider
    /// is appended last when the request did not include it, so nodes no
    /// requested provider covers still get a kernel.
    pub fn resolve(&self, requested: &[ProviderConfig]) -> Result<Vec<Box<dyn ExecutionProvider>>> {
        if requested.is_empty() {
            return Ok(vec![self.create(CPU_PROVIDER)?]);
        }

        let mut providers = Vec::with_capacity(requested.len());

        for config in requested {
            let mut provider = self.create(&config.name)?;

            if let Availability::Unavailable(reason) = provider.availability() {
                warn!("Skipping {}: {}", config.name, reason);
                continue;
            }

            provider.configure(&config.options)?;
            providers.push(provider);
        }

        if providers.is_empty() {
            return Err(Error::NoProviderAvailable(
                requested.iter().map(|c| c.name.clone()).collect(),
            ));
        }

        let has_cpu = providers.iter().any(|p| p.name() == CPU_PROVIDER);
        if !has_cpu && self.factories.contains_key(CPU_PROVIDER) {
            debug!("Appending {} as the fallback provider", CPU_PROVIDER);
            providers.push(self.create(CPU_PROVIDER)?);
        }

        Ok(providers)
    }
}
