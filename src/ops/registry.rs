use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::Node;
use super::tensor::Tensor;

/// Per-invocation view handed to a kernel
#[derive(Debug, Clone, Copy)]
pub struct KernelContext<'a> {
    pub node: &'a Node,
    /// Opset version the node was resolved against
    pub opset_version: i64,
}

impl<'a> KernelContext<'a> {
    pub fn new(node: &'a Node, opset_version: i64) -> Self {
        Self { node, opset_version }
    }

    /// Whether the caller wants output `slot` materialized
    pub fn is_output_connected(&self, slot: usize) -> bool {
        self.node.is_output_connected(slot)
    }
}

/// Trait for implementing ONNX operators
pub trait Operator: Send + Sync + Debug {
    /// Compute the operation.
    ///
    /// `inputs[i]` is `None` when input slot `i` was left empty. `outputs` has
    /// one entry per declared output slot; a kernel fills every slot for which
    /// `context.is_output_connected` holds and may leave the others as `None`.
    fn compute(
        &self,
        inputs: &[Option<&Tensor>],
        outputs: &mut [Option<Tensor>],
        context: &KernelContext,
    ) -> Result<()>;

    /// Validate the operator against a node
    fn validate(&self, node: &Node) -> Result<()>;
}

#[derive(Debug, Clone)]
struct KernelEntry {
    since_version: i64,
    op: Arc<dyn Operator>,
}

/// Registry for ONNX operators
#[derive(Debug, Default, Clone)]
pub struct OperatorRegistry {
    operators: HashMap<(String, String), Vec<KernelEntry>>,
}

impl OperatorRegistry {
    /// Create a new operator registry
    pub fn new() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }

    /// Register a kernel valid from `since_version` of `domain` onwards
    pub fn register_operator(
        &mut self,
        name: &str,
        domain: &str,
        since_version: i64,
        op: Arc<dyn Operator>,
    ) -> Result<()> {
        let entries = self
            .operators
            .entry((domain.to_string(), name.to_string()))
            .or_default();

        if entries.iter().any(|e| e.since_version == since_version) {
            return Err(Error::InvalidOperator(format!(
                "Operator {} (version {}) is already registered",
                qualified(domain, name),
                since_version
            )));
        }

        entries.push(KernelEntry { since_version, op });
        entries.sort_by_key(|e| e.since_version);
        Ok(())
    }

    /// Kernel with the highest `since_version` not above `opset_version`
    pub fn get_operator(&self, name: &str, domain: &str, opset_version: i64) -> Option<Arc<dyn Operator>> {
        self.operators
            .get(&(domain.to_string(), name.to_string()))?
            .iter()
            .rev()
            .find(|e| e.since_version <= opset_version)
            .map(|e| Arc::clone(&e.op))
    }

    pub fn supports(&self, name: &str, domain: &str, opset_version: i64) -> bool {
        self.get_operator(name, domain, opset_version).is_some()
    }

    pub fn len(&self) -> usize {
        self.operators.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Qualified names of everything registered, sorted
    pub fn operator_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .operators
            .keys()
            .map(|(domain, name)| qualified(domain, name))
            .collect();
        names.sort();
        names
    }

    /// Initialize the registry with standard operators
    pub fn initialize_standard_operators() -> Result<Self> {
        use crate::ops::activations::{LeakyRelu, Relu, Sigmoid, Tanh};
        use crate::ops::identity::Identity;

        let mut registry = Self::new();

        registry.register_operator("Identity", "", 1, Arc::new(Identity))?;
        registry.register_operator("Relu", "", 6, Arc::new(Relu))?;
        registry.register_operator("LeakyRelu", "", 6, Arc::new(LeakyRelu::default()))?;
        registry.register_operator("Sigmoid", "", 6, Arc::new(Sigmoid))?;
        registry.register_operator("Tanh", "", 6, Arc::new(Tanh))?;

        Ok(registry)
    }
}

fn qualified(domain: &str, name: &str) -> String {
    if domain.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", domain, name)
    }
}
