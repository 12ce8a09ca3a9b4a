use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::model::{ExecutionGraph, Node, OnnxModel, TensorInfo};
use crate::ops::registry::{KernelContext, Operator, OperatorRegistry};
use crate::ops::tensor::Tensor;
use crate::parser::{GraphBuilder, OnnxModelLoader, SchemaValidator};

use super::context::{ProviderConfig, SessionOptions};
use super::provider::{ExecutionProvider, ProviderRegistry};

/// Name reported for nodes served by a custom op domain
pub const CUSTOM_OP_PROVIDER: &str = "CustomOpDomain";

/// A node bound to the kernel that will run it
#[derive(Debug)]
struct PlannedNode {
    node: Node,
    kernel: Arc<dyn Operator>,
    opset_version: i64,
    provider: String,
}

/// A loaded model ready to run.
///
/// Planning happens once in the constructor: the graph is validated,
/// sorted, and every node is bound to a kernel. `run` only moves tensors.
#[derive(Debug)]
pub struct InferenceSession {
    model: OnnxModel,
    graph: ExecutionGraph,
    providers: Vec<Box<dyn ExecutionProvider>>,
    plan: Vec<PlannedNode>,
    initializers: HashMap<String, Tensor>,
    options: SessionOptions,
}

impl InferenceSession {
    /// Load `path` and run it on the named providers, in priority order
    pub fn new<P: AsRef<Path>>(path: P, providers: &[&str]) -> Result<Self> {
        let options = SessionOptions {
            providers: providers.iter().map(|name| ProviderConfig::new(name)).collect(),
            ..SessionOptions::default()
        };
        Self::with_options(path, options)
    }

    pub fn with_options<P: AsRef<Path>>(path: P, options: SessionOptions) -> Result<Self> {
        let model = OnnxModelLoader::load_model(path.as_ref())?;
        Self::from_model(model, options)
    }

    /// Create a session from serialized `ModelProto` bytes
    pub fn from_bytes(bytes: &[u8], options: SessionOptions) -> Result<Self> {
        let model = OnnxModelLoader::load_model_from_bytes(bytes)?;
        Self::from_model(model, options)
    }

    pub fn from_model(model: OnnxModel, options: SessionOptions) -> Result<Self> {
        if options.validate_graph {
            SchemaValidator::new().validate_model(&model)?;
        }

        let graph = GraphBuilder::build_graph(&model)?;
        let providers = ProviderRegistry::with_builtin().resolve(&options.providers)?;

        let mut custom_ops = OperatorRegistry::new();
        for domain in &options.custom_op_domains {
            domain.register_into(&mut custom_ops)?;
            debug!(
                "{}Custom domain '{}' provides [{}]",
                log_prefix(&options.log_id),
                domain.domain(),
                domain.op_types().collect::<Vec<_>>().join(", ")
            );
        }

        let plan = graph
            .nodes
            .iter()
            .map(|node| Self::assign_kernel(&model, node, &providers, &custom_ops))
            .collect::<Result<Vec<_>>>()?;

        let initializers = model
            .graph
            .initializers
            .iter()
            .map(|t| Ok((t.name.clone(), Tensor::from_model_tensor(t)?)))
            .collect::<Result<HashMap<_, _>>>()?;

        info!(
            "{}Created session for graph '{}' ({} nodes) on [{}]",
            log_prefix(&options.log_id),
            model.graph.name,
            plan.len(),
            providers.iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
        );

        Ok(Self {
            model,
            graph,
            providers,
            plan,
            initializers,
            options,
        })
    }

    /// First provider with a kernel wins; custom domains come after providers
    fn assign_kernel(
        model: &OnnxModel,
        node: &Node,
        providers: &[Box<dyn ExecutionProvider>],
        custom_ops: &OperatorRegistry,
    ) -> Result<PlannedNode> {
        let opset_version = model.opset_version(&node.domain).ok_or_else(|| {
            Error::InvalidModel(format!(
                "Node {} uses domain '{}' which is not imported by the model",
                node.name, node.domain
            ))
        })?;

        let assigned = providers
            .iter()
            .find_map(|p| {
                p.registry()
                    .get_operator(&node.op_type, &node.domain, opset_version)
                    .map(|kernel| (kernel, p.name().to_string()))
            })
            .or_else(|| {
                custom_ops
                    .get_operator(&node.op_type, &node.domain, opset_version)
                    .map(|kernel| (kernel, CUSTOM_OP_PROVIDER.to_string()))
            });

        let (kernel, provider) = assigned.ok_or_else(|| Error::UnsupportedOperator {
            domain: node.domain.clone(),
            op_type: node.op_type.clone(),
            version: opset_version,
        })?;

        kernel.validate(node)?;
        debug!("Node {} ({}) assigned to {}", node.name, node.qualified_op(), provider);

        Ok(PlannedNode {
            node: node.clone(),
            kernel,
            opset_version,
            provider,
        })
    }

    pub fn model(&self) -> &OnnxModel {
        &self.model
    }

    pub fn inputs(&self) -> &[TensorInfo] {
        &self.model.graph.inputs
    }

    pub fn outputs(&self) -> &[TensorInfo] {
        &self.model.graph.outputs
    }

    /// Providers in use, in priority order
    pub fn providers(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// `(node name, provider)` in execution order
    pub fn node_assignments(&self) -> Vec<(&str, &str)> {
        self.plan
            .iter()
            .map(|step| (step.node.name.as_str(), step.provider.as_str()))
            .collect()
    }

    pub fn execution_graph(&self) -> &ExecutionGraph {
        &self.graph
    }

    /// Run the graph and return `output_names` in the requested order.
    /// An empty `output_names` returns every graph output.
    pub fn run(&self, output_names: &[&str], inputs: HashMap<String, Tensor>) -> Result<Vec<Tensor>> {
        let requested = self.check_output_names(output_names)?;
        self.check_inputs(&inputs)?;

        let mut values: HashMap<String, Tensor> = self.initializers.clone();
        values.extend(inputs);

        for step in &self.plan {
            let produced = self.run_node(step, &values)?;
            values.extend(produced);
        }

        requested
            .into_iter()
            .map(|name| {
                values
                    .get(name)
                    .map(|t| Tensor::new(t.data.clone()).with_name(name))
                    .ok_or_else(|| Error::InvalidGraph(format!("Output {} was not computed", name)))
            })
            .collect()
    }

    fn check_output_names<'a>(&'a self, output_names: &[&'a str]) -> Result<Vec<&'a str>> {
        if output_names.is_empty() {
            return Ok(self.outputs().iter().map(|o| o.name.as_str()).collect());
        }

        for name in output_names {
            if !self.outputs().iter().any(|o| o.name == *name) {
                return Err(Error::InvalidOutputName(name.to_string()));
            }
        }
        Ok(output_names.to_vec())
    }

    fn check_inputs(&self, inputs: &HashMap<String, Tensor>) -> Result<()> {
        for name in inputs.keys() {
            if !self.inputs().iter().any(|i| &i.name == name) {
                return Err(Error::InvalidInputName(name.clone()));
            }
        }

        for info in self.inputs() {
            let tensor = inputs
                .get(&info.name)
                .ok_or_else(|| Error::MissingInput(info.name.clone()))?;

            if tensor.data_type() != info.data_type {
                return Err(Error::TypeMismatch {
                    name: info.name.clone(),
                    expected: format!("tensor({})", info.data_type),
                    actual: format!("tensor({})", tensor.data_type()),
                });
            }

            if !info.accepts_shape(tensor.shape()) {
                return Err(Error::ShapeMismatch {
                    name: info.name.clone(),
                    expected: info.shape.clone(),
                    actual: tensor.shape().to_vec(),
                });
            }
        }

        Ok(())
    }

    fn run_node(&self, step: &PlannedNode, values: &HashMap<String, Tensor>) -> Result<Vec<(String, Tensor)>> {
        let node = &step.node;
        let started = Instant::now();

        let inputs = node
            .inputs
            .iter()
            .map(|name| {
                if name.is_empty() {
                    return Ok(None);
                }
                values.get(name).map(Some).ok_or_else(|| Error::ExecutionError {
                    node: node.name.clone(),
                    message: format!("input {} is not available", name),
                })
            })
            .collect::<Result<Vec<Option<&Tensor>>>>()?;

        let mut outputs: Vec<Option<Tensor>> = vec![None; node.outputs.len()];
        let context = KernelContext::new(node, step.opset_version);

        step.kernel
            .compute(&inputs, &mut outputs, &context)
            .map_err(|e| Error::ExecutionError {
                node: node.name.clone(),
                message: e.to_string(),
            })?;

        let mut produced = Vec::with_capacity(outputs.len());
        for (slot, name) in node.connected_outputs() {
            let tensor = outputs[slot].take().ok_or_else(|| Error::ExecutionError {
                node: node.name.clone(),
                message: format!("output {} ({}) was not produced", slot, name),
            })?;
            produced.push((name.to_string(), tensor.with_name(name)));
        }

        if self.options.enable_profiling {
            debug!(
                "{}{} on {} took {:?}",
                log_prefix(&self.options.log_id),
                node.name,
                step.provider,
                started.elapsed()
            );
        }

        Ok(produced)
    }
}

fn log_prefix(log_id: &str) -> String {
    if log_id.is_empty() {
        String::new()
    } else {
        format!("[{}] ", log_id)
    }
}
