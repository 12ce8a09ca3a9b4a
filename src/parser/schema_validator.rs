use std::collections::HashSet;

use log::debug;

use crate::error::{Error, Result};
use crate::model::{Graph, Node, OnnxModel};

/// Model-level checks that do not need the operator registry
pub struct SchemaValidator {
    // Minimum supported IR version
    min_ir_version: i64,

    // Maximum supported IR version
    max_ir_version: i64,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self {
            min_ir_version: 3,
            max_ir_version: 11,
        }
    }

    /// Accept IR versions in `min..=max` instead of the default range
    pub fn with_ir_range(mut self, min: i64, max: i64) -> Self {
        self.min_ir_version = min;
        self.max_ir_version = max;
        self
    }

    /// Validate IR version, opset coverage and value naming
    pub fn validate_model(&self, model: &OnnxModel) -> Result<()> {
        self.validate_ir_version(model.metadata.ir_version)?;

        for node in &model.graph.nodes {
            self.validate_node_domain(model, node)?;
        }

        self.validate_graph_names(&model.graph)?;
        debug!(
            "Model '{}' passed schema validation ({} nodes)",
            model.graph.name,
            model.graph.nodes.len()
        );
        Ok(())
    }

    fn validate_ir_version(&self, ir_version: i64) -> Result<()> {
        if ir_version < self.min_ir_version || ir_version > self.max_ir_version {
            return Err(Error::ValidationError(format!(
                "Unsupported IR version {} (supported: {}..={})",
                ir_version, self.min_ir_version, self.max_ir_version
            )));
        }
        Ok(())
    }

    fn validate_node_domain(&self, model: &OnnxModel, node: &Node) -> Result<()> {
        if model.opset_version(&node.domain).is_none() {
            return Err(Error::ValidationError(format!(
                "Node {} uses domain '{}' which is not imported by the model",
                node.name, node.domain
            )));
        }
        Ok(())
    }

    /// Every value is defined once; empty names are only allowed in node
    /// output slots, where they mark an unused optional output.
    fn validate_graph_names(&self, graph: &Graph) -> Result<()> {
        let mut defined: HashSet<&str> = HashSet::new();

        for info in &graph.inputs {
            if info.name.is_empty() {
                return Err(Error::ValidationError("Graph input with empty name".to_string()));
            }
            if !defined.insert(info.name.as_str()) {
                return Err(Error::ValidationError(format!(
                    "Duplicate graph input: {}",
                    info.name
                )));
            }
        }

        for tensor in &graph.initializers {
            if !defined.insert(tensor.name.as_str()) {
                return Err(Error::ValidationError(format!(
                    "Initializer {} shadows another value",
                    tensor.name
                )));
            }
        }

        for node in &graph.nodes {
            for (_, output) in node.connected_outputs() {
                if !defined.insert(output) {
                    return Err(Error::ValidationError(format!(
                        "Value {} is produced more than once (node {})",
                        output, node.name
                    )));
                }
            }
        }

        for info in &graph.outputs {
            if info.name.is_empty() {
                return Err(Error::ValidationError("Graph output with empty name".to_string()));
            }
        }

        Ok(())
    }
}
