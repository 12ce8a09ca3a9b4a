//! Custom operator domains supplied by the host application.
//!
//! A [`CustomOpDomain`] groups kernels under a domain name that models refer
//! to through their opset imports. Sessions register these kernels next to
//! the ones contributed by execution providers.

use std::sync::Arc;

use crate::builder::fixtures::TEST_DOMAIN;
use crate::error::{Error, Result};
use crate::model::Node;
use crate::ops::registry::{KernelContext, Operator, OperatorRegistry};
use crate::ops::tensor::Tensor;

/// Named set of custom kernels
#[derive(Debug, Clone)]
pub struct CustomOpDomain {
    domain: String,
    since_version: i64,
    ops: Vec<(String, Arc<dyn Operator>)>,
}

impl CustomOpDomain {
    pub fn new(domain: &str, since_version: i64) -> Self {
        Self {
            domain: domain.to_string(),
            since_version,
            ops: Vec::new(),
        }
    }

    pub fn add_op(mut self, op_type: &str, op: Arc<dyn Operator>) -> Self {
        self.ops.push((op_type.to_string(), op));
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn op_types(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().map(|(name, _)| name.as_str())
    }

    pub fn register_into(&self, registry: &mut OperatorRegistry) -> Result<()> {
        for (op_type, op) in &self.ops {
            registry.register_operator(op_type, &self.domain, self.since_version, Arc::clone(op))?;
        }
        Ok(())
    }
}

/// `WithOptionalOutput`: one input, up to three outputs.
///
/// Output 0 is required. Every connected slot receives a copy of the input;
/// slots left empty by the node are never produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct WithOptionalOutput;

const MAX_OUTPUTS: usize = 3;

impl Operator for WithOptionalOutput {
    fn compute(&self, inputs: &[Option<&Tensor>], outputs: &mut [Option<Tensor>], context: &KernelContext) -> Result<()> {
        let x = inputs.first().copied().flatten().ok_or_else(|| {
            Error::ValidationError("WithOptionalOutput requires 1 input, got none".to_string())
        })?;

        for (slot, output) in outputs.iter_mut().enumerate() {
            if context.is_output_connected(slot) {
                *output = Some(Tensor::new(x.data.clone()));
            }
        }
        Ok(())
    }

    fn validate(&self, node: &Node) -> Result<()> {
        if node.inputs.len() != 1 || node.inputs[0].is_empty() {
            return Err(Error::ValidationError(format!(
                "WithOptionalOutput requires exactly 1 input, got {}",
                node.inputs.len()
            )));
        }

        if node.outputs.is_empty() || node.outputs.len() > MAX_OUTPUTS {
            return Err(Error::ValidationError(format!(
                "WithOptionalOutput takes 1 to {} outputs, got {}",
                MAX_OUTPUTS,
                node.outputs.len()
            )));
        }

        if !node.is_output_connected(0) {
            return Err(Error::ValidationError(format!(
                "Node {}: output 0 of WithOptionalOutput is required",
                node.name
            )));
        }

        Ok(())
    }
}

/// The `test` domain holding [`WithOptionalOutput`]
pub fn optional_output_domain() -> CustomOpDomain {
    CustomOpDomain::new(TEST_DOMAIN, 1).add_op("WithOptionalOutput", Arc::new(WithOptionalOutput))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn node(outputs: &[&str]) -> Node {
        Node {
            id: 0,
            name: "CustomOptionalOutput".to_string(),
            op_type: "WithOptionalOutput".to_string(),
            domain: TEST_DOMAIN.to_string(),
            inputs: vec!["GraphIn0".to_string()],
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            attributes: HashMap::new(),
            doc_string: String::new(),
        }
    }

    #[test]
    fn skipped_slot_is_not_produced() {
        let node = node(&["Output0", "", "Output2"]);
        let context = KernelContext::new(&node, 1);
        let x = Tensor::from_f32(&[2], vec![1.0, 2.0]).unwrap();
        let mut outputs = vec![None, None, None];

        WithOptionalOutput.compute(&[Some(&x)], &mut outputs, &context).unwrap();

        assert_eq!(outputs[0].as_ref().map(|t| t.data.clone()), Some(x.data.clone()));
        assert!(outputs[1].is_none());
        assert_eq!(outputs[2].as_ref().map(|t| t.data.clone()), Some(x.data));
    }

    #[test]
    fn first_output_is_required() {
        assert!(WithOptionalOutput.validate(&node(&["", "Output1"])).is_err());
        assert!(WithOptionalOutput.validate(&node(&["a", "b", "c", "d"])).is_err());
        assert!(WithOptionalOutput.validate(&node(&["Output0"])).is_ok());
    }

    #[test]
    fn domain_registers_kernels() {
        let domain = optional_output_domain();
        assert_eq!(domain.domain(), TEST_DOMAIN);
        assert_eq!(domain.op_types().collect::<Vec<_>>(), vec!["WithOptionalOutput"]);

        let mut registry = OperatorRegistry::new();
        domain.register_into(&mut registry).unwrap();
        assert!(registry.supports("WithOptionalOutput", TEST_DOMAIN, 1));
        assert!(!registry.supports("WithOptionalOutput", "", 13));
    }
}
