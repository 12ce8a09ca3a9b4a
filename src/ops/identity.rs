use crate::error::{Error, Result};
use crate::model::Node;
use crate::ops::registry::{KernelContext, Operator};
use crate::ops::tensor::Tensor;

/// Identity operator: copies its single input to its single output
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Operator for Identity {
    fn compute(&self, inputs: &[Option<&Tensor>], outputs: &mut [Option<Tensor>], _context: &KernelContext) -> Result<()> {
        let x = inputs
            .first()
            .copied()
            .flatten()
            .ok_or_else(|| Error::ValidationError("Identity requires 1 input, got none".to_string()))?;

        let slot = outputs
            .first_mut()
            .ok_or_else(|| Error::ValidationError("Identity requires 1 output, got none".to_string()))?;

        *slot = Some(Tensor::new(x.data.clone()));
        Ok(())
    }

    fn validate(&self, node: &Node) -> Result<()> {
        if node.inputs.len() != 1 || node.outputs.len() != 1 {
            return Err(Error::ValidationError(format!(
                "Identity operator requires 1 input and 1 output, got {} and {}",
                node.inputs.len(),
                node.outputs.len()
            )));
        }
        Ok(())
    }
}
