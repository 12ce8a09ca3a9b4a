use num_traits::Float;

use crate::error::{Error, Result};
use crate::model::{Attribute, Node};
use crate::ops::registry::{KernelContext, Operator};
use crate::ops::tensor::{element_wise_unary_op, FloatUnary, Tensor};

/// Shared plumbing for single-input, single-output activations
#[derive(Debug, Clone, Copy)]
struct ActivationBase {
    name: &'static str,
}

impl ActivationBase {
    fn new(name: &'static str) -> Self {
        Self { name }
    }

    fn compute_impl<F: FloatUnary>(
        &self,
        f: &F,
        inputs: &[Option<&Tensor>],
        outputs: &mut [Option<Tensor>],
    ) -> Result<()> {
        let x = inputs.first().copied().flatten().ok_or_else(|| {
            Error::ValidationError(format!("{} requires 1 input, got none", self.name))
        })?;

        let slot = outputs.first_mut().ok_or_else(|| {
            Error::ValidationError(format!("{} requires 1 output, got none", self.name))
        })?;

        *slot = Some(element_wise_unary_op(x, f)?);
        Ok(())
    }

    fn validate_impl(&self, node: &Node) -> Result<()> {
        if node.inputs.len() != 1 || node.inputs[0].is_empty() {
            return Err(Error::ValidationError(format!(
                "{} operator requires exactly 1 input, got {}",
                self.name,
                node.inputs.len()
            )));
        }

        if node.outputs.len() != 1 || node.outputs[0].is_empty() {
            return Err(Error::ValidationError(format!(
                "{} operator requires exactly 1 output, got {}",
                self.name,
                node.outputs.len()
            )));
        }

        Ok(())
    }
}

/// ReLU activation operator
#[derive(Debug, Clone, Copy, Default)]
pub struct Relu;

/// LeakyReLU activation operator
#[derive(Debug, Clone, Copy)]
pub struct LeakyRelu {
    alpha: f32,
}

impl Default for LeakyRelu {
    fn default() -> Self {
        Self { alpha: 0.01 }
    }
}

impl LeakyRelu {
    pub fn new(alpha: f32) -> Self {
        Self { alpha }
    }
}

/// Sigmoid activation operator
#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

/// Tanh activation operator
#[derive(Debug, Clone, Copy, Default)]
pub struct Tanh;

impl FloatUnary for Relu {
    fn apply<T: Float>(&self, x: T) -> T {
        if x > T::zero() {
            x
        } else {
            T::zero()
        }
    }
}

impl FloatUnary for LeakyRelu {
    fn apply<T: Float>(&self, x: T) -> T {
        let alpha = T::from(self.alpha).unwrap_or_else(T::zero);
        if x > T::zero() {
            x
        } else {
            alpha * x
        }
    }
}

impl FloatUnary for Sigmoid {
    fn apply<T: Float>(&self, x: T) -> T {
        T::one() / (T::one() + (-x).exp())
    }
}

impl FloatUnary for Tanh {
    fn apply<T: Float>(&self, x: T) -> T {
        x.tanh()
    }
}

impl Operator for Relu {
    fn compute(&self, inputs: &[Option<&Tensor>], outputs: &mut [Option<Tensor>], _context: &KernelContext) -> Result<()> {
        ActivationBase::new("Relu").compute_impl(self, inputs, outputs)
    }

    fn validate(&self, node: &Node) -> Result<()> {
        ActivationBase::new("Relu").validate_impl(node)
    }
}

impl Operator for LeakyRelu {
    fn compute(&self, inputs: &[Option<&Tensor>], outputs: &mut [Option<Tensor>], context: &KernelContext) -> Result<()> {
        let op = context
            .node
            .get_float("alpha")
            .map(LeakyRelu::new)
            .unwrap_or(*self);
        ActivationBase::new("LeakyRelu").compute_impl(&op, inputs, outputs)
    }

    fn validate(&self, node: &Node) -> Result<()> {
        ActivationBase::new("LeakyRelu").validate_impl(node)?;

        if let Some(attr) = node.attributes.get("alpha") {
            if !matches!(attr, Attribute::Float(_)) {
                return Err(Error::ValidationError(
                    "LeakyRelu alpha attribute must be a float".to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl Operator for Sigmoid {
    fn compute(&self, inputs: &[Option<&Tensor>], outputs: &mut [Option<Tensor>], _context: &KernelContext) -> Result<()> {
        ActivationBase::new("Sigmoid").compute_impl(self, inputs, outputs)
    }

    fn validate(&self, node: &Node) -> Result<()> {
        ActivationBase::new("Sigmoid").validate_impl(node)
    }
}

impl Operator for Tanh {
    fn compute(&self, inputs: &[Option<&Tensor>], outputs: &mut [Option<Tensor>], _context: &KernelContext) -> Result<()> {
        ActivationBase::new("Tanh").compute_impl(self, inputs, outputs)
    }

    fn validate(&self, node: &Node) -> Result<()> {
        ActivationBase::new("Tanh").validate_impl(node)
    }
}

/// ReLU activation function
pub fn relu(x: &Tensor) -> Result<Tensor> {
    element_wise_unary_op(x, &Relu)
}

/// LeakyReLU activation function
pub fn leaky_relu(x: &Tensor, alpha: f32) -> Result<Tensor> {
    element_wise_unary_op(x, &LeakyRelu::new(alpha))
}

/// Sigmoid activation function
pub fn sigmoid(x: &Tensor) -> Result<Tensor> {
    element_wise_unary_op(x, &Sigmoid)
}

/// Tanh activation function
pub fn tanh(x: &Tensor) -> Result<Tensor> {
    element_wise_unary_op(x, &Tanh)
}
