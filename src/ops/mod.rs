pub mod activations;
pub mod custom;
pub mod identity;
pub mod registry;
pub mod tensor;

pub mod prelude {
    pub use super::registry::{KernelContext, Operator, OperatorRegistry};
    pub use super::tensor::{Shape, Tensor, TensorData};
}

pub use custom::{optional_output_domain, CustomOpDomain};
pub use registry::{KernelContext, Operator, OperatorRegistry};
pub use tensor::{Shape, Tensor, TensorData};
