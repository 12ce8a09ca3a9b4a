pub mod builder;
pub mod error;
pub mod execution;
pub mod model;
pub mod ops;
pub mod parser;
pub mod proto;
pub mod runner;

// Re-export commonly used types
pub use builder::fixtures::{Fixture, TEST_DOMAIN};
pub use builder::{build_graph, build_node, encode_model, save_model, GraphSpec, NodeSpec};
pub use error::{Error, Result};
pub use execution::{InferenceSession, ProviderConfig, ProviderOptions, SessionOptions};
pub use model::{DataType, ExecutionGraph, Graph, Node, NodeId, OnnxModel, TensorInfo};
pub use ops::custom::{optional_output_domain, CustomOpDomain};
pub use ops::registry::{KernelContext, Operator, OperatorRegistry};
pub use ops::tensor::Tensor;
pub use runner::{run_model, RunnerConfig};
