pub mod context;
pub mod provider;
pub mod session;

pub use context::{ProviderConfig, ProviderOptions, SessionOptions};
pub use provider::{
    Availability, ExecutionProvider, ProviderRegistry, CPU_PROVIDER, CUDA_PROVIDER, IN_TREE_PROVIDER,
};
pub use session::InferenceSession;
