//! Reading serialized models into the in-memory [`OnnxModel`](crate::model::OnnxModel),
//! checking them, and wiring them into an [`ExecutionGraph`](crate::model::ExecutionGraph).

pub mod graph_builder;
pub mod model_loader;
pub mod schema_validator;

pub use graph_builder::GraphBuilder;
pub use model_loader::OnnxModelLoader;
pub use schema_validator::SchemaValidator;
