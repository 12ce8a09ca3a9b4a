use thiserror::Error;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Protobuf parsing error: {0}")]
    ProtobufError(#[from] prost::DecodeError),

    #[error("Protobuf encoding error: {0}")]
    EncodeError(#[from] prost::EncodeError),

    #[error("Invalid configuration file: {0}")]
    ConfigFormat(#[from] serde_json::Error),

    #[error("Invalid ONNX model: {0}")]
    InvalidModel(String),

    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid graph structure: {0}")]
    InvalidGraph(String),

    #[error("Failed to load model from {0}: {1}")]
    ModelLoadError(PathBuf, String),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("No kernel for operator {op_type} in domain '{domain}' (opset {version})")]
    UnsupportedOperator {
        domain: String,
        op_type: String,
        version: i64,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown execution provider: {0}")]
    UnknownProvider(String),

    #[error("None of the requested execution providers are available: {0:?}")]
    NoProviderAvailable(Vec<String>),

    #[error("Invalid input name: {0}")]
    InvalidInputName(String),

    #[error("Invalid output name: {0}")]
    InvalidOutputName(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Unexpected input data type for {name}. Actual: {actual}, expected: {expected}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Got invalid dimensions for input {name}. Expected: {expected:?}, got: {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<i64>,
        actual: Vec<usize>,
    },

    #[error("Node {node} failed: {message}")]
    ExecutionError {
        node: String,
        message: String,
    },
}
