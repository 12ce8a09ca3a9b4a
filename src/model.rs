use std::collections::HashMap;

use strum_macros::{Display, EnumString};

/// Unique identifier for a node in the graph
pub type NodeId = usize;

/// Metadata about the ONNX model
#[derive(Debug, Clone, Default)]
pub struct ModelMetadata {
    pub producer_name: String,
    pub producer_version: String,
    pub domain: String,
    pub model_version: i64,
    pub doc_string: String,
    pub graph_name: String,
    pub ir_version: i64,
}

/// Information about a tensor
#[derive(Debug, Clone)]
pub struct TensorInfo {
    pub name: String,
    /// Static dimensions; symbolic or missing dimensions are `-1`
    pub shape: Vec<i64>,
    pub data_type: DataType,
    pub doc_string: String,
}

impl TensorInfo {
    /// Check a concrete shape against the declared one. Dynamic dimensions
    /// match anything; an empty declared shape with no dims is a scalar.
    pub fn accepts_shape(&self, shape: &[usize]) -> bool {
        self.shape.len() == shape.len()
            && self
                .shape
                .iter()
                .zip(shape)
                .all(|(&expected, &actual)| expected < 0 || expected as usize == actual)
    }
}

/// ONNX data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum DataType {
    #[strum(serialize = "undefined")]
    Undefined,
    #[strum(to_string = "float", serialize = "float32", serialize = "f32")]
    Float,
    #[strum(to_string = "double", serialize = "float64", serialize = "f64")]
    Double,
    #[strum(serialize = "int8")]
    Int8,
    #[strum(serialize = "int16")]
    Int16,
    #[strum(to_string = "int32", serialize = "i32")]
    Int32,
    #[strum(to_string = "int64", serialize = "i64")]
    Int64,
    #[strum(serialize = "uint8")]
    Uint8,
    #[strum(serialize = "uint16")]
    Uint16,
    #[strum(serialize = "uint32")]
    Uint32,
    #[strum(serialize = "uint64")]
    Uint64,
    #[strum(serialize = "string")]
    String,
    #[strum(serialize = "bool")]
    Bool,
    #[strum(serialize = "float16")]
    Float16,
    #[strum(serialize = "complex64")]
    Complex64,
    #[strum(serialize = "complex128")]
    Complex128,
    #[strum(serialize = "bfloat16")]
    BFloat16,
}

impl DataType {
    pub fn from_proto(proto_type: i32) -> Self {
        match proto_type {
            1 => DataType::Float,
            2 => DataType::Uint8,
            3 => DataType::Int8,
            4 => DataType::Uint16,
            5 => DataType::Int16,
            6 => DataType::Int32,
            7 => DataType::Int64,
            8 => DataType::String,
            9 => DataType::Bool,
            10 => DataType::Float16,
            11 => DataType::Double,
            12 => DataType::Uint32,
            13 => DataType::Uint64,
            14 => DataType::Complex64,
            15 => DataType::Complex128,
            16 => DataType::BFloat16,
            _ => DataType::Undefined,
        }
    }

    /// The `TensorProto.DataType` value for this type
    pub fn to_proto(self) -> i32 {
        match self {
            DataType::Undefined => 0,
            DataType::Float => 1,
            DataType::Uint8 => 2,
            DataType::Int8 => 3,
            DataType::Uint16 => 4,
            DataType::Int16 => 5,
            DataType::Int32 => 6,
            DataType::Int64 => 7,
            DataType::String => 8,
            DataType::Bool => 9,
            DataType::Float16 => 10,
            DataType::Double => 11,
            DataType::Uint32 => 12,
            DataType::Uint64 => 13,
            DataType::Complex64 => 14,
            DataType::Complex128 => 15,
            DataType::BFloat16 => 16,
        }
    }
}

/// Initializer data as stored in the model, little-endian
#[derive(Debug, Clone)]
pub struct Tensor {
    pub name: String,
    pub data_type: DataType,
    pub dims: Vec<i64>,
    pub data: Vec<u8>,
    pub doc_string: String,
}

/// Node in the computation graph
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub op_type: String,
    pub domain: String,
    pub inputs: Vec<String>,
    /// Output slots; an empty name marks an optional output left unused
    pub outputs: Vec<String>,
    pub attributes: HashMap<String, Attribute>,
    pub doc_string: String,
}

impl Node {
    pub fn is_output_connected(&self, slot: usize) -> bool {
        self.outputs.get(slot).map_or(false, |name| !name.is_empty())
    }

    /// Names of the outputs this node actually produces, with their slots
    pub fn connected_outputs(&self) -> impl Iterator<Item = (usize, &str)> {
        self.outputs
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty())
            .map(|(slot, name)| (slot, name.as_str()))
    }

    pub fn get_float(&self, name: &str) -> Option<f32> {
        match self.attributes.get(name) {
            Some(Attribute::Float(value)) => Some(*value),
            _ => None,
        }
    }

    /// `domain.op_type`, with the default domain left bare
    pub fn qualified_op(&self) -> String {
        if self.domain.is_empty() {
            self.op_type.clone()
        } else {
            format!("{}.{}", self.domain, self.op_type)
        }
    }
}

/// Node attribute
#[derive(Debug, Clone)]
pub enum Attribute {
    Float(f32),
    Int(i64),
    String(String),
    Tensor(Tensor),

    // List types
    Floats(Vec<f32>),
    Ints(Vec<i64>),
    Strings(Vec<String>),
    Tensors(Vec<Tensor>),
}

/// Graph structure containing nodes and tensors
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub name: String,
    pub nodes: Vec<Node>,
    pub inputs: Vec<TensorInfo>,
    pub outputs: Vec<TensorInfo>,
    pub initializers: Vec<Tensor>,
    pub value_info: Vec<TensorInfo>,
    pub doc_string: String,
}

/// The complete ONNX model
#[derive(Debug, Clone, Default)]
pub struct OnnxModel {
    pub metadata: ModelMetadata,
    pub graph: Graph,
    pub opset_imports: HashMap<String, i64>,
    pub metadata_props: HashMap<String, String>,
}

impl OnnxModel {
    pub fn opset_version(&self, domain: &str) -> Option<i64> {
        self.opset_imports.get(domain).copied()
    }
}

/// One end of a data edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    GraphInput,
    Initializer,
    GraphOutput,
    Node { id: NodeId, slot: usize },
}

/// A named value flowing from its producer to one consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEdge {
    pub tensor: String,
    pub from: Endpoint,
    pub to: Endpoint,
}

/// Validated, topologically ordered execution graph
#[derive(Debug, Clone)]
pub struct ExecutionGraph {
    pub nodes: Vec<Node>,
    pub dependencies: HashMap<NodeId, Vec<NodeId>>,
    pub edges: Vec<DataEdge>,
}

impl ExecutionGraph {
    /// Edges consumed by the given node, in input-slot order
    pub fn inputs_of(&self, id: NodeId) -> Vec<&DataEdge> {
        let mut edges: Vec<&DataEdge> = self
            .edges
            .iter()
            .filter(|edge| matches!(edge.to, Endpoint::Node { id: to, .. } if to == id))
            .collect();
        edges.sort_by_key(|edge| match edge.to {
            Endpoint::Node { slot, .. } => slot,
            _ => usize::MAX,
        });
        edges
    }

    /// Edges leaving the given node
    pub fn outputs_of(&self, id: NodeId) -> Vec<&DataEdge> {
        self.edges
            .iter()
            .filter(|edge| matches!(edge.from, Endpoint::Node { id: from, .. } if from == id))
            .collect()
    }
}
