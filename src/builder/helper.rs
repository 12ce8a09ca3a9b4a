use crate::model::DataType;
use crate::proto::{
    onnx::type_proto, AttributeProto, AttributeType, Dimension, DimensionValue, GraphProto,
    ModelProto, NodeProto, OperatorSetIdProto, TensorProto, TensorShapeProto, TypeProto,
    TypeValue, ValueInfoProto,
};

use super::{GraphSpec, NodeSpec};

/// IR version stamped on models built here unless the caller overrides it
pub const IR_VERSION: i64 = 9;

/// Attribute payloads accepted by [`make_attribute`]
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Float(f32),
    Int(i64),
    String(String),
    Tensor(TensorProto),
    Graph(GraphProto),
    Floats(Vec<f32>),
    Ints(Vec<i64>),
    Strings(Vec<String>),
    Tensors(Vec<TensorProto>),
    Graphs(Vec<GraphProto>),
}

impl From<f32> for AttributeValue {
    fn from(value: f32) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<TensorProto> for AttributeValue {
    fn from(value: TensorProto) -> Self {
        AttributeValue::Tensor(value)
    }
}

impl From<GraphProto> for AttributeValue {
    fn from(value: GraphProto) -> Self {
        AttributeValue::Graph(value)
    }
}

impl From<Vec<f32>> for AttributeValue {
    fn from(value: Vec<f32>) -> Self {
        AttributeValue::Floats(value)
    }
}

impl From<Vec<i64>> for AttributeValue {
    fn from(value: Vec<i64>) -> Self {
        AttributeValue::Ints(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(value: Vec<String>) -> Self {
        AttributeValue::Strings(value)
    }
}

/// Build an attribute, deriving its `type` tag from the value
pub fn make_attribute(name: &str, value: AttributeValue) -> AttributeProto {
    let mut attr = AttributeProto {
        name: Some(name.to_string()),
        ..Default::default()
    };

    let attr_type = match value {
        AttributeValue::Float(f) => {
            attr.f = Some(f);
            AttributeType::Float
        }
        AttributeValue::Int(i) => {
            attr.i = Some(i);
            AttributeType::Int
        }
        AttributeValue::String(s) => {
            attr.s = Some(s.into_bytes());
            AttributeType::String
        }
        AttributeValue::Tensor(t) => {
            attr.t = Some(t);
            AttributeType::Tensor
        }
        AttributeValue::Graph(g) => {
            attr.g = Some(g);
            AttributeType::Graph
        }
        AttributeValue::Floats(floats) => {
            attr.floats = floats;
            AttributeType::Floats
        }
        AttributeValue::Ints(ints) => {
            attr.ints = ints;
            AttributeType::Ints
        }
        AttributeValue::Strings(strings) => {
            attr.strings = strings.into_iter().map(String::into_bytes).collect();
            AttributeType::Strings
        }
        AttributeValue::Tensors(tensors) => {
            attr.tensors = tensors;
            AttributeType::Tensors
        }
        AttributeValue::Graphs(graphs) => {
            attr.graphs = graphs;
            AttributeType::Graphs
        }
    };

    attr.r#type = Some(attr_type as i32);
    attr
}

/// Build a node the way the stock ONNX helper does: attributes sorted by
/// name, `name` and `doc_string` only when non-empty, `domain` whenever given.
pub fn make_node(spec: &NodeSpec) -> NodeProto {
    let mut attributes: Vec<&(String, AttributeValue)> = spec.attributes.iter().collect();
    attributes.sort_by(|a, b| a.0.cmp(&b.0));

    NodeProto {
        input: spec.inputs.clone(),
        output: spec.outputs.clone(),
        name: spec.name.clone().filter(|name| !name.is_empty()),
        op_type: Some(spec.op_type.clone()),
        attribute: attributes
            .into_iter()
            .map(|(key, value)| make_attribute(key, value.clone()))
            .collect(),
        doc_string: spec.doc_string.clone().filter(|doc| !doc.is_empty()),
        domain: spec.domain.clone(),
    }
}

/// Build a graph; `doc_string` is only set when non-empty
pub fn make_graph(spec: &GraphSpec) -> GraphProto {
    GraphProto {
        node: spec.nodes.clone(),
        name: Some(spec.name.clone()),
        initializer: spec.initializers.clone(),
        doc_string: spec.doc_string.clone().filter(|doc| !doc.is_empty()),
        input: spec.inputs.clone(),
        output: spec.outputs.clone(),
        value_info: spec.value_info.clone(),
    }
}

pub fn make_tensor_type_proto(elem_type: DataType, shape: &[i64]) -> TypeProto {
    let shape = TensorShapeProto {
        dim: shape
            .iter()
            .map(|&d| Dimension {
                denotation: None,
                value: Some(DimensionValue::DimValue(d)),
            })
            .collect(),
    };

    TypeProto {
        denotation: None,
        value: Some(TypeValue::TensorType(type_proto::Tensor {
            elem_type: Some(elem_type.to_proto()),
            shape: Some(shape),
        })),
    }
}

pub fn make_tensor_value_info(name: &str, elem_type: DataType, shape: &[i64]) -> ValueInfoProto {
    ValueInfoProto {
        name: Some(name.to_string()),
        r#type: Some(make_tensor_type_proto(elem_type, shape)),
        doc_string: None,
    }
}

/// Float tensor stored in `float_data`
pub fn make_float_tensor(name: &str, dims: &[i64], values: &[f32]) -> TensorProto {
    TensorProto {
        dims: dims.to_vec(),
        data_type: Some(DataType::Float.to_proto()),
        float_data: values.to_vec(),
        name: Some(name.to_string()),
        ..Default::default()
    }
}

pub fn make_operatorsetid(domain: &str, version: i64) -> OperatorSetIdProto {
    OperatorSetIdProto {
        domain: Some(domain.to_string()),
        version: Some(version),
    }
}

pub fn make_model(graph: GraphProto, opset_imports: Vec<OperatorSetIdProto>) -> ModelProto {
    ModelProto {
        ir_version: Some(IR_VERSION),
        graph: Some(graph),
        opset_import: opset_imports,
        ..Default::default()
    }
}
