//! Building and saving ONNX models.
//!
//! The output of this module is meant to be used as a byte-for-byte test
//! oracle, so every step is deterministic: attributes follow the caller's
//! key order, explicitly empty doc strings are written as empty fields, and
//! the protobuf encoding is emitted in field-number order.

pub mod fixtures;
pub mod helper;

use std::fs;
use std::path::Path;

use bytes::{Bytes, BytesMut};
use log::info;
use prost::Message;

use crate::error::{Error, Result};
use crate::proto::{
    AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto, TensorProto,
    ValueInfoProto,
};

pub use fixtures::Fixture;
pub use helper::{
    make_attribute, make_float_tensor, make_graph, make_model, make_node, make_operatorsetid,
    make_tensor_value_info, AttributeValue, IR_VERSION,
};

/// Description of a single node invocation
#[derive(Debug, Clone, Default)]
pub struct NodeSpec {
    pub op_type: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub name: Option<String>,
    pub doc_string: Option<String>,
    pub domain: Option<String>,
    /// Attributes in the order they should be serialized
    pub attributes: Vec<(String, AttributeValue)>,
}

impl NodeSpec {
    pub fn new<I, O, S, T>(op_type: &str, inputs: I, outputs: O) -> Self
    where
        I: IntoIterator<Item = S>,
        O: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            op_type: op_type.to_string(),
            inputs: inputs.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }

    pub fn doc_string(mut self, doc_string: &str) -> Self {
        self.doc_string = Some(doc_string.to_string());
        self
    }

    pub fn attribute(mut self, key: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.push((key.to_string(), value.into()));
        self
    }
}

/// Description of a graph
#[derive(Debug, Clone, Default)]
pub struct GraphSpec {
    pub name: String,
    pub nodes: Vec<NodeProto>,
    pub inputs: Vec<ValueInfoProto>,
    pub outputs: Vec<ValueInfoProto>,
    pub initializers: Vec<TensorProto>,
    pub value_info: Vec<ValueInfoProto>,
    pub doc_string: Option<String>,
}

impl GraphSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn nodes(mut self, nodes: impl IntoIterator<Item = NodeProto>) -> Self {
        self.nodes.extend(nodes);
        self
    }

    pub fn input(mut self, input: ValueInfoProto) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn output(mut self, output: ValueInfoProto) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn initializer(mut self, tensor: TensorProto) -> Self {
        self.initializers.push(tensor);
        self
    }

    pub fn doc_string(mut self, doc_string: &str) -> Self {
        self.doc_string = Some(doc_string.to_string());
        self
    }
}

/// Messages carrying an optional `doc_string` field
pub trait DocString {
    fn doc_string_mut(&mut self) -> &mut Option<String>;
}

macro_rules! impl_doc_string {
    ($($proto:ty),* $(,)?) => {
        $(
            impl DocString for $proto {
                fn doc_string_mut(&mut self) -> &mut Option<String> {
                    &mut self.doc_string
                }
            }
        )*
    };
}

impl_doc_string!(NodeProto, GraphProto, ModelProto, ValueInfoProto, AttributeProto, TensorProto);

/// Write an explicitly empty doc string as a present, empty field.
///
/// The stock helpers drop empty doc strings, which makes the encoding depend
/// on the helper version. Any other `text` leaves the entity untouched.
pub fn normalize_doc_string<T: DocString>(mut entity: T, text: Option<&str>) -> T {
    if text == Some("") {
        *entity.doc_string_mut() = Some(String::new());
    }
    entity
}

/// Stable-sort `items` so their keys follow `order`.
///
/// Every key must appear in `order`.
pub fn order_repeated_field<T, K, S>(items: &mut Vec<T>, key: K, order: &[S]) -> Result<()>
where
    K: Fn(&T) -> &str,
    S: AsRef<str>,
{
    let ranks = items
        .iter()
        .map(|item| {
            let name = key(item);
            order
                .iter()
                .position(|candidate| candidate.as_ref() == name)
                .ok_or_else(|| {
                    Error::ValidationError(format!("'{}' is not in the requested order", name))
                })
        })
        .collect::<Result<Vec<usize>>>()?;

    let mut ranked: Vec<(usize, T)> = ranks.into_iter().zip(std::mem::take(items)).collect();
    ranked.sort_by_key(|(rank, _)| *rank);
    items.extend(ranked.into_iter().map(|(_, item)| item));
    Ok(())
}

/// Build a node with deterministic attribute order and doc string handling
pub fn build_node(spec: NodeSpec) -> Result<NodeProto> {
    let mut node = normalize_doc_string(make_node(&spec), spec.doc_string.as_deref());

    let order: Vec<&str> = spec.attributes.iter().map(|(key, _)| key.as_str()).collect();
    order_repeated_field(
        &mut node.attribute,
        |attr: &AttributeProto| attr.name.as_deref().unwrap_or_default(),
        &order,
    )?;

    Ok(node)
}

/// Build a graph. Wiring is not checked here; the loader does that.
pub fn build_graph(spec: GraphSpec) -> GraphProto {
    normalize_doc_string(make_graph(&spec), spec.doc_string.as_deref())
}

/// Opset import for the default domain, written without a `domain` field
pub fn clear_domain(mut opset: OperatorSetIdProto) -> OperatorSetIdProto {
    opset.domain = None;
    opset
}

/// Serialize a model to its protobuf encoding
pub fn encode_model(model: &ModelProto) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(model.encoded_len());
    model.encode(&mut buf)?;
    Ok(buf.freeze())
}

/// Serialize a model and write it to `path`
pub fn save_model(model: &ModelProto, path: &Path) -> Result<()> {
    let bytes = encode_model(model)?;
    fs::write(path, &bytes)?;
    info!("Saved model ({} bytes) to {}", bytes.len(), path.display());
    Ok(())
}
