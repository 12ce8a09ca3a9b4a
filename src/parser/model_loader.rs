use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::debug;
use prost::Message;

use crate::error::{Error, Result};
use crate::model::{Attribute, DataType, Graph, ModelMetadata, Node, OnnxModel, Tensor, TensorInfo};
use crate::proto::{
    AttributeProto, AttributeType, DimensionValue, GraphProto, ModelProto, NodeProto,
    OperatorSetIdProto, TensorProto, TypeValue, ValueInfoProto,
};

/// Explicit name of the default operator domain
pub const ONNX_DOMAIN: &str = "ai.onnx";

/// ONNX model loader responsible for parsing and loading ONNX models
pub struct OnnxModelLoader;

impl OnnxModelLoader {
    /// Load an ONNX model from a file path
    pub fn load_model(path: &Path) -> Result<OnnxModel> {
        let model_proto = Self::load_model_proto(path)?;
        Self::convert_proto_to_internal(model_proto)
            .map_err(|e| Error::ModelLoadError(path.to_path_buf(), e.to_string()))
    }

    /// Read and decode a model file without converting it
    pub fn load_model_proto(path: &Path) -> Result<ModelProto> {
        let mut file = File::open(path).map_err(|e| {
            Error::ModelLoadError(path.to_path_buf(), format!("Failed to open file: {}", e))
        })?;

        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer).map_err(|e| {
            Error::ModelLoadError(path.to_path_buf(), format!("Failed to read file: {}", e))
        })?;

        debug!("Read {} bytes from {}", buffer.len(), path.display());
        Self::deserialize_model_proto(&buffer)
    }

    /// Load an ONNX model from bytes
    pub fn load_model_from_bytes(data: &[u8]) -> Result<OnnxModel> {
        let model_proto = Self::deserialize_model_proto(data)?;
        Self::convert_proto_to_internal(model_proto)
    }

    /// Deserialize protobuf bytes into a ModelProto
    pub fn deserialize_model_proto(bytes: &[u8]) -> Result<ModelProto> {
        ModelProto::decode(bytes).map_err(Error::ProtobufError)
    }

    /// Convert protobuf model to internal representation
    pub fn convert_proto_to_internal(proto: ModelProto) -> Result<OnnxModel> {
        let opset_imports = Self::handle_opset_imports(&proto.opset_import);
        let metadata = Self::extract_model_metadata(&proto);
        let metadata_props = proto
            .metadata_props
            .iter()
            .map(|entry| {
                (
                    entry.key.clone().unwrap_or_default(),
                    entry.value.clone().unwrap_or_default(),
                )
            })
            .collect();

        let graph_proto = proto
            .graph
            .ok_or_else(|| Error::MissingField("Model is missing graph".to_string()))?;
        let graph = Self::convert_graph_proto(graph_proto)?;

        Ok(OnnxModel {
            metadata,
            graph,
            opset_imports,
            metadata_props,
        })
    }

    /// Extract model metadata from protobuf
    pub fn extract_model_metadata(proto: &ModelProto) -> ModelMetadata {
        ModelMetadata {
            producer_name: proto.producer_name.clone().unwrap_or_default(),
            producer_version: proto.producer_version.clone().unwrap_or_default(),
            domain: proto.domain.clone().unwrap_or_default(),
            model_version: proto.model_version.unwrap_or_default(),
            doc_string: proto.doc_string.clone().unwrap_or_default(),
            graph_name: proto
                .graph
                .as_ref()
                .and_then(|g| g.name.clone())
                .unwrap_or_default(),
            ir_version: proto.ir_version.unwrap_or_default(),
        }
    }

    /// Process opset imports. An import without a domain, or with `ai.onnx`,
    /// is the default domain.
    pub fn handle_opset_imports(imports: &[OperatorSetIdProto]) -> HashMap<String, i64> {
        imports
            .iter()
            .map(|import| {
                (
                    normalize_domain(import.domain.as_deref()),
                    import.version.unwrap_or(1),
                )
            })
            .collect()
    }

    /// Extract input tensor information from model
    pub fn get_input_info(model: &OnnxModel) -> Vec<TensorInfo> {
        model.graph.inputs.clone()
    }

    /// Extract output tensor information from model
    pub fn get_output_info(model: &OnnxModel) -> Vec<TensorInfo> {
        model.graph.outputs.clone()
    }

    fn convert_graph_proto(graph_proto: GraphProto) -> Result<Graph> {
        let initializers = graph_proto
            .initializer
            .iter()
            .map(Self::convert_tensor_proto)
            .collect::<Result<Vec<_>>>()?;

        let initializer_names: Vec<&str> = initializers.iter().map(|t| t.name.as_str()).collect();

        // Older models list initializers among the graph inputs as well
        let inputs = graph_proto
            .input
            .iter()
            .map(Self::convert_value_info_proto)
            .filter(|info| match info {
                Ok(info) => !initializer_names.contains(&info.name.as_str()),
                Err(_) => true,
            })
            .collect::<Result<Vec<_>>>()?;

        let outputs = graph_proto
            .output
            .iter()
            .map(Self::convert_value_info_proto)
            .collect::<Result<Vec<_>>>()?;

        let value_info = graph_proto
            .value_info
            .iter()
            .map(Self::convert_value_info_proto)
            .collect::<Result<Vec<_>>>()?;

        let nodes = graph_proto
            .node
            .iter()
            .enumerate()
            .map(|(id, node)| Self::convert_node_proto(node, id))
            .collect::<Result<Vec<_>>>()?;

        Ok(Graph {
            name: graph_proto.name.unwrap_or_default(),
            nodes,
            inputs,
            outputs,
            initializers,
            value_info,
            doc_string: graph_proto.doc_string.unwrap_or_default(),
        })
    }

    fn convert_node_proto(node_proto: &NodeProto, id: usize) -> Result<Node> {
        let mut attributes = HashMap::new();

        for attr in &node_proto.attribute {
            let name = attr.name.clone().unwrap_or_default();
            let value = Self::convert_attribute_proto(attr)?;
            attributes.insert(name, value);
        }

        let op_type = node_proto
            .op_type
            .clone()
            .ok_or_else(|| Error::MissingField(format!("op_type of node {}", id)))?;

        let name = match &node_proto.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}_{}", op_type, id),
        };

        Ok(Node {
            id,
            name,
            op_type,
            domain: normalize_domain(node_proto.domain.as_deref()),
            inputs: node_proto.input.clone(),
            outputs: node_proto.output.clone(),
            attributes,
            doc_string: node_proto.doc_string.clone().unwrap_or_default(),
        })
    }

    /// Convert a TensorProto to raw little-endian bytes
    pub fn convert_tensor_proto(tensor_proto: &TensorProto) -> Result<Tensor> {
        let data_type = tensor_proto
            .data_type
            .map(DataType::from_proto)
            .unwrap_or(DataType::Undefined);

        let data = match &tensor_proto.raw_data {
            Some(raw) => raw.clone(),
            None => match data_type {
                DataType::Float => le_bytes(&tensor_proto.float_data, f32::to_le_bytes),
                DataType::Double => le_bytes(&tensor_proto.double_data, f64::to_le_bytes),
                DataType::Int64 => le_bytes(&tensor_proto.int64_data, i64::to_le_bytes),
                DataType::Int32 => le_bytes(&tensor_proto.int32_data, i32::to_le_bytes),
                DataType::Bool | DataType::Uint8 | DataType::Int8 => tensor_proto
                    .int32_data
                    .iter()
                    .map(|&v| v as u8)
                    .collect(),
                other => {
                    return Err(Error::UnsupportedFeature(format!(
                        "Tensor {} has unsupported data type {}",
                        tensor_proto.name.as_deref().unwrap_or_default(),
                        other
                    )))
                }
            },
        };

        Ok(Tensor {
            name: tensor_proto.name.clone().unwrap_or_default(),
            data_type,
            dims: tensor_proto.dims.clone(),
            data,
            doc_string: tensor_proto.doc_string.clone().unwrap_or_default(),
        })
    }

    fn convert_value_info_proto(value_info: &ValueInfoProto) -> Result<TensorInfo> {
        let name = value_info.name.clone().unwrap_or_default();

        let type_proto = value_info
            .r#type
            .as_ref()
            .ok_or_else(|| Error::MissingField(format!("Missing type for value info: {}", name)))?;

        let tensor_type = match &type_proto.value {
            Some(TypeValue::TensorType(tensor)) => tensor,
            Some(TypeValue::SparseTensorType(_)) => {
                return Err(Error::UnsupportedFeature(format!(
                    "Sparse tensor value info: {}",
                    name
                )))
            }
            None => {
                return Err(Error::MissingField(format!(
                    "Missing tensor type for value info: {}",
                    name
                )))
            }
        };

        let shape = match &tensor_type.shape {
            Some(shape) => shape
                .dim
                .iter()
                .map(|dim| match &dim.value {
                    Some(DimensionValue::DimValue(val)) => *val,
                    // Symbolic or unknown dimension
                    Some(DimensionValue::DimParam(_)) | None => -1,
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(TensorInfo {
            name,
            shape,
            data_type: tensor_type
                .elem_type
                .map(DataType::from_proto)
                .unwrap_or(DataType::Undefined),
            doc_string: value_info.doc_string.clone().unwrap_or_default(),
        })
    }

    fn convert_attribute_proto(attr: &AttributeProto) -> Result<Attribute> {
        let name = attr.name.as_deref().unwrap_or_default();
        let attr_type = attr
            .r#type
            .and_then(AttributeType::from_i32)
            .unwrap_or(AttributeType::Undefined);

        match attr_type {
            AttributeType::Float => Ok(Attribute::Float(attr.f.unwrap_or_default())),
            AttributeType::Int => Ok(Attribute::Int(attr.i.unwrap_or_default())),
            AttributeType::String => Ok(Attribute::String(
                String::from_utf8_lossy(attr.s.as_deref().unwrap_or_default()).into_owned(),
            )),
            AttributeType::Tensor => match &attr.t {
                Some(t) => Ok(Attribute::Tensor(Self::convert_tensor_proto(t)?)),
                None => Err(Error::MissingField(format!("Missing tensor in attribute {}", name))),
            },
            AttributeType::Floats => Ok(Attribute::Floats(attr.floats.clone())),
            AttributeType::Ints => Ok(Attribute::Ints(attr.ints.clone())),
            AttributeType::Strings => Ok(Attribute::Strings(
                attr.strings
                    .iter()
                    .map(|s| String::from_utf8_lossy(s).into_owned())
                    .collect(),
            )),
            AttributeType::Tensors => {
                let tensors = attr
                    .tensors
                    .iter()
                    .map(Self::convert_tensor_proto)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Attribute::Tensors(tensors))
            }
            AttributeType::Undefined => Err(Error::InvalidModel(format!(
                "Undefined attribute type for {}",
                name
            ))),
            other => Err(Error::UnsupportedFeature(format!(
                "{:?} attributes not supported ({})",
                other, name
            ))),
        }
    }
}

/// `ai.onnx` and the empty string name the same domain; keep the empty form.
pub fn normalize_domain(domain: Option<&str>) -> String {
    match domain {
        None | Some(ONNX_DOMAIN) => String::new(),
        Some(other) => other.to_string(),
    }
}

fn le_bytes<T: Copy, const N: usize>(values: &[T], to_bytes: impl Fn(T) -> [u8; N]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * N);
    for &value in values {
        bytes.extend_from_slice(&to_bytes(value));
    }
    bytes
}
