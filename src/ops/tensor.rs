use std::fmt;

use ndarray::{ArrayD, IxDyn};
use num_traits::Float;

use crate::error::{Error, Result};
use crate::model::{DataType, Tensor as ModelTensor};

/// Shape of a tensor
pub type Shape = Vec<usize>;

/// Typed element storage
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Float(ArrayD<f32>),
    Double(ArrayD<f64>),
    Int32(ArrayD<i32>),
    Int64(ArrayD<i64>),
    Bool(ArrayD<bool>),
}

macro_rules! for_each_array {
    ($data:expr, $arr:ident => $body:expr) => {
        match $data {
            TensorData::Float($arr) => $body,
            TensorData::Double($arr) => $body,
            TensorData::Int32($arr) => $body,
            TensorData::Int64($arr) => $body,
            TensorData::Bool($arr) => $body,
        }
    };
}

/// Tensor struct for runtime computation
#[derive(Clone, PartialEq)]
pub struct Tensor {
    pub name: Option<String>,
    pub data: TensorData,
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor {{ name: {:?}, data_type: {}, shape: {:?} }}",
            self.name,
            self.data_type(),
            self.shape()
        )
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{}: ", name)?;
        }
        for_each_array!(&self.data, arr => write!(f, "{}", arr))?;
        write!(f, " (tensor({}), shape {:?})", self.data_type(), self.shape())
    }
}

macro_rules! impl_from_array {
    ($elem:ty, $variant:ident) => {
        impl From<ArrayD<$elem>> for Tensor {
            fn from(arr: ArrayD<$elem>) -> Self {
                Tensor::new(TensorData::$variant(arr))
            }
        }
    };
}

impl_from_array!(f32, Float);
impl_from_array!(f64, Double);
impl_from_array!(i32, Int32);
impl_from_array!(i64, Int64);
impl_from_array!(bool, Bool);

impl Tensor {
    pub fn new(data: TensorData) -> Self {
        Self { name: None, data }
    }

    /// Build a float tensor from a flat buffer
    pub fn from_f32(shape: &[usize], values: Vec<f32>) -> Result<Self> {
        Ok(Self::from(from_shape_vec(shape, values)?))
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn data_type(&self) -> DataType {
        match &self.data {
            TensorData::Float(_) => DataType::Float,
            TensorData::Double(_) => DataType::Double,
            TensorData::Int32(_) => DataType::Int32,
            TensorData::Int64(_) => DataType::Int64,
            TensorData::Bool(_) => DataType::Bool,
        }
    }

    pub fn shape(&self) -> &[usize] {
        for_each_array!(&self.data, arr => arr.shape())
    }

    pub fn len(&self) -> usize {
        for_each_array!(&self.data, arr => arr.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match &self.data {
            TensorData::Float(arr) => Some(arr),
            _ => None,
        }
    }

    /// Elements widened to `f64` in logical order
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match &self.data {
            TensorData::Float(arr) => arr.iter().map(|&v| v as f64).collect(),
            TensorData::Double(arr) => arr.iter().copied().collect(),
            TensorData::Int32(arr) => arr.iter().map(|&v| v as f64).collect(),
            TensorData::Int64(arr) => arr.iter().map(|&v| v as f64).collect(),
            TensorData::Bool(arr) => arr.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect(),
        }
    }

    /// Build a tensor of the element type of `values`
    pub fn from_vec<T>(shape: &[usize], values: Vec<T>) -> Result<Self>
    where
        Tensor: From<ArrayD<T>>,
    {
        Ok(Self::from(from_shape_vec(shape, values)?))
    }

    /// Create a runtime tensor from an initializer
    pub fn from_model_tensor(tensor: &ModelTensor) -> Result<Self> {
        let shape = tensor
            .dims
            .iter()
            .map(|&d| {
                usize::try_from(d).map_err(|_| {
                    Error::InvalidModel(format!("Tensor {} has negative dimension {}", tensor.name, d))
                })
            })
            .collect::<Result<Shape>>()?;

        let data = match tensor.data_type {
            DataType::Float => TensorData::Float(from_shape_vec(&shape, decode_le(&tensor.data, f32::from_le_bytes))?),
            DataType::Double => TensorData::Double(from_shape_vec(&shape, decode_le(&tensor.data, f64::from_le_bytes))?),
            DataType::Int32 => TensorData::Int32(from_shape_vec(&shape, decode_le(&tensor.data, i32::from_le_bytes))?),
            DataType::Int64 => TensorData::Int64(from_shape_vec(&shape, decode_le(&tensor.data, i64::from_le_bytes))?),
            DataType::Bool => TensorData::Bool(from_shape_vec(&shape, tensor.data.iter().map(|&b| b != 0).collect())?),
            other => {
                return Err(Error::UnsupportedFeature(format!(
                    "Initializer {} has unsupported type {}",
                    tensor.name, other
                )))
            }
        };

        Ok(Self::new(data).with_name(&tensor.name))
    }
}

fn from_shape_vec<T>(shape: &[usize], values: Vec<T>) -> Result<ArrayD<T>> {
    let len = values.len();
    ArrayD::from_shape_vec(IxDyn(shape), values).map_err(|e| {
        Error::ValidationError(format!("{} values do not fit shape {:?}: {}", len, shape, e))
    })
}

fn decode_le<T, const N: usize>(bytes: &[u8], from_bytes: fn([u8; N]) -> T) -> Vec<T> {
    bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut buf = [0u8; N];
            buf.copy_from_slice(chunk);
            from_bytes(buf)
        })
        .collect()
}

/// Scalar function applied to every element of a floating point tensor
pub trait FloatUnary {
    fn apply<T: Float>(&self, x: T) -> T;
}

pub fn element_wise_unary_op<Op: FloatUnary>(a: &Tensor, op: &Op) -> Result<Tensor> {
    let data = match &a.data {
        TensorData::Float(arr) => TensorData::Float(arr.mapv(|x| op.apply(x))),
        TensorData::Double(arr) => TensorData::Double(arr.mapv(|x| op.apply(x))),
        _ => {
            return Err(Error::UnsupportedFeature(format!(
                "Element-wise float operation on tensor({})",
                a.data_type()
            )))
        }
    };
    Ok(Tensor::new(data))
}
