//! Load a model, bind inputs, run it and collect the requested outputs.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::error::{Error, Result};
use crate::execution::{InferenceSession, ProviderConfig, SessionOptions, IN_TREE_PROVIDER};
use crate::model::DataType;
use crate::ops::custom::optional_output_domain;
use crate::ops::tensor::{Tensor, TensorData};

/// One named input tensor.
///
/// Values keep their JSON number form until the element type is known, so
/// integer inputs are never routed through `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputBinding {
    pub name: String,
    #[serde(default = "default_data_type")]
    pub data_type: String,
    /// Defaults to a vector of `values.len()` elements
    #[serde(default)]
    pub shape: Option<Vec<usize>>,
    pub values: Vec<Number>,
}

fn default_data_type() -> String {
    DataType::Float.to_string()
}

impl InputBinding {
    pub fn new<T: Into<Number>>(name: &str, values: impl IntoIterator<Item = T>) -> Self {
        Self {
            name: name.to_string(),
            data_type: default_data_type(),
            shape: None,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn to_tensor(&self) -> Result<Tensor> {
        let data_type = DataType::from_str(&self.data_type).map_err(|_| {
            Error::InvalidConfig(format!(
                "Unknown data type '{}' for input {}",
                self.data_type, self.name
            ))
        })?;
        let shape = self.shape.clone().unwrap_or_else(|| vec![self.values.len()]);

        let tensor = match data_type {
            DataType::Float => Tensor::from_vec(&shape, self.convert(data_type, |n| n.as_f64().map(|v| v as f32))?)?,
            DataType::Double => Tensor::from_vec(&shape, self.convert(data_type, Number::as_f64)?)?,
            DataType::Int32 => Tensor::from_vec(
                &shape,
                self.convert(data_type, |n| n.as_i64().and_then(|v| i32::try_from(v).ok()))?,
            )?,
            DataType::Int64 => Tensor::from_vec(&shape, self.convert(data_type, Number::as_i64)?)?,
            DataType::Bool => Tensor::from_vec(&shape, self.convert(data_type, |n| n.as_f64().map(|v| v != 0.0))?)?,
            other => {
                return Err(Error::UnsupportedFeature(format!(
                    "Inputs of type {} are not supported",
                    other
                )))
            }
        };
        Ok(tensor.with_name(&self.name))
    }

    /// Convert every value exactly, or report the first one that does not fit
    fn convert<T>(&self, data_type: DataType, cast: impl Fn(&Number) -> Option<T>) -> Result<Vec<T>> {
        self.values
            .iter()
            .map(|n| {
                cast(n).ok_or_else(|| {
                    Error::InvalidConfig(format!(
                        "Value {} of input {} is not a valid {}",
                        n, self.name, data_type
                    ))
                })
            })
            .collect()
    }
}

impl FromStr for InputBinding {
    type Err = Error;

    /// `NAME[:TYPE]=v1,v2,...`
    fn from_str(s: &str) -> Result<Self> {
        let (head, values) = s
            .split_once('=')
            .ok_or_else(|| Error::InvalidConfig(format!("Expected NAME[:TYPE]=VALUES, got '{}'", s)))?;

        let (name, data_type) = match head.split_once(':') {
            Some((name, data_type)) => (name, data_type.to_string()),
            None => (head, default_data_type()),
        };
        if name.is_empty() {
            return Err(Error::InvalidConfig(format!("Missing input name in '{}'", s)));
        }

        let values = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| {
                serde_json::from_str::<Number>(v).map_err(|_| {
                    Error::InvalidConfig(format!("Invalid value '{}' for input {}", v, name))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            data_type,
            shape: None,
            values,
        })
    }
}

/// `NAME:KEY=VALUE` as accepted by `--provider-option`
pub fn parse_provider_option(s: &str) -> Result<(String, String, String)> {
    let invalid = || Error::InvalidConfig(format!("Expected PROVIDER:KEY=VALUE, got '{}'", s));
    let (provider, option) = s.split_once(':').ok_or_else(invalid)?;
    let (key, value) = option.split_once('=').ok_or_else(invalid)?;
    if provider.is_empty() || key.is_empty() {
        return Err(invalid());
    }
    Ok((provider.to_string(), key.to_string(), value.to_string()))
}

/// Everything needed for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub model: PathBuf,
    pub providers: Vec<ProviderConfig>,
    pub inputs: Vec<InputBinding>,
    pub outputs: Vec<String>,
    /// Schema-validate the model before planning
    pub validate_graph: bool,
    /// Log per-node timings at debug level
    pub enable_profiling: bool,
    pub log_id: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("Relu.onnx"),
            providers: vec![ProviderConfig::new(IN_TREE_PROVIDER)
                .with_option("int_property", "3")
                .with_option("str_property", "strval")],
            inputs: vec![InputBinding::new("x", [-3i64, 5, -2, 4])],
            outputs: vec!["graphOut".to_string()],
            validate_graph: true,
            enable_profiling: false,
            log_id: String::new(),
        }
    }
}

impl RunnerConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Set an option on an already requested provider
    pub fn set_provider_option(&mut self, provider: &str, key: &str, value: &str) -> Result<()> {
        let config = self
            .providers
            .iter_mut()
            .find(|p| p.name == provider)
            .ok_or_else(|| {
                Error::InvalidConfig(format!("Option given for provider {} which was not requested", provider))
            })?;
        config.options.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            providers: self.providers.clone(),
            ..SessionOptions::default()
        }
        .set_validate_graph(self.validate_graph)
        .enable_profiling(self.enable_profiling)
        .set_log_id(&self.log_id)
        .add_custom_op_domain(optional_output_domain())
    }
}

/// Run the configured model once
pub fn run_model(config: &RunnerConfig) -> Result<Vec<Tensor>> {
    let session = InferenceSession::with_options(&config.model, config.session_options())?;

    let inputs = config
        .inputs
        .iter()
        .map(|binding| Ok((binding.name.clone(), binding.to_tensor()?)))
        .collect::<Result<HashMap<_, _>>>()?;

    let output_names: Vec<&str> = config.outputs.iter().map(String::as_str).collect();
    let outputs = session.run(&output_names, inputs)?;

    info!(
        "Ran {} on [{}], {} output(s)",
        config.model.display(),
        session.providers().join(", "),
        outputs.len()
    );
    Ok(outputs)
}

/// Outputs as a JSON object keyed by name
pub fn outputs_to_json(outputs: &[Tensor]) -> serde_json::Value {
    let entries = outputs
        .iter()
        .enumerate()
        .map(|(i, tensor)| {
            let name = tensor.name.clone().unwrap_or_else(|| format!("output_{}", i));
            let value = serde_json::json!({
                "data_type": tensor.data_type().to_string(),
                "shape": tensor.shape(),
                "values": json_values(tensor),
            });
            (name, value)
        })
        .collect();
    serde_json::Value::Object(entries)
}

/// Element values with their own JSON number kind, so int64 stays exact
fn json_values(tensor: &Tensor) -> serde_json::Value {
    match &tensor.data {
        TensorData::Float(arr) => arr.iter().map(|&v| v as f64).collect(),
        TensorData::Double(arr) => arr.iter().copied().collect(),
        TensorData::Int32(arr) => arr.iter().copied().collect(),
        TensorData::Int64(arr) => arr.iter().copied().collect(),
        TensorData::Bool(arr) => arr.iter().copied().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_input_binding() {
        let binding: InputBinding = "x=-3,5,-2,4".parse().unwrap();
        assert_eq!(binding, InputBinding::new("x", [-3i64, 5, -2, 4]));
        assert_eq!(binding.to_tensor().unwrap().to_f64_vec(), vec![-3.0, 5.0, -2.0, 4.0]);

        let typed: InputBinding = "ids:int64=1, 2".parse().unwrap();
        assert_eq!(typed.data_type, "int64");
        assert_eq!(typed.to_tensor().unwrap().data_type(), DataType::Int64);

        assert!("x".parse::<InputBinding>().is_err());
        assert!("x=1,two".parse::<InputBinding>().is_err());
    }

    #[test]
    fn int64_values_are_exact() {
        // 2^53 + 1 has no f64 representation
        let binding: InputBinding = "ids:int64=9007199254740993,-9223372036854775808".parse().unwrap();
        let tensor = binding.to_tensor().unwrap();
        match &tensor.data {
            TensorData::Int64(arr) => {
                assert_eq!(arr.iter().copied().collect::<Vec<_>>(), vec![9007199254740993, i64::MIN]);
            }
            other => panic!("expected int64 data, got {:?}", other),
        }

        let json = outputs_to_json(&[tensor]);
        assert_eq!(json["ids"]["values"][0].as_i64(), Some(9007199254740993));
    }

    #[test]
    fn values_must_fit_the_data_type() {
        let fractional: InputBinding = "ids:int64=1.5".parse().unwrap();
        assert!(matches!(fractional.to_tensor(), Err(Error::InvalidConfig(_))));

        let too_big: InputBinding = "ids:int32=4294967296".parse().unwrap();
        assert!(matches!(too_big.to_tensor(), Err(Error::InvalidConfig(_))));

        let floats: InputBinding = "x:double=0.25,3".parse().unwrap();
        assert_eq!(floats.to_tensor().unwrap().to_f64_vec(), vec![0.25, 3.0]);
    }

    #[test]
    fn session_settings_reach_options() {
        let config: RunnerConfig =
            serde_json::from_str(r#"{"validate_graph": false, "enable_profiling": true, "log_id": "run-7"}"#).unwrap();
        let options = config.session_options();

        assert!(!options.validate_graph);
        assert!(options.enable_profiling);
        assert_eq!(options.log_id, "run-7");
        assert_eq!(options.custom_op_domains.len(), 1);

        let defaults = RunnerConfig::default().session_options();
        assert!(defaults.validate_graph);
        assert!(!defaults.enable_profiling);
    }

    #[test]
    fn unknown_data_type() {
        let binding: InputBinding = "x:quaternion=1".parse().unwrap();
        assert!(matches!(binding.to_tensor(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn provider_option_syntax() {
        assert_eq!(
            parse_provider_option("InTreeExecutionProvider:int_property=3").unwrap(),
            (
                "InTreeExecutionProvider".to_string(),
                "int_property".to_string(),
                "3".to_string()
            )
        );
        assert!(parse_provider_option("int_property=3").is_err());
    }

    #[test]
    fn defaults_match_sample() {
        let config = RunnerConfig::default();
        assert_eq!(config.providers[0].options["int_property"], "3");
        assert_eq!(config.providers[0].options["str_property"], "strval");
        assert_eq!(config.outputs, vec!["graphOut"]);

        let partial: RunnerConfig = serde_json::from_str(r#"{"model": "other.onnx"}"#).unwrap();
        assert_eq!(partial.model, PathBuf::from("other.onnx"));
        assert_eq!(partial.inputs, config.inputs);
    }

    #[test]
    fn option_for_missing_provider() {
        let mut config = RunnerConfig::default();
        assert!(config.set_provider_option("CPUExecutionProvider", "k", "v").is_err());
        config.set_provider_option(IN_TREE_PROVIDER, "int_property", "7").unwrap();
        assert_eq!(config.providers[0].options["int_property"], "7");
    }
}
