use anyhow::Result;
use onnx_harness::{
    builder::{
        build_graph, build_node, clear_domain, encode_model, fixtures, make_model, make_operatorsetid,
        make_tensor_value_info, save_model, Fixture, GraphSpec, NodeSpec,
    },
    error::Error,
    execution::{InferenceSession, ProviderConfig, SessionOptions, CPU_PROVIDER, CUDA_PROVIDER, IN_TREE_PROVIDER},
    model::DataType,
    ops::{optional_output_domain, Tensor},
    proto::{ModelProto, OperatorSetIdProto},
};
use rand::Rng;
use std::collections::HashMap;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_fixture(dir: &TempDir, fixture: Fixture) -> Result<PathBuf> {
    let path = dir.path().join(fixture.file_name());
    save_model(&fixture.build()?, &path)?;
    Ok(path)
}

fn relu_input(values: Vec<f32>) -> Result<HashMap<String, Tensor>> {
    let mut inputs = HashMap::new();
    inputs.insert("x".to_string(), Tensor::from_f32(&[values.len()], values)?);
    Ok(inputs)
}

// Single float [4] node `x` -> `y` of the given op type
fn single_op_model(op_type: &str, opset: OperatorSetIdProto) -> Result<ModelProto> {
    let node = build_node(NodeSpec::new(op_type, ["x"], ["y"]).name("n0"))?;
    let graph = build_graph(
        GraphSpec::new(op_type)
            .nodes([node])
            .input(make_tensor_value_info("x", DataType::Float, &[4]))
            .output(make_tensor_value_info("y", DataType::Float, &[4])),
    );
    let mut model = make_model(graph, vec![opset]);
    model.ir_version = Some(7);
    Ok(model)
}

fn values(tensor: &Tensor) -> Vec<f32> {
    tensor.as_f32().expect("float output").iter().copied().collect()
}

#[test]
fn test_relu_on_in_tree_provider() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_fixture(&dir, Fixture::Relu)?;

    let options = SessionOptions::new().with_provider(
        ProviderConfig::new(IN_TREE_PROVIDER)
            .with_option("int_property", "3")
            .with_option("str_property", "strval"),
    );
    let session = InferenceSession::with_options(&path, options)?;

    // CPU is always the last fallback
    assert_eq!(session.providers(), vec![IN_TREE_PROVIDER, CPU_PROVIDER]);
    assert_eq!(session.node_assignments(), vec![("Relu0", IN_TREE_PROVIDER)]);

    let outputs = session.run(&["graphOut"], relu_input(vec![-3.0, 5.0, -2.0, 4.0])?)?;
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].name.as_deref(), Some("graphOut"));
    assert_eq!(values(&outputs[0]), vec![0.0, 5.0, 0.0, 4.0]);
    Ok(())
}

#[test]
fn test_relu_random_inputs() -> Result<()> {
    let bytes = encode_model(&fixtures::relu()?)?;
    let session = InferenceSession::from_bytes(&bytes, SessionOptions::new())?;
    let mut rng = rand::thread_rng();

    for _ in 0..16 {
        let input: Vec<f32> = (0..4).map(|_| rng.gen_range(-10.0..10.0)).collect();
        let expected: Vec<f32> = input.iter().map(|v| v.max(0.0)).collect();

        let outputs = session.run(&[], relu_input(input)?)?;
        assert_eq!(values(&outputs[0]), expected);
    }
    Ok(())
}

#[test]
fn test_optional_output_custom_op() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_fixture(&dir, Fixture::OptionalOutput)?;

    let options = SessionOptions::new()
        .with_provider(ProviderConfig::new(CPU_PROVIDER))
        .add_custom_op_domain(optional_output_domain());
    let session = InferenceSession::with_options(&path, options)?;

    let assignments: HashMap<&str, &str> = session.node_assignments().into_iter().collect();
    assert_eq!(assignments["CustomOptionalOutput"], "CustomOpDomain");
    assert_eq!(assignments["Iden0"], CPU_PROVIDER);
    assert_eq!(assignments["Iden2"], CPU_PROVIDER);

    let mut inputs = HashMap::new();
    inputs.insert("GraphIn0".to_string(), Tensor::from_f32(&[2], vec![1.5, -2.5])?);

    // Requested order wins over declaration order
    let outputs = session.run(&["GraphOut1", "GraphOut0"], inputs)?;
    assert_eq!(outputs[0].name.as_deref(), Some("GraphOut1"));
    assert_eq!(outputs[1].name.as_deref(), Some("GraphOut0"));
    assert_eq!(values(&outputs[0]), vec![1.5, -2.5]);
    assert_eq!(values(&outputs[1]), vec![1.5, -2.5]);
    Ok(())
}

#[test]
fn test_custom_op_requires_domain_registration() -> Result<()> {
    let bytes = encode_model(&fixtures::custom_op_optional_output()?)?;
    let err = InferenceSession::from_bytes(&bytes, SessionOptions::new()).unwrap_err();

    match err {
        Error::UnsupportedOperator { domain, op_type, version } => {
            assert_eq!(domain, "test");
            assert_eq!(op_type, "WithOptionalOutput");
            assert_eq!(version, 1);
        }
        other => panic!("unexpected error: {}", other),
    }
    Ok(())
}

#[test]
fn test_in_tree_provider_falls_back_for_unsupported_ops() -> Result<()> {
    let bytes = encode_model(&fixtures::custom_op_optional_output()?)?;
    let options = SessionOptions::from_candidates(&[IN_TREE_PROVIDER, CPU_PROVIDER], &[])?
        .add_custom_op_domain(optional_output_domain());
    let session = InferenceSession::from_bytes(&bytes, options)?;

    assert_eq!(session.providers(), vec![IN_TREE_PROVIDER, CPU_PROVIDER]);
    assert!(session
        .node_assignments()
        .iter()
        .filter(|(name, _)| name.starts_with("Iden"))
        .all(|(_, provider)| *provider == IN_TREE_PROVIDER));
    Ok(())
}

#[test]
fn test_in_tree_only_request_falls_back_to_cpu() -> Result<()> {
    // The in-tree provider has no Sigmoid kernel
    let bytes = encode_model(&single_op_model("Sigmoid", clear_domain(make_operatorsetid("", 13)))?)?;
    let options = SessionOptions::from_candidates(&[IN_TREE_PROVIDER], &[])?;
    let session = InferenceSession::from_bytes(&bytes, options)?;

    assert_eq!(session.providers(), vec![IN_TREE_PROVIDER, CPU_PROVIDER]);
    assert_eq!(session.node_assignments(), vec![("n0", CPU_PROVIDER)]);

    let outputs = session.run(&["y"], relu_input(vec![0.0, 0.0, 0.0, 0.0])?)?;
    assert_eq!(values(&outputs[0]), vec![0.5; 4]);
    Ok(())
}

#[test]
fn test_explicit_onnx_domain_runs() -> Result<()> {
    let bytes = encode_model(&single_op_model("Relu", make_operatorsetid("ai.onnx", 13))?)?;
    let session = InferenceSession::from_bytes(&bytes, SessionOptions::new())?;

    assert_eq!(session.model().opset_version(""), Some(13));
    let outputs = session.run(&[], relu_input(vec![-1.0, 2.0, -3.0, 4.0])?)?;
    assert_eq!(values(&outputs[0]), vec![0.0, 2.0, 0.0, 4.0]);
    Ok(())
}

#[test]
fn test_validation_can_be_disabled() -> Result<()> {
    let mut model = fixtures::relu()?;
    // Outside the accepted IR range
    model.ir_version = Some(2);
    let bytes = encode_model(&model)?;

    assert!(matches!(
        InferenceSession::from_bytes(&bytes, SessionOptions::new()),
        Err(Error::ValidationError(_))
    ));

    let options = SessionOptions::new()
        .set_validate_graph(false)
        .enable_profiling(true)
        .set_log_id("unvalidated");
    let session = InferenceSession::from_bytes(&bytes, options)?;
    let outputs = session.run(&["graphOut"], relu_input(vec![-3.0, 5.0, -2.0, 4.0])?)?;
    assert_eq!(values(&outputs[0]), vec![0.0, 5.0, 0.0, 4.0]);
    Ok(())
}

#[test]
fn test_invalid_output_name() -> Result<()> {
    let bytes = encode_model(&fixtures::relu()?)?;
    let session = InferenceSession::from_bytes(&bytes, SessionOptions::new())?;

    let err = session.run(&["y"], relu_input(vec![1.0, 2.0, 3.0, 4.0])?).unwrap_err();
    assert!(matches!(err, Error::InvalidOutputName(ref name) if name == "y"));
    Ok(())
}

#[test]
fn test_input_binding_errors() -> Result<()> {
    let bytes = encode_model(&fixtures::relu()?)?;
    let session = InferenceSession::from_bytes(&bytes, SessionOptions::new())?;

    let mut wrong_name = HashMap::new();
    wrong_name.insert("input".to_string(), Tensor::from_f32(&[4], vec![0.0; 4])?);
    assert!(matches!(
        session.run(&["graphOut"], wrong_name),
        Err(Error::InvalidInputName(_))
    ));

    assert!(matches!(
        session.run(&["graphOut"], HashMap::new()),
        Err(Error::MissingInput(ref name)) if name == "x"
    ));

    let mut wrong_type = HashMap::new();
    wrong_type.insert(
        "x".to_string(),
        Tensor::from_vec(&[4], vec![1.0f64, 2.0, 3.0, 4.0])?,
    );
    match session.run(&["graphOut"], wrong_type) {
        Err(Error::TypeMismatch { expected, actual, .. }) => {
            assert_eq!(expected, "tensor(float)");
            assert_eq!(actual, "tensor(double)");
        }
        other => panic!("expected a type mismatch, got {:?}", other),
    }

    assert!(matches!(
        session.run(&["graphOut"], relu_input(vec![1.0, 2.0, 3.0])?),
        Err(Error::ShapeMismatch { .. })
    ));
    Ok(())
}

#[test]
fn test_provider_resolution_errors() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_fixture(&dir, Fixture::Relu)?;

    assert!(matches!(
        InferenceSession::new(&path, &["NotAProvider"]),
        Err(Error::UnknownProvider(_))
    ));
    assert!(matches!(
        InferenceSession::new(&path, &[CUDA_PROVIDER]),
        Err(Error::NoProviderAvailable(_))
    ));

    let session = InferenceSession::new(&path, &[CUDA_PROVIDER, CPU_PROVIDER])?;
    assert_eq!(session.providers(), vec![CPU_PROVIDER]);

    let bad_option = SessionOptions::new()
        .with_provider(ProviderConfig::new(IN_TREE_PROVIDER).with_option("int_property", "three"));
    assert!(matches!(
        InferenceSession::with_options(&path, bad_option),
        Err(Error::InvalidConfig(_))
    ));
    Ok(())
}

#[test]
fn test_missing_model_file() {
    let result = InferenceSession::new("does/not/exist.onnx", &[CPU_PROVIDER]);
    assert!(matches!(result, Err(Error::ModelLoadError(..))));
}

#[test]
fn test_session_metadata() -> Result<()> {
    let bytes = encode_model(&fixtures::custom_op_optional_output()?)?;
    let options = SessionOptions::new().add_custom_op_domain(optional_output_domain());
    let session = InferenceSession::from_bytes(&bytes, options)?;

    let inputs: Vec<_> = session.inputs().iter().map(|i| i.name.as_str()).collect();
    let outputs: Vec<_> = session.outputs().iter().map(|o| o.name.as_str()).collect();
    assert_eq!(inputs, ["GraphIn0"]);
    assert_eq!(outputs, ["GraphOut0", "GraphOut1"]);
    assert_eq!(session.model().metadata.ir_version, 7);
    Ok(())
}
