use onnx_harness::{
    builder::{
        build_graph, build_node, encode_model, fixtures, make_model, make_operatorsetid, make_tensor_value_info,
        GraphSpec, NodeSpec,
    },
    error::Error,
    model::{DataType, Endpoint, Graph, ModelMetadata, Node, OnnxModel, TensorInfo},
    parser::{GraphBuilder, OnnxModelLoader, SchemaValidator},
};
use std::collections::HashMap;

fn node(id: usize, op_type: &str, inputs: &[&str], outputs: &[&str]) -> Node {
    Node {
        id,
        name: format!("{}_{}", op_type, id),
        op_type: op_type.to_string(),
        domain: "".to_string(),
        inputs: inputs.iter().map(|s| s.to_string()).collect(),
        outputs: outputs.iter().map(|s| s.to_string()).collect(),
        attributes: HashMap::new(),
        doc_string: "".to_string(),
    }
}

fn float_info(name: &str, shape: &[i64]) -> TensorInfo {
    TensorInfo {
        name: name.to_string(),
        shape: shape.to_vec(),
        data_type: DataType::Float,
        doc_string: "".to_string(),
    }
}

// Helper to create a model around the given nodes, reading `input` and producing `output`
fn create_test_model(nodes: Vec<Node>, input: &str, output: &str) -> OnnxModel {
    let metadata = ModelMetadata {
        producer_name: "Test".to_string(),
        producer_version: "1.0".to_string(),
        domain: "".to_string(),
        model_version: 1,
        doc_string: "Test model".to_string(),
        graph_name: "test_graph".to_string(),
        ir_version: 7,
    };

    let graph = Graph {
        name: "test_graph".to_string(),
        nodes,
        inputs: vec![float_info(input, &[1, 4])],
        outputs: vec![float_info(output, &[1, 4])],
        ..Default::default()
    };

    let mut opset_imports = HashMap::new();
    opset_imports.insert("".to_string(), 13);

    OnnxModel {
        metadata,
        graph,
        opset_imports,
        metadata_props: HashMap::new(),
    }
}

fn load_optional_output_fixture() -> OnnxModel {
    let bytes = encode_model(&fixtures::custom_op_optional_output().unwrap()).unwrap();
    OnnxModelLoader::load_model_from_bytes(&bytes).unwrap()
}

#[test]
fn test_model_metadata_extraction() {
    let model = load_optional_output_fixture();

    assert_eq!(model.metadata.ir_version, 7);
    assert_eq!(model.metadata.graph_name, "CustomOpTest");
    assert_eq!(model.opset_version(""), Some(13));
    assert_eq!(model.opset_version(fixtures::TEST_DOMAIN), Some(1));
    assert_eq!(model.opset_imports.len(), 2);
}

#[test]
fn test_get_input_output_info() {
    let model = load_optional_output_fixture();

    let inputs = OnnxModelLoader::get_input_info(&model);
    let outputs = OnnxModelLoader::get_output_info(&model);

    assert_eq!(inputs.len(), 1);
    assert_eq!(outputs.len(), 2);

    assert_eq!(inputs[0].name, "GraphIn0");
    assert_eq!(inputs[0].shape, vec![2]);
    assert_eq!(inputs[0].data_type, DataType::Float);

    assert_eq!(outputs[0].name, "GraphOut0");
    assert_eq!(outputs[1].name, "GraphOut1");
}

#[test]
fn test_optional_output_slot_is_kept_empty() {
    let model = load_optional_output_fixture();
    let custom = &model.graph.nodes[0];

    assert_eq!(custom.op_type, "WithOptionalOutput");
    assert_eq!(custom.domain, "test");
    assert_eq!(custom.outputs, vec!["Output0", "", "Output2"]);
    assert!(custom.is_output_connected(0));
    assert!(!custom.is_output_connected(1));
    assert!(custom.is_output_connected(2));
}

#[test]
fn test_schema_validation() {
    let validator = SchemaValidator::new();

    assert!(validator.validate_model(&load_optional_output_fixture()).is_ok());

    let model = create_test_model(vec![node(0, "Relu", &["X"], &["Y"])], "X", "Y");
    assert!(validator.validate_model(&model).is_ok());
}

#[test]
fn test_schema_validation_rejects_bad_models() {
    let validator = SchemaValidator::new();

    let mut old = create_test_model(vec![node(0, "Relu", &["X"], &["Y"])], "X", "Y");
    old.metadata.ir_version = 2;
    assert!(matches!(validator.validate_model(&old), Err(Error::ValidationError(_))));

    let mut foreign = create_test_model(vec![node(0, "Relu", &["X"], &["Y"])], "X", "Y");
    foreign.graph.nodes[0].domain = "com.example".to_string();
    assert!(validator.validate_model(&foreign).is_err());

    let twice = create_test_model(
        vec![node(0, "Relu", &["X"], &["Y"]), node(1, "Relu", &["X"], &["Y"])],
        "X",
        "Y",
    );
    assert!(validator.validate_model(&twice).is_err());
}

#[test]
fn test_graph_building() {
    let model = load_optional_output_fixture();

    let graph = GraphBuilder::build_graph(&model).unwrap();
    assert_eq!(graph.nodes.len(), 3);

    // No edge may originate from the unused middle slot
    assert!(graph
        .edges
        .iter()
        .all(|edge| edge.from != Endpoint::Node { id: 0, slot: 1 }));

    let from_custom = graph.outputs_of(0);
    assert_eq!(from_custom.len(), 2);

    let iden0 = graph.nodes.iter().find(|n| n.name == "Iden0").unwrap();
    let iden2 = graph.nodes.iter().find(|n| n.name == "Iden2").unwrap();

    let iden0_in = graph.inputs_of(iden0.id);
    assert_eq!(iden0_in.len(), 1);
    assert_eq!(iden0_in[0].tensor, "Output0");
    assert_eq!(iden0_in[0].from, Endpoint::Node { id: 0, slot: 0 });

    let iden2_in = graph.inputs_of(iden2.id);
    assert_eq!(iden2_in[0].tensor, "Output2");
    assert_eq!(iden2_in[0].from, Endpoint::Node { id: 0, slot: 2 });

    assert_eq!(graph.dependencies[&iden0.id], vec![0]);
    assert!(graph.dependencies[&0].is_empty());
}

#[test]
fn test_topological_sort() {
    // Sequential chain: node0 -> node1 -> node2, stored out of order
    let model = create_test_model(
        vec![
            node(2, "Tanh", &["b"], &["output"]),
            node(0, "Relu", &["input"], &["a"]),
            node(1, "Sigmoid", &["a"], &["b"]),
        ],
        "input",
        "output",
    );

    let edges = GraphBuilder::resolve_inputs_outputs(&model.graph).unwrap();
    let sorted_nodes = GraphBuilder::topological_sort(&model.graph.nodes, &edges).unwrap();

    let node0_idx = sorted_nodes.iter().position(|n| n.id == 0).unwrap();
    let node1_idx = sorted_nodes.iter().position(|n| n.id == 1).unwrap();
    let node2_idx = sorted_nodes.iter().position(|n| n.id == 2).unwrap();

    assert!(node0_idx < node1_idx);
    assert!(node1_idx < node2_idx);
}

#[test]
fn test_cycle_is_rejected() {
    let model = create_test_model(
        vec![
            node(0, "Identity", &["b"], &["a"]),
            node(1, "Identity", &["a"], &["b"]),
        ],
        "input",
        "a",
    );

    assert!(matches!(
        GraphBuilder::build_graph(&model),
        Err(Error::InvalidGraph(_))
    ));
}

#[test]
fn test_unproduced_input_is_rejected() {
    let model = create_test_model(vec![node(0, "Relu", &["nowhere"], &["Y"])], "X", "Y");

    let err = GraphBuilder::build_graph(&model).unwrap_err();
    assert!(err.to_string().contains("nowhere"));
}

#[test]
fn test_garbage_bytes_fail_to_decode() {
    let result = OnnxModelLoader::load_model_from_bytes(&[0xff, 0xff, 0xff]);
    assert!(matches!(result, Err(Error::ProtobufError(_))));
}

#[test]
fn test_explicit_onnx_domain_import() {
    let relu = build_node(NodeSpec::new("Relu", ["x"], ["y"]).name("n0")).unwrap();
    let graph = build_graph(
        GraphSpec::new("g")
            .nodes([relu])
            .input(make_tensor_value_info("x", DataType::Float, &[4]))
            .output(make_tensor_value_info("y", DataType::Float, &[4])),
    );
    let mut proto = make_model(graph, vec![make_operatorsetid("ai.onnx", 13)]);
    proto.ir_version = Some(8);
    // Nodes may also name the default domain explicitly
    proto.graph.as_mut().unwrap().node[0].domain = Some("ai.onnx".to_string());

    let model = OnnxModelLoader::load_model_from_bytes(&encode_model(&proto).unwrap()).unwrap();
    assert_eq!(model.opset_version(""), Some(13));
    assert_eq!(model.graph.nodes[0].domain, "");
    assert!(SchemaValidator::new().validate_model(&model).is_ok());
}

#[test]
fn test_ir_version_range() {
    let mut model = create_test_model(vec![node(0, "Relu", &["X"], &["Y"])], "X", "Y");

    // Current ONNX releases write IR 11
    model.metadata.ir_version = 11;
    assert!(SchemaValidator::new().validate_model(&model).is_ok());

    model.metadata.ir_version = 12;
    assert!(matches!(
        SchemaValidator::new().validate_model(&model),
        Err(Error::ValidationError(_))
    ));
    assert!(SchemaValidator::new().with_ir_range(3, 12).validate_model(&model).is_ok());

    model.metadata.ir_version = 7;
    assert!(SchemaValidator::new().with_ir_range(8, 12).validate_model(&model).is_err());
}
