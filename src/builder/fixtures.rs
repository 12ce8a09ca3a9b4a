//! Test fixture models.

use std::path::{Path, PathBuf};

use strum_macros::{Display, EnumString};

use crate::error::Result;
use crate::model::DataType;
use crate::proto::ModelProto;

use super::{
    build_graph, build_node, clear_domain, make_model, make_operatorsetid, make_tensor_value_info,
    GraphSpec, NodeSpec,
};

/// Domain of the custom operator used by the optional-output fixture
pub const TEST_DOMAIN: &str = "test";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum Fixture {
    #[strum(serialize = "optional-output")]
    OptionalOutput,
    #[strum(serialize = "relu")]
    Relu,
}

impl Fixture {
    /// Canonical file name of the fixture
    pub fn file_name(&self) -> &'static str {
        match self {
            Fixture::OptionalOutput => "custom_op_optional_output.onnx",
            Fixture::Relu => "Relu.onnx",
        }
    }

    pub fn build(&self) -> Result<ModelProto> {
        match self {
            Fixture::OptionalOutput => custom_op_optional_output(),
            Fixture::Relu => relu(),
        }
    }
}

/// Where a fixture is written: an existing directory gets the fixture's
/// canonical file name inside it, any other path is used as given.
pub fn resolve_output_path(path: &Path, fixture: Fixture) -> PathBuf {
    if path.is_dir() {
        path.join(fixture.file_name())
    } else {
        path.to_path_buf()
    }
}

/// A `test.WithOptionalOutput` node whose middle output is left unused,
/// followed by two identities that expose the other two outputs.
pub fn custom_op_optional_output() -> Result<ModelProto> {
    let custom_node = build_node(
        NodeSpec::new("WithOptionalOutput", ["GraphIn0"], ["Output0", "", "Output2"])
            .name("CustomOptionalOutput")
            .domain(TEST_DOMAIN),
    )?;

    let iden0 = build_node(NodeSpec::new("Identity", ["Output0"], ["GraphOut0"]).name("Iden0"))?;
    let iden1 = build_node(NodeSpec::new("Identity", ["Output2"], ["GraphOut1"]).name("Iden2"))?;

    let graph = build_graph(
        GraphSpec::new("CustomOpTest")
            .nodes([custom_node, iden0, iden1])
            .input(make_tensor_value_info("GraphIn0", DataType::Float, &[2]))
            .output(make_tensor_value_info("GraphOut0", DataType::Float, &[2]))
            .output(make_tensor_value_info("GraphOut1", DataType::Float, &[2])),
    );

    let mut model = make_model(
        graph,
        vec![
            clear_domain(make_operatorsetid("", 13)),
            make_operatorsetid(TEST_DOMAIN, 1),
        ],
    );
    model.ir_version = Some(7);
    Ok(model)
}

/// Single `Relu` over a float vector of length 4: `x` -> `graphOut`
pub fn relu() -> Result<ModelProto> {
    let node = build_node(NodeSpec::new("Relu", ["x"], ["graphOut"]).name("Relu0"))?;

    let graph = build_graph(
        GraphSpec::new("Relu")
            .nodes([node])
            .input(make_tensor_value_info("x", DataType::Float, &[4]))
            .output(make_tensor_value_info("graphOut", DataType::Float, &[4])),
    );

    let mut model = make_model(graph, vec![clear_domain(make_operatorsetid("", 13))]);
    model.ir_version = Some(7);
    Ok(model)
}
