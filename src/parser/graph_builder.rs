use std::collections::HashMap;

use log::debug;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{Error, Result};
use crate::model::{DataEdge, Endpoint, ExecutionGraph, Graph, Node, NodeId, OnnxModel};

/// Graph builder responsible for constructing the computational graph
pub struct GraphBuilder;

impl GraphBuilder {
    /// Build an execution graph from the ONNX model
    pub fn build_graph(model: &OnnxModel) -> Result<ExecutionGraph> {
        let edges = Self::resolve_inputs_outputs(&model.graph)?;
        let nodes = Self::topological_sort(&model.graph.nodes, &edges)?;
        let dependencies = Self::build_dependency_map(&nodes, &edges);

        Self::report_dangling_outputs(&nodes, &edges);

        Ok(ExecutionGraph {
            nodes,
            dependencies,
            edges,
        })
    }

    /// Wire every named value to its single producer.
    ///
    /// Empty input names are omitted optional inputs and empty output names
    /// are unused optional outputs; neither takes part in the wiring.
    pub fn resolve_inputs_outputs(graph: &Graph) -> Result<Vec<DataEdge>> {
        let mut producers: HashMap<&str, Endpoint> = HashMap::new();

        for input in &graph.inputs {
            define(&mut producers, &input.name, Endpoint::GraphInput)?;
        }
        for tensor in &graph.initializers {
            define(&mut producers, &tensor.name, Endpoint::Initializer)?;
        }
        for node in &graph.nodes {
            for (slot, output) in node.connected_outputs() {
                define(&mut producers, output, Endpoint::Node { id: node.id, slot })?;
            }
        }

        let mut edges = Vec::new();

        for node in &graph.nodes {
            for (slot, input) in node.inputs.iter().enumerate() {
                if input.is_empty() {
                    continue;
                }
                let from = producers.get(input.as_str()).cloned().ok_or_else(|| {
                    Error::InvalidGraph(format!(
                        "Input {} of node {} is not produced by any node, graph input or initializer",
                        input, node.name
                    ))
                })?;
                edges.push(DataEdge {
                    tensor: input.clone(),
                    from,
                    to: Endpoint::Node { id: node.id, slot },
                });
            }
        }

        for output in &graph.outputs {
            let from = producers.get(output.name.as_str()).cloned().ok_or_else(|| {
                Error::InvalidGraph(format!("Graph output {} is never produced", output.name))
            })?;
            edges.push(DataEdge {
                tensor: output.name.clone(),
                from,
                to: Endpoint::GraphOutput,
            });
        }

        Ok(edges)
    }

    /// Sort nodes so every producer precedes its consumers
    pub fn topological_sort(nodes: &[Node], edges: &[DataEdge]) -> Result<Vec<Node>> {
        let mut dag: DiGraph<NodeId, ()> = DiGraph::with_capacity(nodes.len(), edges.len());
        let mut indices: HashMap<NodeId, NodeIndex> = HashMap::with_capacity(nodes.len());
        let by_id: HashMap<NodeId, &Node> = nodes.iter().map(|n| (n.id, n)).collect();

        for node in nodes {
            indices.insert(node.id, dag.add_node(node.id));
        }

        for edge in edges {
            if let (Endpoint::Node { id: from, .. }, Endpoint::Node { id: to, .. }) = (&edge.from, &edge.to) {
                if let (Some(&a), Some(&b)) = (indices.get(from), indices.get(to)) {
                    dag.update_edge(a, b, ());
                }
            }
        }

        let order = toposort(&dag, None).map_err(|cycle| {
            let id = dag[cycle.node_id()];
            let name = by_id.get(&id).map(|n| n.name.as_str()).unwrap_or_default();
            Error::InvalidGraph(format!("Graph contains a cycle through node {}", name))
        })?;

        Ok(order
            .into_iter()
            .filter_map(|index| by_id.get(&dag[index]).map(|node| (*node).clone()))
            .collect())
    }

    /// Build a dependency map for all nodes
    pub fn build_dependency_map(nodes: &[Node], edges: &[DataEdge]) -> HashMap<NodeId, Vec<NodeId>> {
        let mut dependency_map: HashMap<NodeId, Vec<NodeId>> =
            nodes.iter().map(|node| (node.id, Vec::new())).collect();

        for edge in edges {
            if let (Endpoint::Node { id: producer, .. }, Endpoint::Node { id: consumer, .. }) = (&edge.from, &edge.to) {
                let dependencies = dependency_map.entry(*consumer).or_default();
                if !dependencies.contains(producer) {
                    dependencies.push(*producer);
                }
            }
        }

        dependency_map
    }

    fn report_dangling_outputs(nodes: &[Node], edges: &[DataEdge]) {
        for node in nodes {
            for (slot, output) in node.connected_outputs() {
                let consumed = edges
                    .iter()
                    .any(|edge| edge.from == Endpoint::Node { id: node.id, slot });
                if !consumed {
                    debug!("Output {} of node {} is never consumed", output, node.name);
                }
            }
        }
    }
}

fn define<'a>(producers: &mut HashMap<&'a str, Endpoint>, name: &'a str, endpoint: Endpoint) -> Result<()> {
    if producers.insert(name, endpoint).is_some() {
        return Err(Error::InvalidGraph(format!(
            "Value {} has more than one producer",
            name
        )));
    }
    Ok(())
}
