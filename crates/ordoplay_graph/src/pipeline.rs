// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dependency and task graphs derived from a node graph.
//!
//! The dependency graph has one vertex per node and an arc `A -> B` when some
//! output of `A` feeds some input of `B`. The task graph refines it: a node
//! that declares [`subtasks`](crate::Node::subtasks) contributes its internal
//! DAG, every other node contributes a single task. Each node then has exactly
//! one entry and one exit task, adding funnel vertices where the internal DAG
//! has several sources or sinks, and dependency arcs connect exit to entry.
//!
//! The pipeline does not execute anything; a scheduler walks
//! [`task_order`](Pipeline::task_order) and dispatches the tasks.

use crate::dag::DirectedGraph;
use crate::error::{GraphError, Result};
use crate::graph::NodeGraph;
use crate::node::{NodeId, Subtask};
use std::collections::HashMap;

/// What a task vertex executes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// The node's whole `update`
    Node,
    /// One step of the node's internal task graph
    Subtask {
        /// Index in the node's subtask graph
        index: usize,
        /// Step name
        name: String,
    },
    /// Synthetic join point; executes nothing
    Funnel,
}

/// Vertex of the task graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Node the task belongs to
    pub owner: NodeId,
    /// What to run
    pub kind: TaskKind,
}

/// Entry and exit task of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Attachment {
    entry: usize,
    exit: usize,
}

/// A node graph together with its dependency and task graphs
#[derive(Debug)]
pub struct Pipeline {
    graph: NodeGraph,
    dependency_graph: DirectedGraph<NodeId>,
    vertices: HashMap<NodeId, usize>,
    node_order: Vec<usize>,
    task_graph: DirectedGraph<Task>,
    task_order: Vec<usize>,
    attachments: Vec<Attachment>,
}

impl Pipeline {
    /// Take ownership of `graph` and compute both derived graphs.
    ///
    /// Fails with `InvalidGraph` if the links form a cycle or a node's
    /// internal task graph is empty, cyclic or lacks sources or sinks.
    pub fn new(graph: NodeGraph) -> Result<Self> {
        let mut pipeline = Self {
            graph,
            dependency_graph: DirectedGraph::new(),
            vertices: HashMap::new(),
            node_order: Vec::new(),
            task_graph: DirectedGraph::new(),
            task_order: Vec::new(),
            attachments: Vec::new(),
        };
        pipeline.rebuild()?;
        Ok(pipeline)
    }

    /// Recompute both derived graphs after editing the node graph
    pub fn rebuild(&mut self) -> Result<()> {
        self.calculate_dependency_graph()?;
        self.calculate_task_graph()?;
        tracing::debug!(
            "Pipeline built: {} nodes, {} dependencies, {} tasks",
            self.dependency_graph.len(),
            self.dependency_graph.edge_count(),
            self.task_graph.len()
        );
        Ok(())
    }

    /// Rebuild the dependency graph from the links of the node graph
    pub fn calculate_dependency_graph(&mut self) -> Result<()> {
        let mut dependency_graph = DirectedGraph::new();
        let ids: Vec<NodeId> = self.graph.node_ids().collect();
        let mut vertices = HashMap::with_capacity(ids.len());
        for id in &ids {
            vertices.insert(*id, dependency_graph.add_vertex(*id));
        }

        // A node feeding itself stays within its own tasks
        for (a, first) in ids.iter().enumerate() {
            for (b, second) in ids.iter().enumerate().skip(a + 1) {
                if self.is_linked(*first, *second) {
                    dependency_graph.add_edge(a, b);
                }
                if self.is_linked(*second, *first) {
                    dependency_graph.add_edge(b, a);
                }
            }
        }

        let order = dependency_graph.topological_order().map_err(|error| {
            GraphError::invalid_graph(format!("node dependencies: {error}"))
        })?;
        self.dependency_graph = dependency_graph;
        self.vertices = vertices;
        self.node_order = order;
        Ok(())
    }

    /// Whether some output of `source` feeds some input of `destination`
    pub fn is_linked(&self, source: NodeId, destination: NodeId) -> bool {
        self.graph.is_linked(source, destination)
    }

    /// Rebuild the task graph from the dependency graph
    pub fn calculate_task_graph(&mut self) -> Result<()> {
        let mut task_graph = DirectedGraph::new();
        let mut attachments = Vec::with_capacity(self.dependency_graph.len());

        for &owner in self.dependency_graph.vertices() {
            let node = self
                .graph
                .node(owner)
                .ok_or_else(|| GraphError::invalid_state(format!("Node not found: {owner:?}")))?;
            let attachment = match node.subtasks() {
                Some(subtasks) => expand_subtasks(&mut task_graph, owner, &subtasks)?,
                None => {
                    let task = task_graph.add_vertex(Task {
                        owner,
                        kind: TaskKind::Node,
                    });
                    Attachment {
                        entry: task,
                        exit: task,
                    }
                }
            };
            attachments.push(attachment);
        }

        for (from, to) in self.dependency_graph.edges() {
            task_graph.add_edge(attachments[from].exit, attachments[to].entry);
        }

        let order = task_graph
            .topological_order()
            .map_err(|error| GraphError::invalid_graph(format!("task graph: {error}")))?;
        self.task_graph = task_graph;
        self.task_order = order;
        self.attachments = attachments;
        Ok(())
    }

    /// Nodes no other node feeds
    pub fn source_nodes(&self) -> Vec<NodeId> {
        self.node_ids(self.dependency_graph.sources())
    }

    /// Nodes feeding no other node
    pub fn sink_nodes(&self) -> Vec<NodeId> {
        self.node_ids(self.dependency_graph.sinks())
    }

    /// Nodes in dependency order
    pub fn node_order(&self) -> Vec<NodeId> {
        self.node_ids(self.node_order.iter().copied())
    }

    /// Direct downstream nodes of `node_id`
    pub fn node_successors(&self, node_id: NodeId) -> Vec<NodeId> {
        match self.vertex_of(node_id) {
            Some(vertex) => self.node_ids(self.dependency_graph.successors(vertex)),
            None => Vec::new(),
        }
    }

    /// Direct upstream nodes of `node_id`
    pub fn node_predecessors(&self, node_id: NodeId) -> Vec<NodeId> {
        match self.vertex_of(node_id) {
            Some(vertex) => self.node_ids(self.dependency_graph.predecessors(vertex)),
            None => Vec::new(),
        }
    }

    /// Task graph vertices in execution order
    pub fn task_order(&self) -> &[usize] {
        &self.task_order
    }

    /// Task vertex by index
    pub fn task(&self, index: usize) -> Option<&Task> {
        self.task_graph.vertex(index)
    }

    /// Entry and exit task of `node_id`
    pub fn node_tasks(&self, node_id: NodeId) -> Option<(usize, usize)> {
        self.vertex_of(node_id)
            .and_then(|vertex| self.attachments.get(vertex))
            .map(|attachment| (attachment.entry, attachment.exit))
    }

    /// The dependency graph; vertices carry node IDs
    pub fn dependency_graph(&self) -> &DirectedGraph<NodeId> {
        &self.dependency_graph
    }

    /// The task graph
    pub fn task_graph(&self) -> &DirectedGraph<Task> {
        &self.task_graph
    }

    /// The node graph
    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    /// The node graph, mutably. Call [`rebuild`](Self::rebuild) after
    /// changing nodes or links.
    pub fn graph_mut(&mut self) -> &mut NodeGraph {
        &mut self.graph
    }

    /// Give the node graph back
    pub fn into_graph(self) -> NodeGraph {
        self.graph
    }

    fn vertex_of(&self, node_id: NodeId) -> Option<usize> {
        self.vertices.get(&node_id).copied()
    }

    fn node_ids(&self, vertices: impl IntoIterator<Item = usize>) -> Vec<NodeId> {
        vertices
            .into_iter()
            .filter_map(|vertex| self.dependency_graph.vertex(vertex).copied())
            .collect()
    }
}

/// Copy a node's subtask graph into `task_graph` and reduce it to a single
/// entry and exit.
fn expand_subtasks(
    task_graph: &mut DirectedGraph<Task>,
    owner: NodeId,
    subtasks: &DirectedGraph<Subtask>,
) -> Result<Attachment> {
    if subtasks.is_empty() {
        return Err(GraphError::invalid_graph(format!(
            "node {owner:?} declares no subtasks"
        )));
    }
    if !subtasks.is_acyclic() {
        return Err(GraphError::invalid_graph(format!(
            "subtasks of node {owner:?} contain a cycle"
        )));
    }
    let sources = subtasks.sources();
    let sinks = subtasks.sinks();
    if sources.is_empty() || sinks.is_empty() {
        return Err(GraphError::invalid_graph(format!(
            "subtasks of node {owner:?} have no entry or exit"
        )));
    }

    let offset = task_graph.len();
    for (index, subtask) in subtasks.vertices().iter().enumerate() {
        task_graph.add_vertex(Task {
            owner,
            kind: TaskKind::Subtask {
                index,
                name: subtask.name.clone(),
            },
        });
    }
    for (from, to) in subtasks.edges() {
        task_graph.add_edge(offset + from, offset + to);
    }

    let entry = match sources.as_slice() {
        [single] => offset + single,
        _ => {
            let funnel = task_graph.add_vertex(Task {
                owner,
                kind: TaskKind::Funnel,
            });
            for source in &sources {
                task_graph.add_edge(funnel, offset + source);
            }
            funnel
        }
    };
    let exit = match sinks.as_slice() {
        [single] => offset + single,
        _ => {
            let funnel = task_graph.add_vertex(Task {
                owner,
                kind: TaskKind::Funnel,
            });
            for sink in &sinks {
                task_graph.add_edge(offset + sink, funnel);
            }
            funnel
        }
    };
    Ok(Attachment { entry, exit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, Ports};
    use crate::port::PortRef;

    struct Pass {
        ports: Ports,
    }

    impl Pass {
        fn new() -> Self {
            Self {
                ports: Ports::new().input::<f32>("in").output::<f32>("out"),
            }
        }
    }

    impl Node for Pass {
        fn ports(&self) -> &Ports {
            &self.ports
        }

        fn ports_mut(&mut self) -> &mut Ports {
            &mut self.ports
        }

        fn update(&mut self) -> Result<()> {
            Ok(())
        }
    }

    /// Graphics node with a configurable subtask graph
    struct Render {
        ports: Ports,
        steps: DirectedGraph<Subtask>,
    }

    impl Render {
        fn new(names: &[&str], edges: &[(usize, usize)]) -> Self {
            let mut steps = DirectedGraph::new();
            for name in names {
                steps.add_vertex(Subtask::new(*name));
            }
            for (from, to) in edges {
                steps.add_edge(*from, *to);
            }
            Self {
                ports: Ports::new().input::<f32>("in").output::<f32>("out"),
                steps,
            }
        }
    }

    impl Node for Render {
        fn ports(&self) -> &Ports {
            &self.ports
        }

        fn ports_mut(&mut self) -> &mut Ports {
            &mut self.ports
        }

        fn update(&mut self) -> Result<()> {
            Ok(())
        }

        fn subtasks(&self) -> Option<DirectedGraph<Subtask>> {
            Some(self.steps.clone())
        }
    }

    fn link(graph: &mut NodeGraph, source: NodeId, destination: NodeId) {
        assert!(graph
            .link(PortRef::new(source, 0), PortRef::new(destination, 0))
            .unwrap());
    }

    #[test]
    fn test_dependency_graph_follows_links() {
        let mut graph = NodeGraph::default();
        let a = graph.insert(Pass::new());
        let b = graph.insert(Pass::new());
        let c = graph.insert(Pass::new());
        link(&mut graph, c, a);
        link(&mut graph, a, b);

        let pipeline = Pipeline::new(graph).unwrap();
        assert!(pipeline.is_linked(c, a));
        assert!(!pipeline.is_linked(a, c));
        assert_eq!(pipeline.dependency_graph().edge_count(), 2);
        assert_eq!(pipeline.source_nodes(), vec![c]);
        assert_eq!(pipeline.sink_nodes(), vec![b]);
        assert_eq!(pipeline.node_order(), vec![c, a, b]);
        assert_eq!(pipeline.node_successors(a), vec![b]);
        assert_eq!(pipeline.node_predecessors(a), vec![c]);
    }

    #[test]
    fn test_node_lookups_follow_rebuild() {
        let mut graph = NodeGraph::default();
        let a = graph.insert(Pass::new());
        let b = graph.insert(Pass::new());
        let c = graph.insert(Pass::new());
        link(&mut graph, a, b);
        link(&mut graph, b, c);

        let mut pipeline = Pipeline::new(graph).unwrap();
        assert_eq!(pipeline.node_tasks(c), Some((2, 2)));

        assert!(pipeline.graph_mut().remove_node(a).is_some());
        pipeline.rebuild().unwrap();
        assert_eq!(pipeline.node_tasks(a), None);
        assert!(pipeline.node_successors(a).is_empty());
        assert_eq!(pipeline.node_tasks(b), Some((0, 0)));
        assert_eq!(pipeline.node_tasks(c), Some((1, 1)));
        assert_eq!(pipeline.node_successors(b), vec![c]);
        assert_eq!(pipeline.node_predecessors(c), vec![b]);
        assert!(pipeline.node_predecessors(b).is_empty());
    }

    #[test]
    fn test_plain_nodes_become_single_tasks() {
        let mut graph = NodeGraph::default();
        let a = graph.insert(Pass::new());
        let b = graph.insert(Pass::new());
        link(&mut graph, a, b);

        let pipeline = Pipeline::new(graph).unwrap();
        assert_eq!(pipeline.task_graph().len(), 2);
        assert_eq!(pipeline.task(0).unwrap().kind, TaskKind::Node);
        assert_eq!(pipeline.task(1).unwrap().owner, b);
        assert!(pipeline.task_graph().has_edge(0, 1));
    }

    #[test]
    fn test_subtasks_expand_with_funnels() {
        let mut graph = NodeGraph::default();
        let input = graph.insert(Pass::new());
        // two independent uploads feeding two draws
        let render = graph.insert(Render::new(
            &["upload_a", "upload_b", "draw_a", "draw_b"],
            &[(0, 2), (1, 3)],
        ));
        let output = graph.insert(Pass::new());
        link(&mut graph, input, render);
        link(&mut graph, render, output);

        let pipeline = Pipeline::new(graph).unwrap();
        let tasks = pipeline.task_graph();
        // input, four subtasks, two funnels, output
        assert_eq!(tasks.len(), 8);

        let (entry, exit) = pipeline.node_tasks(render).unwrap();
        assert_eq!(tasks.vertex(entry).unwrap().kind, TaskKind::Funnel);
        assert_eq!(tasks.vertex(exit).unwrap().kind, TaskKind::Funnel);
        assert_eq!(tasks.out_degree(entry), 2);
        assert_eq!(tasks.in_degree(exit), 2);

        let (_, input_exit) = pipeline.node_tasks(input).unwrap();
        let (output_entry, _) = pipeline.node_tasks(output).unwrap();
        assert!(tasks.has_edge(input_exit, entry));
        assert!(tasks.has_edge(exit, output_entry));
        assert!(tasks
            .vertices()
            .iter()
            .filter(|task| task.owner == render)
            .all(|task| task.kind != TaskKind::Node));

        let order = pipeline.task_order();
        let position = |task: usize| order.iter().position(|&t| t == task).unwrap();
        assert!(position(input_exit) < position(entry));
        assert!(position(exit) < position(output_entry));
    }

    #[test]
    fn test_single_source_and_sink_need_no_funnel() {
        let mut graph = NodeGraph::default();
        let render = graph.insert(Render::new(&["upload", "draw"], &[(0, 1)]));

        let pipeline = Pipeline::new(graph).unwrap();
        assert_eq!(pipeline.task_graph().len(), 2);
        assert_eq!(pipeline.node_tasks(render), Some((0, 1)));
        assert_eq!(
            pipeline.task(1).unwrap().kind,
            TaskKind::Subtask {
                index: 1,
                name: "draw".to_string()
            }
        );
    }

    #[test]
    fn test_empty_subtasks_rejected() {
        let mut graph = NodeGraph::default();
        graph.insert(Render::new(&[], &[]));
        assert!(matches!(Pipeline::new(graph), Err(GraphError::InvalidGraph(_))));
    }

    #[test]
    fn test_cyclic_subtasks_rejected() {
        let mut graph = NodeGraph::default();
        graph.insert(Render::new(&["a", "b"], &[(0, 1), (1, 0)]));
        assert!(matches!(Pipeline::new(graph), Err(GraphError::InvalidGraph(_))));
    }

    #[test]
    fn test_dependency_cycle_rejected() {
        let mut graph = NodeGraph::default();
        let a = graph.insert(Pass::new());
        let b = graph.insert(Pass::new());
        link(&mut graph, a, b);
        link(&mut graph, b, a);
        assert!(matches!(Pipeline::new(graph), Err(GraphError::InvalidGraph(_))));
    }

    #[test]
    fn test_rebuild_after_edit() {
        let mut graph = NodeGraph::default();
        let a = graph.insert(Pass::new());
        let b = graph.insert(Pass::new());

        let mut pipeline = Pipeline::new(graph).unwrap();
        assert_eq!(pipeline.dependency_graph().edge_count(), 0);

        link(pipeline.graph_mut(), a, b);
        pipeline.rebuild().unwrap();
        assert_eq!(pipeline.dependency_graph().edge_count(), 1);
        assert_eq!(pipeline.into_graph().node_count(), 2);
    }
}
