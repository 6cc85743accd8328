// SPDX-License-Identifier: MIT OR Apache-2.0
//! Single-threaded reference executor for pipeline task graphs.

use ordoplay_graph::{NodeId, Pipeline, Result, TaskKind};

/// Runs every task of a pipeline once per frame, in topological order
#[derive(Debug, Default)]
pub struct SequentialScheduler {
    frames: u64,
}

impl SequentialScheduler {
    /// Create a scheduler that has not run any frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute one frame; returns the number of tasks that ran
    pub fn run_frame(&mut self, pipeline: &mut Pipeline) -> Result<usize> {
        let tasks: Vec<(NodeId, TaskKind)> = pipeline
            .task_order()
            .iter()
            .filter_map(|&index| pipeline.task(index))
            .map(|task| (task.owner, task.kind.clone()))
            .collect();

        let mut executed = 0;
        for (owner, kind) in tasks {
            match kind {
                TaskKind::Node => pipeline.graph_mut().update(owner)?,
                TaskKind::Subtask { index, name } => {
                    tracing::trace!("Running subtask {} of {:?}", name, owner);
                    pipeline.graph_mut().run_subtask(owner, index)?;
                }
                TaskKind::Funnel => continue,
            }
            executed += 1;
        }

        self.frames += 1;
        tracing::debug!("Frame {} ran {} tasks", self.frames, executed);
        Ok(executed)
    }

    /// Frames executed so far
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordoplay_graph::{DirectedGraph, EngineContext, Node, PortRef, Ports, Subtask};
    use std::sync::{Arc, Mutex};

    /// Records which subtasks ran
    struct Recorder {
        ports: Ports,
        log: Arc<Mutex<Vec<usize>>>,
    }

    impl Node for Recorder {
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
            let mut steps = DirectedGraph::new();
            let draw = steps.add_vertex(Subtask::new("draw"));
            let upload = steps.add_vertex(Subtask::new("upload"));
            let shadow = steps.add_vertex(Subtask::new("shadow"));
            steps.add_edge(upload, draw);
            steps.add_edge(shadow, draw);
            Some(steps)
        }

        fn run_subtask(&mut self, index: usize) -> Result<()> {
            self.log.lock().unwrap().push(index);
            let value = *self.ports.get::<f32>(0)?;
            self.ports.set(0, value * 2.0)
        }
    }

    #[test]
    fn test_frame_respects_dependencies() {
        let context = EngineContext::with_builtin_nodes();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = context.new_graph();

        let source = graph.add_node(context.factory().create("Float/Constant").unwrap());
        let render = graph.insert(Recorder {
            ports: Ports::new().input::<f32>("in").output::<f32>("out"),
            log: Arc::clone(&log),
        });
        let sink = graph.add_node(context.factory().create("Float/Constant").unwrap());
        assert!(graph.link(PortRef::new(source, 0), PortRef::new(render, 0)).unwrap());
        assert!(graph.link(PortRef::new(render, 0), PortRef::new(sink, 0)).unwrap());
        graph.set_input(PortRef::new(source, 0), 1.5f32).unwrap();

        let mut pipeline = Pipeline::new(graph).unwrap();
        let mut scheduler = SequentialScheduler::new();
        // source, three subtasks, sink; the entry funnel does not count
        assert_eq!(scheduler.run_frame(&mut pipeline).unwrap(), 5);
        assert_eq!(scheduler.frames(), 1);

        // upload and shadow run before draw
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 0]);
        assert_eq!(
            *pipeline
                .graph()
                .get_input::<f32>(PortRef::new(sink, 0))
                .unwrap(),
            3.0
        );
    }

    #[test]
    fn test_frame_delivers_operands_before_dividing() {
        let context = EngineContext::with_builtin_nodes();
        let json = r#"{
            "nodes": [
                { "name": "a", "class": "Int/Constant", "inputs": ["6"] },
                { "name": "b", "class": "Int/Constant", "inputs": ["3"] },
                { "name": "q", "class": "Int/Divide" }
            ],
            "links": [
                { "src": "a", "dst": "q", "srcp": 0, "dstp": 0 },
                { "src": "b", "dst": "q", "srcp": 0, "dstp": 1 }
            ]
        }"#;
        let (_, graph, nodes) = context.load_graph(json).unwrap();

        let mut pipeline = Pipeline::new(graph).unwrap();
        let mut scheduler = SequentialScheduler::new();
        assert_eq!(scheduler.run_frame(&mut pipeline).unwrap(), 3);
        let divide = pipeline.graph().node(nodes[2]).unwrap();
        assert_eq!(*divide.input(0).unwrap().get::<i32>().unwrap(), 6);
        assert_eq!(*divide.input(1).unwrap().get::<i32>().unwrap(), 3);
    }

    #[test]
    fn test_errors_stop_the_frame() {
        let context = EngineContext::with_builtin_nodes();
        let mut graph = context.new_graph();
        let divide = graph.add_node(context.factory().create("Int/Divide").unwrap());
        graph.set_input(PortRef::new(divide, 1), 1i32).unwrap();

        let mut pipeline = Pipeline::new(graph).unwrap();
        let mut scheduler = SequentialScheduler::new();
        assert_eq!(scheduler.run_frame(&mut pipeline).unwrap(), 1);

        pipeline
            .graph_mut()
            .clear_input(PortRef::new(divide, 1))
            .unwrap();
        assert!(scheduler.run_frame(&mut pipeline).is_err());
        assert_eq!(scheduler.frames(), 1);
    }
}
