// SPDX-License-Identifier: MIT OR Apache-2.0
//! `OrdoPlay` graph runner
//!
//! Loads a JSON graph, prints its dependency and task graphs, runs it for a
//! number of frames and optionally writes it back in canonical form.
//!
//! ```text
//! ordoplay_graph <graph.json> [--config <file.ron>] [--frames N] [--save <out.json>]
//! ```
//!
//! Without a graph file the registered node classes are listed.

mod config;
mod scheduler;

use config::GraphConfig;
use ordoplay_graph::parser::{GraphParser, NodeMetadata};
use ordoplay_graph::{Any, EngineContext, GraphError, GraphHeader, NodeId, Pipeline, TaskKind};
use scheduler::SequentialScheduler;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const USAGE: &str =
    "usage: ordoplay_graph [<graph.json>] [--config <file.ron>] [--frames N] [--save <out.json>]";

/// Errors reported by the runner
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}\n{usage}", usage = USAGE)]
    Usage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Parsed command line
#[derive(Debug, Default, PartialEq)]
struct Args {
    graph: Option<PathBuf>,
    config: Option<PathBuf>,
    frames: Option<u32>,
    save: Option<PathBuf>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, CliError> {
        let mut parsed = Args::default();
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| CliError::Usage(format!("{flag} needs a value")))
            };
            match arg.as_str() {
                "--config" => parsed.config = Some(PathBuf::from(value("--config")?)),
                "--save" => parsed.save = Some(PathBuf::from(value("--save")?)),
                "--frames" => {
                    let text = value("--frames")?;
                    let frames = text
                        .parse()
                        .map_err(|_| CliError::Usage(format!("invalid frame count '{text}'")))?;
                    parsed.frames = Some(frames);
                }
                flag if flag.starts_with("--") => {
                    return Err(CliError::Usage(format!("unknown option {flag}")));
                }
                _ if parsed.graph.is_some() => {
                    return Err(CliError::Usage(format!("unexpected argument {arg}")));
                }
                _ => parsed.graph = Some(PathBuf::from(arg)),
            }
        }
        Ok(parsed)
    }
}

fn main() {
    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    let config = match &args.config {
        Some(path) => GraphConfig::load(path),
        None => Ok(GraphConfig::default()),
    };
    let log_filter = config
        .as_ref()
        .map_or_else(|_| GraphConfig::default().log_filter, |c| c.log_filter.clone());

    // RUST_LOG wins over the configured filter
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting OrdoPlay graph runner v{}", env!("CARGO_PKG_VERSION"));

    let result = config.map_err(CliError::from).and_then(|config| run(&args, &config));
    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: &Args, config: &GraphConfig) -> Result<(), CliError> {
    let context = if config.register_builtin_nodes {
        EngineContext::with_builtin_nodes()
    } else {
        EngineContext::new()
    };

    let Some(graph_path) = &args.graph else {
        print_node_classes(&context);
        return Ok(());
    };

    let json = std::fs::read_to_string(graph_path)?;
    let (parser, graph, ids) = context.load_graph(&json)?;
    let labels: HashMap<NodeId, String> = parser
        .nodes()
        .iter()
        .zip(ids.iter().copied())
        .map(|(description, id)| (id, node_label(description.id, description.name.as_deref())))
        .collect();

    let mut pipeline = Pipeline::new(graph)?;
    print_pipeline(&pipeline, &labels);

    let frames = args.frames.unwrap_or(config.frames);
    let mut scheduler = SequentialScheduler::new();
    for _ in 0..frames {
        scheduler.run_frame(&mut pipeline)?;
    }
    if frames > 0 {
        print_sink_inputs(&pipeline, &labels);
    }

    if let Some(save_path) = &args.save {
        let graph = pipeline.into_graph();
        let metadata = node_metadata(&parser, &ids);
        let header = parser
            .header()
            .cloned()
            .unwrap_or_else(|| GraphHeader::new(config.content_type.clone()));
        let text = context.save_graph(&graph, &metadata, Some(&header))?;
        std::fs::write(save_path, text)?;
        tracing::info!("Saved graph to {}", save_path.display());
    }

    Ok(())
}

fn node_label(id: Option<i64>, name: Option<&str>) -> String {
    match (name, id) {
        (Some(name), _) => name.to_string(),
        (None, Some(id)) => format!("#{id}"),
        (None, None) => "?".to_string(),
    }
}

fn node_metadata(parser: &GraphParser, ids: &[NodeId]) -> Vec<(NodeId, NodeMetadata)> {
    parser
        .nodes()
        .iter()
        .zip(ids.iter().copied())
        .map(|(description, id)| {
            (
                id,
                NodeMetadata {
                    id: description.id,
                    name: description.name.clone(),
                    position: description.position.unwrap_or_default(),
                },
            )
        })
        .collect()
}

fn print_node_classes(context: &EngineContext) {
    let classes = context.factory().enumerate();
    println!("{} node classes", classes.len());
    for info in classes {
        let inputs: Vec<String> = info
            .input_names
            .iter()
            .zip(&info.input_types)
            .map(|(name, ty)| format!("{name}: {ty}"))
            .collect();
        let outputs: Vec<String> = info
            .output_names
            .iter()
            .zip(&info.output_types)
            .map(|(name, ty)| format!("{name}: {ty}"))
            .collect();
        println!(
            "  {:<20} ({}) -> ({})  {}",
            info.full_name(),
            inputs.join(", "),
            outputs.join(", "),
            info.description
        );
    }
}

fn print_pipeline(pipeline: &Pipeline, labels: &HashMap<NodeId, String>) {
    let label = |id: &NodeId| labels.get(id).map_or("?", String::as_str);

    println!("Dependency graph:");
    for (from, to) in pipeline.dependency_graph().edges() {
        let graph = pipeline.dependency_graph();
        if let (Some(from), Some(to)) = (graph.vertex(from), graph.vertex(to)) {
            println!("  {} -> {}", label(from), label(to));
        }
    }

    println!("Task order:");
    for &index in pipeline.task_order() {
        let Some(task) = pipeline.task(index) else {
            continue;
        };
        match &task.kind {
            TaskKind::Node => println!("  [{index}] {}", label(&task.owner)),
            TaskKind::Subtask { name, .. } => {
                println!("  [{index}] {}.{name}", label(&task.owner));
            }
            TaskKind::Funnel => {
                println!("  [{index}] {} (funnel)", label(&task.owner));
            }
        }
    }
}

fn print_sink_inputs(pipeline: &Pipeline, labels: &HashMap<NodeId, String>) {
    let graph = pipeline.graph();
    println!("Sink inputs:");
    for id in pipeline.sink_nodes() {
        let Some(node) = graph.node(id) else {
            continue;
        };
        for input in node.ports().inputs() {
            // wildcard inputs hold the delivered value wrapped once more
            let value = if input.is_wildcard() {
                input.get::<Any>().ok()
            } else {
                Some(input.value())
            };
            let shown = value
                .and_then(|value| graph.converters().to_string(value).ok())
                .unwrap_or_else(|| format!("<{}>", input.port_type()));
            println!(
                "  {}.{} = {}",
                labels.get(&id).map_or("?", String::as_str),
                input.name(),
                shown
            );
        }
    }
}
