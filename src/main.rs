use std::path::{Path, PathBuf};

use fintree::cli::{Cli, Commands, ConfigAction};
use fintree::{
    Config, DocumentInput, Engine, FintreeError, Result, RetrievalOptions,
};

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Build { inputs, out } => cmd_build(config, &inputs, &out),
        Commands::Query {
            question,
            tree,
            method,
            top_k,
            json,
        } => cmd_query(config, &question, &tree, method, top_k, json),
        Commands::Stats { tree } => cmd_stats(config, &tree),
        Commands::Config { action } => cmd_config(config, action),
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();
}

fn cmd_build(config: Config, inputs: &[PathBuf], out: &Path) -> Result<()> {
    let engine = Engine::offline(config)?;

    let mut documents = Vec::with_capacity(inputs.len());
    for path in inputs {
        let text = std::fs::read_to_string(path).map_err(|e| FintreeError::Io {
            source: e,
            context: format!("Failed to read document: {}", path.display()),
        })?;
        documents.push(DocumentInput::new(text));
    }

    let report = engine.add_documents(&documents)?;
    engine.save(out)?;

    println!(
        "Indexed {} documents ({} chunks, {} skipped) into {} nodes, depth {}.",
        report.documents, report.chunks, report.skipped_chunks, report.total_nodes, report.tree_depth
    );
    println!("Snapshot written to {}", out.display());
    Ok(())
}

fn cmd_query(
    config: Config,
    question: &str,
    tree_path: &Path,
    method: Option<String>,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let engine = Engine::offline(config)?;
    engine.load(tree_path)?;

    let method = match method {
        Some(name) => name.parse()?,
        None => engine.config().retrieval.traversal_method,
    };
    let k = top_k.unwrap_or(engine.config().retrieval.top_k);

    let response = engine.query_with(question, RetrievalOptions::new(k, method))?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&response).map_err(|e| FintreeError::Json {
                source: e,
                context: "Failed to render query response".to_string(),
            })?;
        println!("{rendered}");
    } else {
        println!("{}", response.answer);
        println!();
        println!("Sources ({}):", response.retrieval_method);
        for node in &response.retrieved_nodes {
            println!(
                "  [L{} #{}] {:.3}  {}",
                node.level, node.id, node.score, node.text_preview
            );
        }
    }
    Ok(())
}

fn cmd_stats(config: Config, tree_path: &Path) -> Result<()> {
    let engine = Engine::offline(config)?;
    engine.load(tree_path)?;

    let stats = engine.statistics()?;
    println!("Total nodes: {}", stats.total_nodes);
    println!("Tree depth:  {}", stats.tree_depth);
    for (level, count) in stats.nodes_per_level.iter().enumerate() {
        println!("  Level {level}: {count} nodes");
    }
    Ok(())
}

fn cmd_config(config: Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init { path } => {
            Config::default().save(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        ConfigAction::Show => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }
    Ok(())
}
