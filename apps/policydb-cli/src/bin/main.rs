use std::env;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use policydb_core::config::{expand_path, Config};
use policydb_pipeline::{Pipeline, QueryRequest};
use policydb_rules::RuleSet;
use tracing_subscriber::EnvFilter;

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {} <ingest|query|rules> [args...]", prog);
        eprintln!("  ingest [data_dir]");
        eprintln!("  query \"<text>\" [--scope doc1,doc2] [--data data_dir]");
        eprintln!("  rules");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template("{spinner} embedding [{bar:40}] {pos}/{len} chunks") {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

async fn load_corpus(pipeline: &Pipeline, data_dir: &Path) -> anyhow::Result<(usize, usize)> {
    let pb = progress_bar();
    let counts = pipeline.ingest_directory(data_dir, Some(&pb)).await?;
    pb.finish_and_clear();
    Ok(counts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let (cmd, args) = parse_args();
    tracing::debug!(command = %cmd, "starting");
    let default_dir = expand_path(&config.settings().data.corpus_dir);
    match cmd.as_str() {
        "ingest" => {
            let data_dir = args.first().map(PathBuf::from).unwrap_or(default_dir);
            println!("Ingesting from {}", data_dir.display());
            let pipeline = Pipeline::from_config(&config)?;
            let (documents, chunks) = load_corpus(&pipeline, &data_dir).await?;
            let snapshot = pipeline.store().snapshot();
            println!("✅ Ingest complete ({} documents, {} chunks, generation {})", documents, chunks, snapshot.generation);
        }
        "query" => {
            let mut text = None;
            let mut scope = None;
            let mut data_dir = default_dir;
            let mut i = 0;
            while i < args.len() {
                match args[i].as_str() {
                    "--scope" | "--data" if i + 1 >= args.len() => {
                        eprintln!("Error: {} requires a value", args[i]);
                        std::process::exit(1);
                    }
                    "--scope" => { scope = Some(args[i + 1].split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect::<Vec<_>>()); i += 1; }
                    "--data" => { data_dir = PathBuf::from(&args[i + 1]); i += 1; }
                    other if !other.starts_with('-') => text = Some(other.to_string()),
                    other => { eprintln!("Unknown flag: {}", other); std::process::exit(1); }
                }
                i += 1;
            }
            let Some(text) = text else {
                eprintln!("Usage: policydb query \"<text>\" [--scope doc1,doc2] [--data data_dir]");
                std::process::exit(1)
            };
            let pipeline = Pipeline::from_config(&config)?;
            load_corpus(&pipeline, &data_dir).await?;
            let request = match scope {
                Some(documents) => QueryRequest::new(text).scoped(documents),
                None => QueryRequest::new(text),
            };
            let response = pipeline.answer(request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        "rules" => {
            let rules = RuleSet::from_settings(config.settings())?;
            let stats = rules.stats();
            println!("📋 {} rules ({} terminal)", stats.total, stats.terminal);
            for (kind, count) in &stats.by_kind { println!("  {}: {}", kind, count); }
            for rule in rules.rules() {
                println!("  [{:>3}] {}{}  {}", rule.priority, rule.id, if rule.terminal { " (terminal)" } else { "" }, rule.condition());
            }
        }
        _ => { eprintln!("Unknown command: {}", cmd); std::process::exit(1); }
    }
    Ok(())
}
