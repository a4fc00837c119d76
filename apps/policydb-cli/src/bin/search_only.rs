use std::env;
use std::path::PathBuf;

use policydb_core::config::{expand_path, Config};
use policydb_core::data_processor::DataProcessor;
use policydb_hybrid::{CorpusStore, HybridRanker};
use policydb_vector::{embed_chunks, EmbeddingCache};

/// Ranks clauses for a query without extraction or rules.
fn main() -> anyhow::Result<()> {
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <query> [data_dir]", args[0]);
        eprintln!("Example: {} 'knee surgery waiting period' ./policies", args[0]);
        std::process::exit(1);
    }
    let settings = config.settings();
    let query_text = &args[1];
    let data_dir = args.get(2).map(PathBuf::from).unwrap_or_else(|| expand_path(&settings.data.corpus_dir));
    println!("🔍 policydb-search-only\n======================");
    println!("Query: {}", query_text);
    println!("Data directory: {}", data_dir.display());

    let embedder = policydb_embed::default_embedder(&settings.embedding)?;
    let cache = EmbeddingCache::new();
    let store = CorpusStore::new();
    for (document_id, chunks) in DataProcessor::new(settings.chunking.clone()).process_directory(&data_dir)? {
        let vectors = embed_chunks(&chunks, embedder.as_ref(), &cache, 32, None)?;
        println!("  indexed {} ({} chunks)", document_id, chunks.len());
        store.ingest(chunks, vectors)?;
    }

    let ranker = HybridRanker::new(settings.retrieval.clone())?;
    let query_vector = embedder.embed_batch(&[query_text.clone()])?.pop();
    let snapshot = store.snapshot();
    let ranked = ranker.rank(query_text, query_vector.as_deref(), &snapshot, None)?;
    println!("\n🔍 Found {} clauses above {:.2} for: \"{}\"", ranked.len(), settings.retrieval.similarity_threshold, query_text);
    for clause in &ranked {
        println!(
            "\n  {}. fused={:.4}  dense={:.4}  sparse={:.4}  id={}",
            clause.rank, clause.fused_score, clause.dense_score, clause.sparse_score, clause.chunk_id
        );
        println!("     📝 {}", clause.text);
    }
    Ok(())
}
