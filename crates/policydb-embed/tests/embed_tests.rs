use policydb_core::config::{EmbeddingBackend, EmbeddingConfig};
use policydb_embed::{default_embedder, HashingEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[test]
fn hashing_embedder_shapes_and_determinism() {
    let embedder = default_embedder(&EmbeddingConfig::default()).expect("embedder");
    let texts = vec!["knee surgery".to_string(), "knee surgery".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let (v1, v2) = (&embs[0], &embs[1]);

    assert_eq!(v1.len(), EmbeddingConfig::default().dim);
    assert_eq!(embedder.dim(), v1.len());

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn shared_vocabulary_is_more_similar() {
    let e = HashingEmbedder::new(256);
    let q = e.embed_text("Knee surgery in Pune");
    let near = e.embed_text("knee surgery is covered");
    let far = e.embed_text("dental cleaning reimbursed annually");
    assert!(cosine(&q, &near) > cosine(&q, &far));
    assert!((cosine(&q, &e.embed_text("KNEE SURGERY in pune")) - 1.0).abs() < 1e-5, "case-insensitive");
}

#[test]
fn empty_text_embeds_to_zero_vector() {
    let e = HashingEmbedder::new(8);
    assert!(e.embed_text("  ,, ").iter().all(|x| *x == 0.0));
}

#[test]
fn model_backend_without_directory_fails() {
    let config = EmbeddingConfig { backend: EmbeddingBackend::Model, model_dir: None, ..EmbeddingConfig::default() };
    assert!(default_embedder(&config).is_err());
    let missing = EmbeddingConfig { backend: EmbeddingBackend::Model, model_dir: Some("/nonexistent/policydb-model".into()), ..EmbeddingConfig::default() };
    assert!(default_embedder(&missing).is_err());
}
