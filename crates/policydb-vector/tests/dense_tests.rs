use std::sync::atomic::{AtomicUsize, Ordering};

use policydb_core::error::Error;
use policydb_core::traits::Embedder;
use policydb_core::types::{Chunk, DenseVector};
use policydb_embed::HashingEmbedder;
use policydb_vector::{cosine, embed_chunks, DenseIndex, EmbeddingCache};
use proptest::prelude::*;

fn dv(id: &str, v: &[f32]) -> DenseVector { DenseVector { chunk_id: id.to_string(), vector: v.to_vec() } }

#[test]
fn rescaled_cosine_bounds() {
    let mut index = DenseIndex::new();
    index.insert(dv("same", &[1.0, 0.0])).unwrap();
    index.insert(dv("orthogonal", &[0.0, 1.0])).unwrap();
    index.insert(dv("opposite", &[-1.0, 0.0])).unwrap();
    let scores = index.score_all(&[2.0, 0.0]).unwrap();
    assert!((scores["same"] - 1.0).abs() < 1e-6);
    assert!((scores["orthogonal"] - 0.5).abs() < 1e-6);
    assert!(scores["opposite"].abs() < 1e-6);
    assert_eq!(index.score(&[1.0, 0.0], "missing"), 0.0);
}

#[test]
fn dimension_is_fixed_by_first_insert() {
    let mut index = DenseIndex::new();
    index.insert(dv("a", &[1.0, 0.0, 0.0])).unwrap();
    let err = index.insert(dv("b", &[1.0, 0.0])).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
    assert!(matches!(index.score_all(&[1.0]), Err(Error::DimensionMismatch { .. })));
    assert!(index.remove("a").is_some());
    assert_eq!(index.dimension(), Some(3));
}

#[test]
fn zero_vector_scores_neutral() {
    assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    let mut index = DenseIndex::with_dimension(2);
    index.insert(dv("z", &[0.0, 0.0])).unwrap();
    assert!((index.score(&[1.0, 0.0], "z") - 0.5).abs() < 1e-6);
}

struct CountingEmbedder { inner: HashingEmbedder, calls: AtomicUsize }

impl Embedder for CountingEmbedder {
    fn id(&self) -> &str { self.inner.id() }
    fn dim(&self) -> usize { self.inner.dim() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

#[test]
fn embed_chunks_uses_cache_for_repeated_text() {
    let embedder = CountingEmbedder { inner: HashingEmbedder::new(32), calls: AtomicUsize::new(0) };
    let cache = EmbeddingCache::new();
    let chunks = vec![
        Chunk::new("a", 0, "knee surgery is covered"),
        Chunk::new("a", 1, "dental care is excluded"),
        Chunk::new("b", 0, "knee surgery is covered"),
    ];
    let first = embed_chunks(&chunks, &embedder, &cache, 2, None).unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(first[2].chunk_id, "b:0");
    assert_eq!(first[0].vector, first[2].vector);
    assert_eq!(cache.len(), 2);

    let before = embedder.calls.load(Ordering::SeqCst);
    embed_chunks(&chunks, &embedder, &cache, 8, None).unwrap();
    assert_eq!(embedder.calls.load(Ordering::SeqCst), before, "all served from cache");
}

struct WrongDim;

impl Embedder for WrongDim {
    fn id(&self) -> &str { "wrong" }
    fn dim(&self) -> usize { 4 }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|_| vec![1.0; 3]).collect()) }
}

#[test]
fn embed_chunks_rejects_wrong_dimension() {
    let err = embed_chunks(&[Chunk::new("a", 0, "text")], &WrongDim, &EmbeddingCache::new(), 4, None).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::DimensionMismatch { expected: 4, actual: 3 })));
}

proptest! {
    #[test]
    fn dense_scores_in_unit_interval(a in prop::collection::vec(-10.0f32..10.0, 4), b in prop::collection::vec(-10.0f32..10.0, 4)) {
        let mut index = DenseIndex::new();
        index.insert(DenseVector { chunk_id: "c".into(), vector: b }).unwrap();
        let s = index.score(&a, "c");
        prop_assert!((0.0..=1.0).contains(&s));
    }
}
