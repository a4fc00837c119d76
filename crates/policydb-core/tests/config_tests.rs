use figment::Jail;
use policydb_core::config::{Config, EmbeddingBackend, PolicyBounds, RetrievalConfig, Settings};
use policydb_core::error::Error;

#[test]
fn defaults_are_valid() {
    let settings = Settings::default();
    settings.validate().expect("defaults validate");
    assert!((settings.retrieval.dense_weight - 0.7).abs() < f32::EPSILON);
    assert!((settings.retrieval.similarity_threshold - 0.6).abs() < f32::EPSILON);
    assert_eq!(settings.embedding.backend, EmbeddingBackend::Hashing);
}

#[test]
fn toml_and_env_layers_override_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "policydb.toml",
            r#"
            [retrieval]
            dense_weight = 0.6
            sparse_weight = 0.4

            [bounds]
            max_age = 65
            excluded_procedures = ["cosmetic", "hair transplant"]
            "#,
        )?;
        jail.create_file("policydb.test.toml", "[retrieval]\nmax_results = 3\n")?;
        jail.set_env("APP_RETRIEVAL__SIMILARITY_THRESHOLD", "0.5");

        let config = Config::load_for_env("test").map_err(|e| e.to_string())?;
        let s = config.settings();
        assert!((s.retrieval.dense_weight - 0.6).abs() < 1e-6);
        assert_eq!(s.retrieval.max_results, 3);
        assert!((s.retrieval.similarity_threshold - 0.5).abs() < 1e-6);
        assert_eq!(s.bounds.max_age, 65);
        assert_eq!(s.bounds.min_age, 18, "untouched keys keep defaults");
        assert_eq!(s.bounds.excluded_procedures, vec!["cosmetic".to_string(), "hair transplant".to_string()]);
        assert_eq!(s.bounds.pre_authorization, PolicyBounds::default().pre_authorization);

        let max_age: u32 = config.get("bounds.max_age").map_err(|e| e.to_string())?;
        assert_eq!(max_age, 65);
        Ok(())
    });
}

#[test]
fn weights_not_summing_to_one_are_rejected_at_load() {
    Jail::expect_with(|jail| {
        jail.create_file("policydb.toml", "[retrieval]\ndense_weight = 0.8\nsparse_weight = 0.3\n")?;
        let err = match Config::load_for_env("test") {
            Ok(_) => panic!("inconsistent weights must not load"),
            Err(e) => e,
        };
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InconsistentWeights { .. })), "{err}");
        Ok(())
    });
}

#[test]
fn retrieval_config_validation() {
    let negative = RetrievalConfig { dense_weight: 1.2, sparse_weight: -0.2, ..RetrievalConfig::default() };
    assert!(matches!(negative.validate(), Err(Error::InconsistentWeights { .. })));

    let threshold = RetrievalConfig { similarity_threshold: 1.5, ..RetrievalConfig::default() };
    assert!(matches!(threshold.validate(), Err(Error::InvalidConfig(_))));

    let zero = RetrievalConfig { max_results: 0, ..RetrievalConfig::default() };
    assert!(matches!(zero.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn model_backend_requires_model_dir() {
    let mut settings = Settings::default();
    settings.embedding.backend = EmbeddingBackend::Model;
    assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn default_exclusions_and_empty_entries() {
    let bounds = PolicyBounds::default();
    assert_eq!(bounds.excluded_procedures, vec!["cosmetic", "plastic surgery", "experimental", "elective"]);
    let blank = PolicyBounds { excluded_procedures: vec!["cosmetic".into(), "  ".into()], ..PolicyBounds::default() };
    assert!(matches!(blank.validate(), Err(Error::InvalidConfig(_))));
}
