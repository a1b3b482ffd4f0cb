//! Serving a fixture file end to end, including reloads after edits.

use std::sync::Arc;
use std::time::Duration;

use subject_pool::{FileAdapter, ReloadOutcome, Sample, SamplerConfig, ServerContext};

const FIXTURE: &str = r#"
projects:
  - id: 1
    name: galaxies
    subjects:
      - { id: 1 }
      - { id: 2 }
      - { id: 3 }
    seen:
      7: [1, 2]
  - id: 2
    name: pairs
    prioritized: true
    pairwise: true
    subjects:
      - { id: 10, priority: 1.0 }
      - { id: 11, priority: 2.0 }
      - { id: 12, priority: 0.0 }
"#;

#[tokio::test]
async fn test_fixture_round_trip_through_context() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("projects.yaml");
    std::fs::write(&path, FIXTURE).expect("write fixture");

    let config = SamplerConfig::new()
        .with_reload_debounce(Duration::ZERO)
        .with_seed(5);
    let context = ServerContext::new(config, Arc::new(FileAdapter::new(&path)));
    assert!(context.load_projects().await.unwrap().is_empty());
    assert!(context.ready());

    let sample = context.sample("galaxies", Some(7), Some(5)).await.unwrap();
    assert_eq!(sample, Sample::Singles(vec![3]));

    // Zero-weight subject never drawn, so only one pair is possible
    let sample = context.sample("pairs", Some(7), Some(5)).await.unwrap();
    let pairs = sample.pairs().expect("pairs");
    assert_eq!(pairs.len(), 1);
    let mut pair = pairs[0];
    pair.sort_unstable();
    assert_eq!(pair, [10, 11]);

    std::fs::write(&path, FIXTURE.replace("{ id: 3 }", "{ id: 4 }")).expect("rewrite fixture");
    assert_eq!(context.reload("galaxies").await.unwrap(), ReloadOutcome::Reloaded);
    let sample = context.sample("galaxies", Some(7), Some(5)).await.unwrap();
    assert_eq!(sample, Sample::Singles(vec![4]));

    context.shutdown().await;
}

#[tokio::test]
async fn test_broken_fixture_is_not_ready() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("projects.json");
    std::fs::write(&path, "{\"projects\": [").expect("write fixture");

    let context = ServerContext::new(SamplerConfig::new(), Arc::new(FileAdapter::new(&path)));
    assert!(context.load_projects().await.is_err());
    assert!(context.ready());
    assert!(context.workflow("galaxies").await.is_err());
}
