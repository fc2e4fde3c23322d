use std::collections::HashSet;

use recommend_engine::models::{EngineVariant, Operation};
use recommend_engine::queue::RecommendationTask;
use recommend_engine::tags;

#[test]
fn tag_extraction_drops_punctuation_stopwords_and_short_tokens() {
    let title = "The Best Bollywood Movie #trending";
    let tags = vec!["bollywood".to_string(), "hindi".to_string()];

    let extracted = tags::extract_tags(title, &tags);

    assert!(extracted.contains("bollywood"));
    assert!(extracted.contains("hindi"));
    assert!(extracted.contains("movie"));
    assert!(extracted.contains("trending"));
    assert!(!extracted.contains("the"));
}

/// Invariant 6 (spec.md §8): tag extraction is idempotent under
/// restringification.
#[test]
fn tag_extraction_is_idempotent_under_restringification() {
    let title = "Bollywood Hits 2024 #party";
    let video_tags = vec!["dance".to_string(), "music".to_string()];

    let first = tags::extract_tags(title, &video_tags);
    let restringified: Vec<String> = first.iter().cloned().collect();
    let second = tags::extract_tags("", &restringified);

    assert_eq!(first, second);
}

/// Sharding rule (spec.md §4.6): device id hex-prefix routing is
/// deterministic and covers the full hex range.
#[test]
fn device_sharding_covers_full_hex_range() {
    let v1_prefixes: HashSet<char> = "01234567".chars().collect();
    let v2_prefixes: HashSet<char> = "89abcdef".chars().collect();

    for c in v1_prefixes {
        let device = format!("{c}device");
        assert_eq!(EngineVariant::for_device(&device), EngineVariant::V1);
    }
    for c in v2_prefixes {
        let device = format!("{c}device");
        assert_eq!(EngineVariant::for_device(&device), EngineVariant::V2);
    }
}

/// Scenario groundwork: a behavior task survives the wire format the task
/// queue carries it over (spec.md §6).
#[test]
fn recommendation_task_round_trips_through_json_with_valid_operation_code() {
    for op in [
        Operation::Watch,
        Operation::Collect,
        Operation::Share,
        Operation::Star,
        Operation::Dislike,
    ] {
        let task = RecommendationTask::new("8abc", "video-42", op);
        let encoded = serde_json::to_string(&task).expect("task must serialize");
        let decoded: RecommendationTask =
            serde_json::from_str(&encoded).expect("task must deserialize");

        assert_eq!(decoded.device, "8abc");
        assert_eq!(decoded.video_id, "video-42");
        assert_eq!(Operation::try_from(decoded.operation).unwrap(), op);
    }
}

/// Empty recall fallback (spec.md §8 scenario 6) starts from an untagged
/// document; the extractor alone must already signal "no tags" so the
/// engine's fallback path is reached.
#[test]
fn untagged_document_yields_no_tags() {
    let extracted = tags::extract_tags("", &[]);
    assert!(extracted.is_empty());
}
