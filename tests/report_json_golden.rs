use lhdigest::core::RecommendationStyle;
use lhdigest::engine::{Engine, EngineOptions};

#[test]
fn digest_json_matches_golden() {
    let lhr = lhdigest::lhr::parse(include_bytes!("fixtures/lhr-performance.json"))
        .expect("parse fixture");
    let engine = Engine::new(EngineOptions {
        category: "performance".to_string(),
        group: Some("load-opportunities".to_string()),
        recommendation_style: RecommendationStyle::Structured,
        thresholds: Default::default(),
        include_tables: true,
    });

    let mut report = engine.digest(&lhr).expect("digest").report;
    report.tool_version = "0.1.0".to_string();
    report.generated_at = "2026-01-01T00:00:00Z".to_string();

    let actual = serde_json::to_value(&report).expect("serialize report");
    let expected: serde_json::Value =
        serde_json::from_str(include_str!("golden/digest.json")).expect("parse golden json");

    assert_eq!(actual, expected);
}

#[test]
fn report_round_trips_through_json() {
    let lhr = lhdigest::lhr::parse(include_bytes!("fixtures/lhr-performance.json"))
        .expect("parse fixture");
    let engine = Engine::new(EngineOptions {
        category: "performance".to_string(),
        group: None,
        recommendation_style: RecommendationStyle::Text,
        thresholds: Default::default(),
        include_tables: false,
    });
    let report = engine.digest(&lhr).expect("digest").report;

    let s = serde_json::to_string(&report).expect("serialize");
    let back: lhdigest::core::Report = serde_json::from_str(&s).expect("deserialize");

    assert_eq!(back.results.len(), report.results.len());
    assert_eq!(back.summary, report.summary);
    assert!(back.results.iter().all(|f| f.table.is_none()));
    assert_eq!(
        back.results[0].recommendations,
        report.results[0].recommendations
    );
}
