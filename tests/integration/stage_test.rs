//! Stage manager integration tests

use chrono::{Duration, TimeZone, Utc};
use market_governor::config::{StageConfig, StagePolicy};
use market_governor::stage::{Stage, StageManager};

#[test]
fn test_aapl_promote_hold_demote() {
    let stages = StageManager::default();

    let d = stages.next_stage("AAPL", Stage::Plan, 9.5, 9.3);
    assert_eq!(d.stage, Stage::Route);
    assert!(d.should_transition);

    let d = stages.next_stage("AAPL", d.stage, 8.9, 9.3);
    assert_eq!(d.stage, Stage::Route);
    assert!(!d.should_transition);
    assert_eq!(d.reason, "Holding ROUTE");

    let d = stages.next_stage("AAPL", d.stage, 8.6, 9.3);
    assert_eq!(d.stage, Stage::Plan);
    assert!(d.should_transition);
    assert!(d.reason.starts_with("Demoting to PLAN"));
}

#[test]
fn test_keys_do_not_leak() {
    let stages = StageManager::default();
    stages.next_stage("AAPL", Stage::Plan, 9.5, 9.3);
    stages.next_stage("MSFT", Stage::Gates, 2.0, 9.3);
    stages.next_stage("AAPL", Stage::Route, 9.0, 9.3);

    assert_eq!(stages.stage_of("AAPL"), Some(Stage::Route));
    assert_eq!(stages.stage_of("MSFT"), Some(Stage::Plan));
    assert_eq!(stages.get_all_transitions().len(), 2);
}

#[test]
fn test_noisy_scores_do_not_flap() {
    let stages = StageManager::default();
    let t0 = Utc.with_ymd_and_hms(2024, 2, 1, 15, 0, 0).unwrap();
    stages.next_stage_at("SPY", Stage::Plan, 9.4, 9.3, t0);

    // Score oscillates around the threshold but inside the band
    let noise = [9.2, 9.35, 8.9, 9.1, 8.85, 9.31, 9.0];
    for (i, score) in noise.iter().enumerate() {
        let d = stages.next_stage_at("SPY", Stage::Route, *score, 9.3, t0 + Duration::minutes(i as i64));
        assert_eq!(d.stage, Stage::Route);
        assert!(!d.should_transition);
    }
    assert_eq!(stages.get_last_transition("SPY").unwrap().transitions, 1);
}

#[test]
fn test_min_hold_time_bounds_transition_rate() {
    let stages = StageManager::new(StageConfig {
        min_hold_secs: 600,
        policy: StagePolicy::OneStep,
        ..Default::default()
    });
    let t0 = Utc.with_ymd_and_hms(2024, 2, 1, 15, 0, 0).unwrap();

    // Alternating extreme scores every minute for an hour
    let mut transitions = Vec::new();
    for minute in 0..60 {
        let score = if minute % 2 == 0 { 9.9 } else { 1.0 };
        let d = stages.next_stage_at("QQQ", Stage::Plan, score, 9.3, t0 + Duration::minutes(minute));
        if d.should_transition {
            transitions.push(minute);
        }
    }

    assert!(!transitions.is_empty());
    for pair in transitions.windows(2) {
        assert!(pair[1] - pair[0] >= 10, "transitions too close: {pair:?}");
    }
}

#[tokio::test]
async fn test_transition_events_carry_reason() {
    let stages = StageManager::default();
    let mut rx = stages.subscribe();

    stages.next_stage("AAPL", Stage::Gates, 9.8, 9.3);
    let event = rx.recv().await.unwrap();
    assert_eq!(event.key, "AAPL");
    assert_eq!(event.from, Stage::Gates);
    assert_eq!(event.to, Stage::Route);
    assert!(event.reason.starts_with("Promoting to ROUTE"));
}
