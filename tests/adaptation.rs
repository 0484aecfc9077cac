use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use nudgekit::{
    CoachConfig, CoachEngine, Context, CycleStage, DismissalReason, EffectivenessRecord,
    Intervention, MemorySink, StaticProfileStore, SuppressReason, Telemetry, TeraCatalog,
};

fn engine_with_config(config: CoachConfig) -> CoachEngine {
    CoachEngine::new(
        config,
        Arc::new(TeraCatalog::builtin().unwrap()),
        Arc::new(StaticProfileStore::new()),
        Arc::new(MemorySink::new()),
    )
    .unwrap()
}

fn engine() -> CoachEngine {
    engine_with_config(CoachConfig::default())
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn receptive_telemetry() -> Telemetry {
    Telemetry {
        task_complexity: Some(0.4),
        time_pressure: Some(0.3),
        interruption_count: Some(1),
        focus_duration_min: Some(20),
        engagement: Some(0.6),
        distraction_level: Some(0.2),
        base_energy: Some(0.8),
        time_active_hours: Some(2.0),
        recent_break_min: Some(10),
    }
}

fn feedback(
    intervention: &Intervention,
    quality: f64,
    dismissal: Option<DismissalReason>,
    at: DateTime<Utc>,
) -> EffectivenessRecord {
    EffectivenessRecord {
        intervention_id: intervention.id,
        user_id: intervention.user_id.clone(),
        engagement: quality,
        completion: quality,
        satisfaction: quality,
        behavior_delta: quality * 2.0 - 1.0,
        dismissal_reason: dismissal,
        at,
    }
}

/// Runs cycles 40 minutes apart, feeding back `quality` after each emission,
/// until `count` emissions have been adapted. Returns the time after the
/// last feedback.
fn emit_and_adapt(engine: &CoachEngine, quality: f64, count: usize) -> DateTime<Utc> {
    let mut now = start();
    let mut adapted = 0;
    while adapted < count {
        let context = Context::at(now);
        if let Some(intervention) = engine.decide("u1", &receptive_telemetry(), &context) {
            assert!(engine.record_feedback(&feedback(
                &intervention,
                quality,
                None,
                now + Duration::minutes(5)
            )));
            adapted += 1;
        }
        now += Duration::minutes(40);
    }
    now
}

mod threshold_adaptation {
    use super::*;

    #[test]
    fn strong_outcomes_lower_the_receptivity_threshold() {
        let mut config = CoachConfig::default();
        config.adaptation.effectiveness_window = 5;
        let engine = engine_with_config(config);
        emit_and_adapt(&engine, 1.0, 5);
        let weights = engine.adaptive_state("u1").unwrap();
        assert!(weights.receptivity_threshold < 0.45);
        assert!(weights.receptivity_threshold >= 0.3);
    }

    #[test]
    fn weak_outcomes_raise_the_receptivity_threshold() {
        let mut config = CoachConfig::default();
        config.adaptation.effectiveness_window = 5;
        let engine = engine_with_config(config);
        emit_and_adapt(&engine, 0.0, 5);
        let weights = engine.adaptive_state("u1").unwrap();
        assert!(weights.receptivity_threshold > 0.45);
        assert!(weights.receptivity_threshold <= 0.9);
    }
}

mod kind_weights {
    use super::*;

    #[test]
    fn positive_feedback_moves_kind_weight_toward_one() {
        let engine = engine();
        let context = Context::at(start());
        let intervention = engine
            .decide("u1", &receptive_telemetry(), &context)
            .unwrap();
        let before = engine
            .adaptive_state("u1")
            .unwrap()
            .weight_for(intervention.kind);
        engine.record_feedback(&feedback(&intervention, 1.0, None, start()));
        let after = engine
            .adaptive_state("u1")
            .unwrap()
            .weight_for(intervention.kind);
        assert!(after > before);
        assert!(after <= 1.0);
    }

    #[test]
    fn negative_feedback_lowers_intensity_and_shortens_interventions() {
        let engine = engine();
        let context = Context::at(start());
        let first = engine
            .decide("u1", &receptive_telemetry(), &context)
            .unwrap();
        engine.record_feedback(&feedback(&first, 0.0, None, start()));
        let weights = engine.adaptive_state("u1").unwrap();
        assert!(weights.intensity_multiplier < 1.0);

        let later = Context::at(start() + Duration::minutes(40));
        let second = engine
            .decide("u1", &receptive_telemetry(), &later)
            .unwrap();
        if second.kind == first.kind {
            assert!(second.duration_min <= first.duration_min);
        }
        assert!(second.intensity < 1.0);
    }
}

mod duplicate_feedback {
    use super::*;

    #[test]
    fn duplicates_leave_adaptive_state_untouched() {
        let engine = engine();
        let context = Context::at(start());
        let intervention = engine
            .decide("u1", &receptive_telemetry(), &context)
            .unwrap();
        let record = feedback(&intervention, 0.9, None, start());

        assert!(engine.record_feedback(&record));
        let once = serde_json::to_value(engine.adaptive_state("u1").unwrap()).unwrap();
        assert!(!engine.record_feedback(&record));
        let twice = serde_json::to_value(engine.adaptive_state("u1").unwrap()).unwrap();
        assert_eq!(once, twice);
    }
}

mod dismissal_reasons {
    use super::*;

    #[test]
    fn too_frequent_dismissals_widen_the_spacing() {
        let engine = engine();
        let context = Context::at(start());
        let intervention = engine
            .decide("u1", &receptive_telemetry(), &context)
            .unwrap();
        // one widening step: effective interval goes from 30 to 40 minutes
        engine.record_feedback(&feedback(
            &intervention,
            0.1,
            Some(DismissalReason::TooFrequent),
            start() + Duration::minutes(5),
        ));

        let after_one_widen = Context::at(start() + Duration::minutes(35));
        let report = engine.run_cycle("u1", &receptive_telemetry(), &after_one_widen);
        assert_eq!(
            report.suppress_reason,
            Some(SuppressReason::MinIntervalNotElapsed)
        );

        let after_widened_interval = Context::at(start() + Duration::minutes(45));
        let report = engine.run_cycle("u1", &receptive_telemetry(), &after_widened_interval);
        assert_eq!(report.stage, CycleStage::Emitted);
    }

    #[test]
    fn not_relevant_dismissal_penalizes_the_kind() {
        let engine = engine();
        let context = Context::at(start());
        let intervention = engine
            .decide("u1", &receptive_telemetry(), &context)
            .unwrap();
        engine.record_feedback(&feedback(
            &intervention,
            0.1,
            Some(DismissalReason::NotRelevant),
            start(),
        ));
        let weight = engine
            .adaptive_state("u1")
            .unwrap()
            .weight_for(intervention.kind);
        assert!(weight < 0.5);
    }
}

mod snapshots {
    use super::*;

    #[test]
    fn learning_survives_a_restart() {
        let engine = engine();
        let context = Context::at(start());
        let intervention = engine
            .decide("u1", &receptive_telemetry(), &context)
            .unwrap();
        engine.record_feedback(&feedback(&intervention, 1.0, None, start()));

        let snapshot = engine.snapshot_user("u1").unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();

        let restarted = super::engine();
        restarted.restore_user(&serde_json::from_str(&json).unwrap());
        assert_eq!(
            restarted.adaptive_state("u1").unwrap(),
            engine.adaptive_state("u1").unwrap()
        );
    }
}
