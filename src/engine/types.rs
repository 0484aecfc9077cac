use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::Display;
use uuid::Uuid;

// FocusState — attention classification produced by the estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FocusState {
    Flow,
    Focused,
    Neutral,
    Distracted,
    Fatigued,
}

// UserState — normalized per-cycle estimate; read-only outside the estimator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserState {
    pub cognitive_load: f64,
    pub energy_level: f64,
    pub stress_level: f64,
    pub receptivity: f64,
    pub focus_state: FocusState,
    /// Set when telemetry fields were missing or malformed and neutral
    /// defaults were substituted.
    pub degraded: bool,
    pub at: DateTime<Utc>,
}

// Telemetry — raw per-cycle signals; every field optional, missing = neutral
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Telemetry {
    #[serde(default)]
    pub task_complexity: Option<f64>,
    #[serde(default)]
    pub time_pressure: Option<f64>,
    #[serde(default)]
    pub interruption_count: Option<u32>,
    #[serde(default)]
    pub focus_duration_min: Option<u32>,
    #[serde(default)]
    pub engagement: Option<f64>,
    #[serde(default)]
    pub distraction_level: Option<f64>,
    #[serde(default)]
    pub base_energy: Option<f64>,
    #[serde(default)]
    pub time_active_hours: Option<f64>,
    #[serde(default)]
    pub recent_break_min: Option<u32>,
}

// Commitment — upcoming calendar block, offsets relative to Context::now
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commitment {
    pub start_offset_min: u32,
    pub duration_min: u32,
}

// CostWindow — caller-projected interruption cost at a future offset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostWindow {
    pub offset_min: u32,
    pub interruption_cost: f64,
}

/// Per-cycle context supplied by the caller. `now` is the engine's only
/// clock; decision paths never read the wall clock themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub now: DateTime<Utc>,
    /// Caller-resolved local hour; used for time-of-day suitability.
    pub hour_of_day: u8,
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// How costly an interruption would be right now, [0,1].
    #[serde(default)]
    pub interruption_cost: f64,
    #[serde(default)]
    pub upcoming_commitments: Vec<Commitment>,
    /// Optional forecast of interruption cost at future offsets, consulted
    /// by the timing optimizer when the current cost is too high.
    #[serde(default)]
    pub cost_forecast: Vec<CostWindow>,
}

impl Context {
    /// Context at `now` with the hour taken from the UTC timestamp and no
    /// interruption pressure.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            hour_of_day: now.hour() as u8,
            activity: None,
            location: None,
            interruption_cost: 0.0,
            upcoming_commitments: Vec::new(),
            cost_forecast: Vec::new(),
        }
    }
}

// InterventionKind — closed set of intervention categories
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InterventionKind {
    MicroBreak,
    BreathingReset,
    MovementPrompt,
    FocusBlock,
    TaskBatching,
    WorkspaceCleanup,
    DeepWorkChallenge,
    ReflectionPrompt,
}

// IntensityBand — coarse intensity class derived from base_intensity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IntensityBand {
    Low,
    Moderate,
    High,
}

impl IntensityBand {
    pub fn of(intensity: f64) -> Self {
        if intensity < 0.35 {
            Self::Low
        } else if intensity < 0.7 {
            Self::Moderate
        } else {
            Self::High
        }
    }
}

/// Catalog entry describing an intervention category prior to
/// personalization. Validated when the catalog is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionCandidate {
    pub id: String,
    pub kind: InterventionKind,
    pub template_ref: String,
    pub base_duration_min: u32,
    pub base_intensity: f64,
    pub trigger_tags: Vec<String>,
}

impl InterventionCandidate {
    pub fn band(&self) -> IntensityBand {
        IntensityBand::of(self.base_intensity)
    }
}

// InterventionTiming — delivery window for an emitted intervention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterventionTiming {
    pub scheduled_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// A concrete, personalized intervention. Immutable once emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intervention {
    pub id: Uuid,
    pub user_id: String,
    pub kind: InterventionKind,
    pub content: String,
    pub action_steps: Vec<String>,
    pub timing: InterventionTiming,
    pub intensity: f64,
    pub duration_min: u32,
    pub follow_up: Option<String>,
    pub trigger_reason: String,
    pub snooze_options: Vec<String>,
}

// DismissalReason — why a user dismissed an intervention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DismissalReason {
    Busy,
    TooFrequent,
    NotRelevant,
    Unclear,
    InFlow,
}

/// Observed outcome for an emitted intervention. Append-only; duplicate
/// `intervention_id` submissions are idempotent-guarded by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectivenessRecord {
    pub intervention_id: Uuid,
    pub user_id: String,
    pub engagement: f64,
    pub completion: f64,
    pub satisfaction: f64,
    /// Observed behavior change, [-1,1].
    pub behavior_delta: f64,
    #[serde(default)]
    pub dismissal_reason: Option<DismissalReason>,
    pub at: DateTime<Utc>,
}

/// Per-user mutable scores biasing future decisions. The only cross-cycle
/// engine state besides usage history; every field is clamp-bounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveWeights {
    /// Per-kind effectiveness score in [0.1,1.0]; absent kinds read 0.5.
    pub kind_weights: BTreeMap<InterventionKind, f64>,
    /// Always clamped to [0.1,1.0].
    pub intensity_multiplier: f64,
    /// Adaptive gate threshold in [0.3,0.9].
    pub receptivity_threshold: f64,
}

pub(crate) const NEUTRAL_KIND_WEIGHT: f64 = 0.5;

impl AdaptiveWeights {
    pub fn new(receptivity_threshold: f64) -> Self {
        Self {
            kind_weights: BTreeMap::new(),
            intensity_multiplier: 1.0,
            receptivity_threshold,
        }
    }

    pub fn weight_for(&self, kind: InterventionKind) -> f64 {
        self.kind_weights
            .get(&kind)
            .copied()
            .unwrap_or(NEUTRAL_KIND_WEIGHT)
    }
}

// SuppressReason — typed reason code for a cycle that emitted nothing
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SuppressReason {
    CognitiveLoadHigh,
    FlowProtected,
    StressCritical,
    ReceptivityLow,
    MinIntervalNotElapsed,
    DailyCapReached,
    NoEligibleCandidate,
    NoViableWindow,
    /// The persistence sink could not answer a history query, so the
    /// interval and cap checks could not be proven.
    HistoryUnavailable,
}

// CycleStage — per-user, per-cycle state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CycleStage {
    Idle,
    StateEstimated,
    Suppressed,
    Admitted,
    StrategySelected,
    ContentComposed,
    TimingScheduled,
    Emitted,
    FeedbackReceived,
    Adapted,
}

/// Outcome of one decision cycle: the terminal stage, the estimated state,
/// and either an intervention or a suppression reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub stage: CycleStage,
    pub state: Option<UserState>,
    pub suppress_reason: Option<SuppressReason>,
    pub intervention: Option<Intervention>,
}

impl CycleReport {
    pub(crate) fn suppressed(state: UserState, reason: SuppressReason) -> Self {
        Self {
            stage: CycleStage::Suppressed,
            state: Some(state),
            suppress_reason: Some(reason),
            intervention: None,
        }
    }

    pub(crate) fn emitted(state: UserState, intervention: Intervention) -> Self {
        Self {
            stage: CycleStage::Emitted,
            state: Some(state),
            suppress_reason: None,
            intervention: Some(intervention),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focus_state_serializes_snake_case() {
        let json = serde_json::to_string(&FocusState::Flow).unwrap();
        assert_eq!(json, "\"flow\"");
        assert_eq!(FocusState::Distracted.to_string(), "distracted");
    }

    #[test]
    fn telemetry_missing_fields_deserialize_as_none() {
        let t: Telemetry = serde_json::from_str(r#"{"task_complexity":0.7}"#).unwrap();
        assert_eq!(t.task_complexity, Some(0.7));
        assert!(t.engagement.is_none());
        assert!(t.interruption_count.is_none());
    }

    #[test]
    fn intensity_band_boundaries() {
        assert_eq!(IntensityBand::of(0.0), IntensityBand::Low);
        assert_eq!(IntensityBand::of(0.34), IntensityBand::Low);
        assert_eq!(IntensityBand::of(0.35), IntensityBand::Moderate);
        assert_eq!(IntensityBand::of(0.69), IntensityBand::Moderate);
        assert_eq!(IntensityBand::of(0.7), IntensityBand::High);
        assert_eq!(IntensityBand::of(1.0), IntensityBand::High);
    }

    #[test]
    fn adaptive_weights_default_to_neutral_per_kind() {
        let weights = AdaptiveWeights::new(0.45);
        assert!((weights.weight_for(InterventionKind::MicroBreak) - 0.5).abs() < f64::EPSILON);
        assert!((weights.intensity_multiplier - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn effectiveness_record_roundtrip() {
        let record = EffectivenessRecord {
            intervention_id: Uuid::nil(),
            user_id: "u1".into(),
            engagement: 0.8,
            completion: 1.0,
            satisfaction: 0.6,
            behavior_delta: 0.2,
            dismissal_reason: Some(DismissalReason::TooFrequent),
            at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"too_frequent\""));
        let back: EffectivenessRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dismissal_reason, Some(DismissalReason::TooFrequent));
    }

    #[test]
    fn suppress_reason_displays_snake_case() {
        assert_eq!(
            SuppressReason::MinIntervalNotElapsed.to_string(),
            "min_interval_not_elapsed"
        );
        assert_eq!(CycleStage::Emitted.to_string(), "emitted");
    }
}
