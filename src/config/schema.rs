use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ── Top-level config ──────────────────────────────────────────────

/// Tunable surface of the decision engine. Every coefficient the source
/// material treats as a judgement call lives here rather than in code;
/// `validate()` runs at engine construction and fails fast on out-of-range
/// values.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoachConfig {
    #[serde(default)]
    pub estimator: EstimatorConfig,

    #[serde(default)]
    pub gate: GateConfig,

    #[serde(default)]
    pub selector: SelectorConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub adaptation: AdaptationConfig,
}

impl CoachConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.estimator.validate()?;
        self.gate.validate()?;
        self.selector.validate()?;
        self.timing.validate()?;
        self.adaptation.validate()?;
        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) || !value.is_finite() {
        return Err(ConfigError::Validation(format!(
            "{name} must be in [0,1], got {value}"
        )));
    }
    Ok(())
}

// ── State estimation ──────────────────────────────────────────────

/// Weights and thresholds for `StateEstimator`. The cognitive-load weights
/// are normalized by their sum, so they only need to be non-negative and
/// not all zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    #[serde(default = "default_load_weight_complexity")]
    pub load_weight_complexity: f64,
    #[serde(default = "default_load_weight_pressure")]
    pub load_weight_pressure: f64,
    #[serde(default = "default_load_weight_interruptions")]
    pub load_weight_interruptions: f64,
    #[serde(default = "default_load_weight_fatigue")]
    pub load_weight_fatigue: f64,

    /// Minutes of unbroken focus before flow is considered.
    #[serde(default = "default_flow_focus_min")]
    pub flow_focus_min: u32,
    #[serde(default = "default_flow_engagement_min")]
    pub flow_engagement_min: f64,
    #[serde(default = "default_flow_distraction_max")]
    pub flow_distraction_max: f64,

    /// Energy below this classifies the user as fatigued.
    #[serde(default = "default_low_energy_threshold")]
    pub low_energy_threshold: f64,

    /// Energy lost per active hour and recovered per break minute.
    #[serde(default = "default_energy_decay_per_hour")]
    pub energy_decay_per_hour: f64,
    #[serde(default = "default_energy_recovery_per_break_min")]
    pub energy_recovery_per_break_min: f64,
}

fn default_load_weight_complexity() -> f64 {
    0.3
}
fn default_load_weight_pressure() -> f64 {
    0.2
}
fn default_load_weight_interruptions() -> f64 {
    0.2
}
fn default_load_weight_fatigue() -> f64 {
    0.3
}
fn default_flow_focus_min() -> u32 {
    45
}
fn default_flow_engagement_min() -> f64 {
    0.7
}
fn default_flow_distraction_max() -> f64 {
    0.3
}
fn default_low_energy_threshold() -> f64 {
    0.3
}
fn default_energy_decay_per_hour() -> f64 {
    0.05
}
fn default_energy_recovery_per_break_min() -> f64 {
    0.01
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            load_weight_complexity: default_load_weight_complexity(),
            load_weight_pressure: default_load_weight_pressure(),
            load_weight_interruptions: default_load_weight_interruptions(),
            load_weight_fatigue: default_load_weight_fatigue(),
            flow_focus_min: default_flow_focus_min(),
            flow_engagement_min: default_flow_engagement_min(),
            flow_distraction_max: default_flow_distraction_max(),
            low_energy_threshold: default_low_energy_threshold(),
            energy_decay_per_hour: default_energy_decay_per_hour(),
            energy_recovery_per_break_min: default_energy_recovery_per_break_min(),
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [
            self.load_weight_complexity,
            self.load_weight_pressure,
            self.load_weight_interruptions,
            self.load_weight_fatigue,
        ];
        if weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return Err(ConfigError::Validation(
                "cognitive-load weights must be non-negative".into(),
            ));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(ConfigError::Validation(
                "cognitive-load weights must not all be zero".into(),
            ));
        }
        check_unit("flow_engagement_min", self.flow_engagement_min)?;
        check_unit("flow_distraction_max", self.flow_distraction_max)?;
        check_unit("low_energy_threshold", self.low_energy_threshold)?;
        Ok(())
    }

    pub(crate) fn load_weight_sum(&self) -> f64 {
        self.load_weight_complexity
            + self.load_weight_pressure
            + self.load_weight_interruptions
            + self.load_weight_fatigue
    }
}

// ── Admission gate ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_cognitive_load_high_threshold")]
    pub cognitive_load_high_threshold: f64,
    #[serde(default = "default_stress_critical_threshold")]
    pub stress_critical_threshold: f64,
    /// Starting receptivity threshold; per-user adaptation moves it within
    /// [`AdaptationConfig::receptivity_floor`, `receptivity_ceiling`].
    #[serde(default = "default_receptivity_min_threshold")]
    pub receptivity_min_threshold: f64,
    #[serde(default = "default_min_interval_minutes")]
    pub min_interval_minutes: u32,
    /// Rolling 24h emission cap per user.
    #[serde(default = "default_max_daily")]
    pub max_daily: u32,
}

fn default_cognitive_load_high_threshold() -> f64 {
    0.8
}
fn default_stress_critical_threshold() -> f64 {
    0.9
}
fn default_receptivity_min_threshold() -> f64 {
    0.45
}
fn default_min_interval_minutes() -> u32 {
    30
}
fn default_max_daily() -> u32 {
    8
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cognitive_load_high_threshold: default_cognitive_load_high_threshold(),
            stress_critical_threshold: default_stress_critical_threshold(),
            receptivity_min_threshold: default_receptivity_min_threshold(),
            min_interval_minutes: default_min_interval_minutes(),
            max_daily: default_max_daily(),
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit(
            "cognitive_load_high_threshold",
            self.cognitive_load_high_threshold,
        )?;
        check_unit("stress_critical_threshold", self.stress_critical_threshold)?;
        check_unit("receptivity_min_threshold", self.receptivity_min_threshold)?;
        if self.min_interval_minutes == 0 {
            return Err(ConfigError::Validation(
                "min_interval_minutes must be at least 1".into(),
            ));
        }
        if self.max_daily == 0 {
            return Err(ConfigError::Validation(
                "max_daily must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ── Strategy selection ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "default_state_match_weight")]
    pub state_match_weight: f64,
    #[serde(default = "default_affinity_weight")]
    pub affinity_weight: f64,
    #[serde(default = "default_adaptive_weight")]
    pub adaptive_weight: f64,
    #[serde(default = "default_fatigue_penalty_weight")]
    pub fatigue_penalty_weight: f64,
    /// Cognitive load at or above this (but below the gate's high threshold)
    /// restricts selection to the low-intensity band.
    #[serde(default = "default_elevated_load_floor")]
    pub elevated_load_floor: f64,
}

fn default_state_match_weight() -> f64 {
    0.4
}
fn default_affinity_weight() -> f64 {
    0.3
}
fn default_adaptive_weight() -> f64 {
    0.2
}
fn default_fatigue_penalty_weight() -> f64 {
    0.1
}
fn default_elevated_load_floor() -> f64 {
    0.6
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            state_match_weight: default_state_match_weight(),
            affinity_weight: default_affinity_weight(),
            adaptive_weight: default_adaptive_weight(),
            fatigue_penalty_weight: default_fatigue_penalty_weight(),
            elevated_load_floor: default_elevated_load_floor(),
        }
    }
}

impl SelectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, w) in [
            ("state_match_weight", self.state_match_weight),
            ("affinity_weight", self.affinity_weight),
            ("adaptive_weight", self.adaptive_weight),
            ("fatigue_penalty_weight", self.fatigue_penalty_weight),
        ] {
            if w < 0.0 || !w.is_finite() {
                return Err(ConfigError::Validation(format!(
                    "{name} must be non-negative"
                )));
            }
        }
        check_unit("elevated_load_floor", self.elevated_load_floor)?;
        Ok(())
    }
}

// ── Timing ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Current interruption cost at or below this delivers immediately.
    #[serde(default = "default_interruption_cost_threshold")]
    pub interruption_cost_threshold: f64,
    #[serde(default = "default_max_defer_minutes")]
    pub max_defer_minutes: u32,
    /// Scheduled interventions expire this long after their delivery window.
    #[serde(default = "default_valid_for_minutes")]
    pub valid_for_minutes: u32,
}

fn default_interruption_cost_threshold() -> f64 {
    0.6
}
fn default_max_defer_minutes() -> u32 {
    120
}
fn default_valid_for_minutes() -> u32 {
    60
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            interruption_cost_threshold: default_interruption_cost_threshold(),
            max_defer_minutes: default_max_defer_minutes(),
            valid_for_minutes: default_valid_for_minutes(),
        }
    }
}

impl TimingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit(
            "interruption_cost_threshold",
            self.interruption_cost_threshold,
        )?;
        if self.valid_for_minutes == 0 {
            return Err(ConfigError::Validation(
                "valid_for_minutes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ── Adaptation ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationConfig {
    /// EMA rate α for per-kind effectiveness and intensity updates.
    #[serde(default = "default_adaptivity_rate")]
    pub adaptivity_rate: f64,
    /// Rolling-mean effectiveness below this raises the receptivity
    /// threshold (more conservative); above `high_watermark` lowers it.
    #[serde(default = "default_low_watermark")]
    pub low_watermark: f64,
    #[serde(default = "default_high_watermark")]
    pub high_watermark: f64,
    /// Bounded per-update threshold step; prevents oscillation.
    #[serde(default = "default_threshold_step")]
    pub threshold_step: f64,
    #[serde(default = "default_receptivity_floor")]
    pub receptivity_floor: f64,
    #[serde(default = "default_receptivity_ceiling")]
    pub receptivity_ceiling: f64,
    /// Number of recent records in the rolling effectiveness window (K).
    #[serde(default = "default_effectiveness_window")]
    pub effectiveness_window: usize,
    /// Bounded processed-id cache guarding duplicate feedback.
    #[serde(default = "default_processed_cache_size")]
    pub processed_cache_size: usize,
    /// Minutes added to the user's effective min-interval after a
    /// `too_frequent` dismissal; capped at twice the configured interval.
    #[serde(default = "default_interval_widen_step_minutes")]
    pub interval_widen_step_minutes: u32,
}

fn default_adaptivity_rate() -> f64 {
    0.2
}
fn default_low_watermark() -> f64 {
    0.3
}
fn default_high_watermark() -> f64 {
    0.7
}
fn default_threshold_step() -> f64 {
    0.05
}
fn default_receptivity_floor() -> f64 {
    0.3
}
fn default_receptivity_ceiling() -> f64 {
    0.9
}
fn default_effectiveness_window() -> usize {
    10
}
fn default_processed_cache_size() -> usize {
    256
}
fn default_interval_widen_step_minutes() -> u32 {
    10
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            adaptivity_rate: default_adaptivity_rate(),
            low_watermark: default_low_watermark(),
            high_watermark: default_high_watermark(),
            threshold_step: default_threshold_step(),
            receptivity_floor: default_receptivity_floor(),
            receptivity_ceiling: default_receptivity_ceiling(),
            effectiveness_window: default_effectiveness_window(),
            processed_cache_size: default_processed_cache_size(),
            interval_widen_step_minutes: default_interval_widen_step_minutes(),
        }
    }
}

impl AdaptationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.adaptivity_rate > 0.0 && self.adaptivity_rate <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "adaptivity_rate must be in (0,1], got {}",
                self.adaptivity_rate
            )));
        }
        check_unit("low_watermark", self.low_watermark)?;
        check_unit("high_watermark", self.high_watermark)?;
        if self.low_watermark >= self.high_watermark {
            return Err(ConfigError::Validation(
                "low_watermark must be below high_watermark".into(),
            ));
        }
        if !(0.0..=0.05).contains(&self.threshold_step) {
            return Err(ConfigError::Validation(format!(
                "threshold_step must be in [0,0.05], got {}",
                self.threshold_step
            )));
        }
        check_unit("receptivity_floor", self.receptivity_floor)?;
        check_unit("receptivity_ceiling", self.receptivity_ceiling)?;
        if self.receptivity_floor >= self.receptivity_ceiling {
            return Err(ConfigError::Validation(
                "receptivity_floor must be below receptivity_ceiling".into(),
            ));
        }
        if self.effectiveness_window == 0 {
            return Err(ConfigError::Validation(
                "effectiveness_window must be at least 1".into(),
            ));
        }
        if self.processed_cache_size == 0 {
            return Err(ConfigError::Validation(
                "processed_cache_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        CoachConfig::default().validate().expect("defaults valid");
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config = CoachConfig::from_toml_str("").unwrap();
        assert_eq!(config.gate.max_daily, 8);
        assert_eq!(config.gate.min_interval_minutes, 30);
        assert!((config.adaptation.adaptivity_rate - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let raw = r"
            [gate]
            max_daily = 4
            receptivity_min_threshold = 0.55
        ";
        let config = CoachConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.gate.max_daily, 4);
        assert!((config.gate.receptivity_min_threshold - 0.55).abs() < f64::EPSILON);
        assert_eq!(config.gate.min_interval_minutes, 30);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let raw = r"
            [gate]
            cognitive_load_high_threshold = 1.4
        ";
        assert!(CoachConfig::from_toml_str(raw).is_err());
    }

    #[test]
    fn zero_load_weights_are_rejected() {
        let raw = r"
            [estimator]
            load_weight_complexity = 0.0
            load_weight_pressure = 0.0
            load_weight_interruptions = 0.0
            load_weight_fatigue = 0.0
        ";
        assert!(CoachConfig::from_toml_str(raw).is_err());
    }

    #[test]
    fn inverted_watermarks_are_rejected() {
        let raw = r"
            [adaptation]
            low_watermark = 0.8
            high_watermark = 0.4
        ";
        assert!(CoachConfig::from_toml_str(raw).is_err());
    }

    #[test]
    fn oversized_threshold_step_is_rejected() {
        let raw = r"
            [adaptation]
            threshold_step = 0.2
        ";
        assert!(CoachConfig::from_toml_str(raw).is_err());
    }
}
