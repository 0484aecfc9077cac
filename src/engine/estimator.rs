//! Telemetry → `UserState` estimation.
//!
//! Pure: the same telemetry and context always produce the same state.
//! Missing or non-finite signals fall back to a neutral 0.5, out-of-range
//! values are clamped into [0,1]; either marks the state
//! degraded-confidence. Estimation never fails.

use crate::config::EstimatorConfig;
use crate::engine::types::{Context, FocusState, Telemetry, UserState};

const NEUTRAL: f64 = 0.5;

/// Interruption counts saturate at this many per cycle when normalized.
const INTERRUPTION_SATURATION: f64 = 10.0;

/// Hours of continuous activity that map to full mental fatigue.
const FATIGUE_SATURATION_HOURS: f64 = 10.0;

const STRESS_WEIGHT_PRESSURE: f64 = 0.5;
const STRESS_WEIGHT_INTERRUPTIONS: f64 = 0.3;
const STRESS_WEIGHT_LOAD: f64 = 0.2;

const RECEPTIVITY_WEIGHT_ENERGY: f64 = 0.3;
const RECEPTIVITY_WEIGHT_LOAD: f64 = 0.3;
const RECEPTIVITY_WEIGHT_STRESS: f64 = 0.25;
const RECEPTIVITY_WEIGHT_HOUR: f64 = 0.15;

pub struct StateEstimator {
    config: EstimatorConfig,
}

impl StateEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn estimate(&self, telemetry: &Telemetry, context: &Context) -> UserState {
        let degraded = telemetry.task_complexity.is_none()
            || telemetry.time_pressure.is_none()
            || telemetry.interruption_count.is_none()
            || telemetry.focus_duration_min.is_none()
            || telemetry.engagement.is_none()
            || telemetry.distraction_level.is_none()
            || telemetry.base_energy.is_none()
            || has_malformed(telemetry);

        let complexity = unit_or_neutral(telemetry.task_complexity);
        let pressure = unit_or_neutral(telemetry.time_pressure);
        let engagement = unit_or_neutral(telemetry.engagement);
        let distraction = unit_or_neutral(telemetry.distraction_level);

        let interruption_frequency = telemetry
            .interruption_count
            .map_or(NEUTRAL, |n| (f64::from(n) / INTERRUPTION_SATURATION).min(1.0));

        let fatigue = telemetry
            .time_active_hours
            .filter(|h| h.is_finite())
            .map_or(NEUTRAL, |h| (h / FATIGUE_SATURATION_HOURS).clamp(0.0, 1.0));

        let cognitive_load = ((self.config.load_weight_complexity * complexity
            + self.config.load_weight_pressure * pressure
            + self.config.load_weight_interruptions * interruption_frequency
            + self.config.load_weight_fatigue * fatigue)
            / self.config.load_weight_sum())
        .clamp(0.0, 1.0);

        let base_energy = unit_or_neutral(telemetry.base_energy);
        let decay = telemetry
            .time_active_hours
            .filter(|h| h.is_finite() && *h >= 0.0)
            .unwrap_or(0.0)
            * self.config.energy_decay_per_hour;
        let recovery = f64::from(telemetry.recent_break_min.unwrap_or(0))
            * self.config.energy_recovery_per_break_min;
        let energy_level = (base_energy - decay + recovery).clamp(0.0, 1.0);

        let stress_level = (STRESS_WEIGHT_PRESSURE * pressure
            + STRESS_WEIGHT_INTERRUPTIONS * interruption_frequency
            + STRESS_WEIGHT_LOAD * cognitive_load)
            .clamp(0.0, 1.0);

        let focus_state = self.classify_focus(
            telemetry.focus_duration_min,
            engagement,
            distraction,
            interruption_frequency,
            energy_level,
        );

        // Monotone: increasing in energy, decreasing in load and stress.
        let receptivity = (RECEPTIVITY_WEIGHT_ENERGY * energy_level
            + RECEPTIVITY_WEIGHT_LOAD * (1.0 - cognitive_load)
            + RECEPTIVITY_WEIGHT_STRESS * (1.0 - stress_level)
            + RECEPTIVITY_WEIGHT_HOUR * hour_suitability(context.hour_of_day))
        .clamp(0.0, 1.0);

        let state = UserState {
            cognitive_load,
            energy_level,
            stress_level,
            receptivity,
            focus_state,
            degraded,
            at: context.now,
        };
        tracing::debug!(
            load = state.cognitive_load,
            energy = state.energy_level,
            stress = state.stress_level,
            receptivity = state.receptivity,
            focus = %state.focus_state,
            degraded = state.degraded,
            "state estimated"
        );
        state
    }

    fn classify_focus(
        &self,
        focus_duration_min: Option<u32>,
        engagement: f64,
        distraction: f64,
        interruption_frequency: f64,
        energy_level: f64,
    ) -> FocusState {
        let focus_min = focus_duration_min.unwrap_or(0);
        if focus_min > self.config.flow_focus_min
            && engagement > self.config.flow_engagement_min
            && distraction < self.config.flow_distraction_max
        {
            return FocusState::Flow;
        }
        if energy_level < self.config.low_energy_threshold {
            return FocusState::Fatigued;
        }
        if interruption_frequency > 0.4 || distraction > 0.6 {
            return FocusState::Distracted;
        }
        if focus_min >= 25 && engagement >= 0.6 {
            return FocusState::Focused;
        }
        FocusState::Neutral
    }
}

fn unit_or_neutral(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => NEUTRAL,
    }
}

fn has_malformed(telemetry: &Telemetry) -> bool {
    let bad_unit = [
        telemetry.task_complexity,
        telemetry.time_pressure,
        telemetry.engagement,
        telemetry.distraction_level,
        telemetry.base_energy,
    ]
    .iter()
    .any(|v| v.is_some_and(|v| !v.is_finite() || !(0.0..=1.0).contains(&v)));
    let bad_hours = telemetry
        .time_active_hours
        .is_some_and(|h| !h.is_finite() || h < 0.0);
    bad_unit || bad_hours
}

/// Time-of-day suitability for an interruption, from observed dismissal
/// patterns: peak mid-morning and mid-afternoon, poor around lunch and
/// outside working hours.
fn hour_suitability(hour: u8) -> f64 {
    match hour {
        9..=11 | 14..=16 => 1.0,
        12 | 13 => 0.3,
        _ => 0.2,
    }
}
