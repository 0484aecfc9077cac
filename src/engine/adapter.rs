//! Feedback-driven adaptation of per-user weights.
//!
//! Each accepted feedback record updates three things: the EMA weight for
//! the intervention's kind, the intensity multiplier, and (via a rolling
//! effectiveness window) the adaptive receptivity threshold. Dismissal
//! reasons carry extra signal: `too_frequent` widens the user's effective
//! minimum interval, `not_relevant` applies an extra penalty to the kind.

use crate::config::AdaptationConfig;
use crate::engine::types::{
    AdaptiveWeights, DismissalReason, EffectivenessRecord, InterventionKind,
};
use std::collections::VecDeque;

const EFF_WEIGHT_ENGAGEMENT: f64 = 0.3;
const EFF_WEIGHT_COMPLETION: f64 = 0.3;
const EFF_WEIGHT_SATISFACTION: f64 = 0.2;
const EFF_WEIGHT_BEHAVIOR: f64 = 0.2;

const KIND_WEIGHT_MIN: f64 = 0.1;
const KIND_WEIGHT_MAX: f64 = 1.0;
const INTENSITY_MIN: f64 = 0.1;
const INTENSITY_MAX: f64 = 1.0;

/// Multiplicative kind-weight penalty applied on a `not_relevant` dismissal.
const NOT_RELEVANT_PENALTY: f64 = 0.8;

/// How far the effective minimum interval may widen, as a multiple of the
/// configured base interval.
const MAX_INTERVAL_WIDEN_FACTOR: u32 = 2;

pub struct EffectivenessAdapter {
    config: AdaptationConfig,
    base_min_interval_min: u32,
}

impl EffectivenessAdapter {
    pub fn new(config: AdaptationConfig, base_min_interval_min: u32) -> Self {
        Self {
            config,
            base_min_interval_min,
        }
    }

    /// Scalar effectiveness of one outcome, in [0,1]. `behavior_delta` comes
    /// in as [-1,1] and is rescaled before blending.
    pub fn effectiveness(record: &EffectivenessRecord) -> f64 {
        let engagement = record.engagement.clamp(0.0, 1.0);
        let completion = record.completion.clamp(0.0, 1.0);
        let satisfaction = record.satisfaction.clamp(0.0, 1.0);
        let behavior = (record.behavior_delta.clamp(-1.0, 1.0) + 1.0) / 2.0;
        EFF_WEIGHT_ENGAGEMENT * engagement
            + EFF_WEIGHT_COMPLETION * completion
            + EFF_WEIGHT_SATISFACTION * satisfaction
            + EFF_WEIGHT_BEHAVIOR * behavior
    }

    /// Applies one feedback record. Returns the computed effectiveness.
    pub fn apply(
        &self,
        weights: &mut AdaptiveWeights,
        recent: &mut VecDeque<f64>,
        effective_min_interval_min: &mut u32,
        kind: InterventionKind,
        record: &EffectivenessRecord,
    ) -> f64 {
        let eff = Self::effectiveness(record);
        let rate = self.config.adaptivity_rate;

        let current = weights.weight_for(kind);
        let mut updated =
            (current * (1.0 - rate) + eff * rate).clamp(KIND_WEIGHT_MIN, KIND_WEIGHT_MAX);
        if record.dismissal_reason == Some(DismissalReason::NotRelevant) {
            updated = (updated * NOT_RELEVANT_PENALTY).max(KIND_WEIGHT_MIN);
        }
        weights.kind_weights.insert(kind, updated);

        weights.intensity_multiplier = (weights.intensity_multiplier
            * (1.0 + rate * (eff - 0.5)))
            .clamp(INTENSITY_MIN, INTENSITY_MAX);

        recent.push_back(eff);
        while recent.len() > self.config.effectiveness_window {
            recent.pop_front();
        }
        if recent.len() == self.config.effectiveness_window {
            self.adapt_threshold(weights, recent);
        }

        if record.dismissal_reason == Some(DismissalReason::TooFrequent) {
            let cap = self.base_min_interval_min * MAX_INTERVAL_WIDEN_FACTOR;
            *effective_min_interval_min = effective_min_interval_min
                .saturating_add(self.config.interval_widen_step_minutes)
                .min(cap);
        }

        tracing::debug!(
            kind = %kind,
            effectiveness = eff,
            kind_weight = updated,
            intensity_multiplier = weights.intensity_multiplier,
            receptivity_threshold = weights.receptivity_threshold,
            "feedback applied"
        );
        eff
    }

    /// Moves the receptivity threshold by at most one step per update, toward
    /// conservative when the rolling mean is poor and toward permissive when
    /// it is strong.
    fn adapt_threshold(&self, weights: &mut AdaptiveWeights, recent: &VecDeque<f64>) {
        let mean = recent.iter().sum::<f64>() / recent.len() as f64;
        let step = if mean < self.config.low_watermark {
            self.config.threshold_step
        } else if mean > self.config.high_watermark {
            -self.config.threshold_step
        } else {
            return;
        };
        weights.receptivity_threshold = (weights.receptivity_threshold + step)
            .clamp(self.config.receptivity_floor, self.config.receptivity_ceiling);
    }
}
