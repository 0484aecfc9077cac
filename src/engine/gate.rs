//! Admission control: decides whether any intervention may be emitted this
//! cycle. Conjunctive rule; every check must hold. Returns a typed reason
//! code on suppression, never an error.

use crate::config::GateConfig;
use crate::engine::types::{AdaptiveWeights, Context, FocusState, SuppressReason, UserState};
use chrono::{DateTime, Duration, Utc};

pub struct InterventionGate {
    config: GateConfig,
}

impl InterventionGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    /// Checks run in fixed order; the first failing condition names the
    /// suppression, which keeps reason codes stable for observability.
    pub fn admit(
        &self,
        state: &UserState,
        context: &Context,
        last_intervention: Option<DateTime<Utc>>,
        daily_count: u32,
        weights: &AdaptiveWeights,
        effective_min_interval_min: u32,
    ) -> Result<(), SuppressReason> {
        if state.cognitive_load >= self.config.cognitive_load_high_threshold {
            return Err(SuppressReason::CognitiveLoadHigh);
        }
        if state.focus_state == FocusState::Flow {
            return Err(SuppressReason::FlowProtected);
        }
        if state.stress_level >= self.config.stress_critical_threshold {
            return Err(SuppressReason::StressCritical);
        }
        if state.receptivity <= weights.receptivity_threshold {
            return Err(SuppressReason::ReceptivityLow);
        }
        if let Some(last) = last_intervention {
            let min_interval = Duration::minutes(i64::from(effective_min_interval_min));
            if context.now.signed_duration_since(last) < min_interval {
                return Err(SuppressReason::MinIntervalNotElapsed);
            }
        }
        if daily_count >= self.config.max_daily {
            return Err(SuppressReason::DailyCapReached);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn receptive_state() -> UserState {
        UserState {
            cognitive_load: 0.3,
            energy_level: 0.8,
            stress_level: 0.2,
            receptivity: 0.8,
            focus_state: FocusState::Neutral,
            degraded: false,
            at: Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap(),
        }
    }

    fn ctx() -> Context {
        Context::at(Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap())
    }

    fn gate() -> InterventionGate {
        InterventionGate::new(GateConfig::default())
    }

    fn weights() -> AdaptiveWeights {
        AdaptiveWeights::new(GateConfig::default().receptivity_min_threshold)
    }

    #[test]
    fn receptive_state_is_admitted() {
        assert!(
            gate()
                .admit(&receptive_state(), &ctx(), None, 0, &weights(), 30)
                .is_ok()
        );
    }

    #[test]
    fn high_cognitive_load_is_suppressed() {
        let state = UserState {
            cognitive_load: 0.85,
            ..receptive_state()
        };
        assert_eq!(
            gate().admit(&state, &ctx(), None, 0, &weights(), 30),
            Err(SuppressReason::CognitiveLoadHigh)
        );
    }

    #[test]
    fn flow_state_is_protected() {
        let state = UserState {
            focus_state: FocusState::Flow,
            ..receptive_state()
        };
        assert_eq!(
            gate().admit(&state, &ctx(), None, 0, &weights(), 30),
            Err(SuppressReason::FlowProtected)
        );
    }

    #[test]
    fn critical_stress_is_suppressed() {
        let state = UserState {
            stress_level: 0.95,
            ..receptive_state()
        };
        assert_eq!(
            gate().admit(&state, &ctx(), None, 0, &weights(), 30),
            Err(SuppressReason::StressCritical)
        );
    }

    #[test]
    fn low_receptivity_is_suppressed() {
        let state = UserState {
            receptivity: 0.4,
            ..receptive_state()
        };
        assert_eq!(
            gate().admit(&state, &ctx(), None, 0, &weights(), 30),
            Err(SuppressReason::ReceptivityLow)
        );
    }

    #[test]
    fn recent_intervention_blocks_until_interval_elapses() {
        let last = ctx().now - chrono::Duration::minutes(5);
        assert_eq!(
            gate().admit(&receptive_state(), &ctx(), Some(last), 0, &weights(), 30),
            Err(SuppressReason::MinIntervalNotElapsed)
        );
        let old = ctx().now - chrono::Duration::minutes(30);
        assert!(
            gate()
                .admit(&receptive_state(), &ctx(), Some(old), 0, &weights(), 30)
                .is_ok()
        );
    }

    #[test]
    fn widened_interval_is_honored() {
        let last = ctx().now - chrono::Duration::minutes(40);
        assert_eq!(
            gate().admit(&receptive_state(), &ctx(), Some(last), 0, &weights(), 60),
            Err(SuppressReason::MinIntervalNotElapsed)
        );
    }

    #[test]
    fn daily_cap_blocks_at_limit() {
        assert_eq!(
            gate().admit(&receptive_state(), &ctx(), None, 8, &weights(), 30),
            Err(SuppressReason::DailyCapReached)
        );
        assert!(
            gate()
                .admit(&receptive_state(), &ctx(), None, 7, &weights(), 30)
                .is_ok()
        );
    }

    #[test]
    fn adapted_threshold_tightens_admission() {
        let mut adapted = weights();
        adapted.receptivity_threshold = 0.85;
        assert_eq!(
            gate().admit(&receptive_state(), &ctx(), None, 0, &adapted, 30),
            Err(SuppressReason::ReceptivityLow)
        );
    }
}
