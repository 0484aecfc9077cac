//! Delivery scheduling for an admitted intervention.
//!
//! Immediate delivery when the current interruption cost is acceptable,
//! otherwise the nearest forecast window that is cheap enough, within the
//! defer horizon, and clear of upcoming commitments. No viable window means
//! the cycle is suppressed rather than delivered at a bad moment.

use crate::config::TimingConfig;
use crate::engine::types::{Context, InterventionTiming, SuppressReason};
use chrono::Duration;

pub struct TimingOptimizer {
    config: TimingConfig,
}

impl TimingOptimizer {
    pub fn new(config: TimingConfig) -> Self {
        Self { config }
    }

    pub fn schedule(&self, context: &Context) -> Result<InterventionTiming, SuppressReason> {
        if context.interruption_cost <= self.config.interruption_cost_threshold {
            return Ok(self.timing_at_offset(context, 0));
        }

        let mut windows: Vec<_> = context
            .cost_forecast
            .iter()
            .filter(|w| w.offset_min > 0 && w.offset_min <= self.config.max_defer_minutes)
            .filter(|w| w.interruption_cost < self.config.interruption_cost_threshold)
            .filter(|w| !overlaps_commitment(context, w.offset_min))
            .collect();
        windows.sort_by_key(|w| w.offset_min);

        match windows.first() {
            Some(window) => Ok(self.timing_at_offset(context, window.offset_min)),
            None => Err(SuppressReason::NoViableWindow),
        }
    }

    fn timing_at_offset(&self, context: &Context, offset_min: u32) -> InterventionTiming {
        let scheduled_at = context.now + Duration::minutes(i64::from(offset_min));
        InterventionTiming {
            scheduled_at,
            valid_until: scheduled_at + Duration::minutes(i64::from(self.config.valid_for_minutes)),
        }
    }
}

fn overlaps_commitment(context: &Context, offset_min: u32) -> bool {
    context.upcoming_commitments.iter().any(|c| {
        offset_min >= c.start_offset_min && offset_min < c.start_offset_min + c.duration_min
    })
}
