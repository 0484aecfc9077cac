//! Per-user cross-cycle state.
//!
//! Everything the engine remembers about a user between cycles lives here:
//! adaptive weights, the effective minimum interval, bounded usage history
//! for repetition penalties, pending emissions awaiting feedback, and the
//! processed-id cache that makes duplicate feedback a no-op. All collections
//! are capacity-bounded so long-running processes stay flat.

use crate::engine::types::{AdaptiveWeights, Intervention, InterventionKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use uuid::Uuid;

/// Recent emissions considered for the selector's repetition penalty.
const RECENT_KINDS_CAPACITY: usize = 16;

/// Emitted-id history kept for resolving feedback to a kind.
const EMITTED_KINDS_CAPACITY: usize = 128;

pub struct UserEngineState {
    pub weights: AdaptiveWeights,
    pub effective_min_interval_min: u32,
    pub recent_effectiveness: VecDeque<f64>,
    recent_kinds: VecDeque<InterventionKind>,
    emitted_kinds: VecDeque<(Uuid, InterventionKind)>,
    /// Emissions whose delivery window has not closed and which have not yet
    /// received feedback. Keyed by id, value is `valid_until`.
    pending: HashMap<Uuid, DateTime<Utc>>,
    processed_order: VecDeque<Uuid>,
    processed: HashSet<Uuid>,
}

impl UserEngineState {
    pub fn new(receptivity_threshold: f64, min_interval_min: u32) -> Self {
        Self {
            weights: AdaptiveWeights::new(receptivity_threshold),
            effective_min_interval_min: min_interval_min,
            recent_effectiveness: VecDeque::new(),
            recent_kinds: VecDeque::new(),
            emitted_kinds: VecDeque::new(),
            pending: HashMap::new(),
            processed_order: VecDeque::new(),
            processed: HashSet::new(),
        }
    }

    pub fn record_emission(&mut self, intervention: &Intervention) {
        self.recent_kinds.push_back(intervention.kind);
        while self.recent_kinds.len() > RECENT_KINDS_CAPACITY {
            self.recent_kinds.pop_front();
        }
        self.emitted_kinds
            .push_back((intervention.id, intervention.kind));
        while self.emitted_kinds.len() > EMITTED_KINDS_CAPACITY {
            self.emitted_kinds.pop_front();
        }
        self.pending
            .insert(intervention.id, intervention.timing.valid_until);
    }

    /// Kind of a previously emitted intervention, if still in history.
    pub fn kind_of(&self, id: Uuid) -> Option<InterventionKind> {
        self.emitted_kinds
            .iter()
            .rev()
            .find(|(known, _)| *known == id)
            .map(|(_, kind)| *kind)
    }

    /// Usage counts over the recent emission window.
    pub fn usage_counts(&self) -> BTreeMap<InterventionKind, u32> {
        let mut counts = BTreeMap::new();
        for kind in &self.recent_kinds {
            *counts.entry(*kind).or_insert(0) += 1;
        }
        counts
    }

    /// Marks an intervention id as processed. Returns false when the id was
    /// already processed; the cache is FIFO-bounded to `cache_size`.
    pub fn mark_processed(&mut self, id: Uuid, cache_size: usize) -> bool {
        if !self.processed.insert(id) {
            return false;
        }
        self.processed_order.push_back(id);
        while self.processed_order.len() > cache_size {
            if let Some(evicted) = self.processed_order.pop_front() {
                self.processed.remove(&evicted);
            }
        }
        true
    }

    pub fn resolve_pending(&mut self, id: Uuid) {
        self.pending.remove(&id);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drops pending emissions whose delivery window has closed without
    /// feedback. Returns how many were dropped.
    pub fn expire_stale(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, valid_until| *valid_until >= now);
        before - self.pending.len()
    }

    pub fn snapshot(&self, user_id: &str) -> UserSnapshot {
        UserSnapshot {
            user_id: user_id.to_string(),
            weights: self.weights.clone(),
            effective_min_interval_min: self.effective_min_interval_min,
            recent_effectiveness: self.recent_effectiveness.iter().copied().collect(),
            recent_kinds: self.recent_kinds.iter().copied().collect(),
        }
    }

    pub fn restore(snapshot: &UserSnapshot) -> Self {
        let mut state = Self::new(
            snapshot.weights.receptivity_threshold,
            snapshot.effective_min_interval_min,
        );
        state.weights = snapshot.weights.clone();
        state.recent_effectiveness = snapshot.recent_effectiveness.iter().copied().collect();
        state.recent_kinds = snapshot.recent_kinds.iter().copied().collect();
        state
    }
}

/// Serializable learning state for one user. Pending emissions and the
/// duplicate-feedback cache are deliberately not carried across restores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub user_id: String,
    pub weights: AdaptiveWeights,
    pub effective_min_interval_min: u32,
    pub recent_effectiveness: Vec<f64>,
    pub recent_kinds: Vec<InterventionKind>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::InterventionTiming;
    use chrono::{Duration, TimeZone};

    fn intervention(id: Uuid, kind: InterventionKind, valid_until: DateTime<Utc>) -> Intervention {
        Intervention {
            id,
            user_id: "u1".into(),
            kind,
            content: "body".into(),
            action_steps: vec!["step".into()],
            timing: InterventionTiming {
                scheduled_at: valid_until - Duration::minutes(60),
                valid_until,
            },
            intensity: 0.3,
            duration_min: 5,
            follow_up: None,
            trigger_reason: "test".into(),
            snooze_options: vec![],
        }
    }

    #[test]
    fn usage_counts_reflect_bounded_history() {
        let mut state = UserEngineState::new(0.45, 30);
        let until = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        for _ in 0..20 {
            state.record_emission(&intervention(
                Uuid::new_v4(),
                InterventionKind::MicroBreak,
                until,
            ));
        }
        let counts = state.usage_counts();
        assert_eq!(counts[&InterventionKind::MicroBreak], 16);
    }

    #[test]
    fn duplicate_mark_processed_is_rejected() {
        let mut state = UserEngineState::new(0.45, 30);
        let id = Uuid::new_v4();
        assert!(state.mark_processed(id, 256));
        assert!(!state.mark_processed(id, 256));
    }

    #[test]
    fn processed_cache_evicts_oldest() {
        let mut state = UserEngineState::new(0.45, 30);
        let first = Uuid::new_v4();
        assert!(state.mark_processed(first, 2));
        assert!(state.mark_processed(Uuid::new_v4(), 2));
        assert!(state.mark_processed(Uuid::new_v4(), 2));
        // first was evicted, so it reads as unprocessed again
        assert!(state.mark_processed(first, 2));
    }

    #[test]
    fn expire_stale_drops_only_closed_windows() {
        let mut state = UserEngineState::new(0.45, 30);
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        state.record_emission(&intervention(
            Uuid::new_v4(),
            InterventionKind::MicroBreak,
            now - Duration::minutes(5),
        ));
        state.record_emission(&intervention(
            Uuid::new_v4(),
            InterventionKind::FocusBlock,
            now + Duration::minutes(5),
        ));
        assert_eq!(state.expire_stale(now), 1);
        assert_eq!(state.pending_count(), 1);
    }

    #[test]
    fn snapshot_restore_roundtrips_learning_state() {
        let mut state = UserEngineState::new(0.45, 30);
        state
            .weights
            .kind_weights
            .insert(InterventionKind::MicroBreak, 0.8);
        state.weights.intensity_multiplier = 0.7;
        state.effective_min_interval_min = 50;
        state.recent_effectiveness.push_back(0.9);

        let snapshot = state.snapshot("u1");
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: UserSnapshot = serde_json::from_str(&json).unwrap();
        let restored = UserEngineState::restore(&back);

        assert_eq!(restored.weights, state.weights);
        assert_eq!(restored.effective_min_interval_min, 50);
        assert_eq!(restored.recent_effectiveness, state.recent_effectiveness);
    }
}
