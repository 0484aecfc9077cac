//! The decision engine: estimate, gate, select, compose, schedule, emit,
//! and adapt on feedback.
//!
//! `CoachEngine` is the crate's facade. Each cycle runs under that user's
//! lock, so concurrent cycles for different users proceed in parallel while
//! two cycles for the same user serialize. The persistence sink is the
//! authority on delivery history; the engine re-queries it every cycle
//! instead of trusting in-memory counters.

pub mod adapter;
pub mod composer;
pub mod estimator;
pub mod gate;
pub mod selector;
pub mod state;
pub mod timing;
pub mod types;

use crate::catalog::TemplateCatalog;
use crate::config::CoachConfig;
use crate::error::{CatalogError, Result};
use crate::profile::PersonalityStore;
use crate::store::PersistenceSink;
use adapter::EffectivenessAdapter;
use chrono::{DateTime, Utc};
use composer::ContentComposer;
use estimator::StateEstimator;
use gate::InterventionGate;
use selector::StrategySelector;
use serde::Serialize;
use state::{UserEngineState, UserSnapshot};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use timing::TimingOptimizer;
use types::{
    AdaptiveWeights, Context, CycleReport, CycleStage, EffectivenessRecord, Intervention,
    SuppressReason, Telemetry, UserState,
};

/// Cumulative counters across all users since construction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineMetrics {
    pub cycles: u64,
    pub emitted: u64,
    pub suppressed: BTreeMap<SuppressReason, u64>,
    pub feedback_applied: u64,
    pub duplicate_feedback: u64,
}

pub struct CoachEngine {
    config: CoachConfig,
    estimator: StateEstimator,
    gate: InterventionGate,
    selector: StrategySelector,
    composer: ContentComposer,
    timing: TimingOptimizer,
    adapter: EffectivenessAdapter,
    catalog: Arc<dyn TemplateCatalog>,
    profiles: Arc<dyn PersonalityStore>,
    sink: Arc<dyn PersistenceSink>,
    users: Mutex<HashMap<String, Arc<Mutex<UserEngineState>>>>,
    metrics: Mutex<EngineMetrics>,
}

impl CoachEngine {
    pub fn new(
        config: CoachConfig,
        catalog: Arc<dyn TemplateCatalog>,
        profiles: Arc<dyn PersonalityStore>,
        sink: Arc<dyn PersistenceSink>,
    ) -> Result<Self> {
        config.validate()?;
        if catalog.candidates().is_empty() {
            return Err(CatalogError::Empty.into());
        }
        Ok(Self {
            estimator: StateEstimator::new(config.estimator.clone()),
            gate: InterventionGate::new(config.gate.clone()),
            selector: StrategySelector::new(config.selector.clone()),
            composer: ContentComposer::new(Arc::clone(&catalog)),
            timing: TimingOptimizer::new(config.timing.clone()),
            adapter: EffectivenessAdapter::new(
                config.adaptation.clone(),
                config.gate.min_interval_minutes,
            ),
            config,
            catalog,
            profiles,
            sink,
            users: Mutex::new(HashMap::new()),
            metrics: Mutex::new(EngineMetrics::default()),
        })
    }

    /// One decision cycle. Returns the emitted intervention, or `None` when
    /// the cycle was suppressed; `run_cycle` exposes the reason.
    pub fn decide(
        &self,
        user_id: &str,
        telemetry: &Telemetry,
        context: &Context,
    ) -> Option<Intervention> {
        self.run_cycle(user_id, telemetry, context).intervention
    }

    /// One decision cycle with the full report: terminal stage, estimated
    /// state, and intervention or suppression reason.
    pub fn run_cycle(&self, user_id: &str, telemetry: &Telemetry, context: &Context) -> CycleReport {
        self.with_metrics(|m| m.cycles += 1);
        let handle = self.user_handle(user_id);
        let mut guard = lock(&handle);
        let user = &mut *guard;

        let estimated = self.estimator.estimate(telemetry, context);
        tracing::debug!(user = user_id, stage = %CycleStage::StateEstimated, "cycle advanced");

        // Sink failures suppress conservatively: without delivery history the
        // interval and cap checks cannot be proven.
        let last = match self.sink.last_intervention_time(user_id) {
            Ok(last) => last,
            Err(e) => {
                tracing::error!(user = user_id, error = %e, "sink query failed");
                return self.suppress(user_id, estimated, SuppressReason::HistoryUnavailable);
            }
        };
        let daily_count = match self.sink.daily_count(user_id, context.now) {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(user = user_id, error = %e, "sink query failed");
                return self.suppress(user_id, estimated, SuppressReason::HistoryUnavailable);
            }
        };

        if let Err(reason) = self.gate.admit(
            &estimated,
            context,
            last,
            daily_count,
            &user.weights,
            user.effective_min_interval_min,
        ) {
            return self.suppress(user_id, estimated, reason);
        }
        tracing::debug!(user = user_id, stage = %CycleStage::Admitted, "cycle advanced");

        let profile = self.profiles.profile(user_id).unwrap_or_default();
        let usage = user.usage_counts();
        let Some(candidate) = self.selector.select(
            self.catalog.candidates(),
            &estimated,
            context,
            &profile,
            &user.weights,
            &usage,
        ) else {
            return self.suppress(user_id, estimated, SuppressReason::NoEligibleCandidate);
        };
        tracing::debug!(user = user_id, stage = %CycleStage::StrategySelected, "cycle advanced");

        // The schedule is computed first because the deterministic id is
        // derived from it, but the cycle reaches ContentComposed before
        // TimingScheduled.
        let timing = match self.timing.schedule(context) {
            Ok(timing) => timing,
            Err(reason) => return self.suppress(user_id, estimated, reason),
        };

        let intervention = match self.composer.compose(
            user_id,
            candidate,
            &profile,
            context,
            timing,
            &user.weights,
            describe_trigger(&estimated),
        ) {
            Ok(intervention) => intervention,
            Err(e) => {
                tracing::error!(user = user_id, candidate = %candidate.id, error = %e, "compose failed");
                return self.suppress(user_id, estimated, SuppressReason::NoEligibleCandidate);
            }
        };
        tracing::debug!(user = user_id, stage = %CycleStage::ContentComposed, "cycle advanced");
        tracing::debug!(user = user_id, stage = %CycleStage::TimingScheduled, "cycle advanced");

        // Persist before reporting emission; an unrecorded emission would
        // escape the interval and cap checks of later cycles.
        if let Err(e) = self.sink.append_emission(&intervention) {
            tracing::error!(user = user_id, error = %e, "emission persist failed");
            return self.suppress(user_id, estimated, SuppressReason::HistoryUnavailable);
        }
        user.record_emission(&intervention);
        self.with_metrics(|m| m.emitted += 1);
        tracing::info!(
            user = user_id,
            id = %intervention.id,
            kind = %intervention.kind,
            scheduled_at = %intervention.timing.scheduled_at,
            "intervention emitted"
        );
        CycleReport::emitted(estimated, intervention)
    }

    /// Applies one feedback record. Returns true when the record changed the
    /// user's adaptive state; duplicates and unknown intervention ids are
    /// no-ops.
    pub fn record_feedback(&self, record: &EffectivenessRecord) -> bool {
        let handle = self.user_handle(&record.user_id);
        let mut guard = lock(&handle);
        let user = &mut *guard;

        let Some(kind) = user.kind_of(record.intervention_id) else {
            tracing::warn!(
                user = %record.user_id,
                id = %record.intervention_id,
                "feedback for unknown intervention ignored"
            );
            return false;
        };
        if !user.mark_processed(
            record.intervention_id,
            self.config.adaptation.processed_cache_size,
        ) {
            self.with_metrics(|m| m.duplicate_feedback += 1);
            tracing::debug!(
                user = %record.user_id,
                id = %record.intervention_id,
                "duplicate feedback ignored"
            );
            return false;
        }
        tracing::debug!(user = %record.user_id, stage = %CycleStage::FeedbackReceived, "cycle advanced");

        if let Err(e) = self.sink.append_feedback(record) {
            tracing::warn!(user = %record.user_id, error = %e, "feedback persist failed");
        }
        user.resolve_pending(record.intervention_id);

        let effectiveness = self.adapter.apply(
            &mut user.weights,
            &mut user.recent_effectiveness,
            &mut user.effective_min_interval_min,
            kind,
            record,
        );
        self.with_metrics(|m| m.feedback_applied += 1);
        tracing::debug!(
            user = %record.user_id,
            stage = %CycleStage::Adapted,
            effectiveness,
            "cycle advanced"
        );
        true
    }

    /// Current adaptive weights for a user, if the engine has seen them.
    pub fn adaptive_state(&self, user_id: &str) -> Option<AdaptiveWeights> {
        let users = lock(&self.users);
        users.get(user_id).map(|handle| lock(handle).weights.clone())
    }

    pub fn metrics(&self) -> EngineMetrics {
        lock(&self.metrics).clone()
    }

    /// Drops pending emissions whose delivery window closed without
    /// feedback, across all users. Returns how many were dropped.
    pub fn expire_stale(&self, now: DateTime<Utc>) -> usize {
        let users = lock(&self.users);
        let mut expired = 0;
        for handle in users.values() {
            expired += lock(handle).expire_stale(now);
        }
        if expired > 0 {
            tracing::debug!(expired, "stale pending emissions dropped");
        }
        expired
    }

    /// Serializable learning state for one user.
    pub fn snapshot_user(&self, user_id: &str) -> Option<UserSnapshot> {
        let users = lock(&self.users);
        users
            .get(user_id)
            .map(|handle| lock(handle).snapshot(user_id))
    }

    /// Replaces a user's learning state from a snapshot.
    pub fn restore_user(&self, snapshot: &UserSnapshot) {
        let mut users = lock(&self.users);
        users.insert(
            snapshot.user_id.clone(),
            Arc::new(Mutex::new(UserEngineState::restore(snapshot))),
        );
    }

    fn user_handle(&self, user_id: &str) -> Arc<Mutex<UserEngineState>> {
        let mut users = lock(&self.users);
        Arc::clone(users.entry(user_id.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(UserEngineState::new(
                self.config.gate.receptivity_min_threshold,
                self.config.gate.min_interval_minutes,
            )))
        }))
    }

    fn suppress(&self, user_id: &str, state: UserState, reason: SuppressReason) -> CycleReport {
        self.with_metrics(|m| *m.suppressed.entry(reason).or_insert(0) += 1);
        tracing::debug!(user = user_id, reason = %reason, "cycle suppressed");
        CycleReport::suppressed(state, reason)
    }

    fn with_metrics(&self, update: impl FnOnce(&mut EngineMetrics)) {
        update(&mut lock(&self.metrics));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn describe_trigger(state: &UserState) -> String {
    format!(
        "{} state, load {:.2}, energy {:.2}, stress {:.2}, receptivity {:.2}",
        state.focus_state,
        state.cognitive_load,
        state.energy_level,
        state.stress_level,
        state.receptivity
    )
}
