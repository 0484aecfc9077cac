//! Scores catalog candidates against state, context, profile, and adaptive
//! weights, and picks the winner deterministically.

use crate::config::SelectorConfig;
use crate::engine::types::{
    AdaptiveWeights, Context, IntensityBand, InterventionCandidate, InterventionKind, UserState,
};
use crate::profile::{MotivationDriver, PersonalityProfile};
use std::collections::{BTreeMap, BTreeSet};

/// Recent uses of the same kind saturate the fatigue penalty at this count.
const FATIGUE_SATURATION: f64 = 5.0;

/// Pluggable sub-scorer contributing to a candidate's state-match term.
/// Implementations must be pure; the selector averages their outputs.
pub trait ScoringFn: Send + Sync {
    fn score(
        &self,
        candidate: &InterventionCandidate,
        state: &UserState,
        context: &Context,
        profile: &PersonalityProfile,
    ) -> f64;
}

/// Fraction of the candidate's trigger tags active in the current state.
pub struct TriggerTagScorer;

impl ScoringFn for TriggerTagScorer {
    fn score(
        &self,
        candidate: &InterventionCandidate,
        state: &UserState,
        context: &Context,
        _profile: &PersonalityProfile,
    ) -> f64 {
        if candidate.trigger_tags.is_empty() {
            return 0.0;
        }
        let active = active_tags(state, context);
        let matched = candidate
            .trigger_tags
            .iter()
            .filter(|tag| active.contains(tag.as_str()))
            .count();
        matched as f64 / candidate.trigger_tags.len() as f64
    }
}

/// Prefers candidates whose intensity leaves headroom under the current
/// cognitive load: a loaded user fits a gentle nudge, a fresh one a harder
/// challenge.
pub struct CognitiveFitScorer;

impl ScoringFn for CognitiveFitScorer {
    fn score(
        &self,
        candidate: &InterventionCandidate,
        state: &UserState,
        _context: &Context,
        _profile: &PersonalityProfile,
    ) -> f64 {
        let headroom = 1.0 - state.cognitive_load;
        (1.0 - (candidate.base_intensity - headroom).abs()).clamp(0.0, 1.0)
    }
}

/// Tags derivable from the estimated state and cycle context, matched
/// against candidate trigger tags.
fn active_tags(state: &UserState, context: &Context) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    tags.insert(state.focus_state.to_string());
    if state.cognitive_load > 0.6 {
        tags.insert("high_load".into());
    }
    if state.stress_level > 0.6 {
        tags.insert("high_stress".into());
    }
    if state.energy_level < 0.4 {
        tags.insert("low_energy".into());
    }
    if state.energy_level > 0.7 {
        tags.insert("energized".into());
    }
    if let Some(activity) = &context.activity {
        tags.insert(activity.clone());
    }
    if let Some(location) = &context.location {
        tags.insert(location.clone());
    }
    tags
}

/// Motivation drivers each intervention kind appeals to.
fn kind_appeal(kind: InterventionKind) -> &'static [MotivationDriver] {
    use MotivationDriver::{Autonomy, Efficiency, Mastery, Progress, Recognition, Wellbeing};
    match kind {
        InterventionKind::MicroBreak | InterventionKind::BreathingReset => &[Wellbeing],
        InterventionKind::MovementPrompt => &[Wellbeing, Autonomy],
        InterventionKind::FocusBlock => &[Progress, Efficiency],
        InterventionKind::TaskBatching | InterventionKind::WorkspaceCleanup => &[Efficiency],
        InterventionKind::DeepWorkChallenge => &[Mastery, Progress],
        InterventionKind::ReflectionPrompt => &[Mastery, Recognition],
    }
}

fn personality_affinity(kind: InterventionKind, profile: &PersonalityProfile) -> f64 {
    let appeal = kind_appeal(kind);
    if profile.motivation_drivers.is_empty() || appeal.is_empty() {
        return 0.5;
    }
    let matched = appeal
        .iter()
        .filter(|driver| profile.motivation_drivers.contains(driver))
        .count();
    matched as f64 / appeal.len() as f64
}

pub struct StrategySelector {
    config: SelectorConfig,
    scorers: Vec<Box<dyn ScoringFn>>,
}

impl StrategySelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            config,
            scorers: vec![Box::new(TriggerTagScorer), Box::new(CognitiveFitScorer)],
        }
    }

    /// Installs an additional sub-scorer alongside the built-ins.
    pub fn with_scorer(mut self, scorer: Box<dyn ScoringFn>) -> Self {
        self.scorers.push(scorer);
        self
    }

    /// Argmax over the weighted score. Ties break on the lowest recent-usage
    /// count, then the lexicographically smallest candidate id, so identical
    /// inputs always pick the same candidate.
    pub fn select<'a>(
        &self,
        candidates: &'a [InterventionCandidate],
        state: &UserState,
        context: &Context,
        profile: &PersonalityProfile,
        weights: &AdaptiveWeights,
        recent_usage: &BTreeMap<InterventionKind, u32>,
    ) -> Option<&'a InterventionCandidate> {
        let elevated = state.cognitive_load >= self.config.elevated_load_floor;
        let mut best: Option<(&InterventionCandidate, f64, u32)> = None;

        for candidate in candidates {
            if elevated && candidate.band() != IntensityBand::Low {
                continue;
            }
            let usage = recent_usage.get(&candidate.kind).copied().unwrap_or(0);
            let score = self.score(candidate, state, context, profile, weights, usage);
            let replace = match &best {
                None => true,
                Some((incumbent, best_score, best_usage)) => {
                    match score.total_cmp(best_score) {
                        std::cmp::Ordering::Greater => true,
                        std::cmp::Ordering::Less => false,
                        std::cmp::Ordering::Equal => {
                            usage < *best_usage
                                || (usage == *best_usage && candidate.id < incumbent.id)
                        }
                    }
                }
            };
            if replace {
                best = Some((candidate, score, usage));
            }
        }

        if let Some((candidate, score, _)) = &best {
            tracing::debug!(candidate = %candidate.id, score, elevated, "strategy selected");
        }
        best.map(|(candidate, _, _)| candidate)
    }

    fn score(
        &self,
        candidate: &InterventionCandidate,
        state: &UserState,
        context: &Context,
        profile: &PersonalityProfile,
        weights: &AdaptiveWeights,
        recent_usage: u32,
    ) -> f64 {
        let state_match = self
            .scorers
            .iter()
            .map(|s| s.score(candidate, state, context, profile).clamp(0.0, 1.0))
            .sum::<f64>()
            / self.scorers.len() as f64;
        let affinity = personality_affinity(candidate.kind, profile);
        let adaptive = weights.weight_for(candidate.kind);
        let fatigue = (f64::from(recent_usage) / FATIGUE_SATURATION).min(1.0);

        self.config.state_match_weight * state_match
            + self.config.affinity_weight * affinity
            + self.config.adaptive_weight * adaptive
            - self.config.fatigue_penalty_weight * fatigue
    }
}
