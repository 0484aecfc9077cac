//! Schema-checked personality profile types and the store collaborator.
//!
//! The engine treats profiles as opaque read-only input: selection uses the
//! motivation drivers, composition uses the communication preference. What a
//! profile contains is decided by the caller, not by the engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LearningStyle {
    Visual,
    #[default]
    Verbal,
    Kinesthetic,
    Reflective,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CommunicationPref {
    #[default]
    Direct,
    Consultative,
    Encouraging,
    Analytical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkPattern {
    DeepFocus,
    Collaborative,
    Fragmented,
    #[default]
    Steady,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MotivationDriver {
    Mastery,
    Autonomy,
    Progress,
    Recognition,
    Wellbeing,
    Efficiency,
}

// PersonalityProfile — read-only collaborator data, loaded externally
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersonalityProfile {
    #[serde(default)]
    pub learning_style: LearningStyle,
    #[serde(default)]
    pub communication_pref: CommunicationPref,
    #[serde(default)]
    pub work_pattern: WorkPattern,
    #[serde(default)]
    pub motivation_drivers: Vec<MotivationDriver>,
}

/// Lookup collaborator for per-user profiles.
pub trait PersonalityStore: Send + Sync {
    fn profile(&self, user_id: &str) -> Option<PersonalityProfile>;
}

/// In-memory profile store with a fallback profile for unknown users.
pub struct StaticProfileStore {
    profiles: HashMap<String, PersonalityProfile>,
    fallback: PersonalityProfile,
}

impl StaticProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: HashMap::new(),
            fallback: PersonalityProfile::default(),
        }
    }

    pub fn with_profile(mut self, user_id: impl Into<String>, profile: PersonalityProfile) -> Self {
        self.profiles.insert(user_id.into(), profile);
        self
    }

    pub fn with_fallback(mut self, fallback: PersonalityProfile) -> Self {
        self.fallback = fallback;
        self
    }
}

impl PersonalityStore for StaticProfileStore {
    fn profile(&self, user_id: &str) -> Option<PersonalityProfile> {
        Some(
            self.profiles
                .get(user_id)
                .cloned()
                .unwrap_or_else(|| self.fallback.clone()),
        )
    }
}
