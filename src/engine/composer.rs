//! Turns a selected candidate into a concrete, personalized intervention.
//!
//! Duration and intensity start from the candidate's base values and are
//! scaled by the user's adaptive intensity multiplier. Ids are derived
//! deterministically from user, template and schedule, so the same inputs
//! always produce the same intervention.

use crate::catalog::TemplateCatalog;
use crate::engine::types::{
    AdaptiveWeights, Context, Intervention, InterventionCandidate, InterventionTiming,
};
use crate::error::CatalogError;
use crate::profile::PersonalityProfile;
use std::sync::Arc;
use uuid::Uuid;

const SNOOZE_OPTIONS: [&str; 3] = ["15min", "1hour", "rest_of_day"];

pub struct ContentComposer {
    catalog: Arc<dyn TemplateCatalog>,
}

impl ContentComposer {
    pub fn new(catalog: Arc<dyn TemplateCatalog>) -> Self {
        Self { catalog }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn compose(
        &self,
        user_id: &str,
        candidate: &InterventionCandidate,
        profile: &PersonalityProfile,
        context: &Context,
        timing: InterventionTiming,
        weights: &AdaptiveWeights,
        trigger_reason: String,
    ) -> Result<Intervention, CatalogError> {
        let multiplier = weights.intensity_multiplier;
        // Floored so the composed duration never exceeds base x multiplier;
        // the one-minute floor is the only allowed exception.
        let duration_min =
            ((f64::from(candidate.base_duration_min) * multiplier).floor() as u32).max(1);
        let intensity = (candidate.base_intensity * multiplier).clamp(0.0, 1.0);

        let content = self
            .catalog
            .render(&candidate.template_ref, profile, context, duration_min)?;
        if content.action_steps.is_empty() {
            return Err(CatalogError::Render(format!(
                "{}: rendered without action steps",
                candidate.template_ref
            )));
        }

        let seed = format!(
            "{user_id}|{}|{}",
            candidate.template_ref,
            timing.scheduled_at.to_rfc3339()
        );
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes());

        Ok(Intervention {
            id,
            user_id: user_id.to_string(),
            kind: candidate.kind,
            content: content.body,
            action_steps: content.action_steps,
            timing,
            intensity,
            duration_min,
            follow_up: content.follow_up,
            trigger_reason,
            snooze_options: SNOOZE_OPTIONS.iter().map(|s| (*s).to_string()).collect(),
        })
    }
}
