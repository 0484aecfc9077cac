//! Intervention catalog and template rendering.
//!
//! A catalog pairs the candidate list (what the selector scores) with the
//! templates that turn a chosen candidate into user-facing text. Validation
//! happens at construction: every candidate must be well-formed and every
//! `template_ref` must resolve to a body and at least one action step, so
//! rendering inside a cycle cannot hit a missing template.

use crate::engine::types::{Context, InterventionCandidate, InterventionKind};
use crate::error::CatalogError;
use crate::profile::PersonalityProfile;
use std::collections::BTreeSet;
use tera::Tera;

/// Personalized text produced for one intervention.
#[derive(Debug, Clone)]
pub struct RenderedContent {
    pub body: String,
    pub action_steps: Vec<String>,
    pub follow_up: Option<String>,
}

/// Source of candidates and their rendered content. Implementations must be
/// usable from concurrent per-user cycles.
pub trait TemplateCatalog: Send + Sync {
    fn candidates(&self) -> &[InterventionCandidate];

    fn render(
        &self,
        template_ref: &str,
        profile: &PersonalityProfile,
        context: &Context,
        duration_min: u32,
    ) -> Result<RenderedContent, CatalogError>;
}

/// Tera-backed catalog. Templates are registered as `<ref>.body`,
/// `<ref>.step.<n>` (numbered from 1) and optionally `<ref>.follow_up`;
/// each template sees `tone`, `duration_min`, `activity` and `location`.
#[derive(Debug)]
pub struct TeraCatalog {
    candidates: Vec<InterventionCandidate>,
    tera: Tera,
    template_names: BTreeSet<String>,
}

impl TeraCatalog {
    pub fn new(candidates: Vec<InterventionCandidate>, tera: Tera) -> Result<Self, CatalogError> {
        if candidates.is_empty() {
            return Err(CatalogError::Empty);
        }
        let template_names: BTreeSet<String> =
            tera.get_template_names().map(String::from).collect();
        let mut seen = BTreeSet::new();
        for candidate in &candidates {
            if !seen.insert(candidate.id.clone()) {
                return Err(CatalogError::InvalidCandidate {
                    id: candidate.id.clone(),
                    reason: "duplicate id".into(),
                });
            }
            if !candidate.base_intensity.is_finite()
                || !(0.0..=1.0).contains(&candidate.base_intensity)
            {
                return Err(CatalogError::InvalidCandidate {
                    id: candidate.id.clone(),
                    reason: format!("base_intensity out of range: {}", candidate.base_intensity),
                });
            }
            if candidate.base_duration_min == 0 {
                return Err(CatalogError::InvalidCandidate {
                    id: candidate.id.clone(),
                    reason: "base_duration_min must be at least 1".into(),
                });
            }
            if candidate.trigger_tags.is_empty() {
                return Err(CatalogError::InvalidCandidate {
                    id: candidate.id.clone(),
                    reason: "at least one trigger tag required".into(),
                });
            }
            let body = format!("{}.body", candidate.template_ref);
            if !template_names.contains(&body) {
                return Err(CatalogError::TemplateNotFound(body));
            }
            let first_step = format!("{}.step.1", candidate.template_ref);
            if !template_names.contains(&first_step) {
                return Err(CatalogError::TemplateNotFound(first_step));
            }
        }
        Ok(Self {
            candidates,
            tera,
            template_names,
        })
    }

    /// The built-in catalog: one candidate per intervention kind, with
    /// templates tuned per communication preference.
    pub fn builtin() -> Result<Self, CatalogError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(builtin_templates())
            .map_err(|e| CatalogError::Render(e.to_string()))?;
        Self::new(builtin_candidates(), tera)
    }

    fn render_one(
        &self,
        name: &str,
        vars: &tera::Context,
    ) -> Result<String, CatalogError> {
        self.tera
            .render(name, vars)
            .map_err(|e| CatalogError::Render(format!("{name}: {e}")))
    }
}

impl TemplateCatalog for TeraCatalog {
    fn candidates(&self) -> &[InterventionCandidate] {
        &self.candidates
    }

    fn render(
        &self,
        template_ref: &str,
        profile: &PersonalityProfile,
        context: &Context,
        duration_min: u32,
    ) -> Result<RenderedContent, CatalogError> {
        let body_name = format!("{template_ref}.body");
        if !self.template_names.contains(&body_name) {
            return Err(CatalogError::TemplateNotFound(body_name));
        }

        let mut vars = tera::Context::new();
        vars.insert("tone", &profile.communication_pref.to_string());
        vars.insert("duration_min", &duration_min);
        vars.insert("activity", &context.activity);
        vars.insert("location", &context.location);

        let body = self.render_one(&body_name, &vars)?;

        let mut action_steps = Vec::new();
        for n in 1.. {
            let step_name = format!("{template_ref}.step.{n}");
            if !self.template_names.contains(&step_name) {
                break;
            }
            action_steps.push(self.render_one(&step_name, &vars)?);
        }

        let follow_up_name = format!("{template_ref}.follow_up");
        let follow_up = if self.template_names.contains(&follow_up_name) {
            Some(self.render_one(&follow_up_name, &vars)?)
        } else {
            None
        };

        Ok(RenderedContent {
            body,
            action_steps,
            follow_up,
        })
    }
}

fn builtin_candidates() -> Vec<InterventionCandidate> {
    fn candidate(
        id: &str,
        kind: InterventionKind,
        duration: u32,
        intensity: f64,
        tags: &[&str],
    ) -> InterventionCandidate {
        InterventionCandidate {
            id: id.into(),
            kind,
            template_ref: id.into(),
            base_duration_min: duration,
            base_intensity: intensity,
            trigger_tags: tags.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    vec![
        candidate(
            "micro_break",
            InterventionKind::MicroBreak,
            5,
            0.25,
            &["high_load", "distracted", "neutral"],
        ),
        candidate(
            "breathing_reset",
            InterventionKind::BreathingReset,
            3,
            0.3,
            &["high_stress", "high_load"],
        ),
        candidate(
            "movement_prompt",
            InterventionKind::MovementPrompt,
            5,
            0.3,
            &["low_energy", "fatigued", "neutral"],
        ),
        candidate(
            "focus_block",
            InterventionKind::FocusBlock,
            25,
            0.55,
            &["distracted", "neutral"],
        ),
        candidate(
            "task_batching",
            InterventionKind::TaskBatching,
            15,
            0.45,
            &["distracted", "high_load"],
        ),
        candidate(
            "workspace_cleanup",
            InterventionKind::WorkspaceCleanup,
            10,
            0.4,
            &["distracted", "neutral"],
        ),
        candidate(
            "deep_work_challenge",
            InterventionKind::DeepWorkChallenge,
            90,
            0.85,
            &["focused", "energized"],
        ),
        candidate(
            "reflection_prompt",
            InterventionKind::ReflectionPrompt,
            10,
            0.3,
            &["neutral", "fatigued"],
        ),
    ]
}

#[rustfmt::skip]
fn builtin_templates() -> Vec<(&'static str, &'static str)> {
    vec![
        ("micro_break.body",
         "{% if tone == \"encouraging\" %}You have been putting in solid effort. {% endif %}Step away for {{ duration_min }} minutes and let your attention reset.{% if tone == \"analytical\" %} Brief detachment from a task restores working-memory capacity within minutes.{% endif %}"),
        ("micro_break.step.1", "Stand up and look away from the screen"),
        ("micro_break.step.2", "Get a glass of water"),
        ("micro_break.step.3", "Take three slow breaths before sitting back down"),
        ("micro_break.follow_up", "Did the break help you come back sharper?"),

        ("breathing_reset.body",
         "{% if tone == \"consultative\" %}Would now be a reasonable moment to pause? {% endif %}Take {{ duration_min }} minutes for slow, deliberate breathing to bring your stress level down."),
        ("breathing_reset.step.1", "Sit back and drop your shoulders"),
        ("breathing_reset.step.2", "Inhale for four counts, hold for four, exhale for six"),
        ("breathing_reset.step.3", "Repeat until the timer runs out"),

        ("movement_prompt.body",
         "Your energy looks low. {% if tone == \"direct\" %}Move for {{ duration_min }} minutes.{% else %}A short {{ duration_min }}-minute walk or stretch will bring it back faster than pushing through.{% endif %}"),
        ("movement_prompt.step.1", "Leave your desk{% if location %} at {{ location }}{% endif %}"),
        ("movement_prompt.step.2", "Walk or stretch until your timer ends"),
        ("movement_prompt.follow_up", "Notice whether your energy shifted afterwards."),

        ("focus_block.body",
         "{% if tone == \"analytical\" %}Your interruption pattern suggests fragmented attention. {% endif %}Block out {{ duration_min }} minutes for a single task{% if activity %} and park everything except {{ activity }}{% endif %}."),
        ("focus_block.step.1", "Pick the one task that matters most right now"),
        ("focus_block.step.2", "Silence notifications for {{ duration_min }} minutes"),
        ("focus_block.step.3", "Work on only that task until the block ends"),
        ("focus_block.follow_up", "How far did you get in the block?"),

        ("task_batching.body",
         "Small tasks are eating your attention. Spend {{ duration_min }} minutes batching them into one pass instead of letting them interrupt you all day."),
        ("task_batching.step.1", "List the small pending items in one place"),
        ("task_batching.step.2", "Handle them back to back without switching elsewhere"),

        ("workspace_cleanup.body",
         "{% if tone == \"encouraging\" %}A clear space sets you up well. {% endif %}Take {{ duration_min }} minutes to close stale tabs and tidy your workspace."),
        ("workspace_cleanup.step.1", "Close every window unrelated to your current task"),
        ("workspace_cleanup.step.2", "Clear your desk of anything you have not touched today"),

        ("deep_work_challenge.body",
         "{% if tone == \"direct\" %}You are in good shape for deep work. Commit to {{ duration_min }} minutes on your hardest problem.{% else %}Conditions look right for deep work. Consider dedicating {{ duration_min }} minutes to your most demanding problem while the momentum lasts.{% endif %}"),
        ("deep_work_challenge.step.1", "Choose the most demanding task on your plate"),
        ("deep_work_challenge.step.2", "Set a {{ duration_min }}-minute timer and close everything else"),
        ("deep_work_challenge.step.3", "Note where you stopped so re-entry is cheap"),
        ("deep_work_challenge.follow_up", "Rate how deep the session actually felt."),

        ("reflection_prompt.body",
         "Take {{ duration_min }} minutes to look back at the day so far: what moved, what stalled, and what one change would help most."),
        ("reflection_prompt.step.1", "Write down the one thing that went well"),
        ("reflection_prompt.step.2", "Write down the one thing you would change"),
        ("reflection_prompt.follow_up", "Keep the note where tomorrow-you will see it."),
    ]
}
