#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod profile;
pub mod store;

pub use catalog::{RenderedContent, TemplateCatalog, TeraCatalog};
pub use config::CoachConfig;
pub use engine::state::UserSnapshot;
pub use engine::{CoachEngine, EngineMetrics};
pub use engine::types::{
    AdaptiveWeights, Commitment, Context, CostWindow, CycleReport, CycleStage, DismissalReason,
    EffectivenessRecord, FocusState, IntensityBand, Intervention, InterventionCandidate,
    InterventionKind, InterventionTiming, SuppressReason, Telemetry, UserState,
};
pub use error::{CoachError, Result};
pub use profile::{PersonalityProfile, PersonalityStore, StaticProfileStore};
pub use store::{MemorySink, PersistenceSink, SqliteSink};
