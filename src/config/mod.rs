pub mod schema;

pub use schema::{
    AdaptationConfig, CoachConfig, EstimatorConfig, GateConfig, SelectorConfig, TimingConfig,
};
