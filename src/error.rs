use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `nudgekit`.
///
/// Errors only surface at construction time (config parsing, catalog
/// validation, store setup). The per-cycle entry points `decide()` and
/// `record_feedback()` complete with a value or a suppression, never an
/// error; collaborator failures inside a cycle are logged and treated as
/// suppression.
#[derive(Debug, Error)]
pub enum CoachError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Catalog / templates ─────────────────────────────────────────────
    #[error("catalog: {0}")]
    Catalog(#[from] CatalogError),

    // ── Persistence sink ────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Catalog errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog has no candidates")]
    Empty,

    #[error("candidate {id} invalid: {reason}")]
    InvalidCandidate { id: String, reason: String },

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("template render failed: {0}")]
    Render(String),
}

// ─── Persistence sink errors ─────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("open failed: {0}")]
    Open(String),

    #[error("query failed: {0}")]
    Query(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, CoachError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_displays_correctly() {
        let err = CoachError::Config(ConfigError::Validation("bad threshold".into()));
        assert!(err.to_string().contains("validation failed"));
    }

    #[test]
    fn catalog_invalid_candidate_displays_id_and_reason() {
        let err = CoachError::Catalog(CatalogError::InvalidCandidate {
            id: "micro_break".into(),
            reason: "base_intensity out of range".into(),
        });
        assert!(err.to_string().contains("micro_break"));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn anyhow_interop() {
        let anyhow_err = anyhow::anyhow!("something went wrong");
        let coach_err: CoachError = anyhow_err.into();
        assert!(coach_err.to_string().contains("something went wrong"));
    }

    #[test]
    fn store_error_displays_correctly() {
        let err = CoachError::Store(StoreError::Open("locked".into()));
        assert!(err.to_string().contains("locked"));
    }
}
