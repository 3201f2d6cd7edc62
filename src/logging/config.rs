use std::path::PathBuf;

/// Logging settings resolved from `LOG_LEVEL`, `LOG_DIR` and `ENVIRONMENT`.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level for this crate's targets when `RUST_LOG` is unset.
    pub level: String,
    pub dir: PathBuf,
    /// JSON lines everywhere plus a separate error log. Set in production.
    pub json: bool,
}

impl LogConfig {
    pub fn default_filter(&self) -> String {
        format!(
            "carehome_backend={},tower_http=debug,axum=debug",
            self.level
        )
    }
}
