use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RiskError {
    #[error("invalid feature {name}: {reason}")]
    InvalidFeature { name: &'static str, reason: String },

    #[error("model expects features {expected:?}, artifact has {found:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("malformed model artifact: {0}")]
    MalformedModel(String),

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("model version {0} not found")]
    VersionNotFound(u32),

    #[error("malformed active-version pointer at {0}")]
    BadPointer(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type RiskResult<T> = Result<T, RiskError>;
