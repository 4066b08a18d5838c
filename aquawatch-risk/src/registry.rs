use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RiskError, RiskResult};
use crate::features::FEATURE_COLUMNS;
use crate::model::{Evaluation, LogisticModel};

const ARTIFACT_PREFIX: &str = "outbreak_model_v";
const ARTIFACT_SUFFIX: &str = ".json";
const ACTIVE_POINTER: &str = "ACTIVE";

/// A trained model plus the metadata needed to trust it at prediction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub trained_at: DateTime<Utc>,
    pub feature_columns: Vec<String>,
    pub training_samples: usize,
    pub evaluation: Evaluation,
    pub model: LogisticModel,
}

impl ModelArtifact {
    pub fn new(version: u32, model: LogisticModel, training_samples: usize, evaluation: Evaluation) -> Self {
        Self {
            version,
            trained_at: Utc::now(),
            feature_columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            training_samples,
            evaluation,
            model,
        }
    }

    fn check_columns(&self) -> RiskResult<()> {
        let matches = self.feature_columns.len() == FEATURE_COLUMNS.len()
            && self.feature_columns.iter().zip(FEATURE_COLUMNS).all(|(a, b)| a == b)
            && self.model.weights.len() == FEATURE_COLUMNS.len();
        if !matches {
            return Err(RiskError::FeatureMismatch {
                expected: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
                found: self.feature_columns.clone(),
            });
        }

        let scaler = &self.model.scaler;
        if scaler.means.len() != FEATURE_COLUMNS.len() || scaler.stds.len() != FEATURE_COLUMNS.len() {
            return Err(RiskError::MalformedModel(format!(
                "scaler has {} means and {} stds for {} features",
                scaler.means.len(),
                scaler.stds.len(),
                FEATURE_COLUMNS.len()
            )));
        }
        if let Some(bad) = scaler.stds.iter().position(|s| !s.is_finite() || *s <= 0.0) {
            return Err(RiskError::MalformedModel(format!(
                "scaler std for {} must be finite and positive",
                FEATURE_COLUMNS[bad]
            )));
        }
        let params = scaler.means.iter().chain(&self.model.weights).chain([&self.model.bias]);
        if params.into_iter().any(|v| !v.is_finite()) {
            return Err(RiskError::MalformedModel("non-finite mean, weight or bias".into()));
        }
        Ok(())
    }
}

/// Versioned model artifacts in one directory.
///
/// Layout: `outbreak_model_v<N>.json` per version and an `ACTIVE` file
/// holding the version number currently served.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    dir: PathBuf,
}

impl ModelRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn artifact_path(&self, version: u32) -> PathBuf {
        self.dir.join(format!("{ARTIFACT_PREFIX}{version}{ARTIFACT_SUFFIX}"))
    }

    /// All stored versions, ascending.
    pub fn versions(&self) -> RiskResult<Vec<u32>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut versions = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(v) = name
                .strip_prefix(ARTIFACT_PREFIX)
                .and_then(|rest| rest.strip_suffix(ARTIFACT_SUFFIX))
                .and_then(|v| v.parse::<u32>().ok())
            {
                versions.push(v);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    pub fn next_version(&self) -> RiskResult<u32> {
        Ok(self.versions()?.last().map_or(1, |v| v + 1))
    }

    pub fn save(&self, artifact: &ModelArtifact) -> RiskResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.artifact_path(artifact.version);
        write_atomic(&path, &serde_json::to_vec_pretty(artifact)?)?;
        tracing::info!(version = artifact.version, path = %path.display(), "model artifact saved");
        Ok(path)
    }

    pub fn load(&self, version: u32) -> RiskResult<ModelArtifact> {
        let path = self.artifact_path(version);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RiskError::VersionNotFound(version))
            }
            Err(e) => return Err(e.into()),
        };
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)?;
        artifact.check_columns()?;
        Ok(artifact)
    }

    /// Point the registry at `version`; it must already be saved.
    pub fn activate(&self, version: u32) -> RiskResult<()> {
        if !self.artifact_path(version).exists() {
            return Err(RiskError::VersionNotFound(version));
        }
        write_atomic(&self.dir.join(ACTIVE_POINTER), version.to_string().as_bytes())?;
        tracing::info!(version, "model version activated");
        Ok(())
    }

    pub fn active_version(&self) -> RiskResult<Option<u32>> {
        let path = self.dir.join(ACTIVE_POINTER);
        match fs::read_to_string(&path) {
            Ok(s) => s
                .trim()
                .parse::<u32>()
                .map(Some)
                .map_err(|_| RiskError::BadPointer(path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn load_active(&self) -> RiskResult<Option<ModelArtifact>> {
        match self.active_version()? {
            Some(v) => self.load(v).map(Some),
            None => Ok(None),
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::TrainingParams;
    use crate::synthetic;
    use tempfile::tempdir;

    pub(crate) fn quick_artifact(version: u32) -> ModelArtifact {
        let data = synthetic::generate(200, u64::from(version));
        let params = TrainingParams { epochs: 30, ..Default::default() };
        let model = LogisticModel::train(&data, params).unwrap();
        let eval = model.evaluate(&data);
        ModelArtifact::new(version, model, data.len(), eval)
    }

    #[test]
    fn empty_directory_has_no_active_model() {
        let tmp = tempdir().unwrap();
        let registry = ModelRegistry::new(tmp.path().join("missing"));
        assert!(registry.versions().unwrap().is_empty());
        assert_eq!(registry.next_version().unwrap(), 1);
        assert!(registry.load_active().unwrap().is_none());
    }

    #[test]
    fn save_activate_and_resolve() {
        let tmp = tempdir().unwrap();
        let registry = ModelRegistry::new(tmp.path());

        registry.save(&quick_artifact(1)).unwrap();
        registry.save(&quick_artifact(2)).unwrap();
        assert_eq!(registry.versions().unwrap(), vec![1, 2]);
        assert_eq!(registry.next_version().unwrap(), 3);

        // saved but not yet served
        assert!(registry.active_version().unwrap().is_none());

        registry.activate(1).unwrap();
        assert_eq!(registry.load_active().unwrap().unwrap().version, 1);

        registry.activate(2).unwrap();
        assert_eq!(registry.load_active().unwrap().unwrap().version, 2);
    }

    #[test]
    fn activating_unknown_version_fails() {
        let tmp = tempdir().unwrap();
        let registry = ModelRegistry::new(tmp.path());
        assert!(matches!(registry.activate(9), Err(RiskError::VersionNotFound(9))));
    }

    #[test]
    fn mismatched_columns_are_rejected() {
        let tmp = tempdir().unwrap();
        let registry = ModelRegistry::new(tmp.path());
        let mut artifact = quick_artifact(1);
        artifact.feature_columns.swap(0, 1);
        registry.save(&artifact).unwrap();

        assert!(matches!(registry.load(1), Err(RiskError::FeatureMismatch { .. })));
    }

    #[test]
    fn malformed_scaler_is_rejected() {
        let tmp = tempdir().unwrap();
        let registry = ModelRegistry::new(tmp.path());

        let mut short = quick_artifact(1);
        short.model.scaler.means.truncate(3);
        short.model.scaler.stds.truncate(3);
        registry.save(&short).unwrap();
        assert!(matches!(registry.load(1), Err(RiskError::MalformedModel(_))));

        let mut zero_std = quick_artifact(2);
        zero_std.model.scaler.stds[4] = 0.0;
        registry.save(&zero_std).unwrap();
        assert!(matches!(registry.load(2), Err(RiskError::MalformedModel(_))));
    }

    #[test]
    fn corrupt_pointer_is_reported() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join(ACTIVE_POINTER), "latest").unwrap();
        let registry = ModelRegistry::new(tmp.path());
        assert!(matches!(registry.active_version(), Err(RiskError::BadPointer(_))));
    }
}
