use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::persistence::{atomic_write_json, load_json};
use crate::registry::{ModelArtifact, RegistryEntry, RegistryError, Selector, Stage};

const VERSIONS_DIR: &str = "versions";
const ARTIFACT_FILE: &str = "artifact.json";
const ENTRY_FILE: &str = "entry.json";
const STAGES_FILE: &str = "stages.json";
const PUBLISH_ATTEMPTS: u32 = 16;

/// Immutable per-version metadata written next to the artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VersionRecord {
    name: String,
    version: u64,
    created_at: DateTime<Utc>,
    checksum: String,
}

type StageMap = BTreeMap<u64, Stage>;

/// File-backed registry rooted at a directory:
///
/// ```text
/// <root>/<name>/versions/<v>/artifact.json
/// <root>/<name>/versions/<v>/entry.json
/// <root>/<name>/stages.json
/// ```
///
/// Published versions are never rewritten. Only the stage labels change.
#[derive(Debug)]
pub struct ModelRegistry {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl ModelRegistry {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `artifact` as the next version of `name` and return that version.
    ///
    /// Files are written into a hidden staging directory which is renamed into
    /// `versions/<v>` once complete, so a failed publish leaves nothing behind
    /// that readers would list. Another process may claim `v` first; the
    /// rename then fails and the next free number is tried.
    pub fn publish(&self, name: &str, artifact: &ModelArtifact) -> Result<u64, RegistryError> {
        validate_name(name)?;
        let bytes = serde_json::to_vec_pretty(artifact)?;
        let checksum = sha256_hex(&bytes);

        let _guard = self.write_lock.lock();
        fs::create_dir_all(self.versions_dir(name))?;
        for _ in 0..PUBLISH_ATTEMPTS {
            let version = self.versions(name)?.last().copied().unwrap_or(0) + 1;
            if self.try_publish_as(name, version, &bytes, &checksum)? {
                info!(model = name, version, checksum = %checksum, "published model version");
                return Ok(version);
            }
            warn!(model = name, version, "version claimed by another writer, retrying");
        }
        Err(RegistryError::VersionConflict {
            name: name.to_string(),
            attempts: PUBLISH_ATTEMPTS,
        })
    }

    /// Install `bytes` as `version`. `Ok(false)` when that version already exists.
    fn try_publish_as(&self, name: &str, version: u64, bytes: &[u8], checksum: &str) -> Result<bool, RegistryError> {
        let record = VersionRecord {
            name: name.to_string(),
            version,
            created_at: Utc::now(),
            checksum: checksum.to_string(),
        };

        let versions_dir = self.versions_dir(name);
        let target = versions_dir.join(version.to_string());
        let staging = versions_dir.join(format!(".staging-{}", Uuid::new_v4().simple()));
        let written = write_version(&staging, bytes, &record).and_then(|_| fs::rename(&staging, &target));
        match written {
            Ok(()) => Ok(true),
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                if target.join(ENTRY_FILE).exists() {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    pub fn resolve(&self, name: &str, selector: &Selector) -> Result<RegistryEntry, RegistryError> {
        validate_name(name)?;
        let versions = self.versions(name)?;

        let version = match selector {
            Selector::Latest => versions.last().copied(),
            Selector::Version(v) => versions.contains(v).then_some(*v),
            Selector::Stage(stage) => {
                let stages = self.load_stages(name)?;
                versions
                    .iter()
                    .rev()
                    .find(|v| stages.get(*v).copied().unwrap_or_default() == *stage)
                    .copied()
            }
        }
        .ok_or_else(|| RegistryError::not_found(name, selector))?;

        self.read_entry(name, version)
    }

    /// Reassign the stage label of an existing version.
    pub fn set_stage(&self, name: &str, version: u64, stage: Stage) -> Result<(), RegistryError> {
        validate_name(name)?;
        let _guard = self.write_lock.lock();
        if !self.versions(name)?.contains(&version) {
            return Err(RegistryError::not_found(name, version));
        }

        let mut stages = self.load_stages(name)?;
        match stage {
            Stage::None => stages.remove(&version),
            _ => stages.insert(version, stage),
        };
        atomic_write_json(&self.model_dir(name).join(STAGES_FILE), &stages)?;

        info!(model = name, version, stage = %stage, "updated model stage");
        Ok(())
    }

    /// Complete versions of `name`, ascending. Empty for an unknown name.
    pub fn versions(&self, name: &str) -> Result<Vec<u64>, RegistryError> {
        validate_name(name)?;
        let dir = match fs::read_dir(self.versions_dir(name)) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut versions = Vec::new();
        for entry in dir {
            let entry = entry?;
            // Only canonical numbers count, so "05" or "+5" cannot alias 5.
            // Staging directories never parse.
            let version = entry
                .file_name()
                .to_str()
                .and_then(|s| s.parse::<u64>().ok().filter(|v| v.to_string() == s));
            if let Some(version) = version {
                versions.push(version);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    /// Raw stored artifact bytes, verified against the recorded checksum.
    pub fn artifact_bytes(&self, name: &str, version: u64) -> Result<Vec<u8>, RegistryError> {
        validate_name(name)?;
        let dir = self.version_dir(name, version);
        let record: VersionRecord =
            load_json(&dir.join(ENTRY_FILE))?.ok_or_else(|| RegistryError::not_found(name, version))?;
        let bytes = fs::read(dir.join(ARTIFACT_FILE))?;

        let actual = sha256_hex(&bytes);
        if actual != record.checksum {
            return Err(RegistryError::Corrupt {
                name: name.to_string(),
                version,
                expected: record.checksum,
                actual,
            });
        }
        Ok(bytes)
    }

    fn read_entry(&self, name: &str, version: u64) -> Result<RegistryEntry, RegistryError> {
        let dir = self.version_dir(name, version);
        let record: VersionRecord =
            load_json(&dir.join(ENTRY_FILE))?.ok_or_else(|| RegistryError::not_found(name, version))?;
        let bytes = self.artifact_bytes(name, version)?;
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)?;
        let stage = self.load_stages(name)?.get(&version).copied().unwrap_or_default();

        debug!(model = name, version, stage = %stage, "resolved model version");
        Ok(RegistryEntry {
            name: record.name,
            version: record.version,
            stage,
            artifact,
            created_at: record.created_at,
            checksum: record.checksum,
        })
    }

    fn load_stages(&self, name: &str) -> Result<StageMap, RegistryError> {
        Ok(load_json(&self.model_dir(name).join(STAGES_FILE))?.unwrap_or_default())
    }

    fn model_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn versions_dir(&self, name: &str) -> PathBuf {
        self.model_dir(name).join(VERSIONS_DIR)
    }

    fn version_dir(&self, name: &str, version: u64) -> PathBuf {
        self.versions_dir(name).join(version.to_string())
    }
}

fn write_version(dir: &Path, artifact: &[u8], record: &VersionRecord) -> io::Result<()> {
    fs::create_dir(dir)?;
    fs::write(dir.join(ARTIFACT_FILE), artifact)?;
    let entry = serde_json::to_vec_pretty(record).map_err(io::Error::other)?;
    fs::write(dir.join(ENTRY_FILE), entry)
}

/// Names become directory names, so only a conservative character set is allowed.
fn validate_name(name: &str) -> Result<(), RegistryError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidName(name.to_string()))
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
