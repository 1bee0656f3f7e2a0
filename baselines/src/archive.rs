//! On-disk model archives.
//!
//! An archive is a single file holding:
//! - [`ArchiveData`]: JSON metadata (algorithm, spaces, policy architecture,
//!   hyperparameters, timestep counter, parameter names)
//! - the policy weights as burn `BinBytesRecorder<FullPrecisionSettings>` bytes
//!
//! Both are wrapped in a `bincode` envelope tagged with [`ARCHIVE_MAGIC`].
//! Archives use the `.zip` extension by default: saving to a path without an
//! extension appends it, and loading falls back to `<path>.zip` when `<path>`
//! does not exist.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::error::{BaselinesError, Result};
use crate::policies::{ActorCriticPolicy, PolicyConfig};
use crate::spaces::Space;

/// Default archive extension, without the dot.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Tag identifying archive files.
pub const ARCHIVE_MAGIC: &str = "burn-baselines-archive";

/// Current archive layout version.
pub const FORMAT_VERSION: u32 = 1;

/// Everything needed to rebuild a model except the weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveData {
    pub algorithm: String,
    pub format_version: u32,
    pub observation_space: Space,
    pub action_space: Space,
    pub policy_config: PolicyConfig,
    /// Algorithm-specific configuration.
    pub hyperparameters: serde_json::Value,
    pub num_timesteps: usize,
    /// Names of the policy parameters, in map order.
    pub parameter_names: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct ArchiveEnvelope {
    magic: String,
    data_json: String,
    policy_bytes: Vec<u8>,
}

/// Metadata plus serialized policy weights.
#[derive(Debug, Clone)]
pub struct ModelArchive {
    pub data: ArchiveData,
    pub policy_bytes: Vec<u8>,
}

impl ModelArchive {
    /// Serialize `policy` alongside `data`.
    pub fn from_policy<B: Backend>(data: ArchiveData, policy: &ActorCriticPolicy<B>) -> Result<Self> {
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let policy_bytes = recorder
            .record(policy.clone().into_record(), ())
            .map_err(|e| BaselinesError::Recorder(e.to_string()))?;
        Ok(Self { data, policy_bytes })
    }

    /// Load the stored weights into `template`, a policy built from
    /// `data.policy_config` and the archived spaces.
    pub fn load_policy<B: Backend>(
        &self,
        template: ActorCriticPolicy<B>,
        device: &B::Device,
    ) -> Result<ActorCriticPolicy<B>> {
        let expected: Vec<String> = template.parameter_shapes().into_keys().collect();
        if expected != self.data.parameter_names {
            return Err(BaselinesError::Archive(format!(
                "archive holds parameters {:?}, policy expects {:?}",
                self.data.parameter_names, expected
            )));
        }

        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let record = recorder
            .load(self.policy_bytes.clone(), device)
            .map_err(|e| BaselinesError::Recorder(e.to_string()))?;
        Ok(template.load_record(record))
    }

    /// Encode the archive.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let envelope = ArchiveEnvelope {
            magic: ARCHIVE_MAGIC.to_string(),
            data_json: serde_json::to_string(&self.data)?,
            policy_bytes: self.policy_bytes.clone(),
        };
        Ok(bincode::serialize(&envelope)?)
    }

    /// Decode an archive.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope: ArchiveEnvelope = bincode::deserialize(bytes)
            .map_err(|e| BaselinesError::Archive(format!("not a model archive: {}", e)))?;
        if envelope.magic != ARCHIVE_MAGIC {
            return Err(BaselinesError::Archive(format!(
                "unexpected archive tag '{}'",
                envelope.magic
            )));
        }

        let data: ArchiveData = serde_json::from_str(&envelope.data_json)?;
        if data.format_version != FORMAT_VERSION {
            return Err(BaselinesError::Archive(format!(
                "archive format version {} does not match supported version {}",
                data.format_version, FORMAT_VERSION
            )));
        }

        Ok(Self {
            data,
            policy_bytes: envelope.policy_bytes,
        })
    }

    /// Write the archive, returning the path actually written.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = archive_save_path(path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&path, self.to_bytes()?)?;
        log::debug!("Wrote {} archive to {}", self.data.algorithm, path.display());
        Ok(path)
    }

    /// Read an archive, resolving a missing `.zip` extension.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = resolve_archive_path(path)?;
        let bytes = fs::read(&path)?;
        Self::from_bytes(&bytes)
    }
}

fn with_archive_extension(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".");
    name.push(ARCHIVE_EXTENSION);
    PathBuf::from(name)
}

/// Path an archive is written to: `.zip` is appended when `path` has no
/// extension.
pub fn archive_save_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        with_archive_extension(path)
    }
}

/// Locate an existing archive: `path` itself, else `path` + `.zip`.
pub fn resolve_archive_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    let with_extension = with_archive_extension(path);
    if with_extension.is_file() {
        return Ok(with_extension);
    }
    Err(BaselinesError::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!(
            "no archive at {} or {}",
            path.display(),
            with_extension.display()
        ),
    )))
}
