//! Compiled contract artifacts and the on-disk store they are read from and written to.
//!
//! Input artifacts follow the truffle build layout: one `<contractName>.json` per contract
//! carrying at least `contractName`, `bytecode` (init code) and `deployedBytecode` (runtime
//! code including the trailing compiler metadata). Other fields are ignored.

use crate::hex_bytes::HexBytes;
use crate::result::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Length of the compiler metadata suffix appended to deployed bytecode
/// (`0xa1 0x65 "bzzr0" 0x58 0x20 <32-byte swarm hash> 0x00 0x29`).
pub const METADATA_SUFFIX_LEN: usize = 43;

/// A compiled contract as emitted by the build toolchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    /// Contract name, also the artifact file stem.
    pub contract_name: String,
    /// Full init code.
    pub bytecode: HexBytes,
    /// Runtime code as deployed, including the metadata suffix.
    pub deployed_bytecode: HexBytes,
}

impl ContractArtifact {
    /// Parses an artifact from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Init code bytes.
    pub fn init_code(&self) -> &[u8] {
        &self.bytecode
    }

    /// Deployed runtime bytes, metadata suffix included.
    pub fn deployed_code(&self) -> &[u8] {
        &self.deployed_bytecode
    }

    /// Executable runtime bytes: the deployed code minus its trailing `suffix_len` metadata
    /// bytes.
    pub fn runtime_code(&self, suffix_len: usize) -> Result<&[u8]> {
        strip_metadata(self.deployed_code(), suffix_len)
    }
}

/// Drops the trailing `suffix_len` metadata bytes from deployed code.
pub fn strip_metadata(deployed: &[u8], suffix_len: usize) -> Result<&[u8]> {
    let end = deployed
        .len()
        .checked_sub(suffix_len)
        .ok_or(Error::MetadataTooShort {
            len: deployed.len(),
            suffix: suffix_len,
        })?;
    Ok(&deployed[..end])
}

/// The persisted result of injecting a prelude into a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionRecord {
    /// Contract the prelude was injected into.
    pub contract_name: String,
    /// The prelude as supplied (`0x`-prefixed hex).
    pub prelude: String,
    /// Prelude length in bytes.
    pub prelude_size: usize,
    /// Final init code.
    pub bytecode: HexBytes,
    /// Final runtime code.
    pub deployed_bytecode: HexBytes,
}

/// Directory-backed store of input artifacts and output records.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    artifact_dir: PathBuf,
    output_dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a store reading from `artifact_dir` and writing to `output_dir`.
    pub fn new(artifact_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Path of the input artifact for `contract_name`.
    pub fn artifact_path(&self, contract_name: &str) -> PathBuf {
        self.artifact_dir.join(format!("{contract_name}.json"))
    }

    /// Path of the output record for `contract_name`.
    pub fn record_path(&self, contract_name: &str) -> PathBuf {
        self.output_dir.join(format!("{contract_name}.json"))
    }

    /// Loads the compiled artifact for `contract_name`.
    pub fn load(&self, contract_name: &str) -> Result<ContractArtifact> {
        let path = self.artifact_path(contract_name);
        let json = read_to_string(&path)?;
        let artifact = ContractArtifact::from_json(&json)?;
        tracing::debug!(
            "Loaded artifact {} ({} init bytes, {} deployed bytes)",
            path.display(),
            artifact.bytecode.len(),
            artifact.deployed_bytecode.len()
        );
        Ok(artifact)
    }

    /// Writes `record` as pretty-printed JSON keyed by its contract name, creating the output
    /// directory if needed. Returns the path written.
    pub fn persist(&self, record: &InjectionRecord) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir).map_err(|source| Error::FileWrite {
            path: self.output_dir.display().to_string(),
            source,
        })?;

        let path = self.record_path(&record.contract_name);
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json).map_err(|source| Error::FileWrite {
            path: path.display().to_string(),
            source,
        })?;

        tracing::info!("Wrote {} record to {}", record.contract_name, path.display());
        Ok(path)
    }
}

fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::FileRead {
        path: path.display().to_string(),
        source,
    })
}
