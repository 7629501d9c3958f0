use async_trait::async_trait;
use clap::Subcommand;
use std::error::Error;
use std::path::Path;

pub mod analyze;
pub mod decode;
pub mod inject;

use thiserror::Error;

/// Errors raised while reading command input.
#[derive(Debug, Error)]
pub enum InputError {
    /// The input file could not be read.
    #[error("failed to read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The input is neither `0x`-prefixed hex nor a file.
    #[error("expected 0x-prefixed hex or a file path, got {0:?}")]
    NotHexOrFile(String),
    /// Hex decoding failed.
    #[error(transparent)]
    Core(#[from] preface_core::Error),
}

/// CLI subcommands for preface.
#[derive(Subcommand)]
pub enum Cmd {
    /// Inject a prelude into a compiled contract artifact.
    Inject(inject::InjectArgs),
    /// Resolve jump and CODECOPY sites in runtime bytecode.
    Analyze(analyze::AnalyzeArgs),
    /// Decode bytecode to an instruction listing.
    Decode(decode::DecodeArgs),
}

/// Trait for executing CLI subcommands.
#[async_trait]
pub trait Command {
    /// Executes the subcommand.
    async fn execute(self) -> Result<(), Box<dyn Error>>;
}

#[async_trait]
impl Command for Cmd {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        match self {
            Cmd::Inject(args) => args.execute().await,
            Cmd::Analyze(args) => args.execute().await,
            Cmd::Decode(args) => args.execute().await,
        }
    }
}

/// Reads bytecode given as `0x` hex, a `.hex` text file, or a raw binary file.
pub(crate) async fn read_bytecode(input: &str) -> Result<Vec<u8>, InputError> {
    let trimmed = input.trim();
    if trimmed.starts_with("0x") {
        return Ok(preface_core::decode_prefixed_hex(trimmed)?);
    }

    let path = Path::new(trimmed);
    if !path.is_file() {
        return Err(InputError::NotHexOrFile(trimmed.to_string()));
    }
    let file_error = |source| InputError::File {
        path: path.display().to_string(),
        source,
    };
    if path.extension().and_then(|s| s.to_str()) == Some("hex") {
        let content = tokio::fs::read_to_string(path).await.map_err(file_error)?;
        let normalized = preface_core::normalize_hex_string(&content)?;
        Ok(hex::decode(normalized).map_err(preface_core::Error::from)?)
    } else {
        tokio::fs::read(path).await.map_err(file_error)
    }
}
