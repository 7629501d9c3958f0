//! Resolves which pushes feed jump targets and `CODECOPY` offsets in runtime bytecode.

use super::read_bytecode;
use async_trait::async_trait;
use clap::Args;
use preface_analysis::{analyze, resolve};
use preface_core::artifact::{ArtifactStore, METADATA_SUFFIX_LEN, strip_metadata};
use preface_core::decoder::decode;
use std::error::Error;
use std::path::PathBuf;

/// Arguments for the `analyze` subcommand.
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Runtime bytecode as 0x hex, a .hex file or a binary file; with `--artifacts`, a
    /// contract name.
    #[arg(value_name = "BYTECODE")]
    pub input: String,
    /// Treat the input as a contract name inside this artifact directory.
    #[arg(long, value_name = "DIR")]
    pub artifacts: Option<PathBuf>,
    /// Trailing metadata bytes to strip before analysis. Defaults to 43 for artifacts and 0
    /// for raw bytecode.
    #[arg(long, value_name = "BYTES")]
    pub metadata_len: Option<usize>,
    /// Emit JSON instead of the site table.
    #[arg(long)]
    pub json: bool,
}

#[async_trait]
impl super::Command for AnalyzeArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        let (code, suffix) = match &self.artifacts {
            Some(dir) => {
                let artifact = ArtifactStore::new(dir, dir).load(&self.input)?;
                (
                    artifact.deployed_bytecode.0,
                    self.metadata_len.unwrap_or(METADATA_SUFFIX_LEN),
                )
            }
            None => (
                read_bytecode(&self.input).await?,
                self.metadata_len.unwrap_or(0),
            ),
        };

        let program = decode(strip_metadata(&code, suffix)?);
        let resolution = resolve(&program, analyze(&program)?)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&resolution)?);
        } else {
            print!("{resolution}");
            let stats = &resolution.stats;
            println!(
                "steps {}, forks {} ({} skipped), max depth {}, rescued {}",
                stats.steps,
                stats.forks_attempted,
                stats.forks_skipped,
                stats.max_depth,
                resolution.rescued()
            );
        }
        Ok(())
    }
}
