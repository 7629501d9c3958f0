//! Injects a prelude into a build artifact and prints the rewritten init and runtime code.

use async_trait::async_trait;
use clap::Args;
use preface_transform::{Injector, InjectorConfig};
use std::error::Error;
use std::path::PathBuf;

/// Arguments for the `inject` subcommand.
#[derive(Args)]
pub struct InjectArgs {
    /// Contract name; the artifact is read from `<artifacts>/<contract>.json`.
    pub contract: String,
    /// Prelude bytecode as 0x-prefixed hex.
    pub prelude: String,
    /// JSON file with an `InjectorConfig`; flags below override its fields.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Directory holding build artifacts.
    #[arg(long, value_name = "DIR")]
    pub artifacts: Option<PathBuf>,
    /// Directory receiving the injected artifact.
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,
    /// Do not write the injected artifact.
    #[arg(long)]
    pub no_persist: bool,
    /// Length of the compiler metadata suffix on deployed bytecode.
    #[arg(long, value_name = "BYTES")]
    pub metadata_len: Option<usize>,
    /// Print the resolved site table and patch list.
    #[arg(long)]
    pub report: bool,
}

impl InjectArgs {
    async fn load_config(&self) -> Result<InjectorConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => serde_json::from_str(&tokio::fs::read_to_string(path).await?)?,
            None => InjectorConfig::default(),
        };
        if let Some(dir) = &self.artifacts {
            config.artifact_dir = dir.clone();
        }
        if let Some(dir) = &self.out {
            config.output_dir = dir.clone();
        }
        if let Some(len) = self.metadata_len {
            config.metadata_suffix_len = len;
        }
        if self.no_persist {
            config.persist = false;
        }
        Ok(config)
    }
}

#[async_trait]
impl super::Command for InjectArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        let config = self.load_config().await?;
        tracing::debug!("Injector config: {:?}", config);

        let injector = Injector::new(config);
        let output = injector.run(&self.contract, &self.prelude).map_err(|e| {
            tracing::error!("[{}] {}", e.kind(), e);
            e
        })?;

        if self.report {
            print!("{}", output.resolution);
            for patch in &output.patches {
                println!(
                    "{:<9} PUSH{} at 0x{:04x}: 0x{:x} -> 0x{:x}",
                    patch.group, patch.width, patch.pc, patch.before, patch.after
                );
            }
        }
        if let Some(path) = &output.record_path {
            tracing::info!("Record written to {}", path.display());
        }

        println!("INIT CODE: {}", output.init_code_hex());
        println!("RUNTIME CODE: {}", output.runtime_code_hex());
        Ok(())
    }
}
