//! Prints a program-counter annotated instruction listing for bytecode.

use super::read_bytecode;
use async_trait::async_trait;
use clap::Args;
use preface_core::decoder::decode;
use std::error::Error;

/// Arguments for the `decode` subcommand.
#[derive(Args)]
pub struct DecodeArgs {
    /// Bytecode as 0x hex, a .hex file or a binary file.
    #[arg(value_name = "BYTECODE")]
    pub input: String,
}

#[async_trait]
impl super::Command for DecodeArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        let bytes = read_bytecode(&self.input).await?;
        let program = decode(&bytes);
        let info = program.info();
        println!(
            "length {} bytes, keccak256 0x{}",
            info.byte_length,
            hex::encode(info.keccak_hash)
        );
        for instruction in program.instructions() {
            println!("{instruction}");
        }
        Ok(())
    }
}
