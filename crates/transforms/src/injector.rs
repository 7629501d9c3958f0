use crate::layout::{RuntimeLayout, locate_runtime_payload};
use crate::patch::{Patch, PatchGroup, PushPatcher};
use crate::prelude::Prelude;
use crate::{InjectorConfig, Result};
use preface_analysis::{Resolution, analyze, resolve};
use preface_core::artifact::{ArtifactStore, InjectionRecord, strip_metadata};
use preface_core::decoder::decode;
use preface_core::HexBytes;
use std::path::PathBuf;

/// Rewritten code plus everything learned while producing it.
#[derive(Debug, Clone)]
pub struct InjectionOutput {
    /// `patched init prefix ++ prelude ++ patched runtime`
    pub init_code: Vec<u8>,
    /// `prelude ++ patched runtime`
    pub runtime_code: Vec<u8>,
    pub layout: RuntimeLayout,
    pub resolution: Resolution,
    pub patches: Vec<Patch>,
    /// Where the output record was written, if it was.
    pub record_path: Option<PathBuf>,
}

impl InjectionOutput {
    pub fn init_code_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.init_code))
    }

    pub fn runtime_code_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.runtime_code))
    }
}

/// Splices `prelude` in front of the runtime carried by `init_code`.
///
/// `deployed_code` is the runtime as deployed, including its trailing `metadata_suffix_len`
/// metadata bytes, which are excluded from analysis but kept in the output. No I/O happens
/// here; identical inputs give identical outputs.
pub fn inject(
    init_code: &[u8],
    deployed_code: &[u8],
    prelude: &Prelude,
    metadata_suffix_len: usize,
) -> Result<InjectionOutput> {
    let layout = locate_runtime_payload(init_code, deployed_code)?;

    let program = decode(strip_metadata(deployed_code, metadata_suffix_len)?);
    let analysis = analyze(&program)?;
    let resolution = resolve(&program, analysis)?;

    let mut runtime = deployed_code.to_vec();
    let mut patcher = PushPatcher::new(prelude.len());
    patcher.patch_group(&mut runtime, &program, PatchGroup::Jump, resolution.jump_origins())?;
    patcher.patch_group(
        &mut runtime,
        &program,
        PatchGroup::CodeCopy,
        resolution.codecopy_origins(),
    )?;

    let init_program = decode(init_code);
    let mut prefix = init_code[..layout.runtime_offset].to_vec();
    let mut init_patcher = PushPatcher::new(prelude.len());
    init_patcher.patch_group(
        &mut prefix,
        &init_program,
        PatchGroup::Length,
        [layout.length_push_pc],
    )?;

    let mut patches = patcher.into_patches();
    patches.extend(init_patcher.into_patches());

    let runtime_code = [prelude.as_bytes(), &runtime].concat();
    let init_code = [&prefix, prelude.as_bytes(), &runtime].concat();

    tracing::info!(
        "Injected {}-byte prelude: init {} bytes, runtime {} bytes, {} pushes patched",
        prelude.len(),
        init_code.len(),
        runtime_code.len(),
        patches.len()
    );

    Ok(InjectionOutput {
        init_code,
        runtime_code,
        layout,
        resolution,
        patches,
        record_path: None,
    })
}

/// Artifact-backed front end: loads a contract by name, injects, and persists the result.
#[derive(Debug, Clone)]
pub struct Injector {
    config: InjectorConfig,
    store: ArtifactStore,
}

impl Injector {
    pub fn new(config: InjectorConfig) -> Self {
        let store = ArtifactStore::new(&config.artifact_dir, &config.output_dir);
        Self { config, store }
    }

    pub fn config(&self) -> &InjectorConfig {
        &self.config
    }

    /// Injects `prelude_hex` into `contract_name`, returning `(init code, runtime code)` as
    /// `0x`-prefixed hex.
    pub fn transform(&self, contract_name: &str, prelude_hex: &str) -> Result<(String, String)> {
        let output = self.run(contract_name, prelude_hex)?;
        Ok((output.init_code_hex(), output.runtime_code_hex()))
    }

    /// Like [`transform`](Self::transform) but returns the full [`InjectionOutput`].
    ///
    /// Nothing is written unless the whole injection succeeds.
    pub fn run(&self, contract_name: &str, prelude_hex: &str) -> Result<InjectionOutput> {
        let prelude = Prelude::from_hex(prelude_hex)?;
        let artifact = self.store.load(contract_name)?;

        let mut output = inject(
            artifact.init_code(),
            artifact.deployed_code(),
            &prelude,
            self.config.metadata_suffix_len,
        )
        .inspect_err(|e| {
            if e.kind().is_internal() {
                tracing::error!("Injection into {} hit an internal fault: {}", contract_name, e)
            } else {
                tracing::warn!("Injection into {} failed: {}", contract_name, e)
            }
        })?;

        if self.config.persist {
            let record = InjectionRecord {
                contract_name: artifact.contract_name.clone(),
                prelude: prelude_hex.trim().to_string(),
                prelude_size: prelude.len(),
                bytecode: HexBytes(output.init_code.clone()),
                deployed_bytecode: HexBytes(output.runtime_code.clone()),
            };
            output.record_path = Some(self.store.persist(&record)?);
        }

        Ok(output)
    }
}
