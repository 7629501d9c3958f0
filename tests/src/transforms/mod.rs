//! Injection through the public `preface-transform` API, including artifact persistence.

use preface_core::ErrorKind;
use preface_core::artifact::InjectionRecord;
use preface_core::assembler::assemble;
use preface_transform::{Error, Injector, InjectorConfig, PatchGroup, Prelude, inject};
use std::path::Path;

/// `a1 65 "bzzr0" 58 20 <32-byte swarm hash> 00 29`
fn metadata() -> Vec<u8> {
    let mut suffix = vec![0xa1, 0x65];
    suffix.extend_from_slice(b"bzzr0");
    suffix.extend_from_slice(&[0x58, 0x20]);
    suffix.extend_from_slice(&[0xab; 32]);
    suffix.extend_from_slice(&[0x00, 0x29]);
    suffix
}

fn deployed(asm: &str) -> Vec<u8> {
    let mut code = assemble(asm).unwrap();
    code.extend(metadata());
    code
}

/// Wraps `runtime` in a 13-byte constructor that copies it out and returns it.
fn init_for(runtime: &[u8]) -> Vec<u8> {
    let mut init = assemble(&format!(
        "PUSH2 0x{:04x} DUP1 PUSH1 0x0d PUSH1 0x00 CODECOPY PUSH1 0x00 RETURN INVALID",
        runtime.len()
    ))
    .unwrap();
    init.extend_from_slice(runtime);
    init
}

fn write_artifact(dir: &Path, name: &str, runtime: &[u8]) {
    let artifact = serde_json::json!({
        "contractName": name,
        "bytecode": format!("0x{}", hex::encode(init_for(runtime))),
        "deployedBytecode": format!("0x{}", hex::encode(runtime)),
    });
    std::fs::write(dir.join(format!("{name}.json")), artifact.to_string()).unwrap();
}

/// Jump table through PUSH2 targets and a CODECOPY of a trailing constant.
const TABLE: &str = "
    PUSH1 0x00 CALLDATALOAD           # 0x00
    PUSH2 0x000e JUMPI                # 0x03
    PUSH2 0x0015 JUMP                 # 0x07
    INVALID INVALID INVALID           # 0x0b
    JUMPDEST                          # 0x0e
    PUSH1 0x01 PUSH2 0x0018 JUMP      # 0x0f
    JUMPDEST                          # 0x15
    PUSH1 0x02                        # 0x16
    JUMPDEST                          # 0x18
    PUSH1 0x20 PUSH2 0x0029 PUSH1 0x00 CODECOPY
    PUSH1 0x00 MSTORE
    PUSH1 0x20 PUSH1 0x00 RETURN      # 0x24
    INVALID
";

#[test]
fn every_shifted_offset_is_patched() {
    let runtime = deployed(TABLE);
    let prelude = Prelude::from_hex("0x5b5b").unwrap();
    let out = inject(&init_for(&runtime), &runtime, &prelude, 43).unwrap();

    let jump_origins: Vec<usize> = out.resolution.jump_origins().into_iter().collect();
    assert_eq!(jump_origins, vec![0x03, 0x07, 0x11]);
    let codecopy_origins: Vec<usize> = out.resolution.codecopy_origins().into_iter().collect();
    assert_eq!(codecopy_origins, vec![0x1b]);

    let shifted = &out.runtime_code[2..];
    assert_eq!(&shifted[0x04..0x06], &[0x00, 0x10]);
    assert_eq!(&shifted[0x08..0x0a], &[0x00, 0x17]);
    assert_eq!(&shifted[0x12..0x14], &[0x00, 0x1a]);
    assert_eq!(&shifted[0x1c..0x1e], &[0x00, 0x2b]);

    let length = out.patches.iter().find(|p| p.group == PatchGroup::Length).unwrap();
    assert_eq!((length.before, length.after), (runtime.len(), runtime.len() + 2));
    assert_eq!(out.layout.runtime_offset, 0x0d);

    let mut prefix = init_for(&runtime)[..0x0d].to_vec();
    prefix[1..3].copy_from_slice(&((runtime.len() + 2) as u16).to_be_bytes());
    assert_eq!(&out.init_code[..0x0d], &prefix[..]);
    assert_eq!(&out.init_code[0x0d..], &out.runtime_code[..]);
}

#[test]
fn duplicated_jump_target_is_unsupported() {
    let runtime = deployed("PUSH1 0x04 DUP1 JUMP JUMPDEST POP STOP");
    let err = inject(&init_for(&runtime), &runtime, &Prelude::from_bytes(vec![0x5b]), 43)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Analysis(preface_analysis::Error::DuplicatedOrigin { origin: 0, .. })
    ));
    assert_eq!(err.kind(), ErrorKind::UnsupportedProgram);
}

#[test]
fn duplicated_codecopy_offset_is_unsupported() {
    let runtime = deployed("PUSH1 0x20 PUSH2 0x0020 DUP1 POP PUSH1 0x00 CODECOPY STOP");
    let err = inject(&init_for(&runtime), &runtime, &Prelude::from_bytes(vec![0x5b]), 43)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Analysis(preface_analysis::Error::DuplicatedOrigin {
            site: "CODECOPY",
            origin: 2,
            ..
        })
    ));
    assert_eq!(err.kind(), ErrorKind::UnsupportedProgram);
}

#[test]
fn second_call_return_address_is_patched() {
    // call #1 returns to 0x05, call #2 to 0x0b; both pass a CALLVALUE guard
    let runtime = deployed(
        "PUSH1 0x05 PUSH1 0x0d JUMP JUMPDEST PUSH1 0x0b PUSH1 0x0d JUMP JUMPDEST STOP
         JUMPDEST CALLVALUE ISZERO PUSH1 0x17 JUMPI PUSH1 0x00 DUP1 REVERT JUMPDEST JUMP",
    );
    let out = inject(&init_for(&runtime), &runtime, &Prelude::from_bytes(vec![0x5b]), 43)
        .unwrap();

    let shifted = &out.runtime_code[1..];
    assert_eq!(shifted[0x01], 0x06);
    assert_eq!(shifted[0x07], 0x0c);
    assert_eq!(shifted[0x11], 0x18);
}

#[test]
fn immediate_overflow_is_unsupported() {
    let asm = format!("PUSH1 0xfe JUMP {} JUMPDEST STOP", "INVALID ".repeat(0xfe - 3));
    let runtime = deployed(&asm);
    let err = inject(&init_for(&runtime), &runtime, &Prelude::from_bytes(vec![0x5b; 2]), 43)
        .unwrap_err();
    assert!(matches!(err, Error::PatchOverflow { pc: 0, value: 0xfe, delta: 2, .. }));
    assert_eq!(err.kind(), ErrorKind::UnsupportedProgram);
}

#[test]
fn metadata_length_is_configurable() {
    let runtime = assemble("PUSH1 0x04 JUMP INVALID JUMPDEST STOP").unwrap();
    let out = inject(&init_for(&runtime), &runtime, &Prelude::from_bytes(vec![0x5b]), 0).unwrap();
    assert_eq!(out.runtime_code, vec![0x5b, 0x60, 0x05, 0x56, 0xfe, 0x5b, 0x00]);

    let err = inject(&init_for(&runtime), &runtime, &Prelude::default(), 43).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
}

#[test]
fn init_code_must_embed_deployed_code() {
    let runtime = deployed(TABLE);
    let mut init = init_for(&runtime);
    let last = init.len() - 1;
    init[last] ^= 0xff;
    let err = inject(&init, &runtime, &Prelude::default(), 43).unwrap_err();
    assert!(matches!(err, Error::RuntimeMismatch { offset: 0x0d, .. }));
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
}

#[test]
fn injector_persists_record_only_on_success() {
    let dir = tempfile::tempdir().unwrap();
    write_artifact(dir.path(), "Table", &deployed(TABLE));
    write_artifact(
        dir.path(),
        "Aliased",
        &deployed("PUSH1 0x04 DUP1 JUMP JUMPDEST POP STOP"),
    );

    let out_dir = dir.path().join("injected");
    let injector = Injector::new(InjectorConfig {
        artifact_dir: dir.path().to_path_buf(),
        output_dir: out_dir.clone(),
        ..Default::default()
    });

    let output = injector.run("Table", "0x600050").unwrap();
    let path = output.record_path.clone().unwrap();
    assert_eq!(path, out_dir.join("Table.json"));

    let record: InjectionRecord =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(record.contract_name, "Table");
    assert_eq!(record.prelude, "0x600050");
    assert_eq!(record.prelude_size, 3);
    assert_eq!(&record.bytecode[..], &output.init_code[..]);
    assert_eq!(&record.deployed_bytecode[..3], &[0x60, 0x00, 0x50]);

    assert!(injector.run("Aliased", "0x600050").is_err());
    assert!(!out_dir.join("Aliased.json").exists());
}

#[test]
fn injector_without_persistence_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_artifact(dir.path(), "Table", &deployed(TABLE));
    let injector = Injector::new(InjectorConfig {
        artifact_dir: dir.path().to_path_buf(),
        output_dir: dir.path().join("injected"),
        persist: false,
        ..Default::default()
    });

    let (init, runtime) = injector.transform("Table", "0x").unwrap();
    assert_eq!(runtime, format!("0x{}", hex::encode(deployed(TABLE))));
    assert_eq!(init, format!("0x{}", hex::encode(init_for(&deployed(TABLE)))));
    assert!(!dir.path().join("injected").exists());
}
