use preface_core::ErrorKind;
use preface_core::artifact::{ArtifactStore, ContractArtifact, METADATA_SUFFIX_LEN};

fn artifact_json(deployed_len: usize) -> String {
    let deployed = "00".repeat(deployed_len);
    serde_json::json!({
        "contractName": "Vault",
        "abi": [{ "type": "fallback" }],
        "bytecode": format!("0x6080{deployed}"),
        "deployedBytecode": format!("0x{deployed}"),
        "sourceMap": "1:2:3"
    })
    .to_string()
}

#[test]
fn runtime_code_strips_metadata_suffix() {
    let artifact = ContractArtifact::from_json(&artifact_json(50)).unwrap();
    assert_eq!(artifact.init_code().len(), 52);
    assert_eq!(artifact.deployed_code().len(), 50);
    assert_eq!(
        artifact.runtime_code(METADATA_SUFFIX_LEN).unwrap().len(),
        50 - METADATA_SUFFIX_LEN
    );
}

#[test]
fn malformed_artifact_json_is_malformed_input() {
    let err = ContractArtifact::from_json(r#"{ "contractName": "Vault" }"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedInput);

    let err = ContractArtifact::from_json(
        r#"{ "contractName": "Vault", "bytecode": "0xzz", "deployedBytecode": "0x" }"#,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
}

#[test]
fn store_paths_are_keyed_by_contract_name() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Vault.json"), artifact_json(4)).unwrap();

    let store = ArtifactStore::new(dir.path(), dir.path().join("injected"));
    assert_eq!(store.artifact_path("Vault"), dir.path().join("Vault.json"));
    assert_eq!(
        store.record_path("Vault"),
        dir.path().join("injected").join("Vault.json")
    );
    assert_eq!(store.load("Vault").unwrap().contract_name, "Vault");
    assert_eq!(store.load("Other").unwrap_err().kind(), ErrorKind::Io);
}
