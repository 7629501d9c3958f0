use super::{
    DISPATCH, DISPATCH_DATA, GUARDED, GUARDED_DATA, call, deploy, deployed, init_code, returned,
};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use preface_transform::{InjectionOutput, Prelude, inject};
use revm::context::result::ExecutionResult;
use revm::primitives::U256;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .without_time()
        .try_init();
}

fn inject_into(runtime: &[u8], prelude: &str) -> Result<InjectionOutput> {
    let prelude = Prelude::from_hex(prelude).map_err(|e| eyre!("Bad prelude: {}", e))?;
    inject(&init_code(runtime)?, runtime, &prelude, 43)
        .map_err(|e| eyre!("Injection failed ({}): {}", e.kind(), e))
}

fn word(value: u64) -> Vec<u8> {
    U256::from(value).to_be_bytes::<32>().to_vec()
}

#[test]
fn test_injected_init_code_deploys_injected_runtime() -> Result<()> {
    init_tracing();
    let runtime = deployed(GUARDED, GUARDED_DATA)?;

    let original = deploy(&init_code(&runtime)?)?;
    assert_eq!(&original[..], &runtime[..]);

    let output = inject_into(&runtime, "0x600050")?;
    let injected = deploy(&output.init_code)?;
    assert_eq!(&injected[..], &output.runtime_code[..]);
    assert_eq!(injected.len(), runtime.len() + 3);
    assert_eq!(&injected[..3], &[0x60, 0x00, 0x50]);
    Ok(())
}

#[test]
fn test_guarded_contract_behaves_identically() -> Result<()> {
    init_tracing();
    let runtime = deployed(GUARDED, GUARDED_DATA)?;
    let output = inject_into(&runtime, "0x600050")?;

    for code in [&runtime[..], &output.runtime_code[..]] {
        let data = returned(&call(code, &[], U256::ZERO)?)?;
        assert_eq!(data.len(), 32);
        assert_eq!(data[31], 0x2a);

        let paid = call(code, &[], U256::from(1))?;
        assert!(
            matches!(paid, ExecutionResult::Revert { .. }),
            "payable call must revert, got {paid:?}"
        );
    }
    Ok(())
}

#[test]
fn test_dispatch_contract_behaves_identically() -> Result<()> {
    init_tracing();
    let runtime = deployed(DISPATCH, DISPATCH_DATA)?;
    let output = inject_into(&runtime, "0x5b600160025050")?;
    assert_eq!(output.resolution.jumps.len(), 3);
    assert_eq!(output.resolution.codecopies.len(), 1);

    for (calldata, selected) in [(word(0), 2), (word(7), 1), (Vec::new(), 2)] {
        let before = returned(&call(&runtime, &calldata, U256::ZERO)?)?;
        let after = returned(&call(&output.runtime_code, &calldata, U256::ZERO)?)?;
        assert_eq!(before, after);
        assert_eq!(&before[..32], &word(selected)[..]);
        assert_eq!(&before[32..36], DISPATCH_DATA);
    }
    Ok(())
}

#[test]
fn test_empty_prelude_is_identity() -> Result<()> {
    let runtime = deployed(DISPATCH, DISPATCH_DATA)?;
    let output = inject_into(&runtime, "0x")?;
    assert_eq!(output.runtime_code, runtime);
    assert_eq!(output.init_code, init_code(&runtime)?);
    Ok(())
}

#[test]
fn test_reverting_prelude_blocks_every_call() -> Result<()> {
    // PUSH1 0x00 DUP1 REVERT
    let runtime = deployed(GUARDED, GUARDED_DATA)?;
    let output = inject_into(&runtime, "0x600080fd")?;
    let injected = deploy(&output.init_code)?;
    let result = call(&injected, &[], U256::ZERO)?;
    assert!(matches!(result, ExecutionResult::Revert { .. }));
    Ok(())
}
