//! End to end ethereum tests.
//!
//! Each contract is deployed twice, once as compiled and once with a prelude injected, and
//! every call must behave identically on both deployments.

use color_eyre::Result;
use color_eyre::eyre::eyre;
use preface_core::assembler::assemble;
use revm::bytecode::Bytecode;
use revm::context::TxEnv;
use revm::context::result::{ExecutionResult, Output};
use revm::database::InMemoryDB;
use revm::primitives::{Address, Bytes, KECCAK_EMPTY, TxKind, U256};
use revm::state::AccountInfo;
use revm::{Context, ExecuteEvm, MainBuilder, MainContext};

/// Externally owned account sending every transaction
pub const CALLER: Address = Address::new([0x42; 20]);

/// Address the runtime under test is installed at for calls
pub const CONTRACT: Address = Address::new([0x11; 20]);

/// Non-payable contract that returns the byte stored at its own offset 0x1a, reached through
/// a JUMPI guard and an unconditional JUMP.
pub const GUARDED: &str = "
    CALLVALUE PUSH1 0x0e JUMPI                  # 0x00
    PUSH1 0x01 PUSH1 0x1a PUSH1 0x1f CODECOPY   # 0x04
    PUSH1 0x13 JUMP                             # 0x0b
    JUMPDEST PUSH1 0x00 DUP1 REVERT             # 0x0e
    JUMPDEST PUSH1 0x20 PUSH1 0x00 RETURN       # 0x13
    INVALID                                     # 0x19
";

/// Data appended after [`GUARDED`]'s code, at offset 0x1a.
pub const GUARDED_DATA: &[u8] = &[0x2a];

/// Branches on the first calldata word through PUSH2 targets and returns
/// `(1 or 2, 32 bytes of code from offset 0x2a)`.
pub const DISPATCH: &str = "
    PUSH1 0x00 CALLDATALOAD                     # 0x00
    PUSH2 0x000e JUMPI                          # 0x03
    PUSH2 0x0015 JUMP                           # 0x07
    INVALID INVALID INVALID                     # 0x0b
    JUMPDEST                                    # 0x0e
    PUSH1 0x01 PUSH2 0x0018 JUMP                # 0x0f
    JUMPDEST                                    # 0x15
    PUSH1 0x02                                  # 0x16
    JUMPDEST                                    # 0x18
    PUSH1 0x20 PUSH2 0x002a PUSH1 0x20 CODECOPY # 0x19
    PUSH1 0x00 MSTORE                           # 0x21
    PUSH1 0x40 PUSH1 0x00 RETURN                # 0x24
    INVALID                                     # 0x29
";

/// Data appended after [`DISPATCH`]'s code, at offset 0x2a.
pub const DISPATCH_DATA: &[u8] = &[0xca, 0xfe, 0xba, 0xbe];

/// `a1 65 "bzzr0" 58 20 <32-byte swarm hash> 00 29`
pub fn metadata() -> Vec<u8> {
    let mut suffix = vec![0xa1, 0x65];
    suffix.extend_from_slice(b"bzzr0");
    suffix.extend_from_slice(&[0x58, 0x20]);
    suffix.extend_from_slice(&[0x5a; 32]);
    suffix.extend_from_slice(&[0x00, 0x29]);
    suffix
}

/// Deployed bytecode: assembled code, trailing data, then compiler metadata.
pub fn deployed(asm: &str, data: &[u8]) -> Result<Vec<u8>> {
    let mut code = assemble(asm).map_err(|e| eyre!("Failed to assemble fixture: {}", e))?;
    code.extend_from_slice(data);
    code.extend(metadata());
    Ok(code)
}

/// Solidity-style init code: a non-payable constructor followed by the runtime copy epilogue.
pub fn init_code(runtime: &[u8]) -> Result<Vec<u8>> {
    let mut init = assemble(&format!(
        "PUSH1 0x80 PUSH1 0x40 MSTORE
         CALLVALUE DUP1 ISZERO PUSH1 0x0f JUMPI
         PUSH1 0x00 DUP1 REVERT
         JUMPDEST POP
         PUSH2 0x{:04x} DUP1 PUSH2 0x001f PUSH1 0x00 CODECOPY PUSH1 0x00 RETURN
         INVALID",
        runtime.len()
    ))
    .map_err(|e| eyre!("Failed to assemble constructor: {}", e))?;
    init.extend_from_slice(runtime);
    Ok(init)
}

fn funded_db() -> InMemoryDB {
    let mut db = InMemoryDB::default();
    db.insert_account_info(
        CALLER,
        AccountInfo {
            balance: U256::from(1_000_000_000_000_000_000u128),
            nonce: 0,
            code_hash: KECCAK_EMPTY,
            code: None,
        },
    );
    db
}

/// Runs `init` as a creation transaction and returns the runtime code it deployed.
pub fn deploy(init: &[u8]) -> Result<Bytes> {
    let mut evm = Context::mainnet().with_db(funded_db()).build_mainnet();
    let tx_env = TxEnv {
        caller: CALLER,
        gas_limit: 30_000_000,
        kind: TxKind::Create,
        data: Bytes::copy_from_slice(init),
        value: U256::ZERO,
        nonce: 0,
        ..Default::default()
    };

    let result = evm
        .transact(tx_env)
        .map_err(|e| eyre!("REVM deployment failed: {:?}", e))?;

    match result.result {
        ExecutionResult::Success {
            output: Output::Create(runtime, Some(_)),
            ..
        } => Ok(runtime),
        ExecutionResult::Success { output, .. } => {
            Err(eyre!("Unexpected deployment output: {:?}", output))
        }
        ExecutionResult::Revert { output, .. } => Err(eyre!("Deployment reverted: {:?}", output)),
        ExecutionResult::Halt { reason, .. } => Err(eyre!("Deployment halted: {:?}", reason)),
    }
}

/// Installs `runtime` at [`CONTRACT`] and calls it once.
pub fn call(runtime: &[u8], data: &[u8], value: U256) -> Result<ExecutionResult> {
    let mut db = funded_db();
    db.insert_account_info(
        CONTRACT,
        AccountInfo {
            balance: U256::ZERO,
            nonce: 1,
            code_hash: KECCAK_EMPTY,
            code: Some(Bytecode::new_raw(Bytes::copy_from_slice(runtime))),
        },
    );

    let mut evm = Context::mainnet().with_db(db).build_mainnet();
    let tx_env = TxEnv {
        caller: CALLER,
        gas_limit: 5_000_000,
        kind: TxKind::Call(CONTRACT),
        data: Bytes::copy_from_slice(data),
        value,
        nonce: 0,
        ..Default::default()
    };

    let result = evm
        .transact(tx_env)
        .map_err(|e| eyre!("REVM call failed: {:?}", e))?;
    Ok(result.result)
}

/// Return data of a successful call.
pub fn returned(result: &ExecutionResult) -> Result<Bytes> {
    match result {
        ExecutionResult::Success {
            output: Output::Call(data),
            ..
        } => Ok(data.clone()),
        other => Err(eyre!("Call did not succeed: {:?}", other)),
    }
}

#[cfg(test)]
mod deploy;
