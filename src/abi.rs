//! Purpose: C ABI boundary the host calls to drive the embedded finality node.
//! Exports: `f3_sidecar_run`, `f3_sidecar_cancel`, `f3_sidecar_state`, `run_on`, `run_raw`,
//! `RawStartArgs`.
//! Role: Translates primitive arguments into `StartParams` and the outcome into a bool.
//! Invariants: Nothing unwinds across the boundary; every failure becomes `false`.
//! Invariants: Failure detail is logged here and not returned to the host.
//! Notes: `f3_sidecar_run` blocks the calling thread for the node's lifetime.
use std::ffi::{CStr, c_char};

use crate::error::{Error, ErrorKind};
use crate::node::Sidecar;
use crate::params::StartParams;
use crate::startup::process_sidecar;

/// Start arguments exactly as they arrive from the host.
#[derive(Clone, Copy, Debug)]
pub struct RawStartArgs {
    pub rpc_endpoint: *const c_char,
    pub f3_rpc_endpoint: *const c_char,
    pub initial_power_table: *const c_char,
    pub bootstrap_epoch: i64,
    pub finality: i64,
    pub db: *const c_char,
    pub manifest_server: *const c_char,
}

#[unsafe(no_mangle)]
pub extern "C" fn f3_sidecar_run(
    rpc_endpoint: *const c_char,
    f3_rpc_endpoint: *const c_char,
    initial_power_table: *const c_char,
    bootstrap_epoch: i64,
    finality: i64,
    db: *const c_char,
    manifest_server: *const c_char,
) -> bool {
    let args = RawStartArgs {
        rpc_endpoint,
        f3_rpc_endpoint,
        initial_power_table,
        bootstrap_epoch,
        finality,
        db,
        manifest_server,
    };
    match process_sidecar() {
        // SAFETY: the host passes NUL-terminated strings that outlive this call.
        Some(sidecar) => unsafe { run_raw(sidecar, &args) },
        None => report(
            Error::new(ErrorKind::NotInitialized).with_message("sidecar is not initialized"),
        ),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn f3_sidecar_cancel() -> bool {
    match process_sidecar() {
        Some(sidecar) => {
            sidecar.cancel();
            true
        }
        None => false,
    }
}

/// `NodeState` code of the process sidecar, or -1 before initialization.
#[unsafe(no_mangle)]
pub extern "C" fn f3_sidecar_state() -> i32 {
    process_sidecar().map_or(-1, |sidecar| sidecar.state().code())
}

/// Runs `sidecar` with already validated parameters; `true` only when the node returned without error.
pub fn run_on(sidecar: &Sidecar, params: StartParams) -> bool {
    match sidecar.run(params) {
        Ok(()) => true,
        Err(err) => report(err),
    }
}

/// Decodes host arguments and runs `sidecar`, reducing every failure to `false`.
///
/// # Safety
///
/// Every non-null string pointer in `args` must point to a NUL-terminated buffer that stays
/// valid and unmodified until this call returns. Null pointers are reported as usage errors.
pub unsafe fn run_raw(sidecar: &Sidecar, args: &RawStartArgs) -> bool {
    // SAFETY: forwarded from this function's contract.
    match unsafe { decode_args(args) } {
        Ok(params) => run_on(sidecar, params),
        Err(err) => report(err),
    }
}

/// # Safety
///
/// Same contract as `run_raw`.
unsafe fn decode_args(args: &RawStartArgs) -> Result<StartParams, Error> {
    // SAFETY: each field is covered by the caller's contract.
    unsafe {
        StartParams::new(
            read_str("rpc_endpoint", &args.rpc_endpoint)?,
            read_str("f3_rpc_endpoint", &args.f3_rpc_endpoint)?,
            read_str("initial_power_table", &args.initial_power_table)?,
            args.bootstrap_epoch,
            args.finality,
            read_str("db", &args.db)?,
            read_str("manifest_server", &args.manifest_server)?,
        )
    }
}

/// Borrows the string behind `input` for as long as the pointer itself is borrowed.
///
/// # Safety
///
/// A non-null `*input` must point to a NUL-terminated buffer valid for `'a`.
unsafe fn read_str<'a>(field: &str, input: &'a *const c_char) -> Result<&'a str, Error> {
    if input.is_null() {
        return Err(Error::new(ErrorKind::Usage).with_message(format!("{field} is null")));
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract; the borrow is tied to `input`.
    unsafe { CStr::from_ptr(*input) }
        .to_str()
        .map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("{field} is not valid UTF-8"))
                .with_source(err)
        })
}

fn report(err: Error) -> bool {
    tracing::error!(
        kind = ?err.kind(),
        code = crate::error::error_kind_code(err.kind()),
        error = %err,
        "boundary run failed"
    );
    false
}
