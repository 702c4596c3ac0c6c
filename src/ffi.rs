//! Host symbols exported to the plugin under test.
//!
//! A plugin resolves these against the harness executable when it is loaded.
//! Functions that are variadic in `slurm/spank.h` are defined with their
//! fixed arguments plus, for the log functions, the single `const char *`
//! argument of the `slurm_xxx("%s", msg)` form that plugins use. On the
//! System V and AAPCS64 calling conventions used by Slurm platforms, those
//! arguments are passed exactly as for a non-variadic call.

use crate::host::{self, LogLevel};
use crate::option::{self, CCallback, OptionDescriptor, OptionSlot};
use crate::spank_sys::{self, spank_context_t, spank_err_t, spank_item_t, spank_option, spank_t};
use crate::SpankErrorKind;
use byte_strings::c_str;
use lazy_static::lazy_static;
use libc::{c_char, c_int};
use std::ffi::CStr;
use std::fmt::Display;
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Hooks the harness knows how to drive.
pub const SUPPORTED_HOOKS: &[&str] = &[
    "slurm_spank_init",
    "slurm_spank_init_post_opt",
    "slurm_spank_exit",
];

lazy_static! {
    // Only populated while a plugin hook runs, see HostScope.
    static ref ACTIVE_SLOT: Mutex<Option<OptionSlot>> = Mutex::new(None);
}

fn active_slot() -> MutexGuard<'static, Option<OptionSlot>> {
    ACTIVE_SLOT.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lends the driver's option slot to the exported host functions for the
/// duration of a plugin call.
///
/// The slot is moved back into the driver's storage when the scope is
/// dropped. A scope entered while another is active shadows it, and the outer
/// slot is lent again when the inner scope ends.
pub struct HostScope<'a> {
    slot: &'a mut OptionSlot,
    shadowed: Option<OptionSlot>,
}

impl<'a> HostScope<'a> {
    pub fn enter(slot: &'a mut OptionSlot) -> HostScope<'a> {
        let shadowed = active_slot().replace(std::mem::take(slot));
        if shadowed.is_some() {
            warn!("Entering a host scope while another one is active");
        }
        HostScope { slot, shadowed }
    }
}

impl Drop for HostScope<'_> {
    fn drop(&mut self) {
        let mut active = active_slot();
        if let Some(slot) = active.take() {
            *self.slot = slot;
        }
        *active = self.shadowed.take();
    }
}

/// Reads an optional C string, `Err` if it is not valid UTF-8.
unsafe fn opt_str<'a>(ptr: *const c_char) -> Result<Option<&'a str>, SpankErrorKind> {
    if ptr.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(Some)
        .map_err(|_| SpankErrorKind::BadArg)
}

unsafe fn register_c_option(opt: *const spank_option) -> Result<(), SpankErrorKind> {
    let opt = opt.as_ref().ok_or(SpankErrorKind::BadArg)?;
    let name = opt_str(opt.name)?.ok_or(SpankErrorKind::BadArg)?;
    let usage = opt_str(opt.usage)?;
    let has_arg = opt.has_arg != 0;
    // arginfo is only looked at when the option takes a value
    let arginfo = if has_arg { opt_str(opt.arginfo)? } else { None };

    let mut desc = OptionDescriptor::new(name)
        .raw_arg(has_arg, arginfo)
        .val(opt.val);
    if let Some(usage) = usage {
        desc = desc.usage(usage);
    }
    if let Some(cb) = opt.cb {
        desc = desc.callback(CCallback(cb));
    }

    let mut active = active_slot();
    let slot = active.as_mut().ok_or(SpankErrorKind::NotAvail)?;
    option::register(slot, desc)
}

#[no_mangle]
pub extern "C" fn spank_context() -> spank_context_t {
    let ctx = host::context();
    debug!(?ctx, "spank_context");
    ctx.into()
}

#[no_mangle]
pub extern "C" fn spank_strerror(err: spank_err_t) -> *const c_char {
    match SpankErrorKind::try_from(err) {
        Ok(kind) => kind.message_cstr().as_ptr(),
        Err(_) => c_str!("Unknown").as_ptr(),
    }
}

/// # Safety
///
/// `opt` must be null or point to a valid `struct spank_option` whose string
/// members are null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn spank_option_register(
    _spank: spank_t,
    opt: *mut spank_option,
) -> spank_err_t {
    match register_c_option(opt) {
        Ok(()) => spank_sys::spank_err_ESPANK_SUCCESS,
        Err(e) => {
            debug!("spank_option_register failed: {}", e);
            e.code()
        }
    }
}

unsafe fn c_log_message(fmt: *const c_char, arg: *const c_char) -> (String, Option<String>) {
    let fmt = if fmt.is_null() {
        String::new()
    } else {
        CStr::from_ptr(fmt).to_string_lossy().into_owned()
    };
    let arg = if !arg.is_null() && host::conversions(&fmt) == ['s'] {
        Some(CStr::from_ptr(arg).to_string_lossy().into_owned())
    } else {
        None
    };
    (fmt, arg)
}

/// # Safety
///
/// `fmt` must be null or a NUL-terminated string. When it holds exactly one
/// `%s` conversion, `arg` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn slurm_error(fmt: *const c_char, arg: *const c_char) {
    let (fmt, arg) = c_log_message(fmt, arg);
    let mut stderr = io::stderr().lock();
    match arg {
        Some(ref arg) => host::log_error(&mut stderr, &fmt, &[arg as &dyn Display]),
        None => host::log_error(&mut stderr, &fmt, &[]),
    }
}

macro_rules! slurm_log_stub {
    ($c_fn:ident, $level:expr) => {
        /// # Safety
        ///
        /// Same contract as [`slurm_error`].
        #[no_mangle]
        pub unsafe extern "C" fn $c_fn(fmt: *const c_char, arg: *const c_char) {
            let (fmt, arg) = c_log_message(fmt, arg);
            let msg = match arg {
                Some(ref arg) => host::format_message(&fmt, &[arg as &dyn Display]),
                None => host::format_message(&fmt, &[]),
            };
            host::spank_log($level, &msg);
        }
    };
}

slurm_log_stub!(slurm_info, LogLevel::Info);
slurm_log_stub!(slurm_verbose, LogLevel::Verbose);
slurm_log_stub!(slurm_debug, LogLevel::Debug);
slurm_log_stub!(slurm_debug2, LogLevel::Debug2);
slurm_log_stub!(slurm_debug3, LogLevel::Debug3);

#[no_mangle]
pub extern "C" fn spank_remote(_spank: spank_t) -> c_int {
    0
}

/// # Safety
///
/// `symbol` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn spank_symbol_supported(symbol: *const c_char) -> c_int {
    if symbol.is_null() {
        return -1;
    }
    let symbol = CStr::from_ptr(symbol).to_string_lossy();
    SUPPORTED_HOOKS.contains(&symbol.as_ref()) as c_int
}

// Items, options and environments of a job do not exist outside of Slurm: the
// remaining entry points only report the error a local context would get.
macro_rules! spank_unavailable {
    ($c_fn:ident ( $($arg:ident : $ty:ty),* ) => $err:path) => {
        #[no_mangle]
        pub extern "C" fn $c_fn(_spank: spank_t, $($arg: $ty),*) -> spank_err_t {
            $(let _ = $arg;)*
            debug!("{} is not available in the harness", stringify!($c_fn));
            $err
        }
    };
}

spank_unavailable!(spank_get_item(item: spank_item_t) => spank_sys::spank_err_ESPANK_NOT_AVAIL);
spank_unavailable!(spank_option_getopt(
    opt: *mut spank_option,
    optarg: *mut *mut c_char
) => spank_sys::spank_err_ESPANK_NOT_AVAIL);
spank_unavailable!(spank_getenv(
    var: *const c_char,
    buf: *mut c_char,
    len: c_int
) => spank_sys::spank_err_ESPANK_NOT_REMOTE);
spank_unavailable!(spank_setenv(
    var: *const c_char,
    val: *const c_char,
    overwrite: c_int
) => spank_sys::spank_err_ESPANK_NOT_REMOTE);
spank_unavailable!(spank_unsetenv(var: *const c_char) => spank_sys::spank_err_ESPANK_NOT_REMOTE);
spank_unavailable!(spank_job_control_getenv(
    var: *const c_char,
    buf: *mut c_char,
    len: c_int
) => spank_sys::spank_err_ESPANK_ENV_NOEXIST);
spank_unavailable!(spank_job_control_setenv(
    var: *const c_char,
    val: *const c_char,
    overwrite: c_int
) => spank_sys::spank_err_ESPANK_NOT_AVAIL);
spank_unavailable!(spank_job_control_unsetenv(var: *const c_char) => spank_sys::spank_err_ESPANK_NOT_AVAIL);
spank_unavailable!(spank_prepend_task_argv(
    argc: c_int,
    argv: *const *const c_char
) => spank_sys::spank_err_ESPANK_NOT_TASK);

/// Addresses of every exported host function.
///
/// The loader references this table so the linker keeps the exports in the
/// executable even though nothing in the harness calls them.
pub struct HostSymbols(pub &'static [*const ()]);
unsafe impl Sync for HostSymbols {}

pub static HOST_SYMBOLS: HostSymbols = HostSymbols(&[
    spank_context as *const (),
    spank_strerror as *const (),
    spank_option_register as *const (),
    slurm_error as *const (),
    slurm_info as *const (),
    slurm_verbose as *const (),
    slurm_debug as *const (),
    slurm_debug2 as *const (),
    slurm_debug3 as *const (),
    spank_remote as *const (),
    spank_symbol_supported as *const (),
    spank_get_item as *const (),
    spank_option_getopt as *const (),
    spank_getenv as *const (),
    spank_setenv as *const (),
    spank_unsetenv as *const (),
    spank_job_control_getenv as *const (),
    spank_job_control_setenv as *const (),
    spank_job_control_unsetenv as *const (),
    spank_prepend_task_argv as *const (),
]);
