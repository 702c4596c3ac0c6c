//! C ABI of the Slurm SPANK host interface, as declared in `slurm/spank.h`.
#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]

use libc::{c_char, c_int, c_void};

pub type spank_t = *mut c_void;

pub type spank_err_t = u32;
pub const spank_err_ESPANK_SUCCESS: spank_err_t = 0;
pub const spank_err_ESPANK_ERROR: spank_err_t = 1;
pub const spank_err_ESPANK_BAD_ARG: spank_err_t = 2;
pub const spank_err_ESPANK_NOT_TASK: spank_err_t = 3;
pub const spank_err_ESPANK_ENV_EXISTS: spank_err_t = 4;
pub const spank_err_ESPANK_ENV_NOEXIST: spank_err_t = 5;
pub const spank_err_ESPANK_NOSPACE: spank_err_t = 6;
pub const spank_err_ESPANK_NOT_REMOTE: spank_err_t = 7;
pub const spank_err_ESPANK_NOEXIST: spank_err_t = 8;
pub const spank_err_ESPANK_NOT_EXECD: spank_err_t = 9;
pub const spank_err_ESPANK_NOT_AVAIL: spank_err_t = 10;
pub const spank_err_ESPANK_NOT_LOCAL: spank_err_t = 11;

pub type spank_context_t = u32;
pub const spank_context_S_CTX_ERROR: spank_context_t = 0;
pub const spank_context_S_CTX_LOCAL: spank_context_t = 1;
pub const spank_context_S_CTX_REMOTE: spank_context_t = 2;
pub const spank_context_S_CTX_ALLOCATOR: spank_context_t = 3;
pub const spank_context_S_CTX_SLURMD: spank_context_t = 4;
pub const spank_context_S_CTX_JOB_SCRIPT: spank_context_t = 5;

pub type spank_item_t = u32;

pub type spank_opt_cb_f =
    Option<unsafe extern "C" fn(val: c_int, optarg: *const c_char, remote: c_int) -> c_int>;

/// Plugin hook signature shared by every `slurm_spank_*` entry point.
pub type spank_hook_f =
    unsafe extern "C" fn(spank: spank_t, ac: c_int, argv: *const *const c_char) -> c_int;

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct spank_option {
    pub name: *const c_char,
    pub arginfo: *const c_char,
    pub usage: *const c_char,
    pub has_arg: c_int,
    pub val: c_int,
    pub cb: spank_opt_cb_f,
}
