//! Plugin written directly against the SPANK C ABI, loaded by `spank-harness`
//! to check the exported host symbols end to end.
//!
//! It registers a `--greet=name` option during init and fails its exit hook
//! unless the option value was delivered in between.
#![allow(non_upper_case_globals)]

use libc::{c_char, c_int, c_void};
use std::ffi::CStr;
use std::ptr;
use std::sync::Mutex;

#[repr(C)]
pub struct StaticCStr(*const u8);
unsafe impl Sync for StaticCStr {}

#[no_mangle]
pub static plugin_name: StaticCStr = StaticCStr(b"fixture\0" as *const u8);
#[no_mangle]
pub static plugin_type: StaticCStr = StaticCStr(b"spank\0" as *const u8);

const S_CTX_LOCAL: u32 = 1;
const GREET_VAL: c_int = 42;

#[repr(C)]
struct SpankOption {
    name: *const c_char,
    arginfo: *const c_char,
    usage: *const c_char,
    has_arg: c_int,
    val: c_int,
    cb: Option<unsafe extern "C" fn(c_int, *const c_char, c_int) -> c_int>,
}

extern "C" {
    fn spank_context() -> u32;
    fn spank_strerror(err: u32) -> *const c_char;
    fn spank_option_register(spank: *mut c_void, opt: *mut SpankOption) -> u32;
    fn slurm_error(fmt: *const c_char, ...);
}

static GREETED: Mutex<Option<String>> = Mutex::new(None);

unsafe extern "C" fn greet_cb(val: c_int, optarg: *const c_char, _remote: c_int) -> c_int {
    if val != GREET_VAL || optarg.is_null() {
        return -1;
    }
    let name = CStr::from_ptr(optarg).to_string_lossy().into_owned();
    match GREETED.lock() {
        Ok(mut greeted) => {
            *greeted = Some(name);
            0
        }
        Err(_) => -1,
    }
}

#[no_mangle]
pub unsafe extern "C" fn slurm_spank_init(
    _spank: *mut c_void,
    _ac: c_int,
    _argv: *const *const c_char,
) -> c_int {
    if spank_context() != S_CTX_LOCAL {
        return -1;
    }

    let mut opt = SpankOption {
        name: b"greet\0".as_ptr() as *const c_char,
        arginfo: b"name\0".as_ptr() as *const c_char,
        usage: b"Greet [name] before running tasks\0".as_ptr() as *const c_char,
        has_arg: 1,
        val: GREET_VAL,
        cb: Some(greet_cb),
    };

    match spank_option_register(ptr::null_mut(), &mut opt) {
        0 => 0,
        rc => {
            slurm_error(b"%s\0".as_ptr() as *const c_char, spank_strerror(rc));
            rc as c_int
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn slurm_spank_exit(
    _spank: *mut c_void,
    _ac: c_int,
    _argv: *const *const c_char,
) -> c_int {
    let greeted = GREETED.lock().map(|g| g.is_some()).unwrap_or(false);
    if greeted {
        0
    } else {
        slurm_error(
            b"%s\0".as_ptr() as *const c_char,
            b"greet option was never delivered\0".as_ptr() as *const c_char,
        );
        1
    }
}
