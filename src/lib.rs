//! Fake Slurm SPANK host for running plugin hooks outside of Slurm
//!
//! The crate provides the handful of host entry points a SPANK plugin links
//! against (`spank_context`, `spank_strerror`, `spank_option_register`,
//! `slurm_error`, ...) and a [`driver::Driver`] that walks a plugin through
//! `slurm_spank_init`, the delivery of its registered option and
//! `slurm_spank_exit`, reporting the value returned at each step.

use byte_strings::c_str;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::error::Error;
use std::ffi::CStr;
use std::fmt;
use std::io;
use std::path::PathBuf;

pub mod driver;
pub mod ffi;
pub mod host;
pub mod logging;
pub mod option;
pub mod plugin;
pub mod spank_sys;

pub use driver::{Driver, Report};
pub use host::LogLevel;
pub use option::{OptionCallback, OptionDescriptor, OptionSlot, RegisteredOption};
pub use plugin::{DynamicPlugin, PluginUnderTest, SymbolLayout};

/// Error codes of the SPANK API.
///
/// These are only ever reported, the harness never branches on them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum SpankErrorKind {
    Success = spank_sys::spank_err_ESPANK_SUCCESS,
    Generic = spank_sys::spank_err_ESPANK_ERROR,
    BadArg = spank_sys::spank_err_ESPANK_BAD_ARG,
    NotTask = spank_sys::spank_err_ESPANK_NOT_TASK,
    EnvExists = spank_sys::spank_err_ESPANK_ENV_EXISTS,
    EnvNotExist = spank_sys::spank_err_ESPANK_ENV_NOEXIST,
    NoSpace = spank_sys::spank_err_ESPANK_NOSPACE,
    NotRemote = spank_sys::spank_err_ESPANK_NOT_REMOTE,
    NoExist = spank_sys::spank_err_ESPANK_NOEXIST,
    NotExecd = spank_sys::spank_err_ESPANK_NOT_EXECD,
    NotAvail = spank_sys::spank_err_ESPANK_NOT_AVAIL,
    NotLocal = spank_sys::spank_err_ESPANK_NOT_LOCAL,
}

impl SpankErrorKind {
    /// Static NUL-terminated description, suitable for handing to C.
    pub fn message_cstr(&self) -> &'static CStr {
        match self {
            SpankErrorKind::Success => c_str!("Success"),
            SpankErrorKind::Generic => c_str!("Generic error"),
            SpankErrorKind::BadArg => c_str!("Bad argument"),
            SpankErrorKind::NotTask => c_str!("Not in task context"),
            SpankErrorKind::EnvExists => c_str!("Environment variable exists"),
            SpankErrorKind::EnvNotExist => c_str!("No such environment variable"),
            SpankErrorKind::NoSpace => c_str!("Buffer too small"),
            SpankErrorKind::NotRemote => c_str!("Valid only in remote context"),
            SpankErrorKind::NoExist => c_str!("Id/PID does not exist on this node"),
            SpankErrorKind::NotExecd => c_str!("Lookup by PID requested, but no tasks running"),
            SpankErrorKind::NotAvail => c_str!("Item not available from this callback"),
            SpankErrorKind::NotLocal => c_str!("Valid only in local or allocator context"),
        }
    }

    pub fn message(&self) -> &'static str {
        self.message_cstr().to_str().unwrap_or(host::UNKNOWN_ERROR)
    }

    pub fn code(self) -> u32 {
        self.into()
    }
}

impl fmt::Display for SpankErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl Error for SpankErrorKind {}

#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum Context {
    // We dont represent error here, as errors are better embedded in Results
    Local = spank_sys::spank_context_S_CTX_LOCAL,
    Remote = spank_sys::spank_context_S_CTX_REMOTE,
    Allocator = spank_sys::spank_context_S_CTX_ALLOCATOR,
    Slurmd = spank_sys::spank_context_S_CTX_SLURMD,
    JobScript = spank_sys::spank_context_S_CTX_JOB_SCRIPT,
}

/// Failures of the harness itself, as opposed to values returned by the
/// plugin under test.
#[derive(Debug)]
pub enum HarnessError {
    Load(PathBuf, libloading::Error),
    MissingSymbol(String, libloading::Error),
    /// Symbol name and the layout it was read with
    InvalidString(String, SymbolLayout),
    Argument(String),
    Io(io::Error),
}

impl Error for HarnessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HarnessError::Load(_, e) | HarnessError::MissingSymbol(_, e) => Some(e),
            HarnessError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarnessError::Load(path, e) => {
                write!(f, "Cannot load plugin {}: {}", path.display(), e)
            }
            HarnessError::MissingSymbol(name, e) => {
                write!(f, "Plugin does not export {}: {}", name, e)
            }
            HarnessError::InvalidString(what, layout) => write!(
                f,
                "Plugin symbol {} is not a valid UTF-8 C string with the {} layout \
                 (try --symbol-layout {})",
                what,
                layout.name(),
                layout.other().name()
            ),
            HarnessError::Argument(arg) => {
                write!(f, "Argument {:?} cannot be converted to a C string", arg)
            }
            HarnessError::Io(e) => write!(f, "Cannot write report: {}", e),
        }
    }
}

impl From<io::Error> for HarnessError {
    fn from(e: io::Error) -> Self {
        HarnessError::Io(e)
    }
}
