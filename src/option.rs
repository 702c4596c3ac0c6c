//! Capture of the option a plugin registers with the host.
//!
//! Slurm keeps a table of every option registered by every plugin. The harness
//! only needs to hand one value back to the plugin, so it keeps a single slot:
//! each registration replaces the previous one.

use crate::SpankErrorKind;
use libc::{c_char, c_int};
use std::ffi::CStr;
use std::fmt;
use std::ptr;
use tracing::debug;

/// Something the host can call back to deliver an option value.
pub trait OptionCallback: Send {
    fn call(&mut self, val: c_int, optarg: Option<&CStr>, remote: bool) -> c_int;
}

impl<F> OptionCallback for F
where
    F: FnMut(c_int, Option<&CStr>, bool) -> c_int + Send,
{
    fn call(&mut self, val: c_int, optarg: Option<&CStr>, remote: bool) -> c_int {
        self(val, optarg, remote)
    }
}

/// Callback supplied through the C ABI by a loaded plugin.
#[derive(Clone, Copy)]
pub struct CCallback(pub unsafe extern "C" fn(c_int, *const c_char, c_int) -> c_int);

impl OptionCallback for CCallback {
    fn call(&mut self, val: c_int, optarg: Option<&CStr>, remote: bool) -> c_int {
        let optarg = optarg.map_or(ptr::null(), |arg| arg.as_ptr());
        // The pointer was handed to us by the plugin whose hooks we are
        // already calling, it is trusted the same way.
        unsafe { (self.0)(val, optarg, remote as c_int) }
    }
}

/// Description of an option, borrowed from the registering plugin.
pub struct OptionDescriptor<'a> {
    name: &'a str,
    usage: Option<&'a str>,
    arginfo: Option<&'a str>,
    has_arg: bool,
    val: c_int,
    callback: Option<Box<dyn OptionCallback>>,
}

impl<'a> OptionDescriptor<'a> {
    pub fn new(name: &'a str) -> Self {
        OptionDescriptor {
            name,
            usage: None,
            arginfo: None,
            has_arg: false,
            val: 0,
            callback: None,
        }
    }
    pub fn usage(mut self, usage: &'a str) -> Self {
        self.usage = Some(usage);
        self
    }
    pub fn takes_value(mut self, arg_name: &'a str) -> Self {
        self.has_arg = true;
        self.arginfo = Some(arg_name);
        self
    }
    /// Sets the raw `has_arg` flag and argument description independently,
    /// as they arrive through `struct spank_option`.
    pub fn raw_arg(mut self, has_arg: bool, arginfo: Option<&'a str>) -> Self {
        self.has_arg = has_arg;
        self.arginfo = arginfo;
        self
    }
    pub fn val(mut self, val: c_int) -> Self {
        self.val = val;
        self
    }
    pub fn callback<C: OptionCallback + 'static>(mut self, callback: C) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }
}

/// An option held by the host after registration. Strings are owned copies.
pub struct RegisteredOption {
    pub name: String,
    pub usage: Option<String>,
    pub arginfo: Option<String>,
    pub has_arg: bool,
    pub val: c_int,
    callback: Option<Box<dyn OptionCallback>>,
}

impl RegisteredOption {
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }
}

impl fmt::Debug for RegisteredOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredOption")
            .field("name", &self.name)
            .field("usage", &self.usage)
            .field("arginfo", &self.arginfo)
            .field("has_arg", &self.has_arg)
            .field("val", &self.val)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Holds at most one [`RegisteredOption`].
#[derive(Default, Debug)]
pub struct OptionSlot {
    current: Option<RegisteredOption>,
}

impl OptionSlot {
    pub fn get(&self) -> Option<&RegisteredOption> {
        self.current.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Calls the registered callback with its stored `val`.
    ///
    /// Returns `None` when nothing was registered or the option came without
    /// a callback.
    pub fn invoke(&mut self, optarg: Option<&CStr>, remote: bool) -> Option<c_int> {
        let option = self.current.as_mut()?;
        let val = option.val;
        let callback = option.callback.as_mut()?;
        debug!(option = %option.name, val, ?optarg, remote, "Invoking option callback");
        Some(callback.call(val, optarg, remote))
    }
}

/// Registers `desc` into `slot`, replacing whatever it held.
///
/// The argument description is copied only when the option takes a value.
/// Returns `BadArg` for an empty name, which Slurm rejects as well.
pub fn register(slot: &mut OptionSlot, desc: OptionDescriptor<'_>) -> Result<(), SpankErrorKind> {
    if desc.name.is_empty() {
        return Err(SpankErrorKind::BadArg);
    }

    let arginfo = match (desc.has_arg, desc.arginfo) {
        (true, Some(info)) => Some(info.to_owned()),
        _ => None,
    };

    debug!(
        name = desc.name,
        has_arg = desc.has_arg,
        ?arginfo,
        val = desc.val,
        "Registering option"
    );

    slot.current = Some(RegisteredOption {
        name: desc.name.to_owned(),
        usage: desc.usage.map(str::to_owned),
        arginfo,
        has_arg: desc.has_arg,
        val: desc.val,
        callback: desc.callback,
    });
    Ok(())
}
