//! Plugins the driver can run.

use crate::ffi::{self, HostScope};
use crate::option::OptionSlot;
use crate::spank_sys::spank_hook_f;
use crate::HarnessError;
use libc::{c_char, c_int};
use libloading::{Library, Symbol};
use std::ffi::{CStr, CString};
use std::path::Path;
use std::ptr;
use tracing::{debug, info};

/// Arguments handed to every hook, kept alive as a C `argv` array.
pub struct PluginArgs {
    args: Vec<String>,
    // Owns the storage argv points into
    _c_args: Vec<CString>,
    argv: Vec<*const c_char>,
}

impl PluginArgs {
    pub fn new<I, S>(args: I) -> Result<Self, HarnessError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let c_args = args
            .iter()
            .map(|arg| CString::new(arg.as_str()).map_err(|_| HarnessError::Argument(arg.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        let mut argv: Vec<*const c_char> = c_args.iter().map(|arg| arg.as_ptr()).collect();
        argv.push(ptr::null());

        Ok(PluginArgs {
            args,
            _c_args: c_args,
            argv,
        })
    }

    pub fn as_slice(&self) -> &[String] {
        &self.args
    }

    pub fn argc(&self) -> c_int {
        self.args.len() as c_int
    }

    /// NULL-terminated, valid for as long as `self`.
    pub fn argv(&self) -> *const *const c_char {
        self.argv.as_ptr()
    }
}

/// The lifecycle hooks of a SPANK plugin, as seen by the driver.
///
/// Each hook receives the driver's option slot: a plugin registers its option
/// into it, and the driver later delivers a value through the registered
/// callback.
pub trait PluginUnderTest {
    fn name(&self) -> &str;
    fn plugin_type(&self) -> &str;
    fn init(&mut self, options: &mut OptionSlot, args: &PluginArgs) -> c_int;
    /// Called once option values have been delivered. `None` when the plugin
    /// has no such hook.
    #[allow(unused_variables)]
    fn init_post_opt(&mut self, options: &mut OptionSlot, args: &PluginArgs) -> Option<c_int> {
        None
    }
    fn exit(&mut self, options: &mut OptionSlot, args: &PluginArgs) -> c_int;
}

/// How `plugin_name` and `plugin_type` are laid out in the shared object.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SymbolLayout {
    /// `char *plugin_name`, as exported by Rust plugins built on `slurm-spank`
    #[default]
    Pointer,
    /// `const char plugin_name[]`, as declared by the C `SPANK_PLUGIN` macro
    Array,
}

impl SymbolLayout {
    pub fn name(self) -> &'static str {
        match self {
            SymbolLayout::Pointer => "pointer",
            SymbolLayout::Array => "array",
        }
    }

    pub fn other(self) -> SymbolLayout {
        match self {
            SymbolLayout::Pointer => SymbolLayout::Array,
            SymbolLayout::Array => SymbolLayout::Pointer,
        }
    }
}

/// A SPANK plugin loaded from a shared object.
pub struct DynamicPlugin {
    name: String,
    plugin_type: String,
    init: spank_hook_f,
    init_post_opt: Option<spank_hook_f>,
    exit: spank_hook_f,
    // Dropped last, the hooks above point into it
    _library: Library,
}

impl DynamicPlugin {
    /// Loads the plugin at `path` and resolves its symbols.
    ///
    /// # Safety
    ///
    /// Loading runs the library's initializers, and the exported symbols are
    /// trusted to have the types SPANK defines for them.
    pub unsafe fn load(path: &Path, layout: SymbolLayout) -> Result<Self, HarnessError> {
        info!("Loading plugin {}", path.display());
        let _ = std::hint::black_box(&ffi::HOST_SYMBOLS);
        let library =
            Library::new(path).map_err(|e| HarnessError::Load(path.to_path_buf(), e))?;

        let name = read_c_string(&library, "plugin_name", layout)?;
        let plugin_type = read_c_string(&library, "plugin_type", layout)?;
        let init = get_hook(&library, "slurm_spank_init")?;
        let exit = get_hook(&library, "slurm_spank_exit")?;
        let init_post_opt = get_hook(&library, "slurm_spank_init_post_opt").ok();

        debug!(
            name = %name,
            plugin_type = %plugin_type,
            has_init_post_opt = init_post_opt.is_some(),
            "Resolved plugin symbols"
        );

        Ok(DynamicPlugin {
            name,
            plugin_type,
            init,
            init_post_opt,
            exit,
            _library: library,
        })
    }

    fn call(hook: spank_hook_f, options: &mut OptionSlot, args: &PluginArgs) -> c_int {
        let _scope = HostScope::enter(options);
        // The fake host carries no state, plugins get a NULL handle
        unsafe { hook(ptr::null_mut(), args.argc(), args.argv()) }
    }
}

unsafe fn get_hook(library: &Library, name: &str) -> Result<spank_hook_f, HarnessError> {
    let symbol: Symbol<spank_hook_f> = library
        .get(name.as_bytes())
        .map_err(|e| HarnessError::MissingSymbol(name.to_string(), e))?;
    Ok(*symbol)
}

unsafe fn read_c_string(
    library: &Library,
    name: &str,
    layout: SymbolLayout,
) -> Result<String, HarnessError> {
    let missing = |e| HarnessError::MissingSymbol(name.to_string(), e);
    let ptr: *const c_char = match layout {
        SymbolLayout::Pointer => {
            let symbol: Symbol<*const *const c_char> =
                library.get(name.as_bytes()).map_err(missing)?;
            **symbol
        }
        SymbolLayout::Array => {
            let symbol: Symbol<*const c_char> = library.get(name.as_bytes()).map_err(missing)?;
            *symbol
        }
    };

    if ptr.is_null() {
        return Err(HarnessError::InvalidString(name.to_string(), layout));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(str::to_string)
        .map_err(|_| HarnessError::InvalidString(name.to_string(), layout))
}

impl PluginUnderTest for DynamicPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn plugin_type(&self) -> &str {
        &self.plugin_type
    }

    fn init(&mut self, options: &mut OptionSlot, args: &PluginArgs) -> c_int {
        Self::call(self.init, options, args)
    }

    fn init_post_opt(&mut self, options: &mut OptionSlot, args: &PluginArgs) -> Option<c_int> {
        self.init_post_opt
            .map(|hook| Self::call(hook, options, args))
    }

    fn exit(&mut self, options: &mut OptionSlot, args: &PluginArgs) -> c_int {
        Self::call(self.exit, options, args)
    }
}
