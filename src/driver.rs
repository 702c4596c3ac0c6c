//! Runs one plugin lifecycle and reports what each hook returned.

use crate::option::OptionSlot;
use crate::plugin::{PluginArgs, PluginUnderTest};
use crate::HarnessError;
use libc::c_int;
use std::ffi::CString;
use std::io::Write;
use tracing::{info, warn};

/// Value delivered to the registered option when none is given.
pub const DEFAULT_OPTARG: &str = "test_arg";

/// Return values collected during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub init: c_int,
    /// `None` when no option callback was registered.
    pub option_callback: Option<c_int>,
    pub init_post_opt: Option<c_int>,
    pub exit: c_int,
}

impl Report {
    /// Process exit code: the value returned by the exit hook, or 1 when it
    /// does not fit.
    pub fn exit_code(&self) -> u8 {
        u8::try_from(self.exit).unwrap_or(1)
    }
}

pub struct Driver<W> {
    out: W,
    optarg: CString,
    options: OptionSlot,
}

impl<W: Write> Driver<W> {
    pub fn new(out: W) -> Self {
        Driver {
            out,
            optarg: CString::new(DEFAULT_OPTARG).unwrap_or_default(),
            options: OptionSlot::default(),
        }
    }

    /// Value delivered to the registered option callback.
    pub fn with_optarg(mut self, optarg: &str) -> Result<Self, HarnessError> {
        self.optarg =
            CString::new(optarg).map_err(|_| HarnessError::Argument(optarg.to_string()))?;
        Ok(self)
    }

    /// Option registered during the last run.
    pub fn options(&self) -> &OptionSlot {
        &self.options
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Drives `plugin` through init, option delivery and exit.
    ///
    /// A non-zero value from a hook is reported and the sequence goes on.
    pub fn run<P>(&mut self, plugin: &mut P, args: &PluginArgs) -> Result<Report, HarnessError>
    where
        P: PluginUnderTest + ?Sized,
    {
        self.options.clear();

        writeln!(self.out, "plugin_name: {}", plugin.name())?;
        writeln!(self.out, "plugin_type: {}", plugin.plugin_type())?;

        info!(args = ?args.as_slice(), "Calling slurm_spank_init");
        let init = plugin.init(&mut self.options, args);
        writeln!(self.out, "slurm_spank_init returned {}", init)?;
        if init != 0 {
            warn!("slurm_spank_init failed with {}", init);
        }

        if let Some(option) = self.options.get() {
            info!(?option, "Plugin registered an option");
        }
        let option_callback = self.options.invoke(Some(&self.optarg), false);
        if let Some(rc) = option_callback {
            writeln!(self.out, "option callback returned {}", rc)?;
        }

        let init_post_opt = plugin.init_post_opt(&mut self.options, args);
        if let Some(rc) = init_post_opt {
            writeln!(self.out, "slurm_spank_init_post_opt returned {}", rc)?;
        }

        info!("Calling slurm_spank_exit");
        let exit = plugin.exit(&mut self.options, args);
        writeln!(self.out, "slurm_spank_exit returned {}", exit)?;
        if exit != 0 {
            warn!("slurm_spank_exit failed with {}", exit);
        }
        self.out.flush()?;

        Ok(Report {
            init,
            option_callback,
            init_post_opt,
            exit,
        })
    }
}
