//! Safe side of the fake host: context, error strings and logging.

use crate::{Context, SpankErrorKind};
use std::fmt::{Display, Write as _};
use std::io::Write;
use tracing::{debug, error, info, trace};

pub const UNKNOWN_ERROR: &str = "Unknown";

/// First line written by [`log_error`] for every message.
pub const ERROR_MARKER: &str = "slurm_error called:";

/// The harness always runs plugins as `srun` would on the submission host.
pub fn context() -> Context {
    Context::Local
}

pub fn strerror(code: u32) -> &'static str {
    match SpankErrorKind::try_from(code) {
        Ok(kind) => kind.message(),
        Err(_) => UNKNOWN_ERROR,
    }
}

pub enum LogLevel {
    Error,
    Info,
    Verbose,
    Debug,
    Debug2,
    Debug3,
}

/// Forwards a message logged by the plugin through `slurm_info()` and friends.
pub fn spank_log(level: LogLevel, msg: &str) {
    match level {
        LogLevel::Error => error!(target: "plugin", "{}", msg),
        LogLevel::Info => info!(target: "plugin", "{}", msg),
        LogLevel::Verbose | LogLevel::Debug => debug!(target: "plugin", "{}", msg),
        LogLevel::Debug2 | LogLevel::Debug3 => trace!(target: "plugin", "{}", msg),
    }
}

/// Writes the `slurm_error()` trace: the marker, the raw format string and
/// the formatted message, one per line.
///
/// Write failures are ignored.
pub fn log_error<W: Write + ?Sized>(sink: &mut W, fmt: &str, args: &[&dyn Display]) {
    let msg = format_message(fmt, args);
    let _ = writeln!(sink, "{}", ERROR_MARKER);
    let _ = writeln!(sink, "{}", fmt);
    let _ = writeln!(sink, "{}", msg);
    let _ = sink.flush();
}

/// Expands the printf conversions of `fmt` from `args`, in order.
///
/// Integer and string conversions all use the `Display` of the next
/// argument. Length modifiers are accepted and dropped. A conversion with no
/// argument left, or one that is not understood, is copied as is.
pub fn format_message(fmt: &str, args: &[&dyn Display]) -> String {
    let mut out = String::with_capacity(fmt.len());
    let mut args = args.iter();
    let mut chars = fmt.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut directive = String::from("%");
        while let Some(&m) = chars.peek() {
            if matches!(m, 'l' | 'h' | 'z' | 'j' | 't') {
                directive.push(m);
                chars.next();
            } else {
                break;
            }
        }

        match chars.next() {
            Some('%') if directive.len() == 1 => out.push('%'),
            Some(conv @ ('s' | 'd' | 'i' | 'u' | 'c')) => match args.next() {
                Some(arg) => {
                    let _ = write!(out, "{}", arg);
                }
                None => {
                    out.push_str(&directive);
                    out.push(conv);
                }
            },
            Some(other) => {
                out.push_str(&directive);
                out.push(other);
            }
            None => out.push_str(&directive),
        }
    }

    out
}

/// Conversion characters of `fmt`, `%%` excluded.
pub fn conversions(fmt: &str) -> Vec<char> {
    let mut convs = Vec::new();
    let mut chars = fmt.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
        match chars.find(|m| !matches!(m, 'l' | 'h' | 'z' | 'j' | 't')) {
            Some('%') | None => {}
            Some(conv) => convs.push(conv),
        }
    }
    convs
}
