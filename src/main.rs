use clap::Parser;
use spank_harness::driver::DEFAULT_OPTARG;
use spank_harness::plugin::PluginArgs;
use spank_harness::{logging, Driver, DynamicPlugin, SymbolLayout};
use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

/// Run the hooks of a Slurm SPANK plugin against a fake host
#[derive(Parser)]
#[command(name = "spank-harness")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Shared object of the plugin under test
    plugin: PathBuf,

    /// Arguments passed to every hook, as plugstack.conf would
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Value delivered to the option registered by the plugin
    #[arg(long, default_value = DEFAULT_OPTARG)]
    optarg: String,

    /// Layout of the plugin_name and plugin_type symbols
    #[arg(long, value_enum, default_value_t = SymbolLayout::Pointer)]
    symbol_layout: SymbolLayout,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    let args = PluginArgs::new(cli.args)?;
    let mut plugin = unsafe { DynamicPlugin::load(&cli.plugin, cli.symbol_layout)? };

    let mut driver = Driver::new(io::stdout().lock()).with_optarg(&cli.optarg)?;
    let report = driver.run(&mut plugin, &args)?;

    Ok(ExitCode::from(report.exit_code()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Cannot initialize logging: {}", e);
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(2)
        }
    }
}
