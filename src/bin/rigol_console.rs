
use std::io;
use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;
use log::info;

use rigol::config::load_config;
use rigol::console::Console;
use rigol::devices::ds1000e::DS1000E;
use rigol::transport::visa::VisaTransport;

/// Drive a Rigol DS1000E oscilloscope from the terminal.
///
/// Commands: R (run), S (stop), G (grab channel 1), M (point mode), X (exit).
/// Any other line is sent to the scope as-is and its reply is printed.
#[derive(Parser)]
#[command(name = "rigol-console", version, about)]
struct Cli {
    /// VISA resource string, e.g. USB0::0x1AB1::0x0588::DS1ET164267347::INSTR
    #[arg(short, long)]
    resource: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print a JSON snapshot of the scope settings and exit
    #[arg(long)]
    state: bool,

    /// Log verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> rigol::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "rigol=debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let settings = load_config(cli.config.as_deref(), cli.resource.as_deref())?;
    info!("Opening {}", settings.resource);

    let transport = VisaTransport::open(&settings.resource, settings.timeout())?;
    let mut scope = DS1000E::new(transport).with_settle_delay(settings.settle_delay());

    if cli.state {
        let state = scope.get_full_state()?;
        scope.release()?;
        let json = serde_json::to_string_pretty(&state).map_err(io::Error::from)?;
        println!("{}", json);
        return Ok(());
    }

    let stdin = io::stdin();
    let mut console = Console::new(scope, stdin.lock(), io::stdout())
        .with_timeouts(settings.timeout(), settings.passthrough_timeout());

    console.startup()?;
    console.run()
}
