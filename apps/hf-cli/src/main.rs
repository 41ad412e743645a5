mod catalog;
mod console;
mod error;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use hf_broker::{BrokerClient, InMemoryBroker, SignalCatalog};
use hf_project::{Effect, Strategy};
use hf_runner::{FixtureRunner, RunnerOptions, StopSignal};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::error::{CliError, CliResult};

const IN_PROCESS_BROKER: &str = "mem://";

#[derive(Parser)]
#[command(name = "hf-fixture")]
#[command(about = "Hardware fixture simulator - answers actuator commands with delayed actual values", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a fixture configuration file
    Validate {
        /// Path to the fixture YAML or JSON file
        config: PathBuf,
    },
    /// List fixtures, served signals and rules
    Signals {
        /// Path to the fixture YAML or JSON file
        config: PathBuf,
    },
    /// Serve the configured actuators until Ctrl-C, SIGTERM or `quit`
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Broker address (mem:// runs the built-in broker with a stdin console)
    #[arg(long, alias = "kuksa", default_value = IN_PROCESS_BROKER)]
    broker: String,
    /// Path to the fixture YAML or JSON file
    #[arg(long, default_value = "fixture.yaml")]
    config: PathBuf,
    /// VSS JSON signal catalog (derived from the config when omitted)
    #[arg(long)]
    vss: Option<PathBuf>,
    /// Graph strategy tick period in milliseconds
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,
    /// Seconds to wait for the broker to become ready
    #[arg(long, default_value_t = 10)]
    ready_timeout_s: u64,
    /// Per-publish timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    publish_timeout_ms: u64,
    /// Bound on waiting for workers at shutdown, in milliseconds
    #[arg(long, default_value_t = 2000)]
    join_timeout_ms: u64,
    /// Capacity of each worker's intake queue
    #[arg(long, default_value_t = 4096)]
    queue_capacity: usize,
    /// Do not read commands from stdin
    #[arg(long)]
    no_console: bool,
}

impl RunArgs {
    fn options(&self) -> RunnerOptions {
        RunnerOptions {
            tick_interval: Duration::from_millis(self.tick_ms),
            ready_timeout: Duration::from_secs(self.ready_timeout_s),
            publish_timeout: Duration::from_millis(self.publish_timeout_ms),
            join_timeout: Duration::from_millis(self.join_timeout_ms),
            queue_capacity: self.queue_capacity,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { config } => cmd_validate(&config),
        Commands::Signals { config } => cmd_signals(&config),
        Commands::Run(args) => cmd_run(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "hf-fixture failed");
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn cmd_validate(config: &Path) -> CliResult<()> {
    println!("Validating fixture config: {}", config.display());
    let fixtures = hf_project::load(config)?;

    println!("✓ Config is valid");
    println!("  Fixtures: {}", fixtures.len());
    println!("  Served actuators: {}", fixtures.served_count());
    println!("  Referenced signals: {}", fixtures.referenced_signals().len());
    Ok(())
}

fn cmd_signals(config: &Path) -> CliResult<()> {
    let fixtures = hf_project::load(config)?;

    for fixture in &fixtures.fixtures {
        let strategy = match fixture.strategy() {
            Strategy::Mirror => "mirror",
            Strategy::Graph => "graph",
        };
        println!("{} ({strategy})", fixture.name);
        println!("  serves:");
        for served in &fixture.served {
            println!("    {served}");
        }
        println!("  rules:");
        for rule in &fixture.rules {
            let deps: Vec<&str> = rule.depends_on.iter().map(|d| d.as_str()).collect();
            let data_type = rule
                .data_type
                .map(|t| t.name())
                .unwrap_or("passthrough");
            let effect = match &rule.effect {
                Effect::Mirror => format!("mirror, delay {:?}", rule.delay),
                Effect::Expression(code) => format!("transform `{code}`"),
            };
            println!(
                "    {} <- [{}] ({data_type}, {effect})",
                rule.output,
                deps.join(", ")
            );
        }
        let external = fixture.external_dependencies();
        if !external.is_empty() {
            println!("  observes:");
            for path in external {
                println!("    {path}");
            }
        }
    }
    Ok(())
}

fn cmd_run(args: &RunArgs) -> CliResult<()> {
    let fixtures = hf_project::load(&args.config)?;
    info!(
        config = %args.config.display(),
        fixtures = fixtures.len(),
        served = fixtures.served_count(),
        "configuration loaded"
    );

    let catalog = match &args.vss {
        Some(path) => catalog::load_vss(path)?,
        None => catalog::from_fixtures(&fixtures),
    };
    let broker = connect(&args.broker, catalog)?;
    let client: Arc<dyn BrokerClient> = Arc::new(broker.connect());

    let mut runner = FixtureRunner::new(args.options());
    runner.start(&fixtures, &broker, client)?;

    let stop = StopSignal::new();
    let on_interrupt = stop.clone();
    ctrlc::set_handler(move || on_interrupt.trigger())?;
    if args.no_console {
        info!("console disabled; serving until Ctrl-C or SIGTERM");
    } else {
        console::spawn(broker.clone(), runner.stats_handle(), stop.clone())
            .map_err(CliError::Console)?;
    }

    runner.run_until(&stop);

    println!("{}", runner.stats());
    Ok(())
}

fn connect(address: &str, catalog: SignalCatalog) -> CliResult<InMemoryBroker> {
    if address == IN_PROCESS_BROKER {
        info!(signals = catalog.len(), "using in-process broker");
        Ok(InMemoryBroker::new(catalog))
    } else {
        Err(CliError::UnsupportedBroker {
            address: address.to_string(),
        })
    }
}
