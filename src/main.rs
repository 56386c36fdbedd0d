use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use otg_hal::config::{ConfigStore, DEFAULT_CONFIG_PATH};
use otg_hal::events::{GadgetCallback, PortCallback, PortCallbackExt, PortListener};
use otg_hal::otg::{FunctionSet, PortRole, PortStatus, PortStatusExt, Status, SysfsNodes};
use otg_hal::state::HalState;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// otg-hal command line arguments
#[derive(Parser, Debug)]
#[command(name = "otg-hal")]
#[command(version, about = "USB OTG role switch and gadget function control", long_about = None)]
struct CliArgs {
    /// Configuration file (JSON)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Also print bus events matching TOPIC (`*`, `gadget.*`, `port.status_changed`, ...)
    #[arg(short = 'e', long, value_name = "TOPIC")]
    events: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a gadget function set, e.g. `adb,mtp` or `none`
    SetFunctions {
        functions: FunctionSet,
        /// Advisory timeout passed along with the request
        #[arg(long, default_value_t = 0)]
        timeout_ms: u64,
    },
    /// Switch the port role (host, device, source, sink, ufp, dfp)
    SwitchRole {
        role: PortRole,
        #[arg(long)]
        port: Option<String>,
    },
    /// Report the port status
    PortStatus,
    /// Report the gadget functions known to this process
    Functions,
}

/// Prints every notification as a JSON line
struct PrintListener;

fn print(value: serde_json::Value) -> otg_hal::Result<()> {
    println!("{}", serde_json::to_string(&value)?);
    Ok(())
}

impl GadgetCallback for PrintListener {
    fn current_functions(&self, functions: FunctionSet, status: Status) -> otg_hal::Result<()> {
        print(json!({ "functions": functions.to_string(), "status": status }))
    }

    fn set_functions_result(&self, functions: FunctionSet, status: Status) -> otg_hal::Result<()> {
        print(json!({ "functions": functions.to_string(), "status": status }))
    }
}

impl PortCallback for PrintListener {
    fn role_switch_status(&self, port_name: &str, role: PortRole, status: Status) -> otg_hal::Result<()> {
        print(json!({ "port": port_name, "role": role, "status": status }))
    }

    fn port_status_changed(&self, ports: &[PortStatus], status: Status) -> otg_hal::Result<()> {
        print(json!({ "ports": ports, "status": status }))
    }
}

impl PortCallbackExt for PrintListener {
    fn port_status_changed_ext(&self, ports: &[PortStatusExt], status: Status) -> otg_hal::Result<()> {
        print(json!({ "ports": ports, "status": status }))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose);

    tracing::debug!("Starting otg-hal v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.unwrap_or_else(get_config_path);
    let store = ConfigStore::load(&config_path).await?;
    let config = store.get();

    let state = HalState::new(&config, Arc::new(SysfsNodes));

    let mut events = state.events.subscribe();

    let listener = Arc::new(PrintListener);
    state
        .roles
        .set_callback(Some(PortListener::extended(&listener)));

    let status = match args.command {
        Command::SetFunctions {
            functions,
            timeout_ms,
        } => {
            state
                .gadget
                .set_functions(
                    functions,
                    Duration::from_millis(timeout_ms),
                    Some(listener.clone() as Arc<dyn GadgetCallback>),
                )
                .await
        }
        Command::SwitchRole { role, port } => {
            let port = port.unwrap_or_else(|| config.role.port_name.clone());
            state.roles.switch_role(&port, role)
        }
        Command::PortStatus => state.roles.query_port_status().1,
        Command::Functions => {
            let callback: Arc<dyn GadgetCallback> = listener.clone();
            state.gadget.get_current_functions(&callback).status()
        }
    };

    state.roles.set_callback(None);

    // Every notification was published synchronously; drain what was queued
    while let Ok(event) = events.try_recv() {
        tracing::debug!("event {}: {}", event.event_name(), event.status());
        if args.events.as_deref().is_some_and(|topic| event.matches_topic(topic)) {
            println!("{}", serde_json::to_string(&event)?);
        }
    }

    match status {
        Status::Success | Status::FunctionsApplied | Status::FunctionsNotApplied => Ok(()),
        other => anyhow::bail!("operation finished with {}", other),
    }
}

/// Initialize logging with tracing-subscriber
fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "otg_hal=error",
        LogLevel::Warn => "otg_hal=warn",
        LogLevel::Info => "otg_hal=info",
        LogLevel::Debug => "otg_hal=debug",
        LogLevel::Trace => "otg_hal=trace",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

/// Get the configuration file path
fn get_config_path() -> PathBuf {
    // Check environment variable first
    if let Ok(path) = std::env::var("OTG_HAL_CONFIG") {
        return PathBuf::from(path);
    }

    PathBuf::from(DEFAULT_CONFIG_PATH)
}
