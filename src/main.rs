mod dispatch;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dispatch::Kind;
use ostack::cloud::http::format_error;
use ostack::resource::Query;
use ostack::Connection;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Command line client for OpenStack-style clouds
#[derive(Parser, Debug)]
#[command(name = "ostack", version, about, long_about = None)]
struct Args {
    /// Cloud from clouds.yaml to use
    #[arg(long, env = "OS_CLOUD", global = true)]
    os_cloud: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List resources of a kind
    List {
        #[arg(value_enum)]
        kind: Kind,
        /// Server-side filter, repeatable
        #[arg(long = "filter", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        filters: Vec<(String, String)>,
        /// Page size
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one resource by name or id
    Show {
        #[arg(value_enum)]
        kind: Kind,
        name_or_id: String,
    },
    /// Delete one resource by name or id
    Delete {
        #[arg(value_enum)]
        kind: Kind,
        name_or_id: String,
    },
    /// Wait for a resource to reach a status
    Wait {
        #[arg(value_enum)]
        kind: Kind,
        name_or_id: String,
        /// Target status; `deleted` waits for the resource to disappear
        #[arg(long)]
        status: Option<String>,
        /// Seconds before giving up
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Cannot open log file {:?}: {}", log_path, e);
            return None;
        },
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    // RUST_LOG narrows targets, e.g. `ostack::resource=trace`
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("ostack started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("ostack").join("ostack.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".ostack").join("ostack.log");
    }
    PathBuf::from("ostack.log")
}

fn print_items(format: OutputFormat, kind: Kind, items: &[serde_json::Value]) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
        OutputFormat::Table => println!("{}", dispatch::render_table(kind, items)),
    }
    Ok(())
}

fn print_item(format: OutputFormat, item: &serde_json::Value) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(item)?),
        OutputFormat::Table => {
            if let Some(obj) = item.as_object() {
                let width = obj.keys().map(|k| k.len()).max().unwrap_or(0);
                for key in obj.keys() {
                    println!(
                        "{:<width$}  {}",
                        key,
                        dispatch::extract_json_value(item, key),
                        width = width
                    );
                }
            }
        },
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let conn = Connection::from_config(args.os_cloud.as_deref())
        .context("Failed to load cloud configuration")?;

    match args.command {
        Command::List {
            kind,
            filters,
            limit,
        } => {
            let mut query = Query::new();
            for (key, value) in filters {
                query.insert(key, value);
            }
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            let items = dispatch::list(&conn, kind, &query).await?;
            print_items(args.format, kind, &items)
        },
        Command::Show { kind, name_or_id } => {
            let item = dispatch::show(&conn, kind, &name_or_id).await?;
            print_item(args.format, &item)
        },
        Command::Delete { kind, name_or_id } => {
            if dispatch::delete(&conn, kind, &name_or_id).await? {
                println!("Deleted {:?} {}", kind, name_or_id);
            } else {
                println!("{:?} {} not found", kind, name_or_id);
            }
            Ok(())
        },
        Command::Wait {
            kind,
            name_or_id,
            status,
            timeout,
        } => {
            let item = dispatch::wait(
                &conn,
                kind,
                &name_or_id,
                status.as_deref(),
                Duration::from_secs(timeout),
            )
            .await?;
            print_item(args.format, &item)
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    if let Err(err) = run(args).await {
        let message = match err.downcast_ref::<ostack::Error>() {
            Some(sdk_error) => format_error(sdk_error),
            None => format!("{:#}", err),
        };
        tracing::error!("{:#}", err);
        eprintln!("Error: {}", message);
        std::process::exit(1);
    }

    Ok(())
}
