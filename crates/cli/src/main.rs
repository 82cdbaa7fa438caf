//! `interface-runner` CLI entry-point.
//!
//! Available sub-commands:
//! - `run`     : execute one interface from a bundle.
//! - `run-all` : execute every interface in a bundle, one after another.
//! - `validate`: check interfaces against the bundle's catalog.

mod bundle;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use adapters::http_rfc::{HttpRfcTransport, HttpRfcTransportConfig};
use adapters::{RemoteCallAdapter, SqlCallAdapter};
use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use db::PgSqlTransport;
use engine::{validate_interface, ExecutionState, ExecutorConfig, InterfaceExecutor, ReferenceMode};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::bundle::Bundle;

#[derive(Parser)]
#[command(
    name = "interface-runner",
    about = "Runs ordered SAP RFC and SQL interface definitions",
    version
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the interface bundle JSON file.
    #[arg(long, env = "INTERFACE_BUNDLE")]
    bundle: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute one interface.
    Run {
        /// Interface ID or name.
        interface: String,
        #[command(flatten)]
        exec: ExecArgs,
    },
    /// Execute every interface in the bundle; later ones run even if an earlier one fails.
    RunAll {
        #[command(flatten)]
        exec: ExecArgs,
    },
    /// Validate one interface, or all of them.
    Validate {
        /// Interface ID or name.
        interface: Option<String>,
    },
}

#[derive(Args)]
struct ExecArgs {
    /// Name of the RFC connection to use.
    #[arg(long)]
    rfc_connection: Option<String>,

    /// Name of the database connection to use.
    #[arg(long)]
    db_connection: Option<String>,

    /// Fail when a back-reference has no value instead of passing null.
    #[arg(long)]
    strict: bool,

    /// Per-call timeout for RFC and SQL calls.
    #[arg(long)]
    call_timeout_secs: Option<u64>,

    /// Base URL of the RFC gateway.
    #[arg(long, env = "RFC_GATEWAY_URL", default_value = "http://localhost:8095")]
    gateway_url: String,

    /// Print the final execution state as JSON.
    #[arg(long)]
    json: bool,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_executor(args: &ExecArgs) -> anyhow::Result<InterfaceExecutor> {
    let gateway = HttpRfcTransport::new(HttpRfcTransportConfig {
        gateway_url: args.gateway_url.clone(),
        ..Default::default()
    })
    .context("failed to build RFC gateway client")?;

    let mut rfc = RemoteCallAdapter::new(Arc::new(gateway));
    let mut sql = SqlCallAdapter::new(Arc::new(PgSqlTransport::default()));
    if let Some(secs) = args.call_timeout_secs {
        let limit = Duration::from_secs(secs);
        rfc = rfc.with_timeout(limit);
        sql = sql.with_timeout(limit);
    }

    let reference_mode = if args.strict { ReferenceMode::Strict } else { ReferenceMode::Lenient };
    Ok(InterfaceExecutor::new(rfc, sql, ExecutorConfig { reference_mode }))
}

fn report(name: &str, state: &ExecutionState, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(state)?);
        return Ok(());
    }
    for (idx, result) in state.results.iter().enumerate() {
        println!("  step {}: {}", idx + 1, serde_json::Value::Object(result.clone()));
    }
    match &state.error {
        None => println!("✅ {name}: {} step(s) completed", state.completed_steps()),
        Some(err) => println!("❌ {name}: failed after {} step(s): {err}", state.completed_steps()),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let bundle = Bundle::load(&cli.bundle)?;

    match cli.command {
        Command::Run { interface, exec } => {
            let interface = bundle.interface(&interface)?;
            let validation = validate_interface(interface, &bundle.catalog)
                .with_context(|| format!("interface '{}' is not valid", interface.name))?;
            for w in &validation.warnings {
                warn!("{w}");
            }

            let connections =
                bundle.select_connections(exec.rfc_connection.as_deref(), exec.db_connection.as_deref())?;
            let executor = build_executor(&exec)?;

            let state = executor.run(interface, &bundle.catalog, &connections).await;
            report(&interface.name, &state, exec.json)?;
            Ok(if state.succeeded() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::RunAll { exec } => {
            let connections =
                bundle.select_connections(exec.rfc_connection.as_deref(), exec.db_connection.as_deref())?;
            let executor = build_executor(&exec)?;

            info!("running {} interface(s)", bundle.interfaces.len());
            let outcomes = executor
                .execute_all(&bundle.interfaces, &bundle.catalog, &connections)
                .await;

            let mut failed = 0;
            for (id, state) in &outcomes {
                report(id, state, exec.json)?;
                if !state.succeeded() {
                    failed += 1;
                }
            }
            if failed > 0 {
                eprintln!("{failed} of {} interface(s) failed", outcomes.len());
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate { interface } => {
            let targets = match &interface {
                Some(key) => vec![bundle.interface(key)?],
                None => bundle.interfaces.iter().collect(),
            };

            let mut invalid = 0;
            for iface in targets {
                match validate_interface(iface, &bundle.catalog) {
                    Ok(r) if r.is_clean() => println!("✅ {} is valid", iface.name),
                    Ok(r) => {
                        println!("⚠️  {} is valid with warnings:", iface.name);
                        for w in &r.warnings {
                            println!("   - {w}");
                        }
                    }
                    Err(e) => {
                        eprintln!("❌ {}: {e}", iface.name);
                        invalid += 1;
                    }
                }
            }
            Ok(if invalid == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
    }
}
