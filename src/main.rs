use clap::Parser;
use env_logger::Env;
use fleetscan::{
    cli::{Cli, Commands},
    config::Config,
    dispatcher::Dispatcher,
    display::DisplayManager,
    nmap::{ScanRequest, ScanSpec, ScriptSelection},
    node::directory_from_config,
    pool::ConnectionPool,
    reporting::{Report, ReportWriter},
    session::SshConnector,
    sqlmap::{DumpRequest, DumpSpec},
    utils::progress::create_spinner,
    FleetError, Result,
};
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    let display = DisplayManager::with_quiet(cli.quiet);

    if let Commands::InitConfig { path } = &cli.command {
        match Config::default().save_to_file(&path.to_string_lossy()) {
            Ok(()) => display.print_success(&format!("Wrote default configuration to {}", path.display())),
            Err(e) => {
                display.print_error(&format!("Failed to write configuration: {}", e));
                process::exit(1);
            }
        }
        return;
    }

    display.print_banner("FLEETSCAN - Distributed Security Scanner", Some("Authorized Testing Only"));

    let mut config = match &cli.config {
        Some(config_path) => match Config::load_from_file(&config_path.to_string_lossy()) {
            Ok(config) => {
                display.print_success(&format!("Loaded configuration from {}", config_path.display()));
                config
            }
            Err(e) => {
                display.print_error(&format!("Failed to load configuration: {}", e));
                process::exit(1);
            }
        },
        None => {
            display.print_warning("No configuration given; using defaults with no nodes");
            Config::default()
        }
    };

    if let Some(output) = &cli.output {
        config.reporting.output_dir = output.clone();
    }
    if !cli.format.is_empty() {
        config.reporting.formats = cli.format.iter().map(|f| (*f).into()).collect();
    }
    if cli.no_report {
        config.reporting.formats.clear();
    }

    let start_time = Instant::now();

    let pool = match build_pool(&config) {
        Ok(pool) => pool,
        Err(e) => {
            display.print_error(&format!("Failed to initialise connection pool: {}", e));
            process::exit(1);
        }
    };

    let dispatcher = Dispatcher::new(Arc::clone(&pool), config.clone());
    let writer = ReportWriter::new(config.reporting.clone());

    let result = run(cli.command, &dispatcher, &writer, &display).await;
    pool.shutdown();

    match result {
        Ok(()) => display.print_success(&format!(
            "Completed in {}",
            fleetscan::utils::time::format_duration(start_time.elapsed())
        )),
        Err(e) => {
            display.print_error(&format!("Operation failed: {}", e));
            if e.is_retryable() {
                display.print_info("All capable nodes are at capacity; try again later");
            }
            process::exit(1);
        }
    }
}

fn build_pool(config: &Config) -> Result<Arc<ConnectionPool>> {
    let directory = directory_from_config(config)?;
    let connector = Arc::new(SshConnector::from_config(&config.pool));
    Ok(Arc::new(ConnectionPool::connect(directory, connector, &config.pool)?))
}

fn read_request<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

async fn run(
    command: Commands,
    dispatcher: &Dispatcher,
    writer: &ReportWriter,
    display: &DisplayManager,
) -> Result<()> {
    match command {
        Commands::Scan { target, ports, scan_type, options, scripts, script_args, request } => {
            display.print_section_header("🔍 PORT SCAN");
            let spec = match request {
                Some(path) => ScanSpec::try_from(read_request::<ScanRequest>(&path)?)?,
                None => ScanSpec {
                    targets: target,
                    scan_type,
                    options,
                    ports,
                    scripts: scripts.map(|names| ScriptSelection { names, args: script_args }),
                },
            };

            let spinner = create_spinner("Waiting for nmap...");
            let result = dispatcher.run_scan(spec).await;
            spinner.finish_and_clear();
            let result = result?;

            display.print_scan_result(&result);
            write_report(writer, display, &result).await
        }
        Commands::Dump { target, intent, database, table, column, tuning, request } => {
            display.print_section_header("💉 SQL INJECTION");
            let spec = match request {
                Some(path) => DumpSpec::try_from(read_request::<DumpRequest>(&path)?)?,
                None => DumpSpec {
                    intent,
                    target: target.unwrap_or_default(),
                    database,
                    table,
                    column,
                    tuning: tuning.into(),
                },
            };

            let spinner = create_spinner(&format!("Waiting for sqlmap ({})...", spec.intent));
            let result = dispatcher.run_dump(spec).await;
            spinner.finish_and_clear();
            let result = result?;

            display.print_dump_result(&result);
            write_report(writer, display, &result).await
        }
        Commands::Harvest { target, tuning } => {
            display.print_section_header("🗄  DATABASE HARVEST");
            let spinner = create_spinner("Enumerating databases, tables and rows...");
            let report = dispatcher.harvest(&target, tuning.into()).await;
            spinner.finish_and_clear();
            let report = report?;

            display.print_harvest(&report);
            write_report(writer, display, &report).await
        }
        Commands::Discover { subnet } => {
            display.print_section_header("🔍 HOST DISCOVERY");
            let spinner = create_spinner(&format!("Sweeping {}...", subnet));
            let hosts = dispatcher.discover_hosts(&subnet).await;
            spinner.finish_and_clear();
            let hosts = hosts?;

            if hosts.is_empty() {
                display.print_warning("No live hosts found in target range");
            } else {
                display.print_host_table(&hosts);
                display.print_success(&format!("Discovery completed: {} live hosts found", hosts.len()));
            }
            Ok(())
        }
        Commands::Nodes => {
            display.print_section_header("🖧  NODES");
            let stats = dispatcher.pool().stats();
            if stats.is_empty() {
                display.print_warning("The node directory is empty");
            }
            display.print_node_stats(&stats);
            for node in dispatcher.pool().nodes() {
                let capabilities: Vec<&str> = node.capabilities.iter().map(String::as_str).collect();
                display.print_info(&format!("{}: {}", node.hostname, capabilities.join(", ")));
            }
            Ok(())
        }
        Commands::InitConfig { .. } => Err(FleetError::configuration(
            "command",
            "init-config is handled before the pool starts",
        )),
    }
}

async fn write_report<R: Report>(
    writer: &ReportWriter,
    display: &DisplayManager,
    report: &R,
) -> Result<()> {
    for path in writer.write(report).await? {
        display.print_info(&format!("Report written to {}", path.display()));
    }
    Ok(())
}
