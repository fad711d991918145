use crate::nmap::{PortSelection, ScanOption, ScanType};
use crate::sqlmap::{DumpIntent, Tuning};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fleetscan")]
#[command(about = "Run nmap and sqlmap on a fleet of SSH worker nodes")]
#[command(long_about = r#"
fleetscan dispatches port scans and SQL-injection probes to worker nodes
reached over SSH, respecting each node's connection ceiling, and turns the
tools' console output into structured reports.

WARNING: This tool should only be used on networks and systems you own or
have explicit permission to test. Unauthorized scanning may be illegal.

Usage Examples:
  fleetscan init-config fleetscan.toml
  fleetscan -c fleetscan.toml nodes
  fleetscan -c fleetscan.toml discover 192.168.1.0/24
  fleetscan -c fleetscan.toml scan -t 192.168.1.10 -p 1-1024 --scan-type syn --option service-version
  fleetscan -c fleetscan.toml dump -t "http://10.0.0.5/item.php?id=1" --intent list-databases
  fleetscan -c fleetscan.toml harvest -t "http://10.0.0.5/item.php?id=1" --threads 4
"#)]
#[command(version)]
#[command(author)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output directory for reports (overrides the configuration)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Report formats (overrides the configuration)
    #[arg(long, value_enum, value_delimiter = ',', global = true)]
    pub format: Vec<OutputFormat>,

    /// Print results without writing report files
    #[arg(long, global = true)]
    pub no_report: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Port scan with nmap on a capable node
    Scan {
        /// Target addresses, hostnames, ranges or CIDR blocks
        #[arg(short, long, required_unless_present = "request")]
        target: Vec<String>,

        /// Ports: all, top:N, 1-1024, 22,80 or T:22,80,U:53
        #[arg(short, long)]
        ports: Option<PortSelection>,

        /// connect, syn, ack, null, fin, xmas, udp, ping or no_ping
        #[arg(long)]
        scan_type: Option<ScanType>,

        /// os-detect, service-version or aggressive (repeatable)
        #[arg(long = "option", value_delimiter = ',')]
        options: Vec<ScanOption>,

        /// NSE scripts; without names the default set is used
        #[arg(long, num_args = 0.., value_delimiter = ',')]
        scripts: Option<Vec<String>>,

        /// NSE script arguments
        #[arg(long, value_delimiter = ',', requires = "scripts")]
        script_args: Vec<String>,

        /// Read the whole request from a JSON file instead
        #[arg(long, value_name = "FILE", conflicts_with = "target")]
        request: Option<PathBuf>,
    },

    /// Single sqlmap operation on a capable node
    Dump {
        /// Target URL
        #[arg(short, long, required_unless_present = "request")]
        target: Option<String>,

        /// list-databases, list-tables, dump-table, dump-column, form-test or banner-grab
        #[arg(long, default_value = "list-databases")]
        intent: DumpIntent,

        #[arg(short = 'D', long)]
        database: Option<String>,

        #[arg(short = 'T', long)]
        table: Option<String>,

        #[arg(short = 'C', long)]
        column: Option<String>,

        #[command(flatten)]
        tuning: TuningArgs,

        /// Read the whole request from a JSON file instead
        #[arg(long, value_name = "FILE", conflicts_with = "target")]
        request: Option<PathBuf>,
    },

    /// Enumerate every database and table of a target and preview their rows
    Harvest {
        /// Target URL
        #[arg(short, long)]
        target: String,

        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// Ping sweep of a subnet
    Discover {
        /// Subnet in CIDR notation or an nmap range
        subnet: String,
    },

    /// Show configured nodes and their session usage
    Nodes,

    /// Write a default configuration file
    InitConfig {
        #[arg(default_value = "fleetscan.toml")]
        path: PathBuf,
    },
}

/// sqlmap tuning flags shared by `dump` and `harvest`
#[derive(Args, Clone, Debug, Default)]
pub struct TuningArgs {
    /// Concurrent HTTP requests (1-10)
    #[arg(long)]
    pub threads: Option<u8>,

    /// Risk of tests to perform (1-3)
    #[arg(long)]
    pub risk: Option<u8>,

    /// Level of tests to perform (1-5)
    #[arg(long)]
    pub level: Option<u8>,

    /// Tamper scripts
    #[arg(long, value_delimiter = ',')]
    pub tamper: Vec<String>,

    /// Crawl depth from the target URL
    #[arg(long)]
    pub crawl: Option<u32>,

    /// Force SSL/HTTPS
    #[arg(long)]
    pub force_ssl: bool,

    /// Delay in seconds between HTTP requests
    #[arg(long)]
    pub delay: Option<f64>,
}

impl From<TuningArgs> for Tuning {
    fn from(args: TuningArgs) -> Self {
        Tuning {
            threads: args.threads,
            risk: args.risk,
            level: args.level,
            tamper: args.tamper,
            crawl: args.crawl,
            force_ssl: args.force_ssl,
            delay: args.delay,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
}

impl From<OutputFormat> for crate::config::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => crate::config::OutputFormat::Json,
            OutputFormat::Csv => crate::config::OutputFormat::Csv,
        }
    }
}
