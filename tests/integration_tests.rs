use fleetscan::{
    config::{Config, OutputFormat},
    dispatcher::Dispatcher,
    nmap::{self, PortSelection, ScanOption, ScanRequest, ScanSpec, ScanType},
    node::{Node, NodeDirectory, NodeRecord, StaticDirectory},
    pool::{ConnectionPool, SessionState},
    reporting::ReportWriter,
    session::{CommandOutput, Connector, ShellTransport},
    sqlmap::{self, DumpIntent, DumpRequest, DumpSpec, Tuning},
    FleetError, Result,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SCAN_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<nmaprun scanner="nmap" args="nmap -oX - -p 22,443 -sT 10.0.0.5">
<host><status state="up" reason="syn-ack"/>
<address addr="10.0.0.5" addrtype="ipv4"/>
<ports>
<port protocol="tcp" portid="22"><state state="open" reason="syn-ack"/><service name="ssh" product="OpenSSH" version="9.6"/></port>
<port protocol="tcp" portid="443"><state state="filtered" reason="no-response"/><service name="https" method="table"/></port>
</ports>
</host>
</nmaprun>"#;

const DBS_OUTPUT: &str = "\
[10:21:07] [INFO] the back-end DBMS is PostgreSQL
back-end DBMS: PostgreSQL
[10:21:08] [INFO] fetching database names
available databases [3]:
[*] inventory
[*] pg_catalog
[*] public

[10:21:09] [INFO] fetched data logged to text files
";

/// Replies by tool name and records every command it sees
struct FakeConnector {
    commands: Arc<Mutex<Vec<String>>>,
    connects: AtomicUsize,
}

impl FakeConnector {
    fn new() -> Self {
        Self {
            commands: Arc::new(Mutex::new(Vec::new())),
            connects: AtomicUsize::new(0),
        }
    }
}

struct FakeTransport {
    commands: Arc<Mutex<Vec<String>>>,
}

impl Connector for FakeConnector {
    fn connect(&self, _node: &Node) -> Result<Box<dyn ShellTransport>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeTransport {
            commands: Arc::clone(&self.commands),
        }))
    }
}

impl ShellTransport for FakeTransport {
    fn exec(&mut self, command: &str, _timeout: Option<Duration>) -> Result<CommandOutput> {
        self.commands.lock().unwrap().push(command.to_string());
        let stdout = if command.starts_with("nmap") {
            SCAN_XML
        } else if command.contains("--dbs") {
            DBS_OUTPUT
        } else {
            ""
        };
        Ok(CommandOutput {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    fn disconnect(&mut self) {}
}

fn record(hostname: &str, tools: &[&str], max_conns: usize) -> NodeRecord {
    NodeRecord {
        hostname: hostname.to_string(),
        username: "scanner".to_string(),
        password: Some("secret".to_string()),
        services: vec!["ssh".to_string()],
        tools: tools.iter().map(|t| t.to_string()).collect(),
        max_conns: Some(max_conns),
        ..Default::default()
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.pool.resync_interval = None;
    config.nodes = vec![
        record("scanner-a", &["nmap"], 1),
        record("scanner-b", &["nmap", "sqlmap"], 2),
    ];
    config
}

fn build(config: &Config) -> (Dispatcher, Arc<FakeConnector>) {
    let directory = Arc::new(StaticDirectory::from_records(&config.nodes, config.pool.default_max_conns).unwrap());
    let connector = Arc::new(FakeConnector::new());
    let pool = ConnectionPool::connect(directory, connector.clone(), &config.pool).unwrap();
    (Dispatcher::new(Arc::new(pool), config.clone()), connector)
}

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.pool.default_max_conns, 10);
    assert_eq!(config.pool.default_ssh_port, 22);
    assert_eq!(config.pool.connect_timeout(), Duration::from_secs(10));
    assert_eq!(config.pool.command_timeout(), Duration::from_secs(600));
    assert_eq!(config.pool.resync_interval(), Some(Duration::from_secs(60)));
    assert!(config.pool.node_file.is_none());

    assert_eq!(config.nmap.binary, "nmap");
    assert_eq!(config.sqlmap.capability, "sqlmap");
    assert_eq!(config.sqlmap.preview_rows, 5);

    assert_eq!(config.reporting.output_dir.to_string_lossy(), "./reports");
    assert_eq!(config.reporting.formats, vec![OutputFormat::Json]);
    assert!(config.nodes.is_empty());
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleetscan.toml");
    let path = path.to_string_lossy().to_string();

    let mut config = test_config();
    config.pool.command_timeout = 120;
    config.reporting.formats = vec![OutputFormat::Json, OutputFormat::Csv];
    config.save_to_file(&path).unwrap();

    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded.pool.command_timeout, 120);
    assert_eq!(loaded.reporting.formats, vec![OutputFormat::Json, OutputFormat::Csv]);
    assert_eq!(loaded.nodes.len(), 2);
    assert_eq!(loaded.nodes[1].hostname, "scanner-b");
    assert_eq!(loaded.nodes[1].max_conns, Some(2));

    let directory = StaticDirectory::from_records(&loaded.nodes, 10).unwrap();
    let nodes = directory.list_nodes().unwrap();
    assert!(nodes[1].has_capability("sqlmap"));
    assert!(!nodes[0].has_capability("sqlmap"));
}

#[test]
fn test_invalid_node_record_rejected() {
    let mut bad = record("scanner-c", &["nmap"], 1);
    bad.private_key = Some("/keys/id_ed25519".into());
    match StaticDirectory::from_records(&[bad], 10) {
        Err(FleetError::Configuration { field, .. }) => assert_eq!(field, "credentials"),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_builders_public_api() {
    let spec = ScanSpec::new(["10.0.0.0/24"])
        .ports(PortSelection::Range { low: 22, high: 80 })
        .scan_type(ScanType::Syn)
        .option(ScanOption::ServiceVersion);
    assert_eq!(nmap::build_arguments(&spec).unwrap(), "-p 22-80 -sS -sV ");

    let dump = DumpSpec::new(DumpIntent::DumpTable, "t").database("d").table("tb");
    assert_eq!(sqlmap::build_command(&dump).unwrap(), "sqlmap -u t --batch -D d -T tb --dump");
}

#[test]
fn test_requests_from_json() {
    let scan: ScanRequest = serde_json::from_str(
        r#"{"targets": ["10.0.0.5"], "scan_type": "udp", "ports": {"udp_ports": [53, 161]}}"#,
    )
    .unwrap();
    let spec = ScanSpec::try_from(scan).unwrap();
    assert_eq!(nmap::build_arguments(&spec).unwrap(), "-p U:53,161 -sU ");

    let dump: DumpRequest = serde_json::from_str(r#"{"intent": "dump-column", "target": "t", "database": "d"}"#).unwrap();
    match DumpSpec::try_from(dump) {
        Err(FleetError::Configuration { field, .. }) => assert_eq!(field, "table"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_capacity_spills_to_next_node() {
    let config = test_config();
    let (dispatcher, connector) = build(&config);
    let pool = dispatcher.pool();

    let first = pool.acquire("nmap").unwrap();
    let second = pool.acquire("nmap").unwrap();
    let third = pool.acquire("nmap").unwrap();
    assert_eq!(first.hostname(), "scanner-a");
    assert_eq!(second.hostname(), "scanner-b");
    assert_eq!(third.hostname(), "scanner-b");
    assert_eq!(first.state(), SessionState::Busy);

    let err = pool.acquire("nmap").unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(connector.connects.load(Ordering::SeqCst), 3);

    drop(second);
    let reused = pool.acquire("sqlmap").unwrap();
    assert_eq!(reused.hostname(), "scanner-b");
    assert_eq!(connector.connects.load(Ordering::SeqCst), 3);

    pool.release(first);
    pool.release(third);
    pool.release(reused);
    assert!(pool.stats().iter().all(|s| s.busy == 0));
}

#[tokio::test]
async fn test_scan_end_to_end() {
    let (dispatcher, connector) = build(&test_config());
    let spec = ScanSpec::new(["10.0.0.5"])
        .ports(PortSelection::List(vec![22, 443]))
        .scan_type(ScanType::Connect);

    let result = dispatcher.run_scan(spec).await.unwrap();
    assert_eq!(result.node, "scanner-a");
    assert_eq!(result.hosts.len(), 1);
    let host = &result.hosts[0];
    assert_eq!(host.os, "unknown");
    assert_eq!(host.ports.tcp.len(), 2);
    assert_eq!(host.ports.tcp[1].state, "filtered");

    let commands = connector.commands.lock().unwrap().clone();
    assert_eq!(commands, ["nmap -oX - -p 22,443 -sT 10.0.0.5"]);
}

#[tokio::test]
async fn test_dump_end_to_end() {
    let (dispatcher, connector) = build(&test_config());
    let tuning = Tuning {
        risk: Some(2),
        ..Default::default()
    };
    let spec = DumpSpec::new(DumpIntent::ListDatabases, "http://10.0.0.7/view?id=4").tuning(tuning);

    let result = dispatcher.run_dump(spec).await.unwrap();
    assert_eq!(result.node, "scanner-b");
    assert_eq!(result.dbms.as_deref(), Some("PostgreSQL"));
    assert_eq!(result.databases, ["inventory", "public"]);

    let commands = connector.commands.lock().unwrap().clone();
    assert_eq!(commands, ["sqlmap -u 'http://10.0.0.7/view?id=4' --batch --dbs --risk=2"]);
}

#[tokio::test]
async fn test_results_written_as_reports() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.reporting.output_dir = dir.path().to_path_buf();
    config.reporting.formats = vec![OutputFormat::Json, OutputFormat::Csv];

    let (dispatcher, _) = build(&config);
    let result = dispatcher.run_scan(ScanSpec::new(["10.0.0.5"])).await.unwrap();

    let files = ReportWriter::new(config.reporting.clone()).write(&result).await.unwrap();
    assert_eq!(files.len(), 2);

    let csv = std::fs::read_to_string(&files[1]).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.contains("10.0.0.5,up,unknown,tcp,22,open,ssh,OpenSSH,9.6"));
}
