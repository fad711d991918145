use crate::config::Config;
use crate::nmap::{self, ScanSpec};
use crate::pool::{ConnectionPool, PooledSession};
use crate::session::CommandOutput;
use crate::sqlmap::{self, DumpIntent, DumpSpec, Tuning};
use crate::types::{DumpResult, HarvestReport, ScanResult};
use crate::{FleetError, Result};
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Runs tool commands on pooled sessions.
///
/// Each operation acquires a session for the tool's capability, executes on a
/// blocking worker thread and returns the session to the pool on every path,
/// including errors and panics inside the worker.
pub struct Dispatcher {
    pool: Arc<ConnectionPool>,
    config: Arc<Config>,
}

struct Execution {
    node: String,
    output: CommandOutput,
}

fn exit_warning(tool: &str, output: &CommandOutput) -> Option<String> {
    if output.success() {
        return None;
    }
    let stderr = output.stderr.trim();
    Some(if stderr.is_empty() {
        format!("{} exited with status {}", tool, output.exit_code)
    } else {
        format!("{} exited with status {}: {}", tool, output.exit_code, stderr)
    })
}

impl Dispatcher {
    pub fn new(pool: Arc<ConnectionPool>, config: Config) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    fn command_timeout(&self) -> Option<Duration> {
        Some(self.config.pool.command_timeout()).filter(|t| !t.is_zero())
    }

    /// Acquires a session for `capability` and hands it to `work` on a blocking thread
    async fn with_session<T, F>(&self, capability: &str, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PooledSession) -> Result<T> + Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        let capability = capability.to_string();

        tokio::task::spawn_blocking(move || {
            let mut session = pool.acquire(&capability)?;
            debug!("Session {} on {} acquired for {}", session.id(), session.hostname(), capability);
            work(&mut session)
        })
        .await
        .map_err(|e| FleetError::Execution(format!("worker task failed: {}", e)))?
    }

    async fn execute(&self, capability: &str, command: String) -> Result<Execution> {
        let timeout = self.command_timeout();
        self.with_session(capability, move |session| {
            info!("Running on {}: {}", session.hostname(), command);
            let output = session.execute(&command, timeout)?;
            Ok(Execution {
                node: session.hostname().to_string(),
                output,
            })
        })
        .await
    }

    pub async fn run_scan(&self, spec: ScanSpec) -> Result<ScanResult> {
        let command = nmap::scan_command(&self.config.nmap.binary, &spec)?;
        let started_at = Utc::now();
        let execution = self.execute(&self.config.nmap.capability, command.clone()).await?;

        let mut warnings = Vec::new();
        warnings.extend(exit_warning("nmap", &execution.output));

        let hosts = match nmap::parse_xml(&execution.output.stdout) {
            Ok(run) => nmap::normalize(&run),
            Err(e) => {
                warn!("Discarding unparseable nmap output from {}: {}", execution.node, e);
                warnings.push(e.to_string());
                Vec::new()
            }
        };
        info!("nmap on {} reported {} hosts", execution.node, hosts.len());

        Ok(ScanResult {
            scan_id: Uuid::new_v4(),
            node: execution.node,
            command,
            exit_code: execution.output.exit_code,
            hosts,
            warnings,
            started_at,
            completed_at: Utc::now(),
        })
    }

    pub async fn run_dump(&self, spec: DumpSpec) -> Result<DumpResult> {
        let command = sqlmap::build_command_for(&self.config.sqlmap.binary, &spec)?;
        let started_at = Utc::now();
        let execution = self.execute(&self.config.sqlmap.capability, command.clone()).await?;

        let mut transcript = sqlmap::summarize(
            spec.intent,
            &execution.output.stdout,
            self.config.sqlmap.preview_rows,
        );
        if let Some(warning) = exit_warning("sqlmap", &execution.output) {
            transcript.warnings.insert(0, warning);
        }
        for warning in &transcript.warnings {
            warn!("{} on {}: {}", spec.intent, execution.node, warning);
        }

        Ok(DumpResult {
            scan_id: Uuid::new_v4(),
            node: execution.node,
            intent: spec.intent,
            target: spec.target,
            command,
            exit_code: execution.output.exit_code,
            dbms: transcript.dbms,
            databases: transcript.databases,
            tables: transcript.tables,
            dump: transcript.dump,
            banner: transcript.banner,
            injection_points: transcript.injection_points,
            warnings: transcript.warnings,
            started_at,
            completed_at: Utc::now(),
        })
    }

    /// Lists databases, then the tables of each, then previews each table's rows,
    /// all over one session
    pub async fn harvest(&self, target: &str, tuning: Tuning) -> Result<HarvestReport> {
        let binary = self.config.sqlmap.binary.clone();
        let preview_rows = self.config.sqlmap.preview_rows;
        let timeout = self.command_timeout();
        let dbs_spec = DumpSpec::new(DumpIntent::ListDatabases, target).tuning(tuning.clone());
        let dbs_command = sqlmap::build_command_for(&binary, &dbs_spec)?;
        let target = target.to_string();
        let started_at = Utc::now();

        self.with_session(&self.config.sqlmap.capability, move |session| {
            let mut warnings = Vec::new();
            let mut run = |command: &str| -> Result<String> {
                debug!("harvest on {}: {}", session.hostname(), command);
                let output = session.execute(command, timeout)?;
                warnings.extend(exit_warning("sqlmap", &output));
                Ok(output.stdout)
            };

            let listing = sqlmap::parse_databases(&run(&dbs_command)?);
            let mut databases = BTreeMap::new();
            let mut tables = BTreeMap::new();

            for database in &listing.databases {
                let spec = DumpSpec::new(DumpIntent::ListTables, target.as_str())
                    .database(database.as_str())
                    .tuning(tuning.clone());
                let names = sqlmap::parse_tables(&run(&sqlmap::build_command_for(&binary, &spec)?)?);

                for table in &names {
                    let spec = DumpSpec::new(DumpIntent::DumpTable, target.as_str())
                        .database(database.as_str())
                        .table(table.as_str())
                        .tuning(tuning.clone());
                    let output = run(&sqlmap::build_command_for(&binary, &spec)?)?;
                    tables.insert(
                        format!("{}.{}", database, table),
                        sqlmap::parse_table_dump(&output, preview_rows),
                    );
                }
                databases.insert(database.clone(), names);
            }

            if listing.databases.is_empty() {
                warnings.push("no user databases found".to_string());
            }
            info!(
                "harvest of {} found {} databases and {} tables",
                target,
                databases.len(),
                tables.len()
            );

            Ok(HarvestReport {
                scan_id: Uuid::new_v4(),
                node: session.hostname().to_string(),
                target,
                dbms: listing.dbms,
                databases,
                tables,
                warnings,
                started_at,
                completed_at: Utc::now(),
            })
        })
        .await
    }

    /// Addresses of hosts that answer a ping sweep of `subnet`
    pub async fn discover_hosts(&self, subnet: &str) -> Result<Vec<String>> {
        let command = nmap::discovery_command(&self.config.nmap.binary, subnet)?;
        let execution = self.execute(&self.config.nmap.capability, command).await?;

        if let Some(warning) = exit_warning("nmap", &execution.output) {
            warn!("{}", warning);
        }
        match nmap::parse_xml(&execution.output.stdout) {
            Ok(run) => Ok(nmap::up_hosts(&run)),
            Err(e) => {
                warn!("Host discovery on {} returned no usable output: {}", subnet, e);
                Ok(Vec::new())
            }
        }
    }
}
