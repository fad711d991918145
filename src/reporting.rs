use crate::config::{OutputFormat, ReportingConfig};
use crate::types::{DumpResult, HarvestReport, ScanResult};
use crate::Result;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Writes results into the configured output directory, one file per format
pub struct ReportWriter {
    config: ReportingConfig,
}

/// Anything the writer can persist: serialisable as JSON and flattenable into CSV records
pub trait Report: Serialize {
    fn kind(&self) -> &'static str;
    fn scan_id(&self) -> Uuid;
    fn started_at(&self) -> DateTime<Utc>;
    fn csv_header(&self) -> &'static [&'static str];
    fn csv_records(&self) -> Vec<Vec<String>>;
}

impl Report for ScanResult {
    fn kind(&self) -> &'static str {
        "scan"
    }

    fn scan_id(&self) -> Uuid {
        self.scan_id
    }

    fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    fn csv_header(&self) -> &'static [&'static str] {
        &["host", "status", "os", "protocol", "port", "state", "service", "product", "version"]
    }

    fn csv_records(&self) -> Vec<Vec<String>> {
        let mut records = Vec::new();
        for host in &self.hosts {
            let base = [host.address.clone(), host.status.clone(), host.os.clone()];
            if host.ports.is_empty() {
                let mut record = base.to_vec();
                record.extend(std::iter::repeat(String::new()).take(6));
                records.push(record);
                continue;
            }
            for (protocol, port) in host.ports.iter() {
                let mut record = base.to_vec();
                record.extend([
                    protocol.to_string(),
                    port.port.to_string(),
                    port.state.clone(),
                    port.service.clone(),
                    port.product.clone(),
                    port.version.clone(),
                ]);
                records.push(record);
            }
        }
        records
    }
}

impl Report for DumpResult {
    fn kind(&self) -> &'static str {
        "dump"
    }

    fn scan_id(&self) -> Uuid {
        self.scan_id
    }

    fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    fn csv_header(&self) -> &'static [&'static str] {
        &["target", "section", "value"]
    }

    fn csv_records(&self) -> Vec<Vec<String>> {
        let mut entries: Vec<(&str, String)> = Vec::new();
        if let Some(dbms) = &self.dbms {
            entries.push(("dbms", dbms.clone()));
        }
        if let Some(banner) = &self.banner {
            entries.push(("banner", banner.clone()));
        }
        entries.extend(self.databases.iter().map(|db| ("database", db.clone())));
        entries.extend(self.tables.iter().map(|t| ("table", t.clone())));
        if let Some(dump) = &self.dump {
            entries.extend(dump.header.iter().map(|h| ("header", h.clone())));
            entries.extend(dump.rows.iter().map(|r| ("row", r.clone())));
        }
        entries.extend(
            self.injection_points
                .iter()
                .map(|p| ("injection", format!("{} ({})", p.parameter, p.place))),
        );

        entries
            .into_iter()
            .map(|(section, value)| vec![self.target.clone(), section.to_string(), value])
            .collect()
    }
}

impl Report for HarvestReport {
    fn kind(&self) -> &'static str {
        "harvest"
    }

    fn scan_id(&self) -> Uuid {
        self.scan_id
    }

    fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    fn csv_header(&self) -> &'static [&'static str] {
        &["database", "table", "kind", "value"]
    }

    fn csv_records(&self) -> Vec<Vec<String>> {
        let mut records = Vec::new();
        for (database, tables) in &self.databases {
            if tables.is_empty() {
                records.push(vec![database.clone(), String::new(), String::new(), String::new()]);
            }
            for table in tables {
                let key = format!("{}.{}", database, table);
                let dump = match self.tables.get(&key) {
                    Some(dump) => dump,
                    None => continue,
                };
                let lines = dump
                    .header
                    .iter()
                    .map(|h| ("header", h))
                    .chain(dump.rows.iter().map(|r| ("row", r)));
                for (kind, value) in lines {
                    records.push(vec![database.clone(), table.clone(), kind.to_string(), value.clone()]);
                }
            }
        }
        records
    }
}

impl ReportWriter {
    pub fn new(config: ReportingConfig) -> Self {
        Self { config }
    }

    pub async fn write<R: Report>(&self, report: &R) -> Result<Vec<PathBuf>> {
        let mut generated_files = Vec::new();
        if self.config.formats.is_empty() {
            return Ok(generated_files);
        }

        fs::create_dir_all(&self.config.output_dir).await?;

        let id = report.scan_id().simple().to_string();
        let base_filename = format!(
            "fleetscan_{}_{}_{}",
            report.kind(),
            report.started_at().format("%Y%m%d_%H%M%S"),
            &id[..8]
        );

        for format in &self.config.formats {
            let file_path = match format {
                OutputFormat::Json => {
                    let path = self.config.output_dir.join(format!("{}.json", base_filename));
                    self.write_json(report, &path).await?;
                    path
                }
                OutputFormat::Csv => {
                    let path = self.config.output_dir.join(format!("{}.csv", base_filename));
                    self.write_csv(report, &path).await?;
                    path
                }
            };

            generated_files.push(file_path);
        }

        info!("Generated {} report files", generated_files.len());
        Ok(generated_files)
    }

    async fn write_json<R: Report>(&self, report: &R, path: &Path) -> Result<()> {
        debug!("Writing JSON report: {}", path.display());
        fs::write(path, serde_json::to_string_pretty(report)?).await?;
        Ok(())
    }

    async fn write_csv<R: Report>(&self, report: &R, path: &Path) -> Result<()> {
        debug!("Writing CSV report: {}", path.display());
        fs::write(path, render_csv(report)?).await?;
        Ok(())
    }
}

pub fn render_csv<R: Report>(report: &R) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(report.csv_header())?;
    for record in report.csv_records() {
        writer.write_record(&record)?;
    }
    writer
        .into_inner()
        .map_err(|e| crate::FleetError::Io(e.into_error()))
}
