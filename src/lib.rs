//! fleetscan - Security Tool Orchestration over an SSH Worker Fleet
//!
//! This library runs port scans (nmap) and SQL-injection probes (sqlmap) on a
//! fleet of worker nodes reached over SSH. A capacity-bounded connection pool
//! hands out sessions, the tool modules build command lines, and transcript
//! parsers turn console output into structured results.
//!
//! # Warning
//! This tool is designed for ethical penetration testing and security assessment
//! purposes only. Users are responsible for ensuring they have proper authorization
//! before scanning any networks or systems.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod display;
pub mod error;
pub mod nmap;
pub mod node;
pub mod pool;
pub mod reporting;
pub mod session;
pub mod sqlmap;
pub mod utils;

pub use error::{FleetError, Result};

/// Result records shared by the tool integrations, the dispatcher and the writers
pub mod types {
    use crate::sqlmap::DumpIntent;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PortRecord {
        pub port: u16,
        pub state: String,
        pub service: String,
        pub product: String,
        pub version: String,
    }

    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ProtocolPorts {
        pub tcp: Vec<PortRecord>,
        pub udp: Vec<PortRecord>,
        pub ip: Vec<PortRecord>,
        pub sctp: Vec<PortRecord>,
    }

    impl ProtocolPorts {
        /// Files the record under its protocol; false for protocols nmap does not report
        pub fn push(&mut self, protocol: &str, record: PortRecord) -> bool {
            let list = match protocol {
                "tcp" => &mut self.tcp,
                "udp" => &mut self.udp,
                "ip" => &mut self.ip,
                "sctp" => &mut self.sctp,
                _ => return false,
            };
            list.push(record);
            true
        }

        pub fn is_empty(&self) -> bool {
            self.tcp.is_empty() && self.udp.is_empty() && self.ip.is_empty() && self.sctp.is_empty()
        }

        pub fn iter(&self) -> impl Iterator<Item = (&'static str, &PortRecord)> {
            self.tcp
                .iter()
                .map(|r| ("tcp", r))
                .chain(self.udp.iter().map(|r| ("udp", r)))
                .chain(self.ip.iter().map(|r| ("ip", r)))
                .chain(self.sctp.iter().map(|r| ("sctp", r)))
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ScriptRecord {
        pub port: u16,
        pub id: String,
        pub output: String,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct HostReport {
        pub address: String,
        pub status: String,
        pub os: String,
        pub os_type: Option<String>,
        pub ports: ProtocolPorts,
        pub scripts: Vec<ScriptRecord>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ScanResult {
        pub scan_id: Uuid,
        pub node: String,
        pub command: String,
        pub exit_code: i32,
        pub hosts: Vec<HostReport>,
        pub warnings: Vec<String>,
        pub started_at: DateTime<Utc>,
        pub completed_at: DateTime<Utc>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TableDump {
        pub header: Option<String>,
        pub rows: Vec<String>,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct InjectionPoint {
        pub parameter: String,
        pub place: String,
        pub techniques: Vec<String>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct DumpResult {
        pub scan_id: Uuid,
        pub node: String,
        pub intent: DumpIntent,
        pub target: String,
        pub command: String,
        pub exit_code: i32,
        pub dbms: Option<String>,
        pub databases: Vec<String>,
        pub tables: Vec<String>,
        pub dump: Option<TableDump>,
        pub banner: Option<String>,
        pub injection_points: Vec<InjectionPoint>,
        pub warnings: Vec<String>,
        pub started_at: DateTime<Utc>,
        pub completed_at: DateTime<Utc>,
    }

    /// Full enumeration of one target: databases, their tables, and row previews keyed `db.table`
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct HarvestReport {
        pub scan_id: Uuid,
        pub node: String,
        pub target: String,
        pub dbms: Option<String>,
        pub databases: BTreeMap<String, Vec<String>>,
        pub tables: BTreeMap<String, TableDump>,
        pub warnings: Vec<String>,
        pub started_at: DateTime<Utc>,
        pub completed_at: DateTime<Utc>,
    }
}
