use crate::config::Config;
use crate::{FleetError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const SSH_SERVICE: &str = "ssh";

/// A node as stored by the external directory, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeRecord {
    pub hostname: String,
    pub username: String,
    pub password: Option<String>,
    pub private_key: Option<PathBuf>,
    pub passphrase: Option<String>,
    pub services: Vec<String>,
    pub tools: Vec<String>,
    pub ports: HashMap<String, u16>,
    pub max_conns: Option<usize>,
}

#[derive(Clone, PartialEq, Eq)]
pub enum NodeAuth {
    Password(String),
    PrivateKey {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

impl fmt::Debug for NodeAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeAuth::Password(_) => f.write_str("Password(<redacted>)"),
            NodeAuth::PrivateKey { path, .. } => {
                f.debug_struct("PrivateKey").field("path", path).finish_non_exhaustive()
            }
        }
    }
}

/// A validated worker node. Capability and credential data is read-only after a directory sync.
#[derive(Debug, Clone)]
pub struct Node {
    pub hostname: String,
    pub username: String,
    pub auth: NodeAuth,
    pub capabilities: BTreeSet<String>,
    pub ports: HashMap<String, u16>,
    pub max_conns: usize,
}

impl Node {
    pub fn from_record(record: NodeRecord, default_max_conns: usize) -> Result<Self> {
        let hostname = record.hostname.trim().to_string();
        if hostname.is_empty() {
            return Err(FleetError::configuration("hostname", "node hostname must not be empty"));
        }

        let auth = match (record.password, record.private_key) {
            (Some(password), None) => NodeAuth::Password(password),
            (None, Some(path)) => NodeAuth::PrivateKey {
                path,
                passphrase: record.passphrase,
            },
            (Some(_), Some(_)) => {
                return Err(FleetError::configuration(
                    "credentials",
                    format!("node {} declares both a password and a private key", hostname),
                ))
            }
            (None, None) => {
                return Err(FleetError::configuration(
                    "credentials",
                    format!("node {} declares neither a password nor a private key", hostname),
                ))
            }
        };

        let capabilities = record
            .services
            .into_iter()
            .chain(record.tools)
            .collect::<BTreeSet<_>>();

        Ok(Self {
            hostname,
            username: record.username,
            auth,
            capabilities,
            ports: record.ports,
            max_conns: record.max_conns.unwrap_or(default_max_conns),
        })
    }

    /// Exact, case-sensitive membership test
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn port_for(&self, service: &str) -> Option<u16> {
        self.ports.get(service).copied()
    }

    pub fn ssh_port(&self, default_port: u16) -> u16 {
        self.port_for(SSH_SERVICE).unwrap_or(default_port)
    }
}

/// Read-only source of node records consumed by the pool
pub trait NodeDirectory: Send + Sync {
    fn list_nodes(&self) -> Result<Vec<Node>>;
}

/// Nodes declared inline in the configuration file
pub struct StaticDirectory {
    nodes: Vec<Node>,
}

impl StaticDirectory {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn from_records(records: &[NodeRecord], default_max_conns: usize) -> Result<Self> {
        let nodes = records
            .iter()
            .cloned()
            .map(|record| Node::from_record(record, default_max_conns))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(nodes))
    }
}

impl NodeDirectory for StaticDirectory {
    fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.nodes.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
struct NodeFile {
    #[serde(default)]
    nodes: Vec<NodeRecord>,
}

/// A TOML file of `[[nodes]]` tables maintained by an administrator, re-read on every sync
pub struct FileDirectory {
    path: PathBuf,
    default_max_conns: usize,
}

impl FileDirectory {
    pub fn new(path: impl AsRef<Path>, default_max_conns: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            default_max_conns,
        }
    }
}

impl NodeDirectory for FileDirectory {
    fn list_nodes(&self) -> Result<Vec<Node>> {
        let content = std::fs::read_to_string(&self.path)?;
        let file: NodeFile = toml::from_str(&content)?;
        debug!("Read {} node records from {}", file.nodes.len(), self.path.display());

        file.nodes
            .into_iter()
            .map(|record| Node::from_record(record, self.default_max_conns))
            .collect()
    }
}

/// Picks the directory implied by the configuration: an external node file when set, else inline nodes
pub fn directory_from_config(config: &Config) -> Result<Arc<dyn NodeDirectory>> {
    let default_max_conns = config.pool.default_max_conns;
    match &config.pool.node_file {
        Some(path) => Ok(Arc::new(FileDirectory::new(path, default_max_conns))),
        None => Ok(Arc::new(StaticDirectory::from_records(&config.nodes, default_max_conns)?)),
    }
}
