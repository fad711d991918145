//! nmap integration: argument assembly, the engine's XML records, and
//! normalisation of those records into [`HostReport`]s.

use crate::types::{HostReport, PortRecord, ProtocolPorts, ScriptRecord};
use crate::utils::{network, shell};
use crate::{FleetError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Connect,
    Syn,
    Ack,
    Null,
    Fin,
    Xmas,
    Udp,
    Ping,
    NoPing,
}

impl ScanType {
    pub const ALL: [ScanType; 9] = [
        ScanType::Connect,
        ScanType::Syn,
        ScanType::Ack,
        ScanType::Null,
        ScanType::Fin,
        ScanType::Xmas,
        ScanType::Udp,
        ScanType::Ping,
        ScanType::NoPing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::Connect => "connect",
            ScanType::Syn => "syn",
            ScanType::Ack => "ack",
            ScanType::Null => "null",
            ScanType::Fin => "fin",
            ScanType::Xmas => "xmas",
            ScanType::Udp => "udp",
            ScanType::Ping => "ping",
            ScanType::NoPing => "no_ping",
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            ScanType::Connect => "-sT",
            ScanType::Syn => "-sS",
            ScanType::Ack => "-sA",
            ScanType::Null => "-sN",
            ScanType::Fin => "-sF",
            ScanType::Xmas => "-sX",
            ScanType::Udp => "-sU",
            ScanType::Ping => "-sn",
            ScanType::NoPing => "-Pn",
        }
    }
}

impl FromStr for ScanType {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self> {
        ScanType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| FleetError::configuration("scan_type", format!("unknown scan type `{}`", s)))
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanOption {
    OsDetect,
    ServiceVersion,
    Aggressive,
}

impl ScanOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanOption::OsDetect => "os-detect",
            ScanOption::ServiceVersion => "service-version",
            ScanOption::Aggressive => "aggressive",
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            ScanOption::OsDetect => "-O",
            ScanOption::ServiceVersion => "-sV",
            ScanOption::Aggressive => "-A",
        }
    }
}

impl FromStr for ScanOption {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "os-detect" | "os" => Ok(ScanOption::OsDetect),
            "service-version" | "services" => Ok(ScanOption::ServiceVersion),
            "aggressive" | "all" => Ok(ScanOption::Aggressive),
            other => Err(FleetError::configuration(
                "options",
                format!("unknown scan option `{}`", other),
            )),
        }
    }
}

/// Mutually exclusive ways of choosing ports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortSelection {
    Top(u32),
    All,
    Range { low: u16, high: u16 },
    List(Vec<u16>),
    Split { tcp: Vec<u16>, udp: Vec<u16> },
}

fn join_ports(ports: &[u16]) -> String {
    ports.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(",")
}

impl PortSelection {
    pub fn validate(&self) -> Result<()> {
        let problem = match self {
            PortSelection::Top(0) => Some("top-ports count must be positive".to_string()),
            PortSelection::Range { low, high } if low > high => {
                Some(format!("range start {} is above range end {}", low, high))
            }
            PortSelection::List(ports) if ports.is_empty() => Some("port list is empty".to_string()),
            PortSelection::Split { tcp, udp } if tcp.is_empty() && udp.is_empty() => {
                Some("tcp and udp port lists are both empty".to_string())
            }
            _ => None,
        };
        match problem {
            Some(message) => Err(FleetError::configuration("ports", message)),
            None => Ok(()),
        }
    }

    /// The ports segment of the argument string, without trailing space
    pub fn segment(&self) -> String {
        match self {
            PortSelection::Top(count) => format!("--top-ports {}", count),
            PortSelection::All => "-p-".to_string(),
            PortSelection::Range { low, high } => format!("-p {}-{}", low, high),
            PortSelection::List(ports) => format!("-p {}", join_ports(ports)),
            PortSelection::Split { tcp, udp } => {
                let mut parts = Vec::new();
                if !tcp.is_empty() {
                    parts.push(format!("T:{}", join_ports(tcp)));
                }
                if !udp.is_empty() {
                    parts.push(format!("U:{}", join_ports(udp)));
                }
                format!("-p {}", parts.join(","))
            }
        }
    }
}

fn parse_port_list(field: &str, value: &str) -> Result<Vec<u16>> {
    value
        .split(',')
        .filter(|p| !p.trim().is_empty())
        .map(|p| {
            p.trim()
                .parse::<u16>()
                .map_err(|_| FleetError::configuration(field, format!("invalid port `{}`", p)))
        })
        .collect()
}

impl FromStr for PortSelection {
    type Err = FleetError;

    /// Accepts `all`, `top:N`, `low-high`, `a,b,c` and `T:a,b,U:c`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let selection = if s == "all" || s == "-" {
            PortSelection::All
        } else if let Some(count) = s.strip_prefix("top:") {
            let count = count
                .parse()
                .map_err(|_| FleetError::configuration("ports", format!("invalid top-ports count `{}`", count)))?;
            PortSelection::Top(count)
        } else if s.starts_with("T:") || s.starts_with("U:") {
            let mut tcp = Vec::new();
            let mut udp = Vec::new();
            let mut in_udp = false;
            for part in s.split(',') {
                let port = if let Some(rest) = part.strip_prefix("T:") {
                    in_udp = false;
                    rest
                } else if let Some(rest) = part.strip_prefix("U:") {
                    in_udp = true;
                    rest
                } else {
                    part
                };
                let ports = parse_port_list("ports", port)?;
                if in_udp {
                    udp.extend(ports);
                } else {
                    tcp.extend(ports);
                }
            }
            PortSelection::Split { tcp, udp }
        } else if let Some((low, high)) = s.split_once('-') {
            let parse = |v: &str| {
                v.trim()
                    .parse::<u16>()
                    .map_err(|_| FleetError::configuration("ports", format!("invalid port range `{}`", s)))
            };
            PortSelection::Range {
                low: parse(low)?,
                high: parse(high)?,
            }
        } else {
            PortSelection::List(parse_port_list("ports", s)?)
        };

        selection.validate()?;
        Ok(selection)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSelection {
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSpec {
    pub targets: Vec<String>,
    pub scan_type: Option<ScanType>,
    #[serde(default)]
    pub options: Vec<ScanOption>,
    pub ports: Option<PortSelection>,
    pub scripts: Option<ScriptSelection>,
}

impl ScanSpec {
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            scan_type: None,
            options: Vec::new(),
            ports: None,
            scripts: None,
        }
    }

    pub fn scan_type(mut self, scan_type: ScanType) -> Self {
        self.scan_type = Some(scan_type);
        self
    }

    pub fn option(mut self, option: ScanOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn ports(mut self, ports: PortSelection) -> Self {
        self.ports = Some(ports);
        self
    }

    pub fn scripts(mut self, scripts: ScriptSelection) -> Self {
        self.scripts = Some(scripts);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(FleetError::configuration("targets", "at least one target is required"));
        }
        for target in &self.targets {
            network::validate_target("targets", target)?;
        }
        if let Some(ports) = &self.ports {
            ports.validate()?;
        }
        Ok(())
    }
}

/// Builds the argument string: ports, scan type, options in insertion order,
/// then scripts. Every segment is followed by one space.
pub fn build_arguments(spec: &ScanSpec) -> Result<String> {
    spec.validate()?;
    let mut args = String::new();

    if let Some(ports) = &spec.ports {
        args.push_str(&ports.segment());
        args.push(' ');
    }
    if let Some(scan_type) = spec.scan_type {
        args.push_str(scan_type.flag());
        args.push(' ');
    }
    for option in &spec.options {
        args.push_str(option.flag());
        args.push(' ');
    }
    if let Some(scripts) = &spec.scripts {
        let names = if scripts.names.is_empty() {
            "default".to_string()
        } else {
            scripts.names.join(",")
        };
        args.push_str(&format!("--script={} ", shell::quote(&names)));
        if !scripts.args.is_empty() {
            args.push_str(&format!("--script-args={} ", shell::quote(&scripts.args.join(","))));
        }
    }

    Ok(args)
}

/// Full remote command; XML goes to stdout for [`parse_xml`]
pub fn scan_command(binary: &str, spec: &ScanSpec) -> Result<String> {
    let args = build_arguments(spec)?;
    Ok(format!("{} -oX - {}{}", binary, args, spec.targets.join(" ")))
}

/// Host discovery without a port scan
pub fn discovery_command(binary: &str, subnet: &str) -> Result<String> {
    network::validate_target("subnet", subnet)?;
    Ok(format!("{} -sn -oX - {}", binary, subnet))
}

/// String-typed scan request as received by a calling layer
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScanRequest {
    pub targets: Vec<String>,
    pub scan_type: Option<String>,
    pub options: Vec<String>,
    pub ports: Option<PortRequest>,
    pub scripts: Option<ScriptSelection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PortRequest {
    #[serde(alias = "top-ports")]
    pub top_ports: Option<u32>,
    #[serde(alias = "all-ports")]
    pub all_ports: bool,
    pub range: Option<(u16, u16)>,
    pub list: Option<Vec<u16>>,
    pub tcp_ports: Option<Vec<u16>>,
    pub udp_ports: Option<Vec<u16>>,
}

impl TryFrom<PortRequest> for PortSelection {
    type Error = FleetError;

    fn try_from(request: PortRequest) -> Result<Self> {
        let split = request.tcp_ports.is_some() || request.udp_ports.is_some();
        let given = [
            request.top_ports.is_some(),
            request.all_ports,
            request.range.is_some(),
            request.list.is_some(),
            split,
        ]
        .iter()
        .filter(|g| **g)
        .count();

        if given != 1 {
            return Err(FleetError::configuration(
                "ports",
                "exactly one of top-ports, all-ports, range, list or tcp/udp lists is required",
            ));
        }

        let selection = if let Some(count) = request.top_ports {
            PortSelection::Top(count)
        } else if request.all_ports {
            PortSelection::All
        } else if let Some((low, high)) = request.range {
            PortSelection::Range { low, high }
        } else if let Some(list) = request.list {
            PortSelection::List(list)
        } else {
            PortSelection::Split {
                tcp: request.tcp_ports.unwrap_or_default(),
                udp: request.udp_ports.unwrap_or_default(),
            }
        };
        selection.validate()?;
        Ok(selection)
    }
}

impl TryFrom<ScanRequest> for ScanSpec {
    type Error = FleetError;

    fn try_from(request: ScanRequest) -> Result<Self> {
        let spec = ScanSpec {
            targets: request.targets,
            scan_type: request.scan_type.as_deref().map(str::parse).transpose()?,
            options: request
                .options
                .iter()
                .map(|o| o.parse())
                .collect::<Result<Vec<_>>>()?,
            ports: request.ports.map(PortSelection::try_from).transpose()?,
            scripts: request.scripts,
        };
        spec.validate()?;
        Ok(spec)
    }
}

// Records of nmap's XML output (`-oX -`). Unknown elements and attributes are ignored.

#[derive(Debug, Default, Deserialize)]
pub struct NmapRun {
    #[serde(rename = "host", default)]
    pub hosts: Vec<NmapHost>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NmapHost {
    #[serde(default)]
    pub status: Option<NmapStatus>,
    #[serde(rename = "address", default)]
    pub addresses: Vec<NmapAddress>,
    #[serde(default)]
    pub ports: Option<NmapPorts>,
    #[serde(default)]
    pub os: Option<NmapOs>,
}

#[derive(Debug, Deserialize)]
pub struct NmapStatus {
    #[serde(rename = "@state")]
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct NmapAddress {
    #[serde(rename = "@addr")]
    pub addr: String,
    #[serde(rename = "@addrtype", default)]
    pub addr_type: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NmapPorts {
    #[serde(rename = "port", default)]
    pub ports: Vec<NmapPort>,
}

#[derive(Debug, Deserialize)]
pub struct NmapPort {
    #[serde(rename = "@protocol")]
    pub protocol: String,
    #[serde(rename = "@portid")]
    pub port_id: u16,
    #[serde(default)]
    pub state: Option<NmapPortState>,
    #[serde(default)]
    pub service: Option<NmapService>,
    #[serde(rename = "script", default)]
    pub scripts: Vec<NmapScript>,
}

#[derive(Debug, Deserialize)]
pub struct NmapPortState {
    #[serde(rename = "@state")]
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct NmapService {
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(rename = "@product", default)]
    pub product: Option<String>,
    #[serde(rename = "@version", default)]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NmapScript {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@output", default)]
    pub output: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NmapOs {
    #[serde(rename = "osmatch", default)]
    pub matches: Vec<NmapOsMatch>,
}

#[derive(Debug, Deserialize)]
pub struct NmapOsMatch {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "osclass", default)]
    pub classes: Vec<NmapOsClass>,
}

#[derive(Debug, Deserialize)]
pub struct NmapOsClass {
    #[serde(rename = "@type", default)]
    pub class_type: Option<String>,
    #[serde(rename = "@osfamily", default)]
    pub family: Option<String>,
}

pub fn parse_xml(xml: &str) -> Result<NmapRun> {
    quick_xml::de::from_str(xml).map_err(|e| FleetError::Parse(format!("nmap XML: {}", e)))
}

impl NmapHost {
    /// The IP address, falling back to whatever address nmap reported first
    pub fn address(&self) -> String {
        self.addresses
            .iter()
            .find(|a| a.addr_type == "ipv4" || a.addr_type == "ipv6")
            .or_else(|| self.addresses.first())
            .map(|a| a.addr.clone())
            .unwrap_or_default()
    }

    pub fn state(&self) -> &str {
        self.status.as_ref().map(|s| s.state.as_str()).unwrap_or("unknown")
    }
}

pub fn normalize_host(host: &NmapHost) -> HostReport {
    let first_match = host.os.as_ref().and_then(|os| os.matches.first());
    let mut ports = ProtocolPorts::default();
    let mut scripts = Vec::new();

    for port in host.ports.iter().flat_map(|p| p.ports.iter()) {
        let service = port.service.as_ref();
        let record = PortRecord {
            port: port.port_id,
            state: port.state.as_ref().map(|s| s.state.clone()).unwrap_or_default(),
            service: service.map(|s| s.name.clone()).unwrap_or_default(),
            product: service.and_then(|s| s.product.clone()).unwrap_or_default(),
            version: service.and_then(|s| s.version.clone()).unwrap_or_default(),
        };
        if !ports.push(&port.protocol, record) {
            debug!("Ignoring port {} with protocol {}", port.port_id, port.protocol);
        }

        scripts.extend(port.scripts.iter().map(|script| ScriptRecord {
            port: port.port_id,
            id: script.id.clone(),
            output: script.output.clone(),
        }));
    }

    HostReport {
        address: host.address(),
        status: host.state().to_string(),
        os: first_match
            .map(|m| m.name.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        os_type: first_match
            .and_then(|m| m.classes.first())
            .and_then(|c| c.class_type.clone()),
        ports,
        scripts,
    }
}

pub fn normalize(run: &NmapRun) -> Vec<HostReport> {
    run.hosts.iter().map(normalize_host).collect()
}

/// Addresses of hosts reported up by a discovery run
pub fn up_hosts(run: &NmapRun) -> Vec<String> {
    run.hosts
        .iter()
        .filter(|h| h.state() == "up")
        .map(NmapHost::address)
        .filter(|a| !a.is_empty())
        .collect()
}
