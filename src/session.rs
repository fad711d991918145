use crate::config::PoolConfig;
use crate::node::{Node, NodeAuth};
use crate::{FleetError, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{ErrorKind, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

/// Exit status and captured streams of one remote command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Executing,
    Closed,
}

/// One live, authenticated shell connection
pub trait ShellTransport: Send {
    /// Runs a command to completion. Returns `Timeout` once the deadline passes;
    /// any error leaves the connection in an unknown state.
    fn exec(&mut self, command: &str, timeout: Option<Duration>) -> Result<CommandOutput>;

    fn disconnect(&mut self);
}

pub trait Connector: Send + Sync {
    fn connect(&self, node: &Node) -> Result<Box<dyn ShellTransport>>;
}

pub struct RemoteSession {
    id: u64,
    hostname: String,
    state: ConnectionState,
    transport: Option<Box<dyn ShellTransport>>,
}

impl fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSession")
            .field("id", &self.id)
            .field("hostname", &self.hostname)
            .field("state", &self.state)
            .finish()
    }
}

impl RemoteSession {
    pub fn new(id: u64, hostname: impl Into<String>) -> Self {
        Self {
            id,
            hostname: hostname.into(),
            state: ConnectionState::Disconnected,
            transport: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    /// Connected and idle; a session left `Executing` by an unwound command is not
    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// On failure the session ends up `Closed` and must not be registered as live.
    pub fn connect(&mut self, node: &Node, connector: &dyn Connector) -> Result<()> {
        if self.state != ConnectionState::Disconnected {
            return Err(FleetError::Execution(format!(
                "session {} on {} cannot connect from state {:?}",
                self.id, self.hostname, self.state
            )));
        }

        self.state = ConnectionState::Connecting;
        match connector.connect(node) {
            Ok(transport) => {
                self.transport = Some(transport);
                self.state = ConnectionState::Connected;
                info!("Opened session {} on {}", self.id, self.hostname);
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Closed;
                Err(e)
            }
        }
    }

    /// A non-zero exit code is data, not an error. Transport failures and
    /// timeouts close the session before the error is returned.
    pub fn execute(&mut self, command: &str, timeout: Option<Duration>) -> Result<CommandOutput> {
        if !self.is_ready() {
            let err = FleetError::Execution(format!(
                "session {} on {} is not ready ({:?})",
                self.id, self.hostname, self.state
            ));
            self.close();
            return Err(err);
        }
        let transport = self.transport.as_mut().ok_or_else(|| {
            FleetError::Execution(format!("session {} has no transport", self.id))
        })?;

        self.state = ConnectionState::Executing;
        debug!("[{}#{}] $ {}", self.hostname, self.id, command);
        let result = transport.exec(command, timeout);
        self.state = ConnectionState::Connected;

        match result {
            Ok(output) => {
                if !output.success() {
                    debug!(
                        "[{}#{}] command exited with status {}",
                        self.hostname, self.id, output.exit_code
                    );
                }
                Ok(output)
            }
            Err(e) => {
                warn!("Closing session {} on {} after failure: {}", self.id, self.hostname, e);
                self.close();
                Err(e)
            }
        }
    }

    /// Idempotent
    pub fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.disconnect();
            debug!("Closed session {} on {}", self.id, self.hostname);
        }
        self.state = ConnectionState::Closed;
    }
}

/// Opens sessions over SSH using the node's single configured credential
pub struct SshConnector {
    default_port: u16,
    connect_timeout: Duration,
}

impl SshConnector {
    pub fn new(default_port: u16, connect_timeout: Duration) -> Self {
        Self {
            default_port,
            connect_timeout,
        }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.default_ssh_port, config.connect_timeout())
    }
}

impl Connector for SshConnector {
    fn connect(&self, node: &Node) -> Result<Box<dyn ShellTransport>> {
        let port = node.ssh_port(self.default_port);
        let connect_error = |reason: String| FleetError::Connect {
            host: node.hostname.clone(),
            port,
            reason,
        };
        let auth_error = |reason: String| FleetError::Authentication {
            host: node.hostname.clone(),
            port,
            reason,
        };

        let addr = (node.hostname.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| connect_error(e.to_string()))?
            .next()
            .ok_or_else(|| connect_error("hostname did not resolve".to_string()))?;

        let tcp = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| connect_error(format!("TCP connection failed: {}", e)))?;

        let mut session = ssh2::Session::new()
            .map_err(|e| connect_error(format!("SSH session creation failed: {}", e)))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(millis(self.connect_timeout));
        session
            .handshake()
            .map_err(|e| connect_error(format!("SSH handshake failed: {}", e)))?;

        let auth_result = match &node.auth {
            NodeAuth::Password(password) => session.userauth_password(&node.username, password),
            NodeAuth::PrivateKey { path, passphrase } => {
                session.userauth_pubkey_file(&node.username, None, path, passphrase.as_deref())
            }
        };
        auth_result.map_err(|e| auth_error(e.to_string()))?;

        if !session.authenticated() {
            return Err(auth_error("server rejected credentials".to_string()));
        }

        Ok(Box::new(SshTransport {
            session,
            io_timeout_ms: millis(self.connect_timeout),
        }))
    }
}

/// libssh2 reports an elapsed blocking timeout as this session error code
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;

fn millis(duration: Duration) -> u32 {
    duration.as_millis().clamp(1, u32::MAX as u128) as u32
}

/// Blocking timeout for the next libssh2 call: 0 (no limit) without a deadline,
/// the time left otherwise, or `None` once the deadline has passed.
fn blocking_timeout_ms(deadline: Option<Instant>, now: Instant) -> Option<u32> {
    match deadline {
        None => Some(0),
        Some(deadline) => deadline.checked_duration_since(now).map(millis),
    }
}

fn channel_error(command: &str, e: ssh2::Error) -> FleetError {
    if matches!(e.code(), ssh2::ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT)) {
        command_timeout(command)
    } else {
        FleetError::Execution(format!("SSH channel error: {}", e))
    }
}

fn command_timeout(command: &str) -> FleetError {
    FleetError::Timeout {
        operation: format!("remote command `{}`", command),
    }
}

struct SshTransport {
    session: ssh2::Session,
    io_timeout_ms: u32,
}

impl SshTransport {
    fn read_chunk(reader: &mut impl Read, sink: &mut Vec<u8>, buf: &mut [u8]) -> Result<bool> {
        match reader.read(buf) {
            Ok(0) => Ok(false),
            Ok(n) => {
                sink.extend_from_slice(&buf[..n]);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(FleetError::Execution(format!("SSH read failed: {}", e))),
        }
    }

    /// Switches to blocking mode bounded by what is left of the deadline
    fn block_until(&self, command: &str, deadline: Option<Instant>) -> Result<()> {
        let timeout_ms = blocking_timeout_ms(deadline, Instant::now()).ok_or_else(|| command_timeout(command))?;
        self.session.set_blocking(true);
        self.session.set_timeout(timeout_ms);
        Ok(())
    }
}

impl ShellTransport for SshTransport {
    fn exec(&mut self, command: &str, timeout: Option<Duration>) -> Result<CommandOutput> {
        let deadline = timeout.map(|t| Instant::now() + t);

        self.block_until(command, deadline)?;
        let mut channel = self.session.channel_session().map_err(|e| channel_error(command, e))?;
        self.block_until(command, deadline)?;
        channel.exec(command).map_err(|e| channel_error(command, e))?;
        self.session.set_blocking(false);

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut buf = [0u8; 8192];

        loop {
            let mut progressed = Self::read_chunk(&mut channel, &mut stdout, &mut buf)?;
            progressed |= Self::read_chunk(&mut channel.stderr(), &mut stderr, &mut buf)?;

            if channel.eof() && !progressed {
                break;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(command_timeout(command));
                }
            }
            if !progressed {
                std::thread::sleep(Duration::from_millis(20));
            }
        }

        self.block_until(command, deadline)?;
        channel.wait_close().map_err(|e| channel_error(command, e))?;
        let exit_code = channel.exit_status().map_err(|e| channel_error(command, e))?;

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    fn disconnect(&mut self) {
        self.session.set_blocking(true);
        self.session.set_timeout(self.io_timeout_ms);
        if let Err(e) = self.session.disconnect(None, "session closed", None) {
            debug!("SSH disconnect failed: {}", e);
        }
    }
}
