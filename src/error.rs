use thiserror::Error;

pub type Result<T> = std::result::Result<T, FleetError>;

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Configuration error in `{field}`: {message}")]
    Configuration { field: String, message: String },

    #[error("No session available for capability `{capability}`")]
    ResourceExhausted { capability: String },

    #[error("Node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("Authentication failed on {host}:{port}: {reason}")]
    Authentication {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Could not connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Timeout occurred during {operation}")]
    Timeout { operation: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FleetError {
    pub fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        FleetError::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Exhaustion is a normal outcome under load; the caller may simply try again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FleetError::ResourceExhausted { .. })
    }

    /// Errors after which the session that produced them must not be reused.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, FleetError::Execution(_) | FleetError::Timeout { .. })
    }
}

impl From<toml::de::Error> for FleetError {
    fn from(err: toml::de::Error) -> Self {
        FleetError::Parse(format!("TOML error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_names_field() {
        let err = FleetError::configuration("scan_type", "unknown value `stealthy`");
        assert_eq!(
            err.to_string(),
            "Configuration error in `scan_type`: unknown value `stealthy`"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_exhaustion_is_retryable() {
        let err = FleetError::ResourceExhausted { capability: "sqlmap".to_string() };
        assert!(err.is_retryable());
        assert!(!err.is_transport_failure());
    }

    #[test]
    fn test_transport_failures() {
        assert!(FleetError::Execution("broken pipe".into()).is_transport_failure());
        assert!(FleetError::Timeout { operation: "nmap".into() }.is_transport_failure());
        assert!(!FleetError::NodeUnavailable("w1".into()).is_transport_failure());
    }
}
