use crate::{FleetError, Result};

/// Quoting for values interpolated into remote shell commands
pub mod shell {
    fn is_safe(c: char) -> bool {
        c.is_ascii_alphanumeric() || "-_.,:/=@%+".contains(c)
    }

    /// Returns the value untouched when it needs no quoting, otherwise single-quotes it
    pub fn quote(value: &str) -> String {
        if !value.is_empty() && value.chars().all(is_safe) {
            return value.to_string();
        }
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}

/// Network target utilities
pub mod network {
    use super::*;
    use lazy_static::lazy_static;
    use regex::Regex;

    lazy_static! {
        // hostnames, IPv4/IPv6 addresses, CIDR blocks and nmap-style ranges (10.0.0.1-20)
        static ref TARGET_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9:\[][A-Za-z0-9.:/_\-\[\]]*$").unwrap();
    }

    /// Rejects anything that could break out of a shell argument
    pub fn validate_target(field: &str, target: &str) -> Result<()> {
        if TARGET_PATTERN.is_match(target) {
            Ok(())
        } else {
            Err(FleetError::configuration(
                field,
                format!("invalid target `{}`", target),
            ))
        }
    }
}

/// Progress reporting utilities
pub mod progress {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::Duration;

    pub fn create_spinner(message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();

        pb.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg} {elapsed:.dim}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );

        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }
}

pub mod time {
    use std::time::Duration;

    /// Format duration as human readable string
    pub fn format_duration(duration: Duration) -> String {
        let secs = duration.as_secs();
        let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else if secs > 0 {
            format!("{}s", seconds)
        } else {
            format!("{}ms", duration.as_millis())
        }
    }
}
