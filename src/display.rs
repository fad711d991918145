use crate::pool::NodeStats;
use crate::types::{DumpResult, HarvestReport, HostReport, ScanResult};
use colored::*;

/// Colored terminal output for results and status lines
pub struct DisplayManager {
    use_colors: bool,
    quiet_mode: bool,
}

impl DisplayManager {
    pub fn new() -> Self {
        Self::with_quiet(false)
    }

    pub fn with_quiet(quiet: bool) -> Self {
        let use_colors = std::env::var("NO_COLOR").is_err()
            && std::env::var("TERM").map_or(true, |term| term != "dumb");

        Self {
            use_colors,
            quiet_mode: quiet,
        }
    }

    pub fn print_section_header(&self, title: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("{}", title.bright_cyan().bold());
            println!("{}", "─".repeat(title.chars().count()).bright_cyan());
        } else {
            println!("{}", title);
            println!("{}", "=".repeat(title.len()));
        }
    }

    pub fn print_success(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "✓".bright_green().bold(), message.green());
        } else {
            println!("[✓] {}", message);
        }
    }

    pub fn print_warning(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "!".bright_yellow().bold(), message.yellow());
        } else {
            println!("[!] {}", message);
        }
    }

    /// Errors are printed even in quiet mode
    pub fn print_error(&self, message: &str) {
        if self.use_colors {
            eprintln!("  {} {}", "✗".bright_red().bold(), message.red().bold());
        } else {
            eprintln!("[✗] {}", message);
        }
    }

    pub fn print_info(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "i".bright_blue().bold(), message.blue());
        } else {
            println!("[i] {}", message);
        }
    }

    fn print_warnings(&self, warnings: &[String]) {
        for warning in warnings {
            self.print_warning(warning);
        }
    }

    /// Print discovery results, capped at the first 10 hosts
    pub fn print_host_table(&self, hosts: &[String]) {
        if self.quiet_mode || hosts.is_empty() { return; }

        if self.use_colors {
            println!("\n  📡 {} {}",
                "Discovered Hosts:".bright_white().bold(),
                format!("({})", hosts.len()).bright_black()
            );
            for host in hosts.iter().take(10) {
                println!("    {} {}", "→".bright_green(), host.cyan());
            }
            if hosts.len() > 10 {
                println!("    {} {} more hosts...", "...".bright_black(), hosts.len() - 10);
            }
        } else {
            println!("\nDiscovered Hosts ({}):", hosts.len());
            for host in hosts.iter().take(10) {
                println!("  → {}", host);
            }
            if hosts.len() > 10 {
                println!("  ... {} more hosts", hosts.len() - 10);
            }
        }
    }

    /// Print one host's ports and script findings
    pub fn print_port_results(&self, host: &HostReport) {
        if self.quiet_mode { return; }

        let ports: Vec<_> = host.ports.iter().collect();
        let os = if host.os == "unknown" { String::new() } else { format!(" [{}]", host.os) };

        if ports.is_empty() {
            if self.use_colors {
                println!("  {} {}{} - {}",
                    "•".bright_black(),
                    host.address.cyan(),
                    os.bright_black(),
                    "No ports reported".bright_black()
                );
            } else {
                println!("  • {}{} - No ports reported", host.address, os);
            }
            return;
        }

        if self.use_colors {
            println!("  {} {}{} → {} ports",
                "•".bright_green().bold(),
                host.address.cyan().bold(),
                os.bright_black(),
                ports.len().to_string().yellow().bold()
            );
        } else {
            println!("  • {}{} → {} ports", host.address, os, ports.len());
        }

        for (protocol, port) in &ports {
            let detail = [port.service.as_str(), port.product.as_str(), port.version.as_str()]
                .iter()
                .filter(|s| !s.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(" ");
            if self.use_colors {
                println!("    {} {}/{} {} {}",
                    "→".bright_green(),
                    port.port.to_string().yellow(),
                    protocol,
                    port.state.white(),
                    detail.bright_black()
                );
            } else {
                println!("    → {}/{} {} {}", port.port, protocol, port.state, detail);
            }
        }

        for script in &host.scripts {
            let first_line = script.output.trim().lines().next().unwrap_or_default();
            if self.use_colors {
                println!("    {} {} ({}): {}", "»".blue(), script.id.blue().bold(), script.port, first_line);
            } else {
                println!("    » {} ({}): {}", script.id, script.port, first_line);
            }
        }
    }

    pub fn print_scan_result(&self, result: &ScanResult) {
        self.print_info(&format!("Ran on {}: {}", result.node, result.command));
        for host in &result.hosts {
            self.print_port_results(host);
        }
        self.print_warnings(&result.warnings);
    }

    pub fn print_dump_result(&self, result: &DumpResult) {
        if self.quiet_mode { return; }

        self.print_info(&format!("Ran on {}: {}", result.node, result.command));
        if let Some(dbms) = &result.dbms {
            println!("  DBMS: {}", if self.use_colors { dbms.cyan().bold().to_string() } else { dbms.clone() });
        }
        if let Some(banner) = &result.banner {
            println!("  Banner: {}", banner);
        }
        for point in &result.injection_points {
            println!("  Injectable: {} ({}) via {}", point.parameter, point.place, point.techniques.join(", "));
        }
        for database in &result.databases {
            println!("    → {}", database);
        }
        for table in &result.tables {
            println!("    → {}", table);
        }
        if let Some(dump) = &result.dump {
            if let Some(header) = &dump.header {
                println!("    {}", if self.use_colors { header.bold().to_string() } else { header.clone() });
            }
            for row in &dump.rows {
                println!("    {}", row);
            }
        }
        self.print_warnings(&result.warnings);
    }

    pub fn print_harvest(&self, report: &HarvestReport) {
        if self.quiet_mode { return; }

        self.print_info(&format!("Harvested {} on {}", report.target, report.node));
        if let Some(dbms) = &report.dbms {
            println!("  DBMS: {}", dbms);
        }
        for (database, tables) in &report.databases {
            if self.use_colors {
                println!("  {} {} {}", "•".bright_green().bold(), database.cyan().bold(),
                    format!("({} tables)", tables.len()).bright_black());
            } else {
                println!("  • {} ({} tables)", database, tables.len());
            }
            for table in tables {
                let rows = report
                    .tables
                    .get(&format!("{}.{}", database, table))
                    .map_or(0, |dump| dump.rows.len());
                println!("    → {} [{} preview rows]", table, rows);
            }
        }
        self.print_warnings(&report.warnings);
    }

    pub fn print_node_stats(&self, stats: &[NodeStats]) {
        if self.quiet_mode { return; }

        println!("  {:<24} {:>5} {:>5} {:>5} {:>5}", "NODE", "MAX", "LIVE", "BUSY", "IDLE");
        for node in stats {
            let line = format!("  {:<24} {:>5} {:>5} {:>5} {:>5}",
                node.hostname, node.max_conns, node.live, node.busy, node.available);
            if self.use_colors && node.retired {
                println!("{}", line.bright_black());
            } else {
                println!("{}", line);
            }
        }
    }

    pub fn print_banner(&self, title: &str, subtitle: Option<&str>) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!();
            println!("  {}", "┌─".bright_cyan().to_string() + &"─".repeat(title.len() + 2) + "─┐");
            println!("  {} {} {}",
                "│".bright_cyan(),
                title.bright_white().bold(),
                "│".bright_cyan()
            );
            if let Some(sub) = subtitle {
                println!("  {} {} {}",
                    "│".bright_cyan(),
                    format!("{:^width$}", sub, width = title.len()).bright_black(),
                    "│".bright_cyan()
                );
            }
            println!("  {}", "└─".bright_cyan().to_string() + &"─".repeat(title.len() + 2) + "─┘");
            println!();
        } else {
            let border = "=".repeat(title.len() + 4);
            println!("\n{}", border);
            println!("  {}  ", title);
            if let Some(sub) = subtitle {
                println!("  {}  ", sub);
            }
            println!("{}\n", border);
        }
    }
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}
