//! Output formatting for CLI responses

use anyhow::Error;
use colored::*;
use relaysync_calibration::CalibrationConfig;
use serde::Serialize;
use serde_json::json;

/// One row of a calibration table.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigRow {
    pub id: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<CalibrationConfig>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConfigRow {
    pub fn loaded(id: usize, config: CalibrationConfig) -> Self {
        Self {
            id,
            config: Some(config),
            valid: config.is_valid(),
            error: None,
        }
    }

    pub fn failed(id: usize, error: impl ToString) -> Self {
        Self {
            id,
            config: None,
            valid: false,
            error: Some(error.to_string()),
        }
    }
}

/// Per-relay result of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct RelayReport {
    pub id: u8,
    pub feedback: bool,
    pub config: CalibrationConfig,
    /// Raw error bits of the last feedback measurement.
    pub last_status: u8,
    pub is_on: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub arm_count: u64,
    pub switch_count: u64,
    pub ignored_edges: u64,
    pub cancel_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub synchronized: bool,
    pub mains_hz: u32,
    pub semicycle_us: u64,
    /// `None` when every stored record was restored, otherwise why defaults
    /// were applied.
    pub restore_repaired: Option<String>,
    pub submitted: u64,
    pub completed: u64,
    pub timed_out: u64,
    pub rejected: u64,
    pub sync: SyncSummary,
    pub relays: Vec<RelayReport>,
}

fn print_json(value: &serde_json::Value, what: &str) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format {what} as JSON: {e}"),
    }
}

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    print_json(
        &json!({
            "success": false,
            "error": { "message": error.to_string() }
        }),
        "error",
    );
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {error}", "Error:".red().bold());

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {err}", "Caused by:".yellow());
        source = err.source();
    }
}

pub fn print_config_table(rows: &[ConfigRow], json: bool) {
    if json {
        print_json(&json!({ "success": true, "relays": rows }), "calibration table");
        return;
    }

    println!("{}", "Relay calibration:".bold());
    for row in rows {
        print_config_row(row);
    }
}

fn print_config_row(row: &ConfigRow) {
    match (&row.config, &row.error) {
        (Some(cfg), _) => {
            let marker = if row.valid { "●".green() } else { "●".red() };
            println!(
                "  {} relay {:>3}  on {:>6} µs  off {:>6} µs  delta {:>5} µs",
                marker, row.id, cfg.delay_on_us, cfg.delay_off_us, cfg.delta_us
            );
        }
        (None, Some(error)) => {
            println!("  {} relay {:>3}  {}", "○".dimmed(), row.id, error.dimmed());
        }
        (None, None) => println!("  {} relay {:>3}", "○".dimmed(), row.id),
    }
}

pub fn print_simulation_report(report: &SimulationReport, json: bool) {
    if json {
        print_json(&json!({ "success": true, "report": report }), "simulation report");
        return;
    }

    let mode = if report.synchronized {
        "zero-cross synchronized".green()
    } else {
        "unsynchronized".yellow()
    };
    println!(
        "{} {} Hz mains, {} µs semicycle, {}",
        "Simulation:".bold(),
        report.mains_hz,
        report.semicycle_us,
        mode
    );
    if let Some(cause) = &report.restore_repaired {
        println!("  {} {cause}", "Defaults applied:".yellow());
    }
    println!(
        "  actions: {} submitted, {} completed, {} timed out, {} rejected",
        report.submitted, report.completed, report.timed_out, report.rejected
    );
    println!(
        "  edges:   {} armed, {} switched, {} ignored, {} cancelled",
        report.sync.arm_count,
        report.sync.switch_count,
        report.sync.ignored_edges,
        report.sync.cancel_count
    );
    for relay in &report.relays {
        let status = if !relay.feedback {
            "no feedback".dimmed()
        } else if relay.last_status == 0 {
            "converged".green()
        } else {
            format!("adjusting ({:#06b})", relay.last_status).yellow()
        };
        println!(
            "  relay {:>3}  on {:>6} µs  off {:>6} µs  delta {:>5} µs  {}",
            relay.id,
            relay.config.delay_on_us,
            relay.config.delay_off_us,
            relay.config.delta_us,
            status
        );
    }
}
