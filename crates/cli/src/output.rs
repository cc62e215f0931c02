//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use std::cmp::Ordering;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a value as pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: i64) -> String {
    const KB: i64 = 1024;
    const MB: i64 = KB * 1024;
    const GB: i64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2}Gi", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2}Mi", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}Ki", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// Format a milli-unit quantity for the given resource
pub fn format_quantity(milli: i64, resource: &str) -> String {
    match resource {
        "cpu" => {
            if milli >= 1000 {
                format!("{:.1}", milli as f64 / 1000.0)
            } else {
                format!("{}m", milli)
            }
        }
        "memory" | "ephemeral-storage" => format_bytes(milli / 1000),
        _ => format!("{}m", milli),
    }
}

/// Format a percentage
pub fn format_percent(value: f64) -> String {
    format!("{:.0}%", value)
}

/// Color a target replica count by scaling direction
pub fn color_replicas(current: i32, target: i32) -> String {
    let formatted = target.to_string();
    match target.cmp(&current) {
        Ordering::Greater => formatted.yellow().to_string(),
        Ordering::Less => formatted.blue().to_string(),
        Ordering::Equal => formatted.green().to_string(),
    }
}

/// Describe a scaling direction
pub fn scaling_direction(current: i32, target: i32) -> &'static str {
    match target.cmp(&current) {
        Ordering::Greater => "scale up",
        Ordering::Less => "scale down",
        Ordering::Equal => "no change",
    }
}
