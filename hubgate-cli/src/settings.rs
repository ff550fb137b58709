//! Settings listing for stored consent decisions.

use std::collections::HashMap;

use chrono::{DateTime, Local};
use hubgate_core::{ConsentCoordinator, ConsentDecision};

use crate::error::CliError;

/// Format one decision as a settings row: origin, badge and decision date.
pub fn format_decision(origin: &str, decision: &ConsentDecision) -> String {
    let date: DateTime<Local> = decision.timestamp.into();
    format!(
        "{:<40} {:<15} {}",
        origin,
        decision.status().label(),
        date.format("%Y-%m-%d %H:%M")
    )
}

/// Format every decision, sorted by origin.
pub fn format_decisions(decisions: &HashMap<String, ConsentDecision>) -> String {
    if decisions.is_empty() {
        return "No websites have requested access yet.".to_string();
    }

    let mut origins: Vec<&String> = decisions.keys().collect();
    origins.sort();
    origins
        .into_iter()
        .map(|origin| format_decision(origin, &decisions[origin]))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print every stored decision.
pub async fn print_decisions(coordinator: &ConsentCoordinator) -> Result<(), CliError> {
    let decisions = coordinator.decisions().await?;
    println!("{}", format_decisions(&decisions));
    Ok(())
}
