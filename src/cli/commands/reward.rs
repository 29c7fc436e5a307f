//! Reward, streak, and ledger commands.
//!
//! - `stride dispatch <user> <action> <type> <id>`
//! - `stride streak <user>`
//! - `stride ledger <user> [--limit N]`

use crate::cli::commands::{format_timestamp, open_engine};
use crate::cli::commands::progress::print_reward_line;
use crate::error::{Error, Result};
use crate::model::{ActionType, ContentType};
use colored::Colorize;
use std::path::PathBuf;

/// Execute a dispatch command.
pub fn execute_dispatch(
    user: &str,
    action: &str,
    content_type: &str,
    content_id: &str,
    db_path: Option<&PathBuf>,
    actor: &str,
    json_output: bool,
) -> Result<()> {
    let action = ActionType::from_str(action).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "unknown action '{action}' (expected plan_started, plan_completed, or daily_check_in)"
        ))
    })?;
    let content_type = ContentType::from_str(content_type);

    let mut engine = open_engine(db_path, actor)?;
    let outcome = engine.dispatch_action(user, action, &content_type, content_id)?;

    if json_output {
        let json = serde_json::json!({
            "success": true,
            "points_earned": outcome.points_earned,
            "already_earned": outcome.already_earned,
            "total_points": outcome.total_points,
            "streak": outcome.streak,
            "milestone": outcome.milestone,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    if outcome.already_earned {
        // Idempotent no-op renders as confirmation, not failure
        println!("{} {} already counted", "✓".green(), action.as_str());
    } else {
        println!("{} {} recorded", "✓".green(), action.as_str());
    }
    print_reward_line(&outcome);
    Ok(())
}

/// Execute a streak command.
pub fn execute_streak(
    user: &str,
    db_path: Option<&PathBuf>,
    actor: &str,
    json_output: bool,
) -> Result<()> {
    let engine = open_engine(db_path, actor)?;
    let streak = engine.current_streak(user)?;
    let total_points = engine.lifetime_points(user)?;

    if json_output {
        let json = serde_json::json!({
            "streak": streak,
            "total_points": total_points,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    if streak.current > 0 {
        println!("🔥 {}-day streak", streak.current);
    } else {
        println!("{} no active streak", "·".dimmed());
    }
    println!("  longest      {}", streak.longest);
    println!("  active days  {}", streak.total_active_days);
    if let Some(day) = &streak.last_active_day {
        println!("  last active  {day}");
    }
    println!("  points       {total_points}");
    Ok(())
}

/// Execute a ledger command.
pub fn execute_ledger(
    user: &str,
    limit: u32,
    db_path: Option<&PathBuf>,
    actor: &str,
    json_output: bool,
) -> Result<()> {
    let engine = open_engine(db_path, actor)?;
    let entries = engine.ledger(user, limit)?;

    if json_output {
        let count = entries.len();
        let json = serde_json::json!({
            "entries": entries,
            "count": count,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{} no ledger entries", "·".dimmed());
        return Ok(());
    }

    for entry in &entries {
        let content = match (&entry.content_type, &entry.content_id) {
            (Some(t), Some(id)) => format!("{t}/{id}"),
            _ => entry.day_bucket.clone(),
        };
        println!(
            "{:>5}  {:<16} {:<24} {}",
            format!("+{}", entry.points).yellow(),
            entry.action_type.as_str(),
            content,
            format_timestamp(entry.created_at).dimmed()
        );
    }
    Ok(())
}
