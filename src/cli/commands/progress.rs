//! Progress tracking commands.
//!
//! - `stride progress start <user> <type> <id> --items a,b,c`
//! - `stride progress toggle <user> <type> <id> <item>`
//! - `stride progress complete <user> <type> <id>`
//! - `stride progress show <user> <type> <id>`

use crate::cli::ProgressCommands;
use crate::cli::commands::{format_timestamp, open_engine};
use crate::content::StaticCatalog;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::model::{ContentType, PlanProgress};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct ProgressOutput {
    id: String,
    user_id: String,
    content_type: String,
    content_id: String,
    status: String,
    completed_item_ids: Vec<String>,
    total_item_count: u32,
    percent_complete: u32,
    reward_claimed: bool,
    started_at: String,
    completed_at: Option<String>,
}

impl From<&PlanProgress> for ProgressOutput {
    fn from(p: &PlanProgress) -> Self {
        Self {
            id: p.id.clone(),
            user_id: p.user_id.clone(),
            content_type: p.content_type.as_str().to_string(),
            content_id: p.content_id.clone(),
            status: p.status.as_str().to_string(),
            completed_item_ids: p.completed_item_ids.clone(),
            total_item_count: p.total_item_count,
            percent_complete: p.percent_complete(),
            reward_claimed: p.reward_claimed,
            started_at: format_timestamp(p.started_at),
            completed_at: p.completed_at.map(format_timestamp),
        }
    }
}

/// Execute a progress command.
pub fn execute(
    command: &ProgressCommands,
    db_path: Option<&PathBuf>,
    actor: &str,
    json_output: bool,
) -> Result<()> {
    let mut engine = open_engine(db_path, actor)?;

    match command {
        ProgressCommands::Start {
            user,
            content_type,
            content_id,
            items,
        } => execute_start(&mut engine, user, content_type, content_id, items, json_output),
        ProgressCommands::Toggle {
            user,
            content_type,
            content_id,
            item_id,
        } => execute_toggle(&mut engine, user, content_type, content_id, item_id, json_output),
        ProgressCommands::Complete {
            user,
            content_type,
            content_id,
        } => execute_complete(&mut engine, user, content_type, content_id, json_output),
        ProgressCommands::Show {
            user,
            content_type,
            content_id,
        } => execute_show(&engine, user, content_type, content_id, json_output),
    }
}

fn execute_start(
    engine: &mut Engine,
    user: &str,
    content_type: &str,
    content_id: &str,
    items: &[String],
    json_output: bool,
) -> Result<()> {
    let content_type = ContentType::from_str(content_type);
    let catalog = StaticCatalog::single(&content_type, content_id, items.to_vec());

    let outcome = engine.start_progress(user, &content_type, content_id, &catalog)?;

    if json_output {
        let json = serde_json::json!({
            "success": true,
            "already_started": outcome.already_started,
            "progress": ProgressOutput::from(&outcome.progress),
            "reward": outcome.reward,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    if outcome.already_started {
        println!(
            "{} {}/{} was already started",
            "✓".green(),
            content_type.as_str(),
            content_id
        );
    } else {
        println!(
            "{} Started {}/{} with {} items",
            "✓".green(),
            content_type.as_str(),
            content_id,
            outcome.progress.total_item_count
        );
        if let Some(reward) = outcome.reward {
            print_reward_line(&reward);
        }
    }
    Ok(())
}

fn execute_toggle(
    engine: &mut Engine,
    user: &str,
    content_type: &str,
    content_id: &str,
    item_id: &str,
    json_output: bool,
) -> Result<()> {
    let content_type = ContentType::from_str(content_type);
    let outcome = engine.toggle_progress_item(user, &content_type, content_id, item_id)?;

    if json_output {
        let percent = outcome.progress.percent_complete();
        let json = serde_json::json!({
            "success": true,
            "status": outcome.progress.status.as_str(),
            "completed_item_ids": &outcome.progress.completed_item_ids,
            "percent_complete": percent,
            "just_completed": outcome.just_completed,
            "reward": outcome.reward,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    let checked = outcome.progress.completed_item_ids.iter().any(|i| i == item_id);
    let mark = if checked { "☑".green() } else { "☐".yellow() };
    println!(
        "{mark} {item_id}  ({}/{} items, {}%)",
        outcome.progress.completed_item_ids.len(),
        outcome.progress.total_item_count,
        outcome.progress.percent_complete()
    );

    if outcome.just_completed {
        println!("{} Plan complete!", "★".green().bold());
        if let Some(reward) = outcome.reward {
            print_reward_line(&reward);
        }
    }
    Ok(())
}

fn execute_complete(
    engine: &mut Engine,
    user: &str,
    content_type: &str,
    content_id: &str,
    json_output: bool,
) -> Result<()> {
    let content_type = ContentType::from_str(content_type);
    let outcome = engine.complete_progress(user, &content_type, content_id)?;

    if json_output {
        let json = serde_json::json!({
            "success": true,
            "already_completed": outcome.already_completed,
            "progress": ProgressOutput::from(&outcome.progress),
            "reward": outcome.reward,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    if outcome.already_completed {
        println!("{} {content_id} was already completed", "✓".green());
    } else {
        println!("{} Completed {content_id}", "★".green().bold());
        if let Some(reward) = outcome.reward {
            print_reward_line(&reward);
        }
    }
    Ok(())
}

fn execute_show(
    engine: &Engine,
    user: &str,
    content_type: &str,
    content_id: &str,
    json_output: bool,
) -> Result<()> {
    let content_type = ContentType::from_str(content_type);
    let p = engine
        .get_progress(user, &content_type, content_id)?
        .ok_or_else(|| Error::ProgressNotFound {
            user_id: user.to_string(),
            content_type: content_type.as_str().to_string(),
            content_id: content_id.to_string(),
        })?;

    if json_output {
        let json = serde_json::json!({
            "progress": ProgressOutput::from(&p),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!(
        "{} {}/{}  [{}]  {}% ({}/{})",
        if p.status.as_str() == "completed" {
            "★".green()
        } else {
            "▸".cyan()
        },
        p.content_type.as_str(),
        p.content_id,
        p.status.as_str().bold(),
        p.percent_complete(),
        p.completed_item_ids.len(),
        p.total_item_count
    );
    println!("  started   {}", format_timestamp(p.started_at).dimmed());
    if let Some(completed_at) = p.completed_at {
        println!("  completed {}", format_timestamp(completed_at).dimmed());
    }
    for item in &p.completed_item_ids {
        println!("  {} {item}", "☑".green());
    }
    Ok(())
}

pub(crate) fn print_reward_line(reward: &crate::model::DispatchOutcome) {
    if reward.already_earned {
        println!(
            "  {} already earned (total {} points)",
            "◆".dimmed(),
            reward.total_points
        );
        return;
    }
    println!(
        "  {} +{} points (total {})",
        "◆".yellow(),
        reward.points_earned,
        reward.total_points
    );
    if reward.streak.current > 1 {
        println!("  {} {}-day streak", "🔥", reward.streak.current);
    }
    if let Some(milestone) = reward.milestone {
        println!(
            "  {} milestone reached: {} {}",
            "▲".magenta(),
            milestone.kind.as_str(),
            milestone.threshold
        );
    }
}
