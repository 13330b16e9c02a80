use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::config;
use crate::gateway::trello::TrelloGateway;
use crate::gateway::BoardGateway;
use crate::sync::SyncEngine;
use crate::views::{self, Dimension, ViewManager};
use crate::webhook;

/// Dispatch a CLI invocation. Commands print JSON reports/views to stdout;
/// a scheduler drives `sync` as its single entry point.
pub async fn run(args: &[String]) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("sync") => handle_sync().await,
        Some("views") => handle_views().await,
        Some("view") => handle_view(&args[1..]).await,
        Some("week") => handle_week(&args[1..]).await,
        Some("boards") => handle_boards().await,
        Some("analyze") => handle_analyze(&args[1..]).await,
        Some("event") => handle_event(),
        Some("help") | None => {
            print_help();
            Ok(())
        }
        Some(other) => bail!("Unknown command: {other}. Run `boardsync help` for usage."),
    }
}

fn gateway() -> Result<(Arc<dyn BoardGateway>, config::AppConfig)> {
    let config = config::load_config()?;
    let gateway = TrelloGateway::new(
        config.trello.api_key.clone(),
        config.trello.token.clone(),
    );
    Ok((Arc::new(gateway), config))
}

async fn handle_sync() -> Result<()> {
    let (gateway, config) = gateway()?;
    let engine = SyncEngine::new(gateway, config.sync_config());
    let report = engine.run_full_sync().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn handle_views() -> Result<()> {
    let (gateway, config) = gateway()?;
    let manager = ViewManager::new(gateway, config.master_board_id());
    let summaries = manager.list_views().await?;
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}

async fn handle_view(args: &[String]) -> Result<()> {
    let (dimension, value) = parse_view_args(args)?;
    let (gateway, config) = gateway()?;
    let manager = ViewManager::new(gateway, config.master_board_id());
    let view = manager.view_by(dimension, &value).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

async fn handle_week(args: &[String]) -> Result<()> {
    let Some(label) = args.first() else {
        bail!("Usage: boardsync week <week-label>");
    };
    let (gateway, config) = gateway()?;
    let manager = ViewManager::new(gateway, config.master_board_id());
    let view = manager.weekly_view(label).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

async fn handle_boards() -> Result<()> {
    let (gateway, _) = gateway()?;
    let boards = gateway.list_boards().await?;
    println!("{}", serde_json::to_string_pretty(&boards)?);
    Ok(())
}

/// Structural breakdown of one board, or of every visible board when no id
/// is given.
async fn handle_analyze(args: &[String]) -> Result<()> {
    let (gateway, _) = gateway()?;
    let analyses = match args.first() {
        Some(board_id) => vec![views::analyze_board(gateway.as_ref(), board_id).await?],
        None => views::analyze_all_boards(gateway.as_ref()).await?,
    };
    println!("{}", serde_json::to_string_pretty(&analyses)?);
    Ok(())
}

/// Normalize a webhook payload read from stdin and print the flat event.
/// Lets an HTTP front end (or an operator replaying a payload) reuse the
/// relay without linking against the library.
fn handle_event() -> Result<()> {
    let mut raw = String::new();
    std::io::Read::read_to_string(&mut std::io::stdin(), &mut raw)
        .context("Failed to read webhook payload from stdin")?;
    let payload: webhook::WebhookPayload =
        serde_json::from_str(&raw).context("Failed to parse webhook payload")?;
    let event = webhook::normalize(payload);
    println!("{}", serde_json::to_string_pretty(&event.to_json())?);
    Ok(())
}

/// Parse `boardsync view <dimension> <value...>` arguments.
pub fn parse_view_args(args: &[String]) -> Result<(Dimension, String)> {
    let Some(dimension) = args.first() else {
        bail!("Usage: boardsync view <client|project|assignee|milestone> <value>");
    };
    let dimension: Dimension = match dimension.parse() {
        Ok(d) => d,
        Err(e) => bail!("{e}"),
    };
    let value = args[1..].join(" ");
    if value.is_empty() {
        bail!("Missing filter value. Usage: boardsync view <dimension> <value>");
    }
    Ok((dimension, value))
}

pub fn print_help() {
    println!("boardsync — mirror source boards onto a master board and query views\n");
    println!("USAGE:");
    println!("  boardsync sync                    Run one full sync pass (create + refresh)");
    println!("  boardsync views                   List view summaries for every distinct filter value");
    println!("  boardsync view <dimension> <value>  Show one filtered view (client, project, assignee, milestone)");
    println!("  boardsync week <label>            Show cards labelled with a week identifier");
    println!("  boardsync boards                  List boards visible to the configured token");
    println!("  boardsync analyze [board-id]      Card/list breakdown and completion rate, one board or all");
    println!("  boardsync event                   Normalize a webhook payload read from stdin");
    println!();
    println!("Configuration lives in ~/.boardsync/config.toml.");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(strs: &[&str]) -> Vec<String> {
        strs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_view_dimension_and_value() {
        let (dimension, value) = parse_view_args(&args(&["client", "Acme"])).unwrap();
        assert_eq!(dimension, Dimension::Client);
        assert_eq!(value, "Acme");
    }

    #[test]
    fn parse_view_joins_multi_word_values() {
        let (dimension, value) =
            parse_view_args(&args(&["project", "iLitigate", "2.0"])).unwrap();
        assert_eq!(dimension, Dimension::Project);
        assert_eq!(value, "iLitigate 2.0");
    }

    #[test]
    fn parse_view_rejects_unknown_dimension() {
        let result = parse_view_args(&args(&["sprint", "12"]));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("unknown dimension"));
    }

    #[test]
    fn parse_view_requires_a_value() {
        assert!(parse_view_args(&args(&["client"])).is_err());
        assert!(parse_view_args(&args(&[])).is_err());
    }
}
