use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::ConfigurationInvalid;
use crate::sync::{SourceBoard, SyncConfig};

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub trello: TrelloConfig,
    pub sync: SyncSettings,
}

#[derive(Debug, Deserialize)]
pub struct TrelloConfig {
    pub api_key: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SyncSettings {
    /// Name of the master board; must be a key of `boards`.
    pub master_board: String,
    /// Board name -> remote board id.
    pub boards: HashMap<String, String>,
    /// Boards mirrored onto the master, in sync order.
    pub source_boards: Vec<String>,
    /// Source board name -> master list name. A source absent here is valid
    /// config; its cards are counted as unmapped at sync time.
    #[serde(default)]
    pub list_mapping: HashMap<String, String>,
}

fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".boardsync")
        .join("config.toml")
}

pub fn load_config() -> Result<AppConfig> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig =
        toml::from_str(&contents).with_context(|| "Failed to parse config.toml")?;
    config.validate()?;
    Ok(config)
}

impl AppConfig {
    /// Fail fast at startup on an incomplete board setup rather than
    /// surfacing missing ids halfway through a sync pass.
    pub fn validate(&self) -> std::result::Result<(), ConfigurationInvalid> {
        let sync = &self.sync;
        if !sync.boards.contains_key(&sync.master_board) {
            return Err(ConfigurationInvalid(format!(
                "master board '{}' has no id in [sync.boards]",
                sync.master_board
            )));
        }
        if sync.source_boards.is_empty() {
            return Err(ConfigurationInvalid(
                "no source boards configured".to_string(),
            ));
        }
        for source in &sync.source_boards {
            if !sync.boards.contains_key(source) {
                return Err(ConfigurationInvalid(format!(
                    "source board '{source}' has no id in [sync.boards]"
                )));
            }
            if source == &sync.master_board {
                return Err(ConfigurationInvalid(format!(
                    "source board '{source}' is the master board"
                )));
            }
        }
        for source in sync.list_mapping.keys() {
            if !sync.source_boards.contains(source) {
                return Err(ConfigurationInvalid(format!(
                    "list mapping refers to unknown source board '{source}'"
                )));
            }
        }
        Ok(())
    }

    pub fn sync_config(&self) -> SyncConfig {
        let sync = &self.sync;
        SyncConfig {
            master_board_id: sync.boards[&sync.master_board].clone(),
            sources: sync
                .source_boards
                .iter()
                .map(|name| SourceBoard {
                    name: name.clone(),
                    id: sync.boards[name].clone(),
                })
                .collect(),
            list_mapping: sync.list_mapping.clone(),
        }
    }

    pub fn master_board_id(&self) -> &str {
        &self.sync.boards[&self.sync.master_board]
    }
}
