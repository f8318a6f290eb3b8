//! Debug commands that can be typed into the search box.
//!
//! They are searched and ranked like apps, and running one acts on the
//! usage database: dumping it as JSON, or toggling the raw choice log.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::usage::{RawChoice, UsageBucket, UsageStore};
use crate::core::matcher;
use crate::core::search::Matchable;
use crate::error::{RankError, RankResult};

/// The known debug commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandCode {
    ExportDatabase,
    CollectRawChoices,
    StopCollectingRawChoices,
}

impl CommandCode {
    pub const ALL: [CommandCode; 3] = [
        CommandCode::ExportDatabase,
        CommandCode::CollectRawChoices,
        CommandCode::StopCollectingRawChoices,
    ];

    /// What the user types to find the command.
    pub fn name(&self) -> &'static str {
        match self {
            CommandCode::ExportDatabase => "/export database",
            CommandCode::CollectRawChoices => "/log app openings",
            CommandCode::StopCollectingRawChoices => "/don't log app openings",
        }
    }

    /// Stable identifier, as used in config files and IPC.
    pub fn id(&self) -> &'static str {
        match self {
            CommandCode::ExportDatabase => "export-database",
            CommandCode::CollectRawChoices => "collect-raw-choices",
            CommandCode::StopCollectingRawChoices => "stop-collecting-raw-choices",
        }
    }

    pub fn from_id(id: &str) -> RankResult<Self> {
        Self::ALL
            .into_iter()
            .find(|code| code.id() == id)
            .ok_or_else(|| RankError::UnknownCommand(id.to_string()))
    }
}

impl Matchable for CommandCode {
    fn match_text(&self) -> &str {
        self.name()
    }
}

/// The searchable list of debug commands.
#[derive(Debug, Clone)]
pub struct CommandCatalog {
    commands: Vec<CommandCode>,
}

impl Default for CommandCatalog {
    fn default() -> Self {
        Self {
            commands: CommandCode::ALL.to_vec(),
        }
    }
}

impl CommandCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands whose name contains `query` as a subsequence, in catalogue order.
    pub fn commands_matching(&self, query: &str) -> Vec<CommandCode> {
        let query = matcher::normalize(query);
        self.commands
            .iter()
            .copied()
            .filter(|code| matcher::is_subsequence(&matcher::normalize(code.name()), &query))
            .collect()
    }
}

/// Everything the usage database knows, as exported by
/// [`CommandCode::ExportDatabase`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub last_decay: Option<i64>,
    pub last_decay_year: Option<i64>,
    pub collect_raw_choices: bool,
    pub usage: Vec<UsageBucket>,
    pub raw_choices: Vec<RawChoice>,
}

impl UsageSnapshot {
    pub fn capture(store: &UsageStore) -> RankResult<Self> {
        let (last_decay, last_decay_year) = store.decay_checkpoint()?;
        Ok(Self {
            last_decay,
            last_decay_year,
            collect_raw_choices: store.collects_raw_choices()?,
            usage: store.all_buckets()?,
            raw_choices: store.raw_choices()?,
        })
    }

    /// Write as pretty-printed JSON.
    pub fn write_to<W: Write>(&self, writer: W) -> RankResult<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Write as pretty-printed JSON to a file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> RankResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        tracing::info!("Exported usage database to {:?}", path);
        Ok(())
    }
}
