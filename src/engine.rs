//! The relevance engine: everything a launcher needs behind one handle.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::runtime::Handle;

use crate::config::Config;
use crate::core::search::CandidateSource;
use crate::core::session::{SearchSession, SnapshotConsumer};
use crate::error::RankResult;
use crate::registry::SubjectRegistry;
use crate::services::commands::{CommandCatalog, CommandCode, UsageSnapshot};
use crate::services::database::Database;
use crate::services::most_used::{MostUsed, MostUsedQuery};
use crate::services::subject_index::SubjectIndex;
use crate::services::usage::UsageStore;

/// What running a debug command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The usage database was written to this file
    Exported(PathBuf),
    /// The raw choice log is now on (`true`) or off
    RawChoices(bool),
}

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Usage store, search index and debug commands over one database.
pub struct RelevanceEngine {
    config: Config,
    db: Arc<Database>,
    registry: Arc<dyn SubjectRegistry>,
    usage: UsageStore,
    index: Arc<SubjectIndex>,
    most_used: Arc<MostUsedQuery>,
    commands: CommandCatalog,
}

impl RelevanceEngine {
    /// Open (or create) the usage database named by `config`.
    pub fn open(config: Config, registry: Arc<dyn SubjectRegistry>) -> RankResult<Self> {
        let db = Database::open(&config.storage.database_path())?;
        Self::with_database(config, Arc::new(db), registry)
    }

    /// An engine whose usage data lives only as long as it does.
    pub fn open_in_memory(config: Config, registry: Arc<dyn SubjectRegistry>) -> RankResult<Self> {
        Self::with_database(config, Arc::new(Database::open_in_memory()?), registry)
    }

    fn with_database(
        config: Config,
        db: Arc<Database>,
        registry: Arc<dyn SubjectRegistry>,
    ) -> RankResult<Self> {
        let usage = UsageStore::new(Arc::clone(&db), config.scoring.clone());
        usage.init_collect_raw_choices(config.debug.collect_raw_choices)?;

        Ok(Self {
            index: Arc::new(SubjectIndex::new(Arc::clone(&db))),
            most_used: Arc::new(MostUsedQuery::new(Arc::clone(&db), Arc::clone(&registry))),
            commands: CommandCatalog::new(),
            usage,
            registry,
            db,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn usage(&self) -> &UsageStore {
        &self.usage
    }

    pub fn index(&self) -> &SubjectIndex {
        &self.index
    }

    /// Record that the user picked `subject_id` just now.
    pub fn record_choice(&self, subject_id: &str) {
        self.record_choice_at(subject_id, local_now());
    }

    pub fn record_choice_at(&self, subject_id: &str, now: NaiveDateTime) {
        self.usage.record_choice(subject_id, now);
    }

    /// Forget a subject that was uninstalled.
    pub fn remove_subject(&self, subject_id: &str) -> RankResult<()> {
        self.usage.remove_subject(subject_id)?;
        self.index.remove(subject_id)
    }

    /// The configured number of most used subjects for right now.
    pub fn most_used(&self) -> Vec<MostUsed> {
        self.most_used_at(local_now(), Some(self.config.search.most_used_limit))
    }

    pub fn most_used_at(&self, now: NaiveDateTime, limit: Option<usize>) -> Vec<MostUsed> {
        self.most_used.most_used(now, limit)
    }

    /// Rebuild the search index from the registry.
    pub fn reindex(&self) -> RankResult<usize> {
        self.reindex_at(local_now())
    }

    pub fn reindex_at(&self, now: NaiveDateTime) -> RankResult<usize> {
        self.index.rebuild(self.registry.as_ref(), &self.most_used, now)
    }

    pub fn run_command(&self, code: CommandCode) -> RankResult<CommandOutcome> {
        self.run_command_at(code, local_now())
    }

    /// Run a debug command. Exports are timestamped with `now`.
    pub fn run_command_at(&self, code: CommandCode, now: NaiveDateTime) -> RankResult<CommandOutcome> {
        tracing::info!("Running command {}", code.id());
        match code {
            CommandCode::ExportDatabase => {
                let path = self.export_path(now);
                self.export_to_path(&path)?;
                Ok(CommandOutcome::Exported(path))
            }
            CommandCode::CollectRawChoices => {
                self.usage.set_collect_raw_choices(true)?;
                Ok(CommandOutcome::RawChoices(true))
            }
            CommandCode::StopCollectingRawChoices => {
                self.usage.set_collect_raw_choices(false)?;
                Ok(CommandOutcome::RawChoices(false))
            }
        }
    }

    /// Write a JSON snapshot of the usage data to `writer`.
    pub fn export_to<W: Write>(&self, writer: W) -> RankResult<()> {
        UsageSnapshot::capture(&self.usage)?.write_to(writer)
    }

    pub fn export_to_path(&self, path: &Path) -> RankResult<()> {
        UsageSnapshot::capture(&self.usage)?.save_to(path)
    }

    /// `exports/usage-<timestamp>.json` next to the database.
    fn export_path(&self, now: NaiveDateTime) -> PathBuf {
        let database = self.config.storage.database_path();
        let dir = database
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
            .join("exports");
        dir.join(format!("usage-{}.json", now.format("%Y%m%d-%H%M%S")))
    }

    /// A search session over the index and the debug commands.
    pub fn search_session(&self, runtime: Handle, consumer: SnapshotConsumer) -> SearchSession {
        SearchSession::new(
            runtime,
            Arc::clone(&self.index) as Arc<dyn CandidateSource>,
            self.commands.clone(),
            Arc::clone(&self.most_used),
            consumer,
        )
    }

    /// The database shared by every part of the engine.
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}
