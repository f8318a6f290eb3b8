//! Persistent services backed by the usage database.

pub mod commands;
pub mod database;
pub mod decay;
pub mod most_used;
pub mod slots;
pub mod subject_index;
pub mod usage;

pub use commands::{CommandCatalog, CommandCode, UsageSnapshot};
pub use database::Database;
pub use decay::{DecayOutcome, DecayScheduler};
pub use most_used::{MostUsed, MostUsedQuery};
pub use slots::WeekSlot;
pub use subject_index::SubjectIndex;
pub use usage::{RawChoice, UsageBucket, UsageStore};
