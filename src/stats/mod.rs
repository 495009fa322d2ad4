//! Term statistics: stores, the offline builder, and shard sizes.

pub mod builder;
pub mod catalog;
pub mod keys;
pub mod lock;
pub mod sizes;
pub mod sqlite;
pub mod store;

pub use builder::{BuildReport, CorpusStatsBuilder};
pub use catalog::{BuildManifest, ShardSet, StatsCatalog};
pub use keys::TermMoments;
pub use sizes::ShardStats;
pub use sqlite::SqliteStatStore;
pub use store::{MemoryStatStore, StatStore};
