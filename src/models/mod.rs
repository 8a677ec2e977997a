pub mod queue_entry;

pub use queue_entry::{EntryUpdate, HttpMethod, QueueCounts, QueueEntry, QueueStatus};
