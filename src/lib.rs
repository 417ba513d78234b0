//! ghflow: periodic ingestion of the public GitHub events feed with
//! in-memory summaries and SQLite persistence.

pub mod api;
pub mod pipeline;
