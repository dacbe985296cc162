//! Cycle-event journaling.

mod jsonl;

pub use jsonl::JsonlLogger;
