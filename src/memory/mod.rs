//! Agent Memory System
//!
//! Session conversation history plus the shared relational memory log
//! that seeds every system prompt.

pub mod relational;
pub mod store;

pub use relational::{FileMemoryStore, InMemoryMemoryStore, MemoryStore};
pub use store::Conversation;
