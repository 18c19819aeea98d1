//! Relational memory
//!
//! An append-only text log shared by foreground and background agents.
//! The loop reads its tail when building the system prompt; designated
//! tools and the background worker append timestamped blocks.

use crate::error::AgentError;
use crate::Result;
use chrono::Local;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

/// Trait for the external memory store
#[async_trait::async_trait]
pub trait MemoryStore: Send + Sync {
    /// Most recent `max_chars` characters of the log
    async fn read_tail(&self, max_chars: usize) -> Result<String>;

    /// Append a timestamped block. Existing content is never rewritten.
    async fn append(&self, label: &str, body: &str) -> Result<()>;
}

pub fn format_block(label: &str, body: &str) -> String {
    let timestamp = Local::now().format("%d/%m/%Y %H:%M");
    format!("\n\n--- {} ({}) ---\n{}\n", label, timestamp, body.trim_end())
}

fn tail_chars(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    text.chars().skip(total - max_chars).collect()
}

/// File-backed store
pub struct FileMemoryStore {
    path: PathBuf,
    // Serializes appends from tasks within this process
    write_lock: Mutex<()>,
}

impl FileMemoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl MemoryStore for FileMemoryStore {
    async fn read_tail(&self, max_chars: usize) -> Result<String> {
        match fs::read_to_string(&self.path).await {
            Ok(text) => Ok(tail_chars(&text, max_chars)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(AgentError::Memory(format!(
                "cannot read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn append(&self, label: &str, body: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                AgentError::Memory(format!("cannot open {}: {}", self.path.display(), e))
            })?;

        file.write_all(format_block(label, body).as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// In-memory store for development and tests
#[derive(Default)]
pub struct InMemoryMemoryStore {
    log: Arc<RwLock<String>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            log: Arc::new(RwLock::new(content.into())),
        }
    }

    pub async fn contents(&self) -> String {
        self.log.read().await.clone()
    }
}

#[async_trait::async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn read_tail(&self, max_chars: usize) -> Result<String> {
        let log = self.log.read().await;
        Ok(tail_chars(&log, max_chars))
    }

    async fn append(&self, label: &str, body: &str) -> Result<()> {
        let mut log = self.log.write().await;
        log.push_str(&format_block(label, body));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_chars_keeps_end() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("abc", 10), "abc");
        // Multi-byte characters are not split
        assert_eq!(tail_chars("prezzo €€€", 2), "€€");
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMemoryStore::new(dir.path().join("absent.txt"));
        assert_eq!(store.read_tail(100).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_file_store_appends_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMemoryStore::new(dir.path().join("nested").join("memory.txt"));

        store.append("ALPHA HUNTER LOG", "feature list").await.unwrap();
        store.append("AGENT INSIGHT", "pool depth < $50k").await.unwrap();

        let text = store.read_tail(10_000).await.unwrap();
        let first = text.find("--- ALPHA HUNTER LOG (").unwrap();
        let second = text.find("--- AGENT INSIGHT (").unwrap();
        assert!(first < second);
        assert!(text.ends_with("pool depth < $50k\n"));

        let tail = store.read_tail(10).await.unwrap();
        assert_eq!(tail.chars().count(), 10);
    }

    #[tokio::test]
    async fn test_concurrent_appends_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileMemoryStore::new(dir.path().join("memory.txt")));

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append("WORKER", &format!("entry {}", i)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let text = store.read_tail(100_000).await.unwrap();
        assert_eq!(text.matches("--- WORKER (").count(), 8);
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryMemoryStore::with_content("older notes");
        store.append("AGENT INSIGHT", "BTC dominance rising").await.unwrap();
        assert!(store.contents().await.starts_with("older notes"));
        assert!(store.read_tail(3000).await.unwrap().contains("BTC dominance rising"));
    }
}
