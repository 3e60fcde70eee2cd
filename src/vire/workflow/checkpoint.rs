// SPDX-License-Identifier: MIT

//! Session checkpoints
//!
//! A run writes snapshots of its [`WorkflowState`](super::state::WorkflowState)
//! under a thread id. Nothing reads them back mid-run; they exist so a run can
//! be identified and inspected afterwards.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::adk::error::Result;

const DEFAULT_NAMESPACE: &str = "vire";

/// Identifies the thread a run's checkpoints belong to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadConfig {
    pub thread_id: String,
    pub checkpoint_ns: String,
}

/// Config for `thread_id`; a blank id gets a fresh uuid
pub fn create_thread_config(thread_id: &str) -> ThreadConfig {
    let thread_id = match thread_id.trim() {
        "" => uuid::Uuid::new_v4().to_string(),
        id => id.to_string(),
    };
    ThreadConfig {
        thread_id,
        checkpoint_ns: DEFAULT_NAMESPACE.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub stage: String,
    pub saved_at: DateTime<Utc>,
    pub state: Value,
}

impl Checkpoint {
    pub fn new(stage: impl Into<String>, state: Value) -> Self {
        Self {
            stage: stage.into(),
            saved_at: Utc::now(),
            state,
        }
    }
}

/// Persistence handle passed explicitly to the engine
#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn save(&self, config: &ThreadConfig, checkpoint: Checkpoint) -> Result<()>;

    /// Checkpoints of a thread, oldest first
    async fn history(&self, config: &ThreadConfig) -> Result<Vec<Checkpoint>>;
}

/// Process-local checkpoints, dropped with the last clone
#[derive(Clone, Default)]
pub struct MemoryCheckpointer {
    threads: Arc<RwLock<HashMap<String, Vec<Checkpoint>>>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for MemoryCheckpointer {
    async fn save(&self, config: &ThreadConfig, checkpoint: Checkpoint) -> Result<()> {
        let mut threads = self.threads.write().await;
        threads
            .entry(thread_key(config))
            .or_default()
            .push(checkpoint);
        Ok(())
    }

    async fn history(&self, config: &ThreadConfig) -> Result<Vec<Checkpoint>> {
        let threads = self.threads.read().await;
        Ok(threads.get(&thread_key(config)).cloned().unwrap_or_default())
    }
}

/// One pretty-printed JSON file per thread under `dir`
pub struct FileCheckpointer {
    dir: PathBuf,
}

impl FileCheckpointer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, config: &ThreadConfig) -> PathBuf {
        self.dir.join(format!("{}.json", escape_file_stem(&thread_key(config))))
    }
}

#[async_trait]
impl Checkpointer for FileCheckpointer {
    async fn save(&self, config: &ThreadConfig, checkpoint: Checkpoint) -> Result<()> {
        let mut checkpoints = self.history(config).await?;
        checkpoints.push(checkpoint);

        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_string_pretty(&checkpoints)?;
        tokio::fs::write(self.path_for(config), json).await?;
        Ok(())
    }

    async fn history(&self, config: &ThreadConfig) -> Result<Vec<Checkpoint>> {
        let path = self.path_for(config);
        match tokio::fs::read_to_string(&path).await {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

fn thread_key(config: &ThreadConfig) -> String {
    format!("{}-{}", config.checkpoint_ns, config.thread_id)
}

/// Reversible file-name encoding: ASCII alphanumerics and `-` stay, every
/// other byte becomes `_XX` (including `_` itself), so distinct keys never
/// share a file
fn escape_file_stem(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_{:02X}", byte));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("vire-checkpoints-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_create_thread_config() {
        let config = create_thread_config("session-1");
        assert_eq!(config.thread_id, "session-1");
        assert_eq!(config.checkpoint_ns, "vire");

        let generated = create_thread_config("  ");
        assert!(uuid::Uuid::parse_str(&generated.thread_id).is_ok());
    }

    #[tokio::test]
    async fn test_memory_checkpointer_keeps_order_per_thread() {
        let checkpointer = MemoryCheckpointer::new();
        let a = create_thread_config("a");
        let b = create_thread_config("b");

        checkpointer
            .save(&a, Checkpoint::new("caption", json!({"caption": "x"})))
            .await
            .unwrap();
        checkpointer
            .save(&a, Checkpoint::new("voting", json!({})))
            .await
            .unwrap();
        checkpointer
            .save(&b, Checkpoint::new("caption", json!({})))
            .await
            .unwrap();

        let stages: Vec<String> = checkpointer
            .history(&a)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.stage)
            .collect();
        assert_eq!(stages, vec!["caption", "voting"]);
        assert_eq!(checkpointer.history(&b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_checkpointer_round_trip() {
        let dir = scratch_dir();
        let checkpointer = FileCheckpointer::new(&dir);
        let config = create_thread_config("run/42");

        assert!(checkpointer.history(&config).await.unwrap().is_empty());

        checkpointer
            .save(&config, Checkpoint::new("caption", json!({"caption": "A dog"})))
            .await
            .unwrap();
        checkpointer
            .save(&config, Checkpoint::new("fan_in", json!({"branch_results": []})))
            .await
            .unwrap();

        let reopened = FileCheckpointer::new(&dir);
        let history = reopened.history(&config).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].state["caption"], "A dog");
        assert!(dir.join("vire-run_2F42.json").exists());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[test]
    fn test_escape_keeps_distinct_ids_apart() {
        assert_eq!(escape_file_stem("vire-a/b"), "vire-a_2Fb");
        assert_eq!(escape_file_stem("vire-a_b"), "vire-a_5Fb");
        assert_eq!(escape_file_stem("vire-plain-1"), "vire-plain-1");
        assert_eq!(escape_file_stem("vire-é"), "vire-_C3_A9");
    }

    #[tokio::test]
    async fn test_similar_thread_ids_do_not_share_history() {
        let dir = scratch_dir();
        let checkpointer = FileCheckpointer::new(&dir);
        let slash = create_thread_config("a/b");
        let underscore = create_thread_config("a_b");

        checkpointer
            .save(&slash, Checkpoint::new("caption", json!({})))
            .await
            .unwrap();
        checkpointer
            .save(&underscore, Checkpoint::new("caption", json!({})))
            .await
            .unwrap();

        assert_eq!(checkpointer.history(&slash).await.unwrap().len(), 1);
        assert_eq!(checkpointer.history(&underscore).await.unwrap().len(), 1);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = scratch_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let checkpointer = FileCheckpointer::new(&dir);
        let config = create_thread_config("broken");
        tokio::fs::write(dir.join("vire-broken.json"), "{not json")
            .await
            .unwrap();

        assert!(checkpointer.history(&config).await.is_err());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
