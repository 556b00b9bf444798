//! Journal-backed storage
//!
//! Keeps the live index in memory and appends every write to
//! `memories.jsonl` under the data directory. The journal is replayed on
//! open; `compact` rewrites it from the live index.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use super::{InMemoryStorage, MemoryFilter, StorageAdapter};
use crate::error::{MemoraiError, Result};
use crate::memory::types::Memory;

const JOURNAL_FILE: &str = "memories.jsonl";

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum JournalEntry {
    Put { memory: Box<Memory> },
    Delete { tenant_id: String, id: Uuid },
}

/// Storage that survives restarts via an append-only journal
#[derive(Debug)]
pub struct FileStorage {
    index: InMemoryStorage,
    path: PathBuf,
    journal: Mutex<File>,
}

impl FileStorage {
    /// Open (or create) the journal under `data_dir` and replay it
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir).await?;
        let path = data_dir.join(JOURNAL_FILE);

        let index = InMemoryStorage::new();
        if fs::try_exists(&path).await? {
            let committed = replay(&path, &index).await?;
            let len = fs::metadata(&path).await?.len();
            if committed < len {
                warn!(
                    path = %path.display(),
                    dropped_bytes = len - committed,
                    "Truncating torn journal tail"
                );
                let file = OpenOptions::new().write(true).open(&path).await?;
                file.set_len(committed).await?;
                file.sync_all().await?;
            }
        }

        let journal = open_append(&path).await?;
        info!(path = %path.display(), records = index.len(), "FileStorage opened");

        Ok(Self {
            index,
            path,
            journal: Mutex::new(journal),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(journal: &mut File, entry: &JournalEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let committed = journal.metadata().await?.len();
        if let Err(e) = write_line(journal, line.as_bytes()).await {
            // Later appends must start on a fresh line
            if let Err(rollback) = journal.set_len(committed).await {
                warn!(error = %rollback, "Failed to roll back partial journal write");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Rewrite the journal so it holds exactly one `put` per live record.
    ///
    /// Also persists access statistics, which are not journaled per call.
    pub async fn compact(&self) -> Result<usize> {
        let mut journal = self.journal.lock().await;

        let mut records = self.index.snapshot();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let tmp_path = self.path.with_extension("jsonl.tmp");
        {
            let mut tmp = File::create(&tmp_path).await?;
            for memory in &records {
                let entry = JournalEntry::Put {
                    memory: Box::new(memory.clone()),
                };
                Self::append(&mut tmp, &entry).await?;
            }
            tmp.sync_all().await?;
        }
        fs::rename(&tmp_path, &self.path).await?;
        *journal = open_append(&self.path).await?;

        info!(path = %self.path.display(), records = records.len(), "Journal compacted");
        Ok(records.len())
    }
}

async fn open_append(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?)
}

async fn write_line(journal: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    journal.write_all(bytes).await?;
    journal.flush().await
}

/// Replay newline-terminated entries into `index`.
///
/// Returns the byte length of the committed prefix. An unterminated final
/// line is a torn write and is never applied.
async fn replay(path: &Path, index: &InMemoryStorage) -> Result<u64> {
    let mut reader = BufReader::new(File::open(path).await?);
    let mut buf = Vec::new();
    let mut committed = 0u64;
    let mut line_no = 0usize;

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).await?;
        if read == 0 || buf.last() != Some(&b'\n') {
            break;
        }
        committed += read as u64;
        line_no += 1;

        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice::<JournalEntry>(line) {
            Ok(JournalEntry::Put { memory }) => index.put(*memory),
            Ok(JournalEntry::Delete { tenant_id, id }) => {
                index.remove(&tenant_id, id);
            }
            Err(e) => warn!(path = %path.display(), line = line_no, error = %e, "Skipping malformed journal line"),
        }
    }
    Ok(committed)
}

#[async_trait]
impl StorageAdapter for FileStorage {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn insert(&self, memory: Memory) -> Result<()> {
        let mut journal = self.journal.lock().await;
        let entry = JournalEntry::Put {
            memory: Box::new(memory),
        };
        Self::append(&mut journal, &entry).await?;
        if let JournalEntry::Put { memory } = entry {
            self.index.put(*memory);
        }
        Ok(())
    }

    async fn get(&self, tenant_id: &str, id: Uuid) -> Result<Option<Memory>> {
        self.index.get(tenant_id, id).await
    }

    async fn delete(&self, tenant_id: &str, id: Uuid) -> Result<bool> {
        let mut journal = self.journal.lock().await;
        if !self.index.remove(tenant_id, id) {
            return Ok(false);
        }
        let entry = JournalEntry::Delete {
            tenant_id: tenant_id.to_string(),
            id,
        };
        Self::append(&mut journal, &entry)
            .await
            .map_err(|e| MemoraiError::Storage(format!("record removed but journal write failed: {e}")))?;
        Ok(true)
    }

    async fn list(&self, filter: &MemoryFilter) -> Result<Vec<Memory>> {
        self.index.list(filter).await
    }

    async fn keyword_search(
        &self,
        tenant_id: &str,
        agent_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(Memory, f32)>> {
        self.index.keyword_search(tenant_id, agent_id, query, limit).await
    }

    async fn record_access(&self, tenant_id: &str, ids: &[Uuid]) -> Result<()> {
        self.index.record_access(tenant_id, ids).await
    }

    async fn count(&self, tenant_id: &str) -> Result<usize> {
        self.index.count(tenant_id).await
    }
}
