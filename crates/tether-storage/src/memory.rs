use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tether_core::{LinkRecord, LinkStore, OwnedLink, OwnerId, Result, ShortCode, StoreError};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

/// One line of the append-only log. Field names are the persisted wire
/// format and must not change: `uuid` (omitted when empty), `short_url`,
/// `original_url`, `is_deleted`.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    #[serde(rename = "uuid", default, skip_serializing_if = "String::is_empty")]
    owner: String,
    #[serde(rename = "short_url")]
    short: String,
    #[serde(rename = "original_url")]
    long: String,
    #[serde(rename = "is_deleted", default)]
    deleted: bool,
}

impl From<&LinkRecord> for Snapshot {
    fn from(record: &LinkRecord) -> Self {
        Self {
            owner: record.owner.as_str().to_owned(),
            short: record.short_code.as_str().to_owned(),
            long: record.long_url.clone(),
            deleted: record.deleted,
        }
    }
}

impl From<Snapshot> for LinkRecord {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            long_url: snapshot.long,
            short_code: ShortCode::new_unchecked(snapshot.short),
            owner: OwnerId::new(snapshot.owner),
            deleted: snapshot.deleted,
        }
    }
}

/// Map and log handle, mutated together under one lock so that readers
/// always observe a record and its tombstone state atomically.
struct State {
    map: HashMap<ShortCode, LinkRecord>,
    log: File,
}

/// In-memory implementation of the [`LinkStore`] contract.
///
/// The backing map is rebuilt at startup by replaying an append-only log of
/// JSON-encoded record snapshots; every successful write (and every
/// tombstone transition) appends one line before the mutation is visible.
/// The log is never compacted.
///
/// A single `tokio::sync::Mutex` serializes all access. A sharded map would
/// allow more read concurrency, but the log append has to be atomic with
/// the map mutation, and batches have to be all-or-nothing, so one critical
/// section it is.
pub struct MemoryStore {
    state: Mutex<State>,
    path: PathBuf,
}

impl MemoryStore {
    /// Opens (creating if absent) the log at `path`, replays it in file
    /// order, and returns a store holding the resulting map.
    ///
    /// Replay is idempotent: later lines for the same code overwrite
    /// earlier state, which is how tombstones written after the original
    /// record win.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let mut map = HashMap::new();

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => return Err(StoreError::Backend(err.to_string())),
        };

        let mut lines = 0usize;
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            let snapshot: Snapshot = serde_json::from_str(line)
                .map_err(|err| StoreError::Backend(format!("corrupt log line: {err}")))?;
            lines += 1;
            let record = LinkRecord::from(snapshot);
            map.insert(record.short_code.clone(), record);
        }

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;

        if lines > 0 {
            info!(
                path = %path.display(),
                lines,
                records = map.len(),
                "replayed link log"
            );
        }

        Ok(Self {
            state: Mutex::new(State { map, log }),
            path,
        })
    }

    /// Path of the backing log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Purges every record and truncates the log. Test-reset helper only;
    /// nothing in the steady-state contract physically removes records.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .log
            .set_len(0)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        state.map.clear();
        Ok(())
    }
}

/// Serializes records as consecutive, newline-terminated log lines into a
/// single buffer, so a multi-record append is one `write_all`.
fn encode_lines(records: &[LinkRecord]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for record in records {
        serde_json::to_writer(&mut buf, &Snapshot::from(record))
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        buf.push(b'\n');
    }
    Ok(buf)
}

/// Appends `record` as one log line and flushes it.
async fn append(log: &mut File, record: &LinkRecord) -> Result<()> {
    let line = encode_lines(std::slice::from_ref(record))?;
    log.write_all(&line)
        .await
        .map_err(|err| StoreError::Backend(err.to_string()))?;
    log.flush()
        .await
        .map_err(|err| StoreError::Backend(err.to_string()))
}

#[async_trait::async_trait]
impl LinkStore for MemoryStore {
    async fn get(&self, code: &ShortCode) -> Result<String> {
        let state = self.state.lock().await;
        match state.map.get(code) {
            None => Err(StoreError::NotFound(code.clone())),
            Some(record) if record.deleted => Err(StoreError::Gone(code.clone())),
            Some(record) => Ok(record.long_url.clone()),
        }
    }

    async fn get_by_owner(&self, owner: &OwnerId) -> Result<Vec<OwnedLink>> {
        let state = self.state.lock().await;
        let links: Vec<OwnedLink> = state
            .map
            .values()
            .filter(|record| &record.owner == owner && !record.deleted)
            .map(|record| OwnedLink {
                long_url: record.long_url.clone(),
                short_code: record.short_code.clone(),
            })
            .collect();

        if links.is_empty() {
            return Err(StoreError::NoRecords);
        }
        Ok(links)
    }

    async fn write(&self, owner: &OwnerId, long_url: &str) -> Result<ShortCode> {
        let record = LinkRecord::new(owner.clone(), long_url);
        let code = record.short_code.clone();

        let mut state = self.state.lock().await;
        if state.map.contains_key(&code) {
            // Same content was written before, by whoever. The code is
            // still valid for the caller, hence it rides along.
            return Err(StoreError::AlreadyExists { code });
        }

        let State { map, log } = &mut *state;
        append(log, &record).await?;
        map.insert(code.clone(), record);
        Ok(code)
    }

    async fn batch_write(&self, owner: &OwnerId, long_urls: &[String]) -> Result<Vec<ShortCode>> {
        let records: Vec<LinkRecord> = long_urls
            .iter()
            .map(|long_url| LinkRecord::new(owner.clone(), long_url.clone()))
            .collect();

        let mut state = self.state.lock().await;

        // Validate the whole batch before touching the map or the log, so
        // a conflict anywhere leaves no trace of the batch. Duplicate
        // content within the batch conflicts with itself, same as it would
        // against the Postgres unique constraint.
        let mut seen = std::collections::HashSet::new();
        for record in &records {
            if state.map.contains_key(&record.short_code) || !seen.insert(&record.short_code) {
                return Err(StoreError::AlreadyExists {
                    code: record.short_code.clone(),
                });
            }
        }

        // One buffered append for the whole batch, and the map is only
        // touched once every line is durable. A failed log write therefore
        // leaves no items visible to readers and nothing to replay.
        let lines = encode_lines(&records)?;
        let State { map, log } = &mut *state;
        log.write_all(&lines)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        log.flush()
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;

        let mut codes = Vec::with_capacity(records.len());
        for record in records {
            codes.push(record.short_code.clone());
            map.insert(record.short_code.clone(), record);
        }
        Ok(codes)
    }

    async fn delete(&self, owner: &OwnerId, code: &ShortCode) -> Result<()> {
        let mut state = self.state.lock().await;
        let State { map, log } = &mut *state;

        match map.get_mut(code) {
            Some(record) if &record.owner == owner && !record.deleted => {
                record.deleted = true;
                // Persist the tombstone so it survives a restart; replay
                // applies this line after the original write.
                let snapshot = record.clone();
                append(log, &snapshot).await
            }
            // Unknown code, foreign owner, or already tombstoned: silent
            // no-op, by contract.
            _ => Ok(()),
        }
    }

    async fn ping(&self) -> bool {
        true
    }
}
