//! Single-file JSON backend implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use semem_core::error::{Error, Result, Warning};
use semem_core::interaction::{Interaction, now_ms};
use semem_core::snapshot::Snapshot;
use semem_core::storage::{LoadOutcome, QueryRows, StorageBackend};

/// Backend configuration.
#[derive(Debug, Clone, Copy)]
pub struct JsonStoreConfig {
    /// How long bookkeeping updates may sit in memory before a rewrite
    pub flush_interval: Duration,
    /// Pretty-print the snapshot file
    pub pretty: bool,
}

impl Default for JsonStoreConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(1),
            pretty: true,
        }
    }
}

struct JsonState {
    snapshot: Snapshot,
    by_id: HashMap<String, usize>,
    dirty: bool,
    last_flush: Instant,
    closed: bool,
    pending_warnings: Vec<Warning>,
}

/// File-backed storage using the shared snapshot format.
pub struct JsonStore {
    path: PathBuf,
    config: JsonStoreConfig,
    state: Mutex<JsonState>,
}

impl std::fmt::Debug for JsonStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStore")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish()
    }
}

impl JsonStore {
    /// Open (or create) a snapshot file.
    ///
    /// A file that exists but does not parse is renamed to
    /// `<name>.corrupt-<millis>` and the backend starts empty; the
    /// quarantine is reported as a warning on the next
    /// [`load_all`](StorageBackend::load_all).
    ///
    /// # Errors
    ///
    /// `Io` when the file exists but cannot be read or the quarantine
    /// rename fails.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(
        path: impl AsRef<Path>,
        dimension: usize,
        config: JsonStoreConfig,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut pending_warnings = Vec::new();

        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => match Snapshot::from_slice(&bytes) {
                Ok(snapshot) => {
                    debug!(interactions = snapshot.interactions.len(), "snapshot loaded");
                    snapshot
                }
                Err(err) => {
                    let quarantine = quarantine_path(&path);
                    warn!(
                        error = %err,
                        quarantined_to = %quarantine.display(),
                        "snapshot unreadable, quarantining"
                    );
                    tokio::fs::rename(&path, &quarantine).await?;
                    pending_warnings.push(Warning::CorruptSnapshotRecovered {
                        quarantined_to: quarantine.display().to_string(),
                    });
                    Snapshot::new(dimension)
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Snapshot::new(dimension),
            Err(err) => return Err(err.into()),
        };

        let by_id = snapshot
            .interactions
            .iter()
            .enumerate()
            .map(|(idx, interaction)| (interaction.id.clone(), idx))
            .collect();

        Ok(Self {
            path,
            config,
            state: Mutex::new(JsonState {
                snapshot,
                by_id,
                dirty: false,
                last_flush: Instant::now(),
                closed: false,
                pending_warnings,
            }),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically rewrite the snapshot file: write to a sibling temp file,
    /// then rename over the target.
    async fn persist(&self, state: &mut JsonState) -> Result<()> {
        state.snapshot.sort();
        let bytes = if self.config.pretty {
            state.snapshot.to_vec()?
        } else {
            serde_json::to_vec(&state.snapshot).map_err(Error::from)?
        };
        // Sorting may have permuted indexes.
        state.by_id = state
            .snapshot
            .interactions
            .iter()
            .enumerate()
            .map(|(idx, interaction)| (interaction.id.clone(), idx))
            .collect();

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        state.dirty = false;
        state.last_flush = Instant::now();
        debug!(
            bytes = bytes.len(),
            interactions = state.snapshot.interactions.len(),
            "snapshot persisted"
        );
        Ok(())
    }

    fn ensure_open(state: &JsonState) -> Result<()> {
        if state.closed {
            return Err(Error::StorageUnavailable("json backend closed".into()));
        }
        Ok(())
    }
}

fn quarantine_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "snapshot".to_string(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!("{name}.corrupt-{}", now_ms()))
}

#[async_trait]
impl StorageBackend for JsonStore {
    async fn load_all(&self) -> Result<LoadOutcome> {
        let mut state = self.state.lock().await;
        Self::ensure_open(&state)?;

        let mut interactions = state.snapshot.interactions.clone();
        interactions.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        let warnings = std::mem::take(&mut state.pending_warnings);
        Ok(LoadOutcome {
            interactions,
            warnings,
        })
    }

    async fn append(&self, interaction: &Interaction) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::ensure_open(&state)?;

        if state.by_id.contains_key(&interaction.id) {
            return Err(Error::Conflict(format!(
                "interaction {} already persisted",
                interaction.id
            )));
        }
        let idx = state.snapshot.interactions.len();
        state.snapshot.interactions.push(interaction.clone());
        state.by_id.insert(interaction.id.clone(), idx);

        // Appends are durable before they return; the buffering knob only
        // applies to bookkeeping updates.
        self.persist(&mut state).await
    }

    async fn update(&self, interaction: &Interaction) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::ensure_open(&state)?;

        let Some(&idx) = state.by_id.get(&interaction.id) else {
            return Err(Error::NotFound(interaction.id.clone()));
        };
        state.snapshot.interactions[idx] = interaction.clone();
        state.dirty = true;

        if state.last_flush.elapsed() >= self.config.flush_interval {
            self.persist(&mut state).await?;
        }
        Ok(())
    }

    async fn query(&self, _query: &str) -> Result<QueryRows> {
        Err(Error::InvalidArgument(
            "the json backend has no query language".into(),
        ))
    }

    async fn delete_all(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::ensure_open(&state)?;

        state.snapshot.interactions.clear();
        state.by_id.clear();
        self.persist(&mut state).await
    }

    async fn flush(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::ensure_open(&state)?;
        if state.dirty {
            self.persist(&mut state).await?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Ok(());
        }
        if state.dirty {
            self.persist(&mut state).await?;
        }
        state.closed = true;
        info!(path = %self.path.display(), "json backend closed");
        Ok(())
    }
}
