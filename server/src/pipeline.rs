//! Batched chat persistence
//!
//! Chat lines are buffered in memory and written to the store in batches,
//! either when the periodic timer fires or as soon as the buffer reaches the
//! batch size. Whoever triggers a write first takes the buffered records out
//! of the buffer, so two concurrent flushes never send the same record. Writes
//! themselves are serialised and run in a single transaction.
//!
//! A batch that fails for a transient reason (timeout, I/O, pool trouble) goes
//! back to the front of the buffer for the next attempt. A record is given up
//! after `max_attempts` failed writes, and while storage stays down the buffer
//! is capped at `max_pending` records with the oldest dropped past the cap. A
//! batch rejected outright, e.g. by a foreign key, is retried row by row so
//! only the offending records are dropped. Every dropped record is counted.
//!
//! `close` waits for every write and player lookup already started, so a
//! record accepted before shutdown is either stored or reported as lost.

use crate::config::PipelineConfig;
use crate::error::StorageError;
use crate::storage::{ChatRecord, ChatStore};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use shared::SteamId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

/// A buffered record and how many writes of it have failed
#[derive(Debug)]
struct Queued {
    record: ChatRecord,
    attempts: u32,
}

pub struct ChatPipeline {
    store: Arc<dyn ChatStore>,
    config: PipelineConfig,
    pending: Mutex<VecDeque<Queued>>,
    write_lock: tokio::sync::Mutex<()>,
    /// steam id -> player row id
    player_ids: Mutex<HashMap<SteamId, i64>>,
    /// Steam ids the store has no row for
    unknown_players: Mutex<HashSet<SteamId>>,
    /// Lines held back while their author's row id is looked up
    lookups: Mutex<HashMap<SteamId, Vec<(String, DateTime<Utc>)>>>,
    dropped: AtomicU64,
    /// Size-triggered writes and player lookups still running
    tasks: Mutex<Vec<JoinHandle<()>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    shutdown: Notify,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ChatPipeline {
    pub fn new(store: Arc<dyn ChatStore>, config: PipelineConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            config,
            pending: Mutex::new(VecDeque::new()),
            write_lock: tokio::sync::Mutex::new(()),
            player_ids: Mutex::new(HashMap::new()),
            unknown_players: Mutex::new(HashSet::new()),
            lookups: Mutex::new(HashMap::new()),
            dropped: AtomicU64::new(0),
            tasks: Mutex::new(Vec::new()),
            timer: Mutex::new(None),
            shutdown: Notify::new(),
        })
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    /// Starts the periodic flush; does nothing if it is already running
    pub fn spawn_flush_timer(self: &Arc<Self>) {
        let mut timer = locked(&self.timer);
        if timer.is_some() {
            debug!("Chat flush timer already running");
            return;
        }

        let pipeline = Arc::clone(self);
        let period = self.config.flush_interval;

        *timer = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = pipeline.flush().await {
                            error!("Periodic chat flush failed: {}", e);
                        }
                    }
                    _ = pipeline.shutdown.notified() => break,
                }
            }
            debug!("Chat flush timer stopped");
        }));
        info!("Chat flush timer running every {:?}", period);
    }

    /// Remembers the player row id used for this steam id's chat lines
    pub fn remember_player(&self, steam_id: SteamId, player_id: i64) {
        locked(&self.player_ids).insert(steam_id, player_id);
        locked(&self.unknown_players).remove(&steam_id);
    }

    fn cached_player(&self, steam_id: SteamId) -> Option<i64> {
        locked(&self.player_ids).get(&steam_id).copied()
    }

    fn forget_row(&self, player_id: i64) {
        locked(&self.player_ids).retain(|_, id| *id != player_id);
    }

    /// Logs a chat line written by `steam_id`
    ///
    /// Never waits on storage. The first line from an uncached player starts
    /// one lookup on a spawned task; lines arriving meanwhile wait behind it,
    /// so a player's lines keep their order. Lines from players without a
    /// stored row are dropped until `remember_player` learns their row.
    pub fn record_chat(self: &Arc<Self>, steam_id: SteamId, message: &str) {
        let timestamp = Utc::now();

        let mut lookups = locked(&self.lookups);
        if let Some(waiting) = lookups.get_mut(&steam_id) {
            waiting.push((message.to_string(), timestamp));
            return;
        }

        if let Some(player_id) = self.cached_player(steam_id) {
            self.push(ChatRecord {
                message: message.to_string(),
                player_id,
                timestamp,
            });
            return;
        }

        if locked(&self.unknown_players).contains(&steam_id) {
            debug!("Dropping chat from unstored player {}", steam_id);
            return;
        }

        lookups.insert(steam_id, vec![(message.to_string(), timestamp)]);
        drop(lookups);

        let pipeline = Arc::clone(self);
        self.track(tokio::spawn(async move {
            pipeline.resolve_player(steam_id).await;
        }));
    }

    async fn resolve_player(self: Arc<Self>, steam_id: SteamId) {
        let lookup = timeout(self.config.store_timeout, self.store.find_player(steam_id)).await;

        let mut lookups = locked(&self.lookups);
        let waiting = lookups.remove(&steam_id).unwrap_or_default();

        match lookup {
            Ok(Ok(Some(player_id))) => {
                self.remember_player(steam_id, player_id);
                for (message, timestamp) in waiting {
                    self.push(ChatRecord {
                        message,
                        player_id,
                        timestamp,
                    });
                }
            }
            Ok(Ok(None)) => {
                locked(&self.unknown_players).insert(steam_id);
                debug!(
                    "Dropping {} chat lines from unstored player {}",
                    waiting.len(),
                    steam_id
                );
            }
            Ok(Err(e)) => warn!(
                "Player lookup for {} failed, dropping {} chat lines: {}",
                steam_id,
                waiting.len(),
                e
            ),
            Err(_) => warn!(
                "Player lookup for {} timed out after {:?}, dropping {} chat lines",
                steam_id,
                self.config.store_timeout,
                waiting.len()
            ),
        }
    }

    /// Buffers a chat line; a full buffer is handed to a background write
    pub fn enqueue(self: &Arc<Self>, player_id: i64, message: &str) {
        self.push(ChatRecord {
            message: message.to_string(),
            player_id,
            timestamp: Utc::now(),
        });
    }

    fn push(self: &Arc<Self>, record: ChatRecord) {
        let full_batch = {
            let mut pending = locked(&self.pending);
            pending.push_back(Queued {
                record,
                attempts: 0,
            });
            if pending.len() >= self.config.batch_size {
                Some(pending.drain(..).collect::<Vec<_>>())
            } else {
                None
            }
        };

        if let Some(batch) = full_batch {
            let pipeline = Arc::clone(self);
            self.track(tokio::spawn(async move {
                if let Err(e) = pipeline.write_batch(batch).await {
                    error!("Size-triggered chat flush failed: {}", e);
                }
            }));
        }
    }

    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = locked(&self.tasks);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    /// Writes everything currently buffered; returns the number of rows written
    pub async fn flush(&self) -> Result<usize, StorageError> {
        let batch: Vec<Queued> = locked(&self.pending).drain(..).collect();
        if batch.is_empty() {
            return Ok(0);
        }
        self.write_batch(batch).await
    }

    async fn write_batch(&self, batch: Vec<Queued>) -> Result<usize, StorageError> {
        let _writer = self.write_lock.lock().await;
        let records: Vec<ChatRecord> = batch.iter().map(|q| q.record.clone()).collect();

        match self.insert(&records).await {
            Ok(()) => {
                debug!("Flushed {} chat records", records.len());
                Ok(records.len())
            }
            Err(e) if e.is_transient() => {
                self.requeue(batch);
                Err(e)
            }
            Err(e) => {
                warn!(
                    "Chat batch of {} rejected, writing records one by one: {}",
                    records.len(),
                    e
                );
                self.write_each(batch).await
            }
        }
    }

    /// Writes records singly so a rejected one only loses itself
    async fn write_each(&self, batch: Vec<Queued>) -> Result<usize, StorageError> {
        let mut written = 0;
        let mut remaining = batch.into_iter();

        while let Some(queued) = remaining.next() {
            match self.insert(std::slice::from_ref(&queued.record)).await {
                Ok(()) => written += 1,
                Err(e) if e.is_transient() => {
                    let mut rest = vec![queued];
                    rest.extend(remaining);
                    self.requeue(rest);
                    return Err(e);
                }
                Err(e) => {
                    let player_id = queued.record.player_id;
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    self.forget_row(player_id);
                    warn!("Dropped chat record for player row {}: {}", player_id, e);
                }
            }
        }

        debug!("Flushed {} chat records one by one", written);
        Ok(written)
    }

    async fn insert(&self, records: &[ChatRecord]) -> Result<(), StorageError> {
        match timeout(self.config.store_timeout, self.store.insert_chat_batch(records)).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(self.config.store_timeout)),
        }
    }

    fn requeue(&self, batch: Vec<Queued>) {
        let max_attempts = self.config.max_attempts;
        let mut exhausted = 0;
        let mut restored: VecDeque<Queued> = batch
            .into_iter()
            .filter_map(|mut queued| {
                queued.attempts += 1;
                if queued.attempts >= max_attempts {
                    exhausted += 1;
                    None
                } else {
                    Some(queued)
                }
            })
            .collect();

        let mut pending = locked(&self.pending);
        restored.append(&mut pending);

        let overflow = restored.len().saturating_sub(self.config.max_pending);
        restored.drain(..overflow);
        *pending = restored;
        drop(pending);

        let lost = exhausted + overflow;
        if lost > 0 {
            self.dropped.fetch_add(lost as u64, Ordering::Relaxed);
            warn!(
                "Dropped {} chat records ({} out of attempts, {} over capacity), {} total",
                lost,
                exhausted,
                overflow,
                self.dropped_count()
            );
        }
    }

    pub fn pending_len(&self) -> usize {
        locked(&self.pending).len()
    }

    /// Records given up on: rejected by the store, out of attempts or over capacity
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stops the timer, waits for running writes, writes what is left and
    /// closes the store
    pub async fn close(&self) {
        self.shutdown.notify_one();
        let timer = locked(&self.timer).take();
        if let Some(timer) = timer {
            if let Err(e) = timer.await {
                error!("Chat flush timer ended abnormally: {}", e);
            }
        }

        loop {
            let tasks = std::mem::take(&mut *locked(&self.tasks));
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                if let Err(e) = task.await {
                    error!("Chat write task ended abnormally: {}", e);
                }
            }
        }

        match self.flush().await {
            Ok(count) => info!("Final chat flush wrote {} records", count),
            Err(e) => error!(
                "Final chat flush failed, {} records not stored: {}",
                self.pending_len(),
                e
            ),
        }
        self.store.close().await;
    }
}
