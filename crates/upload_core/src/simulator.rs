use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use shared::{
    domain::{FileDescriptor, Phase, Transition, UploadId, UploadRecord},
    error::{ErrorReport, UploadError},
    protocol::{Rejection, SubmitReceipt, UploadEvent, UploadSummary},
};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    config::SimulationSettings,
    intake,
    progress::{ProgressGenerator, RandomProgress},
    store::UploadStore,
};

/// Running timer tasks plus the ids that were cancelled while active.
///
/// Guarded by a std mutex: it is never held across an `.await`, so `Drop`
/// can always take it.
#[derive(Default)]
struct TaskTable {
    running: HashMap<UploadId, JoinHandle<()>>,
    cancelled: HashSet<UploadId>,
}

#[derive(Clone, Default)]
struct SharedTasks(Arc<Mutex<TaskTable>>);

impl SharedTasks {
    fn lock(&self) -> MutexGuard<'_, TaskTable> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_not_cancelled(&self, id: UploadId) -> Result<(), UploadError> {
        if self.lock().cancelled.contains(&id) {
            return Err(UploadError::Cancelled(id));
        }
        Ok(())
    }
}

/// Drives every submitted record through `Uploading → Processing → Completed`
/// on its own timer task.
pub struct UploadSimulator {
    store: UploadStore,
    settings: Arc<SimulationSettings>,
    generator: Arc<dyn ProgressGenerator>,
    tasks: SharedTasks,
    events: broadcast::Sender<UploadEvent>,
}

impl UploadSimulator {
    pub fn new(settings: SimulationSettings) -> Self {
        let generator = Arc::new(RandomProgress::from_settings(&settings));
        Self::new_with_generator(settings, generator)
    }

    pub fn new_with_generator(
        settings: SimulationSettings,
        generator: Arc<dyn ProgressGenerator>,
    ) -> Self {
        Self::new_with_dependencies(settings, UploadStore::new(), generator)
    }

    pub fn new_with_dependencies(
        settings: SimulationSettings,
        store: UploadStore,
        generator: Arc<dyn ProgressGenerator>,
    ) -> Self {
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        Self {
            store,
            settings: Arc::new(settings),
            generator,
            tasks: SharedTasks::default(),
            events,
        }
    }

    pub fn store(&self) -> &UploadStore {
        &self.store
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<UploadEvent> {
        self.events.subscribe()
    }

    /// Registers every file and starts its simulation. Returns once the
    /// records exist; progress arrives through [`Self::subscribe_events`].
    pub async fn submit(&self, files: Vec<FileDescriptor>) -> Vec<UploadId> {
        if files.is_empty() {
            return Vec::new();
        }

        let records: Vec<UploadRecord> = files.into_iter().map(UploadRecord::register).collect();
        let ids: Vec<UploadId> = records.iter().map(|record| record.id).collect();

        self.store.append(records.iter().cloned()).await;

        let mut tasks = self.tasks.lock();
        for record in records {
            info!(
                upload_id = %record.id,
                name = %record.name,
                size = record.size,
                "upload registered"
            );
            let id = record.id;
            let _ = self.events.send(UploadEvent::Registered(record));
            // Cancelled between the append and here: never start its timer.
            if tasks.cancelled.contains(&id) {
                continue;
            }
            let driver = self.driver();
            tasks.running.insert(id, tokio::spawn(driver.run(id)));
        }

        ids
    }

    /// Validates each file first; only accepted files are registered.
    pub async fn submit_checked(&self, files: Vec<FileDescriptor>) -> SubmitReceipt {
        let mut accepted = Vec::with_capacity(files.len());
        let mut rejected = Vec::new();

        for file in files {
            let name = file.name.clone();
            match intake::validate(file, &self.settings.intake) {
                Ok(file) => accepted.push(file),
                Err(err) => {
                    warn!(name = %name, error = %err, "upload rejected");
                    rejected.push(Rejection {
                        name,
                        error: ErrorReport::from(err),
                    });
                }
            }
        }

        SubmitReceipt {
            accepted: self.submit(accepted).await,
            rejected,
        }
    }

    /// Stops the simulation of one record and leaves it in its last observed
    /// state. Nothing more is published for `id` after this returns, and a
    /// later `cancel` or `fail` on it returns [`UploadError::Cancelled`].
    ///
    /// A record that already finished is returned as is, with no event.
    pub async fn cancel(&self, id: UploadId) -> Result<UploadRecord, UploadError> {
        let handle = {
            let mut tasks = self.tasks.lock();
            if !tasks.cancelled.insert(id) {
                return Err(UploadError::Cancelled(id));
            }
            tasks.running.remove(&id)
        };
        stop(handle).await;

        let record = match self.store.get(id).await {
            Some(record) if !record.is_terminal() => record,
            other => {
                self.tasks.lock().cancelled.remove(&id);
                return other.ok_or(UploadError::NotFound(id));
            }
        };
        info!(
            upload_id = %id,
            status = %record.status,
            progress = record.progress,
            "upload cancelled"
        );
        let _ = self.events.send(UploadEvent::Cancelled { id });
        Ok(record)
    }

    /// Stops the simulation of one record and moves it to `Error`.
    pub async fn fail(
        &self,
        id: UploadId,
        message: impl Into<String>,
    ) -> Result<UploadRecord, UploadError> {
        self.tasks.ensure_not_cancelled(id)?;
        let handle = self.tasks.lock().running.remove(&id);
        stop(handle).await;

        let message = message.into();
        let tasks = &self.tasks;
        let (record, _) = self
            .store
            .update(id, |record| {
                // Checked under the store lock so a racing cancel either
                // sees `Error` or makes this call fail.
                tasks.ensure_not_cancelled(id)?;
                record.fail(message)
            })
            .await?;
        warn!(upload_id = %id, error = ?record.error, "upload failed");
        let _ = self.events.send(UploadEvent::Failed(record.clone()));
        Ok(record)
    }

    /// Cancels every simulation still running.
    pub async fn shutdown(&self) {
        let handles: Vec<(UploadId, JoinHandle<()>)> = self.tasks.lock().running.drain().collect();
        for (id, handle) in handles {
            handle.abort();
            let _ = handle.await;
            debug!(upload_id = %id, "simulation stopped on shutdown");
        }
    }

    pub fn is_running(&self, id: UploadId) -> bool {
        self.tasks.lock().running.contains_key(&id)
    }

    pub fn running(&self) -> usize {
        self.tasks.lock().running.len()
    }

    pub async fn records(&self) -> Vec<UploadRecord> {
        self.store.snapshot().await
    }

    pub async fn summary(&self) -> UploadSummary {
        self.store.summary().await
    }

    fn driver(&self) -> Driver {
        Driver {
            store: self.store.clone(),
            settings: Arc::clone(&self.settings),
            generator: Arc::clone(&self.generator),
            tasks: self.tasks.clone(),
            events: self.events.clone(),
        }
    }
}

impl Drop for UploadSimulator {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.lock().running.drain() {
            handle.abort();
        }
    }
}

/// Aborts a timer task and waits until it can no longer touch the store.
async fn stop(handle: Option<JoinHandle<()>>) {
    if let Some(handle) = handle {
        handle.abort();
        let _ = handle.await;
    }
}

/// Per-record timer loop.
struct Driver {
    store: UploadStore,
    settings: Arc<SimulationSettings>,
    generator: Arc<dyn ProgressGenerator>,
    tasks: SharedTasks,
    events: broadcast::Sender<UploadEvent>,
}

impl Driver {
    async fn run(self, id: UploadId) {
        let mut phase = Phase::Uploading;
        let mut ticker = self.ticker(phase);

        loop {
            ticker.tick().await;
            let step = self.generator.next_step(phase);
            let (record, transition) = match self
                .store
                .update(id, |record| Ok(record.advance(step)))
                .await
            {
                Ok(outcome) => outcome,
                Err(err) => {
                    debug!(upload_id = %id, error = %err, "simulation stopped");
                    break;
                }
            };

            match transition {
                Transition::Progressed => {
                    debug!(upload_id = %id, ?phase, progress = record.progress, "tick");
                    let _ = self.events.send(UploadEvent::Progress(record));
                }
                Transition::PhaseChanged => {
                    info!(upload_id = %id, status = %record.status, "upload finished, processing");
                    phase = Phase::Processing;
                    ticker = self.ticker(phase);
                    let _ = self.events.send(UploadEvent::PhaseChanged(record));
                }
                Transition::Completed => {
                    info!(upload_id = %id, name = %record.name, "upload completed");
                    let _ = self.events.send(UploadEvent::Completed(record));
                    break;
                }
                Transition::Failed | Transition::Unchanged => break,
            }
        }

        self.tasks.lock().running.remove(&id);
    }

    fn ticker(&self, phase: Phase) -> Interval {
        let period = self.settings.phase(phase).tick_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }
}

#[cfg(test)]
#[path = "tests/simulator_tests.rs"]
mod tests;
