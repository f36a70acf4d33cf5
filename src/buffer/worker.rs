//! Single in-order worker that owns the capture module instance.
//!
//! Key handlers push records onto a FIFO channel and return immediately; one
//! dedicated thread drains it, so a call is never issued to the module while a
//! previous call is still running. Queries travel the same channel, which means
//! they observe every record queued before them.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use tokio::sync::oneshot;

use crate::models::KeyEvent;
use crate::{log_error, log_info, log_warn};

use super::module::{CaptureModule, ModuleBuffer, ModuleFault};
use super::RecordOutcome;

const ENABLE_LOGS: bool = true;

/// Acquires a module instance. Called once at activation and again whenever a
/// trapped instance has to be rebuilt.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, capacity: usize) -> Result<Box<dyn CaptureModule>>;
}

/// Loads the module store compiled into this crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct InProcessLoader;

impl ModuleLoader for InProcessLoader {
    fn load(&self, capacity: usize) -> Result<Box<dyn CaptureModule>> {
        Ok(Box::new(ModuleBuffer::new(capacity)))
    }
}

type ModuleTask = Box<dyn FnOnce(&mut dyn CaptureModule) -> Option<ModuleFault> + Send + 'static>;

enum ModuleCommand {
    Record(KeyEvent),
    Execute(ModuleTask),
    Reload(oneshot::Sender<Result<()>>),
    Shutdown,
}

#[derive(Default)]
struct WorkerStats {
    dropped: AtomicUsize,
    recoveries: AtomicUsize,
}

struct WorkerInner {
    sender: mpsc::Sender<ModuleCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for WorkerInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(ModuleCommand::Shutdown) {
                log_error!("Failed to send shutdown to capture module worker: {err}");
            }
            if let Err(join_err) = handle.join() {
                log_error!("Failed to join capture module worker: {join_err:?}");
            }
        }
    }
}

#[derive(Clone)]
pub struct ModuleWorker {
    inner: Arc<WorkerInner>,
    stats: Arc<WorkerStats>,
    capacity: usize,
}

struct WorkerLoop {
    module: Option<Box<dyn CaptureModule>>,
    loader: Arc<dyn ModuleLoader>,
    capacity: usize,
    stats: Arc<WorkerStats>,
}

impl WorkerLoop {
    fn run(mut self, commands: mpsc::Receiver<ModuleCommand>) {
        while let Ok(command) = commands.recv() {
            match command {
                ModuleCommand::Record(event) => self.record(event),
                ModuleCommand::Execute(task) => match self.module.as_deref_mut() {
                    Some(module) => {
                        if let Some(ModuleFault::Trapped(reason)) = task(module) {
                            self.recover(&reason);
                        }
                    }
                    // Dropping the task drops its reply channel; the caller
                    // sees the module as unavailable.
                    None => log_warn!("capture module unavailable; query dropped"),
                },
                ModuleCommand::Reload(reply) => {
                    let reloaded = self.reload();
                    if reloaded.is_ok() {
                        self.stats.dropped.store(0, Ordering::Relaxed);
                    }
                    let _ = reply.send(reloaded);
                }
                ModuleCommand::Shutdown => break,
            }
        }

        log_info!("Capture module worker shutting down");
    }

    fn record(&mut self, event: KeyEvent) {
        let Some(module) = self.module.as_deref_mut() else {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            log_warn!("capture module unavailable; dropping {} {}", event.kind.as_code(), event.key);
            return;
        };

        match module.capture(event.kind, &event.key, event.timestamp) {
            Ok(RecordOutcome::Dropped) => {
                if self.stats.dropped.fetch_add(1, Ordering::Relaxed) == 0 {
                    log_warn!(
                        "capture module full ({} events); further events are dropped",
                        self.capacity
                    );
                }
            }
            Ok(_) => {}
            Err(ModuleFault::Rejected(reason)) => {
                log_warn!("capture module rejected {}: {reason}", event.key);
            }
            Err(ModuleFault::Trapped(reason)) => self.recover(&reason),
        }
    }

    fn recover(&mut self, reason: &str) {
        log_error!("capture module corrupted ({reason}); rebuilding, captured events are lost");
        self.module = None;
        match self.reload() {
            Ok(()) => {
                self.stats.recoveries.fetch_add(1, Ordering::Relaxed);
                log_info!("capture module recovered");
            }
            Err(err) => log_error!("failed to recover capture module: {err:?}"),
        }
    }

    fn reload(&mut self) -> Result<()> {
        self.module = None;
        let module = self
            .loader
            .load(self.capacity)
            .context("failed to load capture module")?;
        self.module = Some(module);
        Ok(())
    }
}

impl ModuleWorker {
    /// Load the module on a dedicated thread. Fails if the first load fails,
    /// which lets the caller fall back to the typed buffer.
    pub fn spawn(loader: Arc<dyn ModuleLoader>, capacity: usize) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel::<ModuleCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let stats = Arc::new(WorkerStats::default());
        let stats_for_thread = Arc::clone(&stats);

        let worker = thread::Builder::new()
            .name("keystroke-module".into())
            .spawn(move || {
                let module = match loader.load(capacity) {
                    Ok(module) => module,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err.context("capture module failed to initialize")));
                        return;
                    }
                };

                if ready_tx.send(Ok(())).is_err() {
                    log_error!("Module initialization receiver dropped before ready signal");
                    return;
                }

                WorkerLoop {
                    module: Some(module),
                    loader,
                    capacity,
                    stats: stats_for_thread,
                }
                .run(command_rx);
            })
            .context("failed to spawn capture module worker thread")?;

        ready_rx
            .recv()
            .context("capture module worker exited before signaling readiness")??;

        log_info!("Capture module initialized with capacity {capacity}");

        Ok(Self {
            inner: Arc::new(WorkerInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            stats,
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queue a record behind everything already queued.
    pub fn enqueue(&self, event: KeyEvent) -> RecordOutcome {
        match self.inner.sender.send(ModuleCommand::Record(event)) {
            Ok(()) => RecordOutcome::Queued,
            Err(err) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                log_error!("capture module worker is gone: {err}");
                RecordOutcome::Dropped
            }
        }
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut dyn CaptureModule) -> Result<T, ModuleFault> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = ModuleCommand::Execute(Box::new(move |module: &mut dyn CaptureModule| {
            let result = task(module);
            let fault = result.as_ref().err().cloned();
            if reply_tx.send(result.map_err(anyhow::Error::new)).is_err() {
                log_error!("Module caller dropped before receiving result");
            }
            fault
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to capture module worker: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("capture module unavailable"))?
    }

    pub async fn count(&self) -> Result<usize> {
        self.execute(|module| Ok(module.event_count())).await
    }

    pub async fn rows(&self) -> Result<Vec<KeyEvent>> {
        self.execute(|module| module.rows()).await
    }

    /// Empty the module and restart the overflow count.
    pub async fn clear(&self) -> Result<()> {
        let stats = Arc::clone(&self.stats);
        self.execute(move |module| {
            module.clear()?;
            stats.dropped.store(0, Ordering::Relaxed);
            Ok(())
        })
        .await
    }

    pub async fn last_events(&self, n: usize) -> Result<String> {
        self.execute(move |module| Ok(module.last_events(n))).await
    }

    /// Replace the module instance with a fresh one.
    pub async fn reload(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inner
            .sender
            .send(ModuleCommand::Reload(reply_tx))
            .map_err(|err| anyhow!("failed to send reload to capture module worker: {err}"))?;
        reply_rx
            .await
            .map_err(|_| anyhow!("capture module worker terminated unexpectedly"))?
    }

    pub fn dropped(&self) -> usize {
        self.stats.dropped.load(Ordering::Relaxed)
    }

    pub fn recoveries(&self) -> usize {
        self.stats.recoveries.load(Ordering::Relaxed)
    }
}
