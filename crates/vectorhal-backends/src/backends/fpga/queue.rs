//! In-order command queue
//!
//! One worker thread per executor drains a FIFO channel. Each command runs
//! with exclusive access to device memory and reports back on its own
//! rendezvous channel, so `submit` blocks until the command has finished.
//! A panic inside a command is caught at the queue boundary and reported as
//! a device fault instead of tearing down the worker.

use super::memory::DeviceMemory;
use crate::error::{BackendError, Result};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

type Completion = Box<dyn FnOnce() + Send>;
type Job = Box<dyn FnOnce(&mut DeviceMemory) -> Completion + Send>;

enum Command {
    Run { label: String, enqueued: Instant, job: Job },
    Shutdown,
}

/// Timing of one queued command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueProfile {
    pub label: String,
    /// Time spent waiting behind earlier commands
    pub queued_us: u64,
    /// Time spent executing
    pub executed_us: u64,
}

pub(crate) struct CommandQueue {
    sender: Option<mpsc::Sender<Command>>,
    worker: Option<JoinHandle<()>>,
    profile: Option<Arc<Mutex<Vec<QueueProfile>>>>,
}

impl CommandQueue {
    pub(crate) fn start(name: &str, memory: Arc<RwLock<DeviceMemory>>, profiling: bool) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let profile = profiling.then(|| Arc::new(Mutex::new(Vec::new())));
        let worker_profile = profile.clone();

        let worker = thread::Builder::new()
            .name(format!("vectorhal-queue-{name}"))
            .spawn(move || {
                for command in receiver {
                    match command {
                        Command::Run { label, enqueued, job } => {
                            let started = Instant::now();
                            let complete = {
                                let mut memory = memory.write();
                                job(&mut memory)
                            };
                            if let Some(profile) = &worker_profile {
                                profile.lock().push(QueueProfile {
                                    label,
                                    queued_us: started.duration_since(enqueued).as_micros() as u64,
                                    executed_us: started.elapsed().as_micros() as u64,
                                });
                            }
                            complete();
                        }
                        Command::Shutdown => break,
                    }
                }
                tracing::trace!("queue_worker_exited");
            })
            .map_err(|e| BackendError::DeviceUnavailable(format!("cannot start command queue: {e}")))?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            profile,
        })
    }

    /// Enqueue `work` and block until it completes
    ///
    /// A kernel's own `Kernel` error comes back unchanged. Any other error
    /// returned by `work`, and any panic inside it, comes back as
    /// `DeviceFault`. A closed queue is `DeviceLost`.
    pub(crate) fn submit<R, F>(&self, label: &str, work: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut DeviceMemory) -> Result<R> + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| BackendError::DeviceLost("command queue is shut down".into()))?;

        let (reply, completion) = mpsc::sync_channel::<Result<R>>(1);
        let job_label = label.to_string();
        let job: Job = Box::new(move |memory: &mut DeviceMemory| -> Completion {
            let outcome = match catch_unwind(AssertUnwindSafe(|| work(memory))) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err @ BackendError::Kernel { .. })) => Err(err),
                Ok(Err(err)) => Err(BackendError::device_fault(job_label, err.to_string())),
                Err(payload) => Err(BackendError::device_fault(job_label, panic_message(payload.as_ref()))),
            };
            let complete: Completion = Box::new(move || {
                // The submitter may have gone away; nothing to report to then.
                let _ = reply.send(outcome);
            });
            complete
        });

        sender
            .send(Command::Run {
                label: label.to_string(),
                enqueued: Instant::now(),
                job,
            })
            .map_err(|_| BackendError::DeviceLost("command queue worker has exited".into()))?;

        completion
            .recv()
            .map_err(|_| BackendError::DeviceLost(format!("no completion for '{label}'")))?
    }

    pub(crate) fn profile(&self) -> Vec<QueueProfile> {
        self.profile
            .as_ref()
            .map(|profile| profile.lock().clone())
            .unwrap_or_default()
    }

    /// Stop accepting work, let queued commands finish, and join the worker
    pub(crate) fn shutdown(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Command::Shutdown);
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("queue_worker_panicked");
            }
        }
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "kernel panicked".to_string()
    }
}
