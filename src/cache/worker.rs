/// Single-threaded job queue backing the cache reader and writer
///
/// Jobs run strictly in submission order on one named OS thread. Filesystem
/// work stays off the tokio runtime and never interleaves within one worker.
///
/// `run` blocks until the job finishes, so it must never be called from a
/// job executing on the same worker.
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;

use parking_lot::Mutex;

use crate::logger::{self, LogTag};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub(crate) struct SerialWorker {
    name: String,
    sender: Mutex<mpsc::Sender<Job>>,
}

impl SerialWorker {
    pub(crate) fn spawn(name: &str) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let thread_name = name.to_string();

        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                // Exits once every sender is dropped and the queue is drained
                while let Ok(job) = receiver.recv() {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        logger::error(
                            LogTag::Cache,
                            &format!("Job panicked on worker '{}'", thread_name),
                        );
                    }
                }
            })?;

        Ok(Self {
            name: name.to_string(),
            sender: Mutex::new(sender),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Queue a job without waiting; false if the worker thread is gone
    pub(crate) fn submit<F>(&self, job: F) -> bool where F: FnOnce() + Send + 'static {
        self.sender.lock().send(Box::new(job)).is_ok()
    }

    /// Queue a job and block until it has produced its result
    ///
    /// None when the worker is gone or the job panicked.
    pub(crate) fn run<F, R>(&self, job: F) -> Option<R>
        where F: FnOnce() -> R + Send + 'static, R: Send + 'static
    {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let queued = self.submit(move || {
            let _ = reply_tx.send(job());
        });
        if !queued {
            return None;
        }
        reply_rx.recv().ok()
    }
}
