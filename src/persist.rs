//! Background persistence.
//!
//! The store hands every post-mutation snapshot to a single writer thread
//! over a FIFO channel. Writes therefore land in mutation order, and each
//! one carries the full collection, so a later write always supersedes an
//! earlier one. Snapshots still queued behind a newer one are skipped.
//!
//! The thread drives a `tokio` channel with `blocking_recv`, so no runtime is
//! needed. `flush` blocks, and must not be called from inside an async task.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::Result;
use crate::storage::KeyValueStore;

enum Job {
    Save(Value),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Default)]
struct Counters {
    written: AtomicUsize,
    failed: AtomicUsize,
}

pub struct PersistWorker {
    sender: Option<mpsc::UnboundedSender<Job>>,
    handle: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl PersistWorker {
    /// Start the writer thread; `storage` moves onto it.
    pub fn spawn<S: KeyValueStore>(storage: S, slot: impl Into<String>) -> Result<Self> {
        let slot = slot.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        let thread_counters = Arc::clone(&counters);

        let handle = std::thread::Builder::new()
            .name("tasktrack-persist".to_string())
            .spawn(move || run(storage, slot, receiver, thread_counters))?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            counters,
        })
    }

    /// Queue a snapshot. Never blocks.
    pub fn save(&self, snapshot: Value) {
        self.send(Job::Save(snapshot));
    }

    /// Block until every snapshot queued so far has been attempted.
    pub fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.send(Job::Flush(done)) {
            let _ = wait.blocking_recv();
        }
    }

    /// Snapshots written successfully.
    pub fn written(&self) -> usize {
        self.counters.written.load(Ordering::SeqCst)
    }

    /// Snapshots whose write failed.
    pub fn failed(&self) -> usize {
        self.counters.failed.load(Ordering::SeqCst)
    }

    fn send(&self, job: Job) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        if sender.send(job).is_err() {
            tracing::warn!("persistence worker has stopped; snapshot dropped");
            return false;
        }
        true
    }
}

impl Drop for PersistWorker {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain what is queued and exit.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("persistence worker panicked");
            }
        }
    }
}

fn run<S: KeyValueStore>(
    storage: S,
    slot: String,
    mut receiver: mpsc::UnboundedReceiver<Job>,
    counters: Arc<Counters>,
) {
    let mut pending = None;
    loop {
        let job = match pending.take() {
            Some(job) => job,
            None => match receiver.blocking_recv() {
                Some(job) => job,
                None => break,
            },
        };

        match job {
            Job::Save(mut snapshot) => {
                while let Ok(queued) = receiver.try_recv() {
                    match queued {
                        Job::Save(newer) => snapshot = newer,
                        other => {
                            pending = Some(other);
                            break;
                        }
                    }
                }
                write(&storage, &slot, &snapshot, &counters);
            }
            Job::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!(slot = %slot, "persistence worker stopped");
}

fn write<S: KeyValueStore>(storage: &S, slot: &str, snapshot: &Value, counters: &Counters) {
    match storage.write(slot, snapshot) {
        Ok(()) => {
            counters.written.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(
                slot,
                tasks = snapshot.as_array().map(Vec::len).unwrap_or(0),
                "persisted task snapshot"
            );
        }
        Err(err) => {
            counters.failed.fetch_add(1, Ordering::SeqCst);
            tracing::error!(slot, error = %err, "failed to persist task snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every write it sees, slowly.
    #[derive(Clone, Default)]
    struct SlowRecorder {
        writes: Arc<Mutex<Vec<Value>>>,
    }

    impl KeyValueStore for SlowRecorder {
        fn read(&self, _key: &str) -> Result<Option<Value>> {
            Ok(None)
        }

        fn write(&self, _key: &str, value: &Value) -> Result<()> {
            std::thread::sleep(Duration::from_millis(5));
            self.writes.lock().unwrap().push(value.clone());
            Ok(())
        }
    }

    struct Broken;

    impl KeyValueStore for Broken {
        fn read(&self, _key: &str) -> Result<Option<Value>> {
            Ok(None)
        }

        fn write(&self, _key: &str, _value: &Value) -> Result<()> {
            Err(Error::OperationFailed("disk full".to_string()))
        }
    }

    #[test]
    fn flush_waits_for_queued_writes() {
        let storage = MemoryStorage::new();
        let worker = PersistWorker::spawn(storage.clone(), "tasks").unwrap();
        worker.save(json!([1]));
        worker.save(json!([1, 2]));
        worker.flush();
        assert_eq!(storage.get("tasks"), Some(json!([1, 2])));
        assert_eq!(worker.failed(), 0);
        assert!(worker.written() >= 1);
    }

    #[test]
    fn writes_land_in_order_and_last_wins() {
        let recorder = SlowRecorder::default();
        let worker = PersistWorker::spawn(recorder.clone(), "tasks").unwrap();
        for n in 0..20 {
            worker.save(json!([n]));
        }
        worker.flush();

        let writes = recorder.writes.lock().unwrap().clone();
        let seen: Vec<i64> = writes.iter().map(|value| value[0].as_i64().unwrap()).collect();
        let mut sorted = seen.clone();
        sorted.sort_unstable();
        assert_eq!(seen, sorted);
        assert_eq!(seen.last(), Some(&19));
    }

    #[test]
    fn failures_are_counted_not_raised() {
        let worker = PersistWorker::spawn(Broken, "tasks").unwrap();
        worker.save(json!([]));
        worker.flush();
        assert_eq!(worker.failed(), 1);
        assert_eq!(worker.written(), 0);
    }

    #[test]
    fn drop_drains_the_queue() {
        let storage = MemoryStorage::new();
        {
            let worker = PersistWorker::spawn(storage.clone(), "tasks").unwrap();
            worker.save(json!(["last"]));
        }
        assert_eq!(storage.get("tasks"), Some(json!(["last"])));
    }
}
