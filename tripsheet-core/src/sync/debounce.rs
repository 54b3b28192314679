//! Per-key coalescing of rapid writes.
//!
//! A burst of calls sharing a key collapses into one trailing send of the
//! last call's request, once the key has been quiet for the debounce window.
//! Every caller in the burst gets the outcome of that single send.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::writer::{RemoteWriteError, RemoteWriter, WriteRequest, WriteResponse};

/// Quiet period before a coalesced write is sent.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

type Outcome = Result<WriteResponse, RemoteWriteError>;

struct Burst {
    generation: u64,
    request: WriteRequest,
    waiters: Vec<oneshot::Sender<Outcome>>,
    timer: JoinHandle<()>,
}

type Bursts = Arc<Mutex<HashMap<String, Burst>>>;

pub struct Debouncer {
    writer: Arc<dyn RemoteWriter>,
    window: Duration,
    bursts: Bursts,
    next_generation: AtomicU64,
}

impl Debouncer {
    pub fn new(writer: Arc<dyn RemoteWriter>) -> Self {
        Self::with_window(writer, DEBOUNCE_WINDOW)
    }

    pub fn with_window(writer: Arc<dyn RemoteWriter>, window: Duration) -> Self {
        Self {
            writer,
            window,
            bursts: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Schedules `request` under `key`, superseding any request still
    /// waiting under the same key and restarting its timer.
    ///
    /// Must be called from within a tokio runtime. The returned future
    /// resolves once the burst's single send completes.
    pub fn debounce(
        &self,
        key: &str,
        request: WriteRequest,
    ) -> impl Future<Output = Outcome> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let timer = tokio::spawn(fire(
            self.writer.clone(),
            self.bursts.clone(),
            key.to_string(),
            generation,
            self.window,
        ));

        let mut bursts = lock(&self.bursts);
        match bursts.get_mut(key) {
            Some(burst) => {
                burst.timer.abort();
                burst.timer = timer;
                burst.generation = generation;
                burst.request = request;
                burst.waiters.push(tx);
                tracing::debug!("Debounced write for {} restarted", key);
            }
            None => {
                bursts.insert(
                    key.to_string(),
                    Burst {
                        generation,
                        request,
                        waiters: vec![tx],
                        timer,
                    },
                );
            }
        }

        async move {
            rx.await.unwrap_or_else(|_| {
                Err(RemoteWriteError::Transport(
                    "debounced write abandoned before it was sent".to_string(),
                ))
            })
        }
    }

    /// Drops the send waiting under `key`, if any. Its callers resolve with
    /// [`RemoteWriteError::Cancelled`]. Returns whether a send was dropped.
    pub fn cancel(&self, key: &str) -> bool {
        let Some(burst) = lock(&self.bursts).remove(key) else {
            return false;
        };
        burst.timer.abort();
        tracing::debug!(
            "Cancelled debounced write for {} ({} calls)",
            key,
            burst.waiters.len()
        );
        for waiter in burst.waiters {
            let _ = waiter.send(Err(RemoteWriteError::Cancelled));
        }
        true
    }

    /// Keys with a send still waiting for the window to close.
    pub fn pending(&self) -> usize {
        lock(&self.bursts).len()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        for (_, burst) in lock(&self.bursts).drain() {
            burst.timer.abort();
        }
    }
}

async fn fire(
    writer: Arc<dyn RemoteWriter>,
    bursts: Bursts,
    key: String,
    generation: u64,
    window: Duration,
) {
    tokio::time::sleep(window).await;

    let burst = {
        let mut bursts = lock(&bursts);
        match bursts.get(&key) {
            Some(burst) if burst.generation == generation => bursts.remove(&key),
            _ => None,
        }
    };
    let Some(burst) = burst else {
        return;
    };

    tracing::debug!(
        "Sending debounced write for {} ({} calls coalesced)",
        key,
        burst.waiters.len()
    );
    let outcome = writer.send(&burst.request).await;
    for waiter in burst.waiters {
        let _ = waiter.send(outcome.clone());
    }
}

fn lock(bursts: &Bursts) -> MutexGuard<'_, HashMap<String, Burst>> {
    bursts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ShoppingItemPatch;
    use crate::test_support::ScriptedWriter;

    fn rename(id: &str, name: &str) -> WriteRequest {
        WriteRequest::update(
            id,
            ShoppingItemPatch {
                name: Some(name.to_string()),
                ..Default::default()
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_sends_last_request_once() {
        let writer = Arc::new(ScriptedWriter::new());
        let debouncer = Debouncer::new(writer.clone());

        let first = debouncer.debounce("A", rename("A", "first"));
        tokio::time::sleep(Duration::from_millis(200)).await;
        let second = debouncer.debounce("A", rename("A", "second"));

        let (first, second) = tokio::join!(first, second);
        assert!(first.unwrap().success);
        assert!(second.unwrap().success);

        let sent = writer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], rename("A", "second"));
        assert_eq!(debouncer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_restarts_on_each_call() {
        let writer = Arc::new(ScriptedWriter::new());
        let debouncer = Debouncer::new(writer.clone());

        let first = debouncer.debounce("A", rename("A", "1"));
        tokio::time::sleep(Duration::from_millis(400)).await;
        let second = debouncer.debounce("A", rename("A", "2"));
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(writer.sent().is_empty());

        let _ = tokio::join!(first, second);
        assert_eq!(writer.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_and_keys_send_separately() {
        let writer = Arc::new(ScriptedWriter::new());
        let debouncer = Debouncer::new(writer.clone());

        let a = debouncer.debounce("A", rename("A", "a"));
        let b = debouncer.debounce("B", rename("B", "b"));
        let _ = tokio::join!(a, b);
        assert_eq!(writer.sent().len(), 2);

        tokio::time::sleep(Duration::from_millis(600)).await;
        debouncer.debounce("A", rename("A", "again")).await.unwrap();
        assert_eq!(writer.sent().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reaches_every_caller() {
        let writer = Arc::new(ScriptedWriter::new());
        writer.fail_for("A", RemoteWriteError::Rejected("locked".to_string()));
        let debouncer = Debouncer::new(writer.clone());

        let first = debouncer.debounce("A", rename("A", "1"));
        let second = debouncer.debounce("A", rename("A", "2"));
        let (first, second) = tokio::join!(first, second);

        let expected = Err(RemoteWriteError::Rejected("locked".to_string()));
        assert_eq!(first, expected);
        assert_eq!(second, expected);
        assert_eq!(writer.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_waiting_send() {
        let writer = Arc::new(ScriptedWriter::new());
        let debouncer = Debouncer::new(writer.clone());

        let first = debouncer.debounce("A", rename("A", "1"));
        let other = debouncer.debounce("B", rename("B", "b"));
        assert!(debouncer.cancel("A"));
        assert!(!debouncer.cancel("A"));

        assert_eq!(first.await, Err(RemoteWriteError::Cancelled));
        other.await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(writer.sent(), vec![rename("B", "b")]);
        assert_eq!(debouncer.pending(), 0);
    }
}
