//! Background cache refresh
//!
//! Runs the response cache's refresh cycle in a background task, waiting one
//! full interval after each cycle finishes before starting the next, reporting progress over a tokio channel. The task is owned by a
//! [`RefreshHandle`] and stops when the handle is shut down or dropped.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cache::{RefreshSummary, ResponseCache};
use crate::transport::Transport;

/// Capacity of the progress channel; messages beyond it are dropped
const MESSAGE_BUFFER: usize = 32;

/// Messages sent from the background refresher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshMessage {
    /// A refresh cycle started
    RefreshStarted,
    /// Reloading a path failed; its previous response is still served
    KeyRefreshFailed { path: String, error: String },
    /// A refresh cycle finished
    RefreshCompleted {
        refreshed: usize,
        failed: usize,
        expired: usize,
    },
}

/// Handle for controlling the background refresher
pub struct RefreshHandle {
    /// Channel for receiving refresh messages
    pub receiver: mpsc::Receiver<RefreshMessage>,
    shutdown_tx: mpsc::Sender<()>,
    trigger_tx: mpsc::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Spawns the refresher for `cache`, using the cache's refresh interval
    ///
    /// The first cycle runs one interval after spawning and every later cycle
    /// one interval after the previous one completed, however long it took. A
    /// zero interval disables the refresher; the handle is still returned but
    /// never reports.
    pub fn spawn<T: Transport>(cache: ResponseCache<T>) -> Self {
        let interval = cache.config().refresh_interval;
        let (msg_tx, msg_rx) = mpsc::channel(MESSAGE_BUFFER);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (trigger_tx, mut trigger_rx) = mpsc::channel::<()>(1);

        let task = if interval.is_zero() {
            log::info!("Background refresh disabled");
            None
        } else {
            log::info!("Background refresh every {:?}", interval);
            Some(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(interval) => {},
                        Some(()) = trigger_rx.recv() => {},
                    }

                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break,
                        _ = run_cycle(&cache, &msg_tx) => {},
                    }
                }
                log::debug!("Background refresh stopped");
            }))
        };

        Self {
            receiver: msg_rx,
            shutdown_tx,
            trigger_tx,
            task,
        }
    }

    /// Requests a refresh cycle as soon as the current one (if any) finishes
    pub fn request_refresh(&self) {
        let _ = self.trigger_tx.try_send(());
    }

    /// Whether the background task is alive
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops the refresher and waits for its task to exit
    ///
    /// A cycle in progress is abandoned; loads it already started still
    /// complete and land in the cache.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(task) = self.task {
            let _ = task.await;
        }
    }
}

async fn run_cycle<T: Transport>(cache: &ResponseCache<T>, tx: &mpsc::Sender<RefreshMessage>) {
    let _ = tx.try_send(RefreshMessage::RefreshStarted);

    let RefreshSummary {
        refreshed,
        failures,
        expired,
    } = cache.refresh_all().await;

    let failed = failures.len();
    for failure in failures {
        let _ = tx.try_send(RefreshMessage::KeyRefreshFailed {
            path: failure.path,
            error: failure.error.to_string(),
        });
    }
    let _ = tx.try_send(RefreshMessage::RefreshCompleted {
        refreshed,
        failed,
        expired,
    });
}

/// Checks for pending refresh messages without blocking
///
/// # Returns
/// * `Some(RefreshMessage)` if a message was available
/// * `None` if no messages are pending
pub fn try_recv(handle: &mut RefreshHandle) -> Option<RefreshMessage> {
    handle.receiver.try_recv().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::transport::scripted::ScriptedTransport;
    use std::time::Duration;

    fn cache_refreshing_every(
        transport: &ScriptedTransport,
        interval: Duration,
    ) -> ResponseCache<ScriptedTransport> {
        ResponseCache::new(
            transport.clone(),
            CacheConfig {
                refresh_interval: interval,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_refresh_handle_spawn_disabled() {
        let transport = ScriptedTransport::new();
        let cache = cache_refreshing_every(&transport, Duration::ZERO);

        let mut handle = RefreshHandle::spawn(cache);

        assert!(!handle.is_running());
        assert!(try_recv(&mut handle).is_none());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_runs_after_one_interval() {
        let transport = ScriptedTransport::new();
        transport.respond("/api/a", 200, "v1").respond("/api/a", 200, "v2");
        let cache = cache_refreshing_every(&transport, Duration::from_secs(60));
        cache.get("/api/a").await.unwrap();

        let mut handle = RefreshHandle::spawn(cache.clone());
        tokio::task::yield_now().await;
        assert_eq!(transport.calls("/api/a"), 1);
        assert!(handle.is_running());

        assert_eq!(
            handle.receiver.recv().await,
            Some(RefreshMessage::RefreshStarted)
        );
        assert_eq!(
            handle.receiver.recv().await,
            Some(RefreshMessage::RefreshCompleted {
                refreshed: 1,
                failed: 0,
                expired: 0
            })
        );
        assert_eq!(transport.calls("/api/a"), 2);
        assert_eq!(cache.peek("/api/a").unwrap().response.body, "v2");

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_key_is_reported_and_cycle_completes() {
        let transport = ScriptedTransport::new();
        transport.respond("/api/a", 200, "a").fail("/api/a", "refused");
        transport.respond("/api/b", 200, "b");
        let cache = cache_refreshing_every(&transport, Duration::from_secs(60));
        cache.get("/api/a").await.unwrap();
        cache.get("/api/b").await.unwrap();

        let mut handle = RefreshHandle::spawn(cache.clone());

        let mut messages = Vec::new();
        while let Some(message) = handle.receiver.recv().await {
            let done = matches!(message, RefreshMessage::RefreshCompleted { .. });
            messages.push(message);
            if done {
                break;
            }
        }

        assert!(messages.contains(&RefreshMessage::KeyRefreshFailed {
            path: "/api/a".to_string(),
            error: "refused".to_string(),
        }));
        assert_eq!(
            messages.last(),
            Some(&RefreshMessage::RefreshCompleted {
                refreshed: 1,
                failed: 1,
                expired: 0
            })
        );
        assert_eq!(cache.peek("/api/a").unwrap().response.body, "a");

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_refresh_runs_a_cycle_early() {
        let transport = ScriptedTransport::new();
        transport.respond("/api/a", 200, "{}");
        let cache = cache_refreshing_every(&transport, Duration::from_secs(3600));
        cache.get("/api/a").await.unwrap();

        let mut handle = RefreshHandle::spawn(cache);
        tokio::task::yield_now().await;
        let start = tokio::time::Instant::now();

        handle.request_refresh();
        assert_eq!(
            handle.receiver.recv().await,
            Some(RefreshMessage::RefreshStarted)
        );
        assert!(start.elapsed() < Duration::from_secs(3600));

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_cycle_waits_a_full_interval_after_a_slow_cycle() {
        let transport = ScriptedTransport::new().with_delay(Duration::from_secs(90));
        transport.respond("/api/a", 200, "{}");
        let cache = cache_refreshing_every(&transport, Duration::from_secs(60));
        cache.get("/api/a").await.unwrap();

        let mut handle = RefreshHandle::spawn(cache);
        let spawned = tokio::time::Instant::now();

        assert_eq!(
            handle.receiver.recv().await,
            Some(RefreshMessage::RefreshStarted)
        );
        assert!(spawned.elapsed() >= Duration::from_secs(60));
        assert!(matches!(
            handle.receiver.recv().await,
            Some(RefreshMessage::RefreshCompleted { refreshed: 1, .. })
        ));
        let completed = tokio::time::Instant::now();
        assert!(completed - spawned >= Duration::from_secs(150));

        assert_eq!(
            handle.receiver.recv().await,
            Some(RefreshMessage::RefreshStarted)
        );
        assert!(completed.elapsed() >= Duration::from_secs(60));

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_further_cycles() {
        let transport = ScriptedTransport::new();
        transport.respond("/api/a", 200, "{}");
        let cache = cache_refreshing_every(&transport, Duration::from_secs(60));
        cache.get("/api/a").await.unwrap();

        let handle = RefreshHandle::spawn(cache.clone());
        handle.shutdown().await;

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(transport.calls("/api/a"), 1);
        assert_eq!(cache.get("/api/a").await.unwrap().status, 200);
    }
}
