//! Test Scheduler — drives a single [`Test`] on its own recurring cadence.
//! One instance per test, spawned as its own task by the [`crate::manager`].
//! Mirrors the original `webServiceScheduler`'s ticker/close select loop, one
//! level down: there the loop is per web service and iterates its tests, here
//! it is per test since each test carries its own [`Schedule`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use am_domain::model::{Test, WebService};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::MissedTickBehavior;

use crate::prober::Prober;

/// Emitted on the errors channel. Probe failures are never sent here — per
/// the error handling contract they surface only inside the `TestResult`
/// itself (`is_success = false`). This channel instead carries result-sink
/// persistence failures and any fatal setup error a scheduler hits before it
/// can produce its first result.
#[derive(Debug, Clone)]
pub struct SchedulerError {
    pub test_id: String,
    pub message: String,
}

struct SchedulerCore {
    web_service: WebService,
    test: Test,
    prober: Arc<Prober>,
    results_tx: mpsc::Sender<am_domain::model::TestResult>,
    errors_tx: mpsc::Sender<SchedulerError>,
    probe_lock: Mutex<()>,
    closed: AtomicBool,
}

impl SchedulerCore {
    async fn execute(&self) {
        let outcome = self.prober.probe(&self.web_service, &self.test).await;
        let result = match outcome {
            Ok(response) => am_domain::model::TestResult::new(
                self.test.id.clone(),
                self.test.assertion.assert(Some(response.status_code)),
                response.status_code,
                response.body,
                response.response_time_ms,
            ),
            Err(am_domain::error::Error::Probe { message, .. }) => {
                am_domain::model::TestResult::new(self.test.id.clone(), false, 0, message, 0)
            }
            Err(e) => {
                // Not a probe error (e.g. a programming bug building the
                // request); this is unexpected enough to surface on the
                // errors channel rather than silently recorded as a result.
                let _ = self
                    .errors_tx
                    .send(SchedulerError {
                        test_id: self.test.id.clone(),
                        message: e.to_string(),
                    })
                    .await;
                return;
            }
        };
        if self.results_tx.send(result).await.is_err() {
            tracing::warn!(test_id = %self.test.id, "result channel closed, dropping result");
        }
    }
}

/// Owns the tick loop. Consumed by [`TestScheduler::run`], which is spawned
/// as its own task by the manager.
pub struct TestScheduler {
    core: Arc<SchedulerCore>,
    close_rx: watch::Receiver<bool>,
}

/// Cheap-clone handle the manager keeps per test. `execute_now` always runs
/// the probe, even if a tick is mid-flight; `close` is idempotent.
#[derive(Clone)]
pub struct SchedulerHandle {
    core: Arc<SchedulerCore>,
    close_tx: watch::Sender<bool>,
}

pub fn spawn(
    web_service: WebService,
    test: Test,
    prober: Arc<Prober>,
    results_tx: mpsc::Sender<am_domain::model::TestResult>,
    errors_tx: mpsc::Sender<SchedulerError>,
) -> (SchedulerHandle, TestScheduler) {
    let core = Arc::new(SchedulerCore {
        web_service,
        test,
        prober,
        results_tx,
        errors_tx,
        probe_lock: Mutex::new(()),
        closed: AtomicBool::new(false),
    });
    let (close_tx, close_rx) = watch::channel(false);
    let handle = SchedulerHandle {
        core: core.clone(),
        close_tx,
    };
    let scheduler = TestScheduler { core, close_rx };
    (handle, scheduler)
}

impl TestScheduler {
    /// Runs until closed. Never fires immediately on start: the first tick
    /// of `tokio::time::interval` resolves right away, so it is discarded
    /// before entering the select loop. Ticks that arrive while a probe is
    /// still in flight are dropped rather than queued (`MissedTickBehavior::Skip`
    /// plus a non-blocking `try_lock`), keeping at most one probe per test
    /// running at a time.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.core.test.schedule.duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.core.closed.load(Ordering::Acquire) {
                        break;
                    }
                    match self.core.probe_lock.try_lock() {
                        Ok(_guard) => self.core.execute().await,
                        Err(_) => {
                            tracing::debug!(test_id = %self.core.test.id, "tick skipped, probe in flight");
                        }
                    }
                }
                changed = self.close_rx.changed() => {
                    if changed.is_err() || *self.close_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

impl SchedulerHandle {
    pub fn test_id(&self) -> &str {
        &self.core.test.id
    }

    /// Runs the probe out of band from the tick cadence. Always waits its
    /// turn for the probe lock rather than dropping, so a manual execution
    /// never silently disappears the way a busy tick does.
    pub async fn execute_now(&self) {
        if self.core.closed.load(Ordering::Acquire) {
            return;
        }
        let _guard = self.core.probe_lock.lock().await;
        self.core.execute().await;
    }

    /// Idempotent: sending on an already-closed watch channel, or to a
    /// scheduler whose `run` loop already exited, is a harmless no-op.
    pub fn close(&self) {
        self.core.closed.store(true, Ordering::Release);
        let _ = self.close_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use am_domain::model::{AssertionV1, Method, Parameters, Schedule, Timeout};
    use chrono::Utc;

    fn web_service(host: String) -> WebService {
        WebService {
            id: 1,
            host,
            scheme: "http".into(),
            description: String::new(),
            favicon: String::new(),
            created_at: Utc::now(),
            modified_at: Utc::now(),
        }
    }

    fn test() -> Test {
        Test {
            id: "t1".into(),
            web_service_id: 1,
            name: "probe".into(),
            path: "/".into(),
            method: Method::Get,
            content_type: "application/json".into(),
            description: String::new(),
            parameters: Parameters::default(),
            schedule: Schedule::OneMinute,
            timeout: Timeout(1),
            assertion: AssertionV1 { status_code: 200 },
            created_at: Utc::now(),
            modified_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn execute_now_produces_a_result() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .create_async()
            .await;

        let (results_tx, mut results_rx) = mpsc::channel(8);
        let (errors_tx, _errors_rx) = mpsc::channel(8);
        let (handle, scheduler) = spawn(
            web_service(server.host_with_port()),
            test(),
            Arc::new(Prober::new()),
            results_tx,
            errors_tx,
        );
        let task = tokio::spawn(scheduler.run());

        handle.execute_now().await;
        let result = results_rx.recv().await.unwrap();
        assert!(result.is_success);

        handle.close();
        task.await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (results_tx, _results_rx) = mpsc::channel(8);
        let (errors_tx, _errors_rx) = mpsc::channel(8);
        let (handle, scheduler) = spawn(
            web_service("127.0.0.1:1".into()),
            test(),
            Arc::new(Prober::new()),
            results_tx,
            errors_tx,
        );
        let task = tokio::spawn(scheduler.run());
        handle.close();
        handle.close();
        task.await.unwrap();
    }
}
