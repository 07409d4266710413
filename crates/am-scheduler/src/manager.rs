//! Schedule Manager — owns every [`crate::scheduler::SchedulerHandle`] and
//! the single fan-in loop that persists results and surfaces errors. Mirrors
//! the original `webServiceScheduleManager`'s `resultChan`/`errChan`/`closeChan`
//! select loop, generalized from one scheduler per web service to one per
//! test (am-domain schedules live on `Test`, not `WebService`).

use std::collections::HashMap;
use std::sync::Arc;

use am_domain::error::{Error, Result};
use am_domain::model::{Test, WebService};
use am_store::{CatalogStore, ResultStore};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::prober::Prober;
use crate::scheduler::{self, SchedulerError, SchedulerHandle};

const RESULTS_CHANNEL_CAPACITY: usize = 1024;
const ERRORS_CHANNEL_CAPACITY: usize = 128;

struct Entry {
    handle: SchedulerHandle,
    task: JoinHandle<()>,
}

/// Central coordinator. `Init` loads every test from the catalog and starts
/// its scheduler; `Run` drives the result-sink loop until `Close`.
/// `AddSchedule`/`RemoveSchedule`/`UpdateSchedule` mutate the live map under
/// a single mutex, per the resolved mutation-discipline decision (no
/// separate command channel).
pub struct ScheduleManager {
    catalog: Arc<dyn CatalogStore>,
    results: Arc<dyn ResultStore>,
    prober: Arc<Prober>,
    schedulers: Mutex<HashMap<String, Entry>>,
    results_tx: mpsc::Sender<am_domain::model::TestResult>,
    results_rx: Mutex<Option<mpsc::Receiver<am_domain::model::TestResult>>>,
    errors_tx: mpsc::Sender<SchedulerError>,
    errors_rx: Mutex<Option<mpsc::Receiver<SchedulerError>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ScheduleManager {
    pub fn new(catalog: Arc<dyn CatalogStore>, results: Arc<dyn ResultStore>) -> Arc<Self> {
        Self::with_capacities(
            catalog,
            results,
            RESULTS_CHANNEL_CAPACITY,
            ERRORS_CHANNEL_CAPACITY,
        )
    }

    /// Like [`Self::new`], but with channel capacities taken from
    /// [`am_domain::config::SchedulerConfig`] instead of the built-in
    /// defaults.
    pub fn with_capacities(
        catalog: Arc<dyn CatalogStore>,
        results: Arc<dyn ResultStore>,
        results_capacity: usize,
        errors_capacity: usize,
    ) -> Arc<Self> {
        let (results_tx, results_rx) = mpsc::channel(results_capacity);
        let (errors_tx, errors_rx) = mpsc::channel(errors_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Arc::new(ScheduleManager {
            catalog,
            results,
            prober: Arc::new(Prober::new()),
            schedulers: Mutex::new(HashMap::new()),
            results_tx,
            results_rx: Mutex::new(Some(results_rx)),
            errors_tx,
            errors_rx: Mutex::new(Some(errors_rx)),
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Idempotent per §4.3: closes any existing Schedulers first, then lists
    /// every test from the catalog via the unpaginated bootstrap read and
    /// starts one Scheduler per test. Fails fast on a store error — a
    /// partially-scheduled Manager is not an acceptable outcome, so every
    /// lookup is resolved *before* any Scheduler is installed into the map:
    /// if the web-service lookup fails partway through the test list, `init`
    /// returns an error with nothing started, rather than leaving earlier
    /// tests scheduled and later ones missing.
    pub async fn init(&self) -> Result<()> {
        self.close_schedulers().await;

        let tests = self.catalog.list_all_tests().await?;
        let mut resolved = Vec::with_capacity(tests.len());
        for test in tests {
            let web_service = self.catalog.get_web_service_by_id(test.web_service_id).await?;
            resolved.push((web_service, test));
        }

        for (web_service, test) in resolved {
            self.start(web_service, test).await;
        }
        Ok(())
    }

    /// Drives the fan-in loop: persists every result, logs every error. Runs
    /// until `close` is called from another task.
    pub async fn run(self: Arc<Self>) {
        let mut results_rx = self
            .results_rx
            .lock()
            .await
            .take()
            .expect("run called more than once");
        let mut errors_rx = self
            .errors_rx
            .lock()
            .await
            .take()
            .expect("run called more than once");
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                maybe_result = results_rx.recv() => {
                    match maybe_result {
                        Some(result) => {
                            if let Err(e) = self.results.append_result(&result).await {
                                tracing::error!(test_id = %result.test_id, error = %e, "failed to persist result");
                            }
                        }
                        None => break,
                    }
                }
                maybe_error = errors_rx.recv() => {
                    match maybe_error {
                        Some(err) => tracing::error!(test_id = %err.test_id, message = %err.message, "scheduler error"),
                        None => break,
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Starts a scheduler for a newly created test. Does not touch the
    /// catalog; the caller is expected to have already persisted `test`.
    pub async fn add_schedule(&self, web_service: WebService, test: Test) {
        self.start(web_service, test).await;
    }

    /// Replace-then-close: the new scheduler is inserted and started before
    /// the old one is told to close, so there is no window where the test
    /// has no active scheduler and no tick-cadence gap from restarting the
    /// ticker under the old entry. Per §4.3, a test id with no existing
    /// entry is a "not found" error — the caller should `add_schedule`
    /// instead.
    pub async fn update_schedule(&self, web_service: WebService, test: Test) -> Result<()> {
        let test_id = test.id.clone();
        let old = {
            let mut schedulers = self.schedulers.lock().await;
            if !schedulers.contains_key(&test_id) {
                return Err(Error::TestNotFound(test_id));
            }
            let (handle, scheduler) = scheduler::spawn(
                web_service,
                test,
                self.prober.clone(),
                self.results_tx.clone(),
                self.errors_tx.clone(),
            );
            let task = tokio::spawn(scheduler.run());
            schedulers.insert(test_id, Entry { handle, task })
        };
        if let Some(old) = old {
            old.handle.close();
            let _ = old.task.await;
        }
        Ok(())
    }

    pub async fn remove_schedule(&self, test_id: &str) {
        let removed = self.schedulers.lock().await.remove(test_id);
        if let Some(entry) = removed {
            entry.handle.close();
            let _ = entry.task.await;
        }
    }

    /// Runs `test_id`'s probe immediately, independent of its tick phase.
    pub async fn execute_now(&self, test_id: &str) -> Result<()> {
        let handle = {
            let schedulers = self.schedulers.lock().await;
            schedulers
                .get(test_id)
                .map(|entry| entry.handle.clone())
                .ok_or_else(|| Error::TestNotFound(test_id.to_string()))?
        };
        handle.execute_now().await;
        Ok(())
    }

    /// Closes every scheduler, then the fan-in loop, awaiting every scheduler
    /// task sequentially before returning (each `close()` signal is already
    /// sent before we start awaiting, so the tasks are shutting down
    /// concurrently regardless of await order). Idempotent: a second call
    /// finds an empty map and a shutdown signal that is already set.
    pub async fn close(&self) {
        self.close_schedulers().await;
        let _ = self.shutdown_tx.send(true);
    }

    /// Tears down every currently-running Scheduler without touching the
    /// fan-in loop's shutdown signal. Used both by `close` and, as the
    /// idempotent first step of `init`, to discard any Schedulers left over
    /// from a previous bootstrap.
    async fn close_schedulers(&self) {
        let mut schedulers = self.schedulers.lock().await;
        for (_, entry) in schedulers.drain() {
            entry.handle.close();
            let _ = entry.task.await;
        }
    }

    async fn start(&self, web_service: WebService, test: Test) {
        let test_id = test.id.clone();
        let (handle, scheduler) = scheduler::spawn(
            web_service,
            test,
            self.prober.clone(),
            self.results_tx.clone(),
            self.errors_tx.clone(),
        );
        let task = tokio::spawn(scheduler.run());
        let mut schedulers = self.schedulers.lock().await;
        if let Some(old) = schedulers.insert(test_id, Entry { handle, task }) {
            old.handle.close();
        }
    }

    #[cfg(test)]
    async fn scheduler_count(&self) -> usize {
        self.schedulers.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use am_domain::model::{AssertionV1, Method, Parameters, Schedule, Timeout};
    use chrono::Utc;

    fn web_service() -> WebService {
        WebService {
            id: 1,
            host: "127.0.0.1:1".into(),
            scheme: "http".into(),
            description: String::new(),
            favicon: String::new(),
            created_at: Utc::now(),
            modified_at: Utc::now(),
        }
    }

    fn test(id: &str) -> Test {
        Test {
            id: id.into(),
            web_service_id: 1,
            name: "probe".into(),
            path: "/".into(),
            method: Method::Get,
            content_type: "application/json".into(),
            description: String::new(),
            parameters: Parameters::default(),
            schedule: Schedule::Daily,
            timeout: Timeout(1),
            assertion: AssertionV1 { status_code: 200 },
            created_at: Utc::now(),
            modified_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn update_schedule_without_prior_entry_is_not_found() {
        let catalog: Arc<dyn CatalogStore> =
            Arc::new(am_store::SqlCatalogStore::new(am_store::SqliteHandle::in_memory().await.unwrap()));
        let results: Arc<dyn ResultStore> =
            Arc::new(am_store::SqlResultStore::new(am_store::SqliteHandle::in_memory().await.unwrap()));
        let manager = ScheduleManager::new(catalog, results);

        let err = manager
            .update_schedule(web_service(), test("unknown"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TestNotFound(_)));
    }

    #[tokio::test]
    async fn add_schedule_then_remove_leaves_map_as_before() {
        let catalog: Arc<dyn CatalogStore> =
            Arc::new(am_store::SqlCatalogStore::new(am_store::SqliteHandle::in_memory().await.unwrap()));
        let results: Arc<dyn ResultStore> =
            Arc::new(am_store::SqlResultStore::new(am_store::SqliteHandle::in_memory().await.unwrap()));
        let manager = ScheduleManager::new(catalog, results);

        assert_eq!(manager.scheduler_count().await, 0);
        manager.add_schedule(web_service(), test("t1")).await;
        assert_eq!(manager.scheduler_count().await, 1);
        manager.remove_schedule("t1").await;
        assert_eq!(manager.scheduler_count().await, 0);

        // Idempotent on an id that was never present.
        manager.remove_schedule("never-added").await;
        assert_eq!(manager.scheduler_count().await, 0);
    }

    #[tokio::test]
    async fn update_schedule_replaces_without_a_gap() {
        let catalog: Arc<dyn CatalogStore> =
            Arc::new(am_store::SqlCatalogStore::new(am_store::SqliteHandle::in_memory().await.unwrap()));
        let results: Arc<dyn ResultStore> =
            Arc::new(am_store::SqlResultStore::new(am_store::SqliteHandle::in_memory().await.unwrap()));
        let manager = ScheduleManager::new(catalog, results);

        manager.add_schedule(web_service(), test("t1")).await;
        let mut updated = test("t1");
        updated.schedule = Schedule::OneMinute;
        manager
            .update_schedule(web_service(), updated)
            .await
            .unwrap();
        assert_eq!(manager.scheduler_count().await, 1);
    }

    #[tokio::test]
    async fn init_fails_fast_and_leaves_nothing_scheduled_on_partial_store_error() {
        // Every test the fake catalog returns shares `web_service_id: 1`
        // (see `test()`), so make the second one point at an id the fake
        // lookup rejects to force a mid-loop failure.
        struct TwoTests;
        #[async_trait::async_trait]
        impl CatalogStore for TwoTests {
            async fn list_all_tests(&self) -> Result<Vec<Test>> {
                let mut second = test("boom");
                second.web_service_id = 2;
                Ok(vec![test("ok"), second])
            }
            async fn get_test_by_id(&self, _id: &str) -> Result<Test> {
                unimplemented!()
            }
            async fn create_test(
                &self,
                _web_service_id: i64,
                _request: am_domain::model::TestRequest,
            ) -> Result<Test> {
                unimplemented!()
            }
            async fn update_test(&self, _id: &str, _request: am_domain::model::TestRequest) -> Result<Test> {
                unimplemented!()
            }
            async fn delete_test(&self, _id: &str) -> Result<()> {
                unimplemented!()
            }
            async fn list_tests_by_web_service(
                &self,
                _web_service_id: i64,
                _offset: i64,
                _limit: i64,
            ) -> Result<(Vec<Test>, i64)> {
                unimplemented!()
            }
            async fn create_web_service(
                &self,
                _request: am_domain::model::WebServiceRequest,
            ) -> Result<WebService> {
                unimplemented!()
            }
            async fn get_web_service_by_id(&self, id: i64) -> Result<WebService> {
                match id {
                    1 => Ok(web_service()),
                    _ => Err(Error::Store("connection reset".into())),
                }
            }
            async fn update_web_service(
                &self,
                _id: i64,
                _request: am_domain::model::WebServiceRequest,
            ) -> Result<WebService> {
                unimplemented!()
            }
            async fn delete_web_service(&self, _id: i64) -> Result<()> {
                unimplemented!()
            }
            async fn list_web_services(
                &self,
                _offset: i64,
                _limit: i64,
            ) -> Result<(Vec<WebService>, i64)> {
                unimplemented!()
            }
        }

        let catalog: Arc<dyn CatalogStore> = Arc::new(TwoTests);
        let results: Arc<dyn ResultStore> =
            Arc::new(am_store::SqlResultStore::new(am_store::SqliteHandle::in_memory().await.unwrap()));
        let manager = ScheduleManager::new(catalog, results);

        let err = manager.init().await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        // The first test's web-service lookup succeeded before the second
        // one failed; §4.3 forbids it being left scheduled regardless.
        assert_eq!(manager.scheduler_count().await, 0);
    }
}
