//! Suite runner that drives the lifecycle coordinator

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::time::Instant;
use tracing::{error, info};

use crate::config::RunParameters;
use crate::context::{driver_key, drivers_key, AttributeValue, TestRun};
use crate::coordinator::LifecycleCoordinator;
use crate::error::{HarnessError, HarnessResult};
use crate::outcome::{FailureDetail, TestInfo, TestOutcome, TestStatus};
use crate::session::BrowserSession;
use crate::teardown;

/// Why a test body did not pass
#[derive(Debug, Clone)]
pub enum TestFailure {
    Failed(FailureDetail),
    Skipped(String),
}

impl TestFailure {
    pub fn failed(message: impl Into<String>) -> Self {
        TestFailure::Failed(FailureDetail::new(message))
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        TestFailure::Skipped(reason.into())
    }
}

impl From<HarnessError> for TestFailure {
    fn from(e: HarnessError) -> Self {
        TestFailure::failed(e.to_string())
    }
}

pub type TestBodyResult = Result<(), TestFailure>;

type TestBody = Arc<dyn Fn(&TestContext) -> TestBodyResult + Send + Sync>;
type TestCleanup = Arc<dyn Fn(&TestContext, &TestOutcome) + Send + Sync>;

/// What a running test sees of its run
pub struct TestContext {
    run: Arc<TestRun>,
    info: TestInfo,
}

impl TestContext {
    pub fn run(&self) -> &TestRun {
        &self.run
    }

    pub fn info(&self) -> &TestInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.run.parameters().get(name)
    }

    /// Register the test's browser session so failures can be captured
    pub fn register_session(&self, session: Arc<dyn BrowserSession>) {
        self.run
            .attributes()
            .set(driver_key(&self.info.name), AttributeValue::Session(session));
    }

    /// Register several sessions, e.g. two users logged in at once
    pub fn register_sessions(&self, sessions: Vec<Arc<dyn BrowserSession>>) {
        self.run
            .attributes()
            .set(drivers_key(&self.info.name), AttributeValue::Sessions(sessions));
    }

    pub fn sessions(&self) -> HarnessResult<Vec<Arc<dyn BrowserSession>>> {
        self.run.attributes().sessions_for(&self.info.name)
    }
}

#[derive(Clone)]
pub struct TestCase {
    info: TestInfo,
    body: TestBody,
    cleanup: Option<TestCleanup>,
    skip_reason: Option<String>,
}

impl TestCase {
    pub fn new<F>(name: impl Into<String>, test_type: impl Into<String>, body: F) -> Self
    where
        F: Fn(&TestContext) -> TestBodyResult + Send + Sync + 'static,
    {
        Self {
            info: TestInfo::new(name, test_type),
            body: Arc::new(body),
            cleanup: None,
            skip_reason: None,
        }
    }

    /// Run `cleanup` after the outcome has been reported
    pub fn with_cleanup<F>(mut self, cleanup: F) -> Self
    where
        F: Fn(&TestContext, &TestOutcome) + Send + Sync + 'static,
    {
        self.cleanup = Some(Arc::new(cleanup));
        self
    }

    /// Tear down every registered session after the outcome has been reported
    pub fn with_default_teardown(self) -> Self {
        self.with_cleanup(|ctx, outcome| teardown::teardown_registered(ctx.run(), outcome))
    }

    /// Mark the case as skipped without running its body
    pub fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.skip_reason = Some(reason.into());
        self
    }
}

/// Results of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub suite: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub outcomes: Vec<TestOutcome>,
    pub report_path: Option<PathBuf>,
}

impl SuiteSummary {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn outcome(&self, name: &str) -> Option<&TestOutcome> {
        self.outcomes.iter().find(|o| o.info.name == name)
    }
}

pub struct SuiteRunner {
    coordinator: Arc<LifecycleCoordinator>,
    threads: usize,
    parameters: RunParameters,
}

impl SuiteRunner {
    pub fn new(coordinator: Arc<LifecycleCoordinator>) -> Self {
        let threads = coordinator.config().threads.max(1);
        Self {
            coordinator,
            threads,
            parameters: RunParameters::new(),
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_parameters(mut self, parameters: RunParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Run every case, `threads` at a time, then flush the report
    pub fn run(&self, suite_name: &str, cases: Vec<TestCase>) -> HarnessResult<SuiteSummary> {
        let start = Instant::now();
        install_panic_hook();
        let run = self.coordinator.on_run_start(suite_name, &self.parameters)?;
        let total = cases.len();

        info!("Running {} test(s) on {} thread(s)...", total, self.threads);

        let queue = Mutex::new(cases.into_iter().collect::<VecDeque<_>>());
        let outcomes = Mutex::new(Vec::with_capacity(total));

        std::thread::scope(|scope| {
            for _ in 0..self.threads.min(total.max(1)) {
                scope.spawn(|| loop {
                    let next = queue.lock().pop_front();
                    let Some(case) = next else { break };
                    let outcome = self.execute(&run, &case);
                    outcomes.lock().push(outcome);
                });
            }
        });

        let report_path = self.coordinator.on_run_finish()?;
        let outcomes = outcomes.into_inner();
        let count = |status: TestStatus| outcomes.iter().filter(|o| o.status == status).count();
        let summary = SuiteSummary {
            suite: suite_name.to_string(),
            total,
            passed: count(TestStatus::Success),
            failed: count(TestStatus::Failure),
            skipped: count(TestStatus::Skipped),
            duration_ms: start.elapsed().as_millis() as u64,
            outcomes,
            report_path,
        };

        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            summary.passed, summary.failed, summary.skipped, summary.duration_ms
        );
        Ok(summary)
    }

    /// Start, body, outcome callback, cleanup; in that order so the coordinator
    /// sees live sessions before teardown releases them
    fn execute(&self, run: &Arc<TestRun>, case: &TestCase) -> TestOutcome {
        let ctx = TestContext {
            run: run.clone(),
            info: case.info.clone(),
        };
        self.coordinator.on_test_start(&ctx.info);

        let result = match &case.skip_reason {
            Some(reason) => Err(TestFailure::Skipped(reason.clone())),
            None => {
                take_panic_trace();
                catch_unwind(AssertUnwindSafe(|| (case.body)(&ctx))).unwrap_or_else(|payload| {
                    let trace = take_panic_trace().unwrap_or_else(|| Backtrace::force_capture().to_string());
                    Err(TestFailure::Failed(FailureDetail::with_stack_trace(
                        panic_message(payload.as_ref()),
                        trace,
                    )))
                })
            }
        };

        let outcome = match result {
            Ok(()) => TestOutcome::success(ctx.info.clone()),
            Err(TestFailure::Failed(detail)) => TestOutcome::failure(ctx.info.clone(), detail),
            Err(TestFailure::Skipped(reason)) => {
                info!("Skipping {}: {}", ctx.info.name, reason);
                TestOutcome::skipped(ctx.info.clone())
            }
        };

        match outcome.status {
            TestStatus::Success => self.coordinator.on_test_success(&outcome),
            TestStatus::Failure => self.coordinator.on_test_failure(&outcome),
            TestStatus::Skipped => self.coordinator.on_test_skipped(&outcome),
        }

        if let Some(cleanup) = &case.cleanup {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| cleanup(&ctx, &outcome))) {
                error!("Cleanup of {} panicked: {}", ctx.info.name, panic_message(payload.as_ref()));
            }
        }
        run.attributes().clear_test(&ctx.info.name);

        outcome
    }
}

thread_local! {
    /// Trace of the last panic on this thread, recorded where it was raised
    static PANIC_TRACE: RefCell<Option<String>> = RefCell::new(None);
}

static PANIC_HOOK: Once = Once::new();

/// Chain a hook that keeps the panic site and backtrace for the failing test
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            let trace = format!("panicked at {}\n{}", location, Backtrace::force_capture());
            PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<String> {
    PANIC_TRACE.with(|slot| slot.borrow_mut().take())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "test panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(payload.as_ref()), "test panicked");
    }

    #[test]
    fn test_panic_trace_points_at_panic_site() {
        install_panic_hook();
        take_panic_trace();
        let result = catch_unwind(|| panic!("hero list empty"));
        assert!(result.is_err());
        let trace = take_panic_trace().unwrap();
        assert!(trace.starts_with("panicked at "));
        assert!(trace.contains("runner.rs"));
        assert!(take_panic_trace().is_none());
    }
}
