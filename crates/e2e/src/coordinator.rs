//! Test lifecycle coordinator
//!
//! Observes run and test lifecycle events emitted by the suite runner and
//! turns them into report entries, failure screenshots and issue tracker
//! data. Each outcome is handled exactly once.
//!
//! ```text
//! run:   NotStarted ──on_run_start──▶ Running ──on_run_finish──▶ Finished
//! test:  Started ──▶ Succeeded | Failed | Skipped
//! ```

use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::annotation::IssueRegistry;
use crate::artifact::{ArtifactCopier, FsCopier};
use crate::config::{parse_flag, HarnessConfig, RunParameters};
use crate::context::{TestRun, LISTENER_TAKE_SCREENSHOT, TAKE_SCREENSHOTS, UPDATE_JIRA};
use crate::error::{HarnessError, HarnessResult};
use crate::outcome::{TestInfo, TestOutcome};
use crate::report::markup::{self, LabelColor};
use crate::report::{EntryHandle, HtmlReport};
use crate::session::BrowserSession;
use crate::tracker::{BugReport, IssueTracker, LoggingTracker, PassUpdate};

enum RunState {
    NotStarted,
    Running {
        run: Arc<TestRun>,
        report: Arc<HtmlReport>,
    },
    Finished,
}

impl RunState {
    fn name(&self) -> &'static str {
        match self {
            RunState::NotStarted => "not_started",
            RunState::Running { .. } => "running",
            RunState::Finished => "finished",
        }
    }
}

pub struct LifecycleCoordinator {
    config: HarnessConfig,
    issues: IssueRegistry,
    tracker: Arc<dyn IssueTracker>,
    copier: Arc<dyn ArtifactCopier>,
    state: Mutex<RunState>,
    /// Open entries by test name; removed once the test reaches a terminal state
    entries: DashMap<String, EntryHandle>,
}

impl LifecycleCoordinator {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            issues: IssueRegistry::with_default_owner(config.default_issue_owner.clone()),
            config,
            tracker: Arc::new(LoggingTracker),
            copier: Arc::new(FsCopier),
            state: Mutex::new(RunState::NotStarted),
            entries: DashMap::new(),
        }
    }

    pub fn with_issue_registry(mut self, issues: IssueRegistry) -> Self {
        self.issues = issues;
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn IssueTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_copier(mut self, copier: Arc<dyn ArtifactCopier>) -> Self {
        self.copier = copier;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Report of the running run
    pub fn report(&self) -> Option<Arc<HtmlReport>> {
        match &*self.state.lock() {
            RunState::Running { report, .. } => Some(report.clone()),
            _ => None,
        }
    }

    /// The running run
    pub fn run(&self) -> Option<Arc<TestRun>> {
        match &*self.state.lock() {
            RunState::Running { run, .. } => Some(run.clone()),
            _ => None,
        }
    }

    /// Start a run: create its report and publish run-level flags.
    ///
    /// A bad `updateJira` parameter only disables tracker updates.
    pub fn on_run_start(&self, suite_name: &str, params: &RunParameters) -> HarnessResult<Arc<TestRun>> {
        let mut state = self.state.lock();
        if let RunState::Running { .. } = &*state {
            return Err(HarnessError::InvalidRunState {
                from: state.name().to_string(),
                to: "running".to_string(),
            });
        }

        let update_issue_tracker = parse_flag(params, UPDATE_JIRA);
        let run = Arc::new(TestRun::new(suite_name, params.clone(), update_issue_tracker));

        let attributes = run.attributes();
        attributes.set_flag(TAKE_SCREENSHOTS, self.config.take_screenshots);
        attributes.set_flag(LISTENER_TAKE_SCREENSHOT, self.config.listener_takes_screenshots);
        attributes.set_flag(UPDATE_JIRA, update_issue_tracker);

        let report = Arc::new(HtmlReport::new(
            &self.config.output_dir,
            run.report_name(),
            format!("{} - {}", self.config.report_title, suite_name),
        ));
        if let Err(e) = std::fs::create_dir_all(report.asset_dir()) {
            warn!("Could not create report asset folder {}: {}", report.asset_dir().display(), e);
        }

        info!(
            suite = suite_name,
            report = %report.html_path().display(),
            take_screenshots = self.config.take_screenshots,
            listener_takes_screenshots = self.config.listener_takes_screenshots,
            update_issue_tracker,
            "Run started"
        );

        *state = RunState::Running {
            run: run.clone(),
            report,
        };
        Ok(run)
    }

    /// Finish the run and flush the report. Only the first call flushes.
    pub fn on_run_finish(&self) -> HarnessResult<Option<PathBuf>> {
        let previous = std::mem::replace(&mut *self.state.lock(), RunState::Finished);
        let (run, report) = match previous {
            RunState::Running { run, report } => (run, report),
            other => {
                debug!("Run finish with no running report ({}), nothing to flush", other.name());
                return Ok(None);
            }
        };

        if !self.entries.is_empty() {
            warn!("{} test(s) never reported an outcome", self.entries.len());
            self.entries.clear();
        }

        let path = report.flush()?;
        let elapsed = chrono::Utc::now() - run.started_at();
        info!(
            suite = run.suite_name(),
            elapsed_ms = elapsed.num_milliseconds(),
            "Run finished"
        );
        Ok(Some(path))
    }

    pub fn on_test_start(&self, info: &TestInfo) {
        let Some(report) = self.report() else {
            warn!("Test {} started outside of a run", info.name);
            return;
        };

        let entry = report.create_entry(&info.name);
        let issue_id = self
            .issues
            .lookup(&info.test_type)
            .map(|a| a.issue_id.as_str())
            .unwrap_or("");
        entry.info(markup::escape(issue_id));
        entry.assign_category(info.namespace());

        if self.entries.insert(info.name.clone(), entry).is_some() {
            warn!("Test {} started twice, replacing its open report entry", info.name);
        }
        debug!("Test started: {}", info.qualified_name());
    }

    pub fn on_test_success(&self, outcome: &TestOutcome) {
        let Some((run, _report, entry)) = self.terminal_entry(outcome) else {
            return;
        };

        if let Some(annotation) = self.issues.lookup(&outcome.info.test_type) {
            if run.update_issue_tracker() {
                let update = PassUpdate {
                    issue_id: annotation.issue_id.clone(),
                    owner: annotation.owner.clone(),
                    browser: self.config.browser.clone(),
                    environment: self.config.environment.clone(),
                };
                if let Err(e) = self.tracker.record_pass(&update) {
                    warn!("Issue tracker update for {} failed: {}", outcome.name(), e);
                }
            } else {
                debug!(
                    "Issue tracker updates disabled, not updating {} for {}",
                    annotation.issue_id,
                    outcome.name()
                );
            }
        }

        entry.pass(markup::label("Passed", LabelColor::Green));
        info!("✓ {}", outcome.name());
    }

    pub fn on_test_failure(&self, outcome: &TestOutcome) {
        let Some((run, report, entry)) = self.terminal_entry(outcome) else {
            return;
        };

        if run.take_screenshots() && run.listener_takes_screenshot() {
            self.attach_failure_screenshots(&run, &report, &entry, outcome.name());
        }

        let (message, stack_trace) = outcome
            .failure
            .as_ref()
            .map(|f| (f.message.as_str(), f.stack_trace.as_str()))
            .unwrap_or(("", ""));
        entry.fail(markup::failure_details(message, stack_trace), None);

        if run.update_issue_tracker() {
            let annotation = self.issues.lookup(&outcome.info.test_type);
            let bug = BugReport {
                subject: format!("{}_{}", outcome.name(), message),
                description: stack_trace.to_string(),
                linked_issue: annotation.map(|a| a.issue_id.clone()),
                owner: annotation.map(|a| a.owner.clone()),
            };
            if let Err(e) = self.tracker.file_bug(&bug) {
                warn!("Filing bug for {} failed: {}", outcome.name(), e);
            }
        }

        entry.fail(markup::label("Failed", LabelColor::Red), None);
        error!("✗ {} - {}", outcome.name(), message);
    }

    pub fn on_test_skipped(&self, outcome: &TestOutcome) {
        let Some((_run, _report, entry)) = self.terminal_entry(outcome) else {
            return;
        };
        entry.skip(markup::label("Skipped", LabelColor::Orange));
        info!("- {} skipped", outcome.name());
    }

    /// Take the open entry of a test reaching its terminal state
    fn terminal_entry(&self, outcome: &TestOutcome) -> Option<(Arc<TestRun>, Arc<HtmlReport>, EntryHandle)> {
        let (run, report) = match &*self.state.lock() {
            RunState::Running { run, report } => (run.clone(), report.clone()),
            _ => {
                warn!("Outcome for {} reported outside of a run", outcome.name());
                return None;
            }
        };

        let entry = match self.entries.remove(outcome.name()) {
            Some((_, entry)) => entry,
            None => {
                warn!("No open report entry for {}, creating one", outcome.name());
                let entry = report.create_entry(outcome.name());
                entry.assign_category(outcome.info.namespace());
                entry
            }
        };
        Some((run, report, entry))
    }

    fn attach_failure_screenshots(&self, run: &TestRun, report: &HtmlReport, entry: &EntryHandle, test_name: &str) {
        let sessions = match run.attributes().sessions_for(test_name) {
            Ok(sessions) => sessions,
            Err(e) => {
                error!("Cannot capture failure screenshot for {}: {}", test_name, e);
                entry.fail(
                    format!("Screenshot not captured: no browser session found for {}", markup::escape(test_name)),
                    None,
                );
                return;
            }
        };

        let numbered = sessions.len() > 1;
        for (i, session) in sessions.iter().enumerate() {
            let index = numbered.then_some(i + 1);
            let shot_name = match index {
                Some(n) => format!("{}.{}", test_name, n),
                None => test_name.to_string(),
            };

            match self.capture_into_report(session.as_ref(), report, &shot_name) {
                Ok(link) => entry.fail(markup::screenshot_caption(index), Some(link)),
                Err(e) => {
                    warn!("Failure screenshot {} not saved: {}", shot_name, e);
                    let tag = index.map(|n| format!(" (Session {})", n)).unwrap_or_default();
                    entry.fail(
                        format!("Screenshot could not be captured{}: {}", tag, markup::escape(&e.to_string())),
                        None,
                    );
                }
            }
        }
    }

    /// Capture a screenshot and copy it next to the report, returning its link
    fn capture_into_report(&self, session: &dyn BrowserSession, report: &HtmlReport, shot_name: &str) -> HarnessResult<String> {
        let captured = session.capture_screenshot(shot_name)?;
        let file_name = format!("{}.png", shot_name);
        self.copier.copy(&captured, &report.asset_dir().join(&file_name))?;
        debug!("Captured {} from session {}", file_name, session.id());
        Ok(report.asset_link(&file_name))
    }
}
