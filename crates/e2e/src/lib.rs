//! Heroes E2E harness
//!
//! Lifecycle coordination for the heroes demo end-to-end suite. Tests drive
//! the browser and the REST backend themselves; this crate observes their
//! lifecycle and takes care of everything around them:
//! - Builds an HTML report with one entry per test
//! - Captures failure screenshots from every browser session of a test,
//!   either in the coordinator or in teardown, never both
//! - Releases browser sessions exactly once
//! - Computes issue tracker data for tests linked to an issue
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  SuiteRunner                                                │
//! │    run(suite, cases)                                        │
//! │      ├── on_run_start ──▶ TestRun { attributes, flags }     │
//! │      ├── per case, on N worker threads:                     │
//! │      │     on_test_start ─ body ─ on_test_{success,         │
//! │      │     failure,skipped} ─ cleanup (teardown)            │
//! │      └── on_run_finish ──▶ HtmlReport::flush                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  LifecycleCoordinator                                       │
//! │    ├── HtmlReport / EntryHandle   (report)                  │
//! │    ├── IssueRegistry              (annotation)              │
//! │    ├── IssueTracker               (tracker)                 │
//! │    └── ArtifactCopier             (artifact)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  teardown(run, session, outcome, index)                     │
//! │    └── SessionGuard releases the BrowserSession             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod annotation;
pub mod artifact;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod outcome;
pub mod report;
pub mod runner;
pub mod session;
pub mod teardown;
pub mod tracker;

pub use annotation::{IssueAnnotation, IssueRegistry};
pub use config::{HarnessConfig, RunParameters};
pub use context::{AttributeStore, AttributeValue, TestRun};
pub use coordinator::LifecycleCoordinator;
pub use error::{HarnessError, HarnessResult};
pub use outcome::{FailureDetail, TestInfo, TestOutcome, TestStatus};
pub use report::{EntryHandle, HtmlReport, LogStatus};
pub use runner::{SuiteRunner, SuiteSummary, TestCase, TestContext, TestFailure};
pub use session::BrowserSession;
pub use tracker::{IssueTracker, LoggingTracker};
