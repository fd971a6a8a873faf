//! Issue tracker extension point
//!
//! The suite computes what it would tell the tracker about linked tests but
//! ships only a logging implementation. Teams wire a real client in by
//! implementing [`IssueTracker`].

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::HarnessResult;

/// Status update for a linked test that passed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassUpdate {
    pub issue_id: String,
    pub owner: String,
    pub browser: String,
    pub environment: String,
}

/// Bug report for a failed test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugReport {
    /// `<test name>_<failure message>`
    pub subject: String,
    /// Stack trace of the failure
    pub description: String,
    /// Issue linked to the failing test type, if any
    pub linked_issue: Option<String>,
    pub owner: Option<String>,
}

pub trait IssueTracker: Send + Sync {
    fn record_pass(&self, update: &PassUpdate) -> HarnessResult<()>;

    fn file_bug(&self, bug: &BugReport) -> HarnessResult<()>;
}

/// Logs tracker data without contacting any tracker
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTracker;

impl IssueTracker for LoggingTracker {
    fn record_pass(&self, update: &PassUpdate) -> HarnessResult<()> {
        info!(
            issue = %update.issue_id,
            owner = %update.owner,
            browser = %update.browser,
            environment = %update.environment,
            "Issue tracker update (not sent)"
        );
        Ok(())
    }

    fn file_bug(&self, bug: &BugReport) -> HarnessResult<()> {
        info!(
            subject = %bug.subject,
            linked_issue = bug.linked_issue.as_deref().unwrap_or(""),
            "Bug report (not sent)"
        );
        Ok(())
    }
}
