//! Per-run execution context shared by every test of a run

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::config::RunParameters;
use crate::error::{HarnessError, HarnessResult};
use crate::session::BrowserSession;

/// Static "take screenshots of failures at all" flag
pub const TAKE_SCREENSHOTS: &str = "takeScreenshots";

/// Whether the lifecycle coordinator (rather than teardown) captures failures
pub const LISTENER_TAKE_SCREENSHOT: &str = "listenerTakeScreenshot";

/// Run parameter and attribute enabling issue tracker updates
pub const UPDATE_JIRA: &str = "updateJira";

/// Attribute key holding a test's single browser session
pub fn driver_key(test_name: &str) -> String {
    format!("{}.driver", test_name)
}

/// Attribute key holding a test's browser sessions when it drives several
pub fn drivers_key(test_name: &str) -> String {
    format!("{}.drivers", test_name)
}

#[derive(Clone)]
pub enum AttributeValue {
    Flag(bool),
    Text(String),
    Session(Arc<dyn BrowserSession>),
    Sessions(Vec<Arc<dyn BrowserSession>>),
}

impl AttributeValue {
    fn kind(&self) -> &'static str {
        match self {
            AttributeValue::Flag(_) => "flag",
            AttributeValue::Text(_) => "text",
            AttributeValue::Session(_) => "session",
            AttributeValue::Sessions(_) => "session list",
        }
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Flag(v) => write!(f, "Flag({})", v),
            AttributeValue::Text(v) => write!(f, "Text({:?})", v),
            AttributeValue::Session(s) => write!(f, "Session({})", s.id()),
            AttributeValue::Sessions(list) => f
                .debug_list()
                .entries(list.iter().map(|s| s.id()))
                .finish(),
        }
    }
}

/// Concurrent attribute map for a run.
///
/// Tests running on different threads write to it at the same time. Keys for
/// per-test values are derived from the test name so they never collide.
#[derive(Debug, Default)]
pub struct AttributeStore {
    values: DashMap<String, AttributeValue>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: AttributeValue) {
        self.values.insert(key.into(), value);
    }

    pub fn set_flag(&self, key: impl Into<String>, value: bool) {
        self.set(key, AttributeValue::Flag(value));
    }

    pub fn get(&self, key: &str) -> Option<AttributeValue> {
        self.values.get(key).map(|v| v.value().clone())
    }

    pub fn remove(&self, key: &str) -> Option<AttributeValue> {
        self.values.remove(key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn flag(&self, key: &str) -> HarnessResult<bool> {
        match self.get(key) {
            Some(AttributeValue::Flag(v)) => Ok(v),
            Some(other) => Err(HarnessError::AttributeType {
                key: key.to_string(),
                expected: "flag",
                found: other.kind(),
            }),
            None => Err(HarnessError::AttributeMissing(key.to_string())),
        }
    }

    /// Read a flag, falling back to `default` when missing or of another kind
    pub fn flag_or(&self, key: &str, default: bool) -> bool {
        self.flag(key).unwrap_or(default)
    }

    /// Browser sessions registered for a test.
    ///
    /// Merges the single-session key and the session list, single first, with
    /// a handle registered under both keys returned once. A value of another
    /// kind under either key is skipped with a warning so the remaining
    /// sessions are still found.
    pub fn sessions_for(&self, test_name: &str) -> HarnessResult<Vec<Arc<dyn BrowserSession>>> {
        let mut sessions: Vec<Arc<dyn BrowserSession>> = Vec::new();
        let mut push = |session: Arc<dyn BrowserSession>| {
            if !sessions.iter().any(|s| Arc::ptr_eq(s, &session)) {
                sessions.push(session);
            }
        };

        let single = driver_key(test_name);
        match self.get(&single) {
            Some(AttributeValue::Session(session)) => push(session),
            Some(other) => warn!("Ignoring {}: expected session, found {}", single, other.kind()),
            None => {}
        }

        let multi = drivers_key(test_name);
        match self.get(&multi) {
            Some(AttributeValue::Sessions(list)) => list.into_iter().for_each(&mut push),
            Some(other) => warn!("Ignoring {}: expected session list, found {}", multi, other.kind()),
            None => {}
        }

        if sessions.is_empty() {
            return Err(HarnessError::NoSession(test_name.to_string()));
        }
        Ok(sessions)
    }

    /// Drop the per-test keys of a finished test
    pub fn clear_test(&self, test_name: &str) {
        self.values.remove(&driver_key(test_name));
        self.values.remove(&drivers_key(test_name));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One execution of a named suite
#[derive(Debug)]
pub struct TestRun {
    suite_name: String,
    report_name: String,
    parameters: RunParameters,
    attributes: AttributeStore,
    update_issue_tracker: bool,
    started_at: DateTime<Utc>,
}

impl TestRun {
    pub fn new(
        suite_name: impl Into<String>,
        parameters: RunParameters,
        update_issue_tracker: bool,
    ) -> Self {
        let suite_name = suite_name.into();
        Self {
            report_name: report_name_for(&suite_name),
            suite_name,
            parameters,
            attributes: AttributeStore::new(),
            update_issue_tracker,
            started_at: Utc::now(),
        }
    }

    pub fn suite_name(&self) -> &str {
        &self.suite_name
    }

    /// File-system friendly name of the report, derived from the suite name
    pub fn report_name(&self) -> &str {
        &self.report_name
    }

    pub fn parameters(&self) -> &RunParameters {
        &self.parameters
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    pub fn update_issue_tracker(&self) -> bool {
        self.update_issue_tracker
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn take_screenshots(&self) -> bool {
        self.attributes.flag_or(TAKE_SCREENSHOTS, false)
    }

    pub fn listener_takes_screenshot(&self) -> bool {
        self.attributes.flag_or(LISTENER_TAKE_SCREENSHOT, false)
    }
}

/// Replace anything that is not alphanumeric, `-` or `_` with `_`
pub fn report_name_for(suite_name: &str) -> String {
    let name: String = suite_name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() {
        "report".to_string()
    } else {
        name
    }
}
