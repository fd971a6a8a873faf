//! Per-test teardown
//!
//! Every test releases its browser sessions here. When the coordinator is not
//! capturing failure screenshots for the run, teardown captures them instead,
//! so a failing test is photographed in exactly one place.

use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::context::{TestRun, LISTENER_TAKE_SCREENSHOT, TAKE_SCREENSHOTS};
use crate::error::HarnessResult;
use crate::outcome::TestOutcome;
use crate::session::{BrowserSession, SessionGuard};

/// Capture a local failure screenshot if needed, then release the session.
///
/// `session_index` is 0 for single-session tests and 1-based otherwise; it
/// suffixes the screenshot name as `<test>.<index>`. Errors while deciding or
/// capturing are logged. The session is released in every case, including
/// when the capture step panics.
pub fn teardown(run: &TestRun, session: &dyn BrowserSession, outcome: &TestOutcome, session_index: usize) {
    let guard = SessionGuard::new(session);

    match capture_failure_screenshot(run, session, outcome, session_index) {
        Ok(Some(path)) => info!("Saved failure screenshot for {} to {}", outcome.name(), path.display()),
        Ok(None) => {}
        Err(e) => error!("Teardown screenshot for {} failed: {}", outcome.name(), e),
    }

    guard.release();
}

/// Release a session without any screenshot logic
pub fn release(session: &dyn BrowserSession) {
    SessionGuard::new(session).release();
}

/// Tear down every session registered for the test in the run's attributes
pub fn teardown_registered(run: &TestRun, outcome: &TestOutcome) {
    let sessions = match run.attributes().sessions_for(outcome.name()) {
        Ok(sessions) => sessions,
        Err(e) => {
            debug!("Nothing to tear down for {}: {}", outcome.name(), e);
            return;
        }
    };

    if sessions.len() == 1 {
        teardown(run, sessions[0].as_ref(), outcome, 0);
    } else {
        for (i, session) in sessions.iter().enumerate() {
            teardown(run, session.as_ref(), outcome, i + 1);
        }
    }
}

/// Screenshot name for a session of a test
pub fn screenshot_name(test_name: &str, session_index: usize) -> String {
    if session_index > 0 {
        format!("{}.{}", test_name, session_index)
    } else {
        test_name.to_string()
    }
}

fn capture_failure_screenshot(
    run: &TestRun,
    session: &dyn BrowserSession,
    outcome: &TestOutcome,
    session_index: usize,
) -> HarnessResult<Option<PathBuf>> {
    if !outcome.is_failure() {
        return Ok(None);
    }

    let attributes = run.attributes();
    let take_screenshots = attributes.flag(TAKE_SCREENSHOTS).unwrap_or_else(|e| {
        warn!("{}, not taking screenshots", e);
        false
    });
    let listener_takes = attributes.flag(LISTENER_TAKE_SCREENSHOT).unwrap_or_else(|e| {
        warn!("{}, assuming the coordinator does not capture", e);
        false
    });

    if !take_screenshots || listener_takes {
        return Ok(None);
    }

    let name = screenshot_name(outcome.name(), session_index);
    session.capture_screenshot(&name).map(Some)
}
