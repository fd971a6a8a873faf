//! Browser session handles and scoped release

use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::HarnessResult;

/// A live browser-automation session owned by one test.
///
/// The harness never drives the browser itself; it only needs to capture a
/// screenshot of a failing page and to release the session afterwards.
pub trait BrowserSession: Send + Sync {
    /// Identifier used in log lines
    fn id(&self) -> &str;

    /// Capture the current page into an image file and return its path
    fn capture_screenshot(&self, name: &str) -> HarnessResult<PathBuf>;

    /// Close the browser and release its resources
    fn quit(&self) -> HarnessResult<()>;
}

/// Releases a session exactly once, on `release()` or when dropped.
///
/// Dropping also covers unwinding, so the session is quit even if the code
/// holding the guard panics.
pub struct SessionGuard<'a> {
    session: Option<&'a dyn BrowserSession>,
}

impl<'a> SessionGuard<'a> {
    pub fn new(session: &'a dyn BrowserSession) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// Release now instead of at drop
    pub fn release(mut self) {
        self.quit_once();
    }

    fn quit_once(&mut self) {
        if let Some(session) = self.session.take() {
            match session.quit() {
                Ok(()) => debug!("Released browser session {}", session.id()),
                Err(e) => warn!("Failed to release browser session {}: {}", session.id(), e),
            }
        }
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.quit_once();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSession {
        quits: AtomicUsize,
        fail_quit: bool,
    }

    impl BrowserSession for CountingSession {
        fn id(&self) -> &str {
            "counting"
        }

        fn capture_screenshot(&self, name: &str) -> HarnessResult<PathBuf> {
            Ok(PathBuf::from(format!("{}.png", name)))
        }

        fn quit(&self) -> HarnessResult<()> {
            self.quits.fetch_add(1, Ordering::SeqCst);
            if self.fail_quit {
                return Err(HarnessError::SessionRelease {
                    id: "counting".to_string(),
                    reason: "already gone".to_string(),
                });
            }
            Ok(())
        }
    }

    fn session(fail_quit: bool) -> CountingSession {
        CountingSession {
            quits: AtomicUsize::new(0),
            fail_quit,
        }
    }

    #[test]
    fn test_explicit_release_quits_once() {
        let s = session(false);
        let guard = SessionGuard::new(&s);
        guard.release();
        assert_eq!(s.quits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_quits_once() {
        let s = session(false);
        {
            let _guard = SessionGuard::new(&s);
        }
        assert_eq!(s.quits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_quit_error_is_swallowed() {
        let s = session(true);
        SessionGuard::new(&s).release();
        assert_eq!(s.quits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_on_panic() {
        let s = session(false);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = SessionGuard::new(&s);
            panic!("screenshot decision blew up");
        }));
        assert!(result.is_err());
        assert_eq!(s.quits.load(Ordering::SeqCst), 1);
    }
}
