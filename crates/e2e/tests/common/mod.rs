//! Shared fakes for the lifecycle tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use heroes_e2e::artifact::ArtifactCopier;
use heroes_e2e::report::ReportEntry;
use heroes_e2e::tracker::{BugReport, IssueTracker, PassUpdate};
use heroes_e2e::{BrowserSession, HarnessConfig, HarnessError, HarnessResult};

/// Browser session that writes a tiny file per screenshot and counts calls
pub struct FakeSession {
    id: String,
    shots_dir: PathBuf,
    pub captures: Mutex<Vec<String>>,
    pub quits: AtomicUsize,
    pub fail_capture: bool,
}

impl FakeSession {
    pub fn new(id: &str, shots_dir: &Path) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            shots_dir: shots_dir.to_path_buf(),
            captures: Mutex::new(Vec::new()),
            quits: AtomicUsize::new(0),
            fail_capture: false,
        })
    }

    pub fn broken(id: &str, shots_dir: &Path) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            shots_dir: shots_dir.to_path_buf(),
            captures: Mutex::new(Vec::new()),
            quits: AtomicUsize::new(0),
            fail_capture: true,
        })
    }

    pub fn capture_names(&self) -> Vec<String> {
        self.captures.lock().clone()
    }

    pub fn quit_count(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }
}

impl BrowserSession for FakeSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture_screenshot(&self, name: &str) -> HarnessResult<PathBuf> {
        self.captures.lock().push(name.to_string());
        if self.fail_capture {
            return Err(HarnessError::Screenshot {
                name: name.to_string(),
                reason: "browser window closed".to_string(),
            });
        }
        std::fs::create_dir_all(&self.shots_dir)?;
        let path = self.shots_dir.join(format!("{}-{}.png", self.id, name));
        std::fs::write(&path, format!("{}:{}", self.id, name))?;
        Ok(path)
    }

    fn quit(&self) -> HarnessResult<()> {
        self.quits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingTracker {
    pub passes: Mutex<Vec<PassUpdate>>,
    pub bugs: Mutex<Vec<BugReport>>,
}

impl IssueTracker for RecordingTracker {
    fn record_pass(&self, update: &PassUpdate) -> HarnessResult<()> {
        self.passes.lock().push(update.clone());
        Ok(())
    }

    fn file_bug(&self, bug: &BugReport) -> HarnessResult<()> {
        self.bugs.lock().push(bug.clone());
        Ok(())
    }
}

pub struct FailingCopier;

impl ArtifactCopier for FailingCopier {
    fn copy(&self, src: &Path, dest: &Path) -> HarnessResult<()> {
        Err(HarnessError::ArtifactCopy {
            from: src.display().to_string(),
            to: dest.display().to_string(),
            reason: "disk full".to_string(),
        })
    }
}

pub fn config(output_dir: &Path, listener_takes_screenshots: bool) -> HarnessConfig {
    HarnessConfig {
        output_dir: output_dir.to_path_buf(),
        listener_takes_screenshots,
        browser: "firefox".to_string(),
        environment: "staging".to_string(),
        ..Default::default()
    }
}

pub fn fail_records(entry: &ReportEntry) -> Vec<(String, Option<String>)> {
    entry
        .records
        .iter()
        .filter(|r| r.status == heroes_e2e::LogStatus::Fail)
        .map(|r| (r.message.clone(), r.media.clone()))
        .collect()
}
