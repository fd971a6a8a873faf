//! Test identity and results

use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;

/// Identity of a test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestInfo {
    /// Test method name, unique within a run
    pub name: String,

    /// Fully qualified defining type, e.g. `heroes::users::LoginTests`
    pub test_type: String,
}

impl TestInfo {
    pub fn new(name: impl Into<String>, test_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            test_type: test_type.into(),
        }
    }

    /// Declaring namespace of the test type, used to group report entries
    pub fn namespace(&self) -> &str {
        match self.test_type.rsplit_once("::") {
            Some((namespace, _)) => namespace,
            None => &self.test_type,
        }
    }

    /// `type::name`
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.test_type, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Success,
    Failure,
    Skipped,
}

/// Why a test failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub message: String,
    pub stack_trace: String,
}

impl FailureDetail {
    /// Failure with a backtrace captured at the call site, whatever `RUST_BACKTRACE` says
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack_trace: Backtrace::force_capture().to_string(),
        }
    }

    pub fn with_stack_trace(message: impl Into<String>, stack_trace: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack_trace: stack_trace.into(),
        }
    }
}

/// Result of one test case in one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub info: TestInfo,
    pub status: TestStatus,
    pub failure: Option<FailureDetail>,
}

impl TestOutcome {
    pub fn success(info: TestInfo) -> Self {
        Self {
            info,
            status: TestStatus::Success,
            failure: None,
        }
    }

    pub fn failure(info: TestInfo, failure: FailureDetail) -> Self {
        Self {
            info,
            status: TestStatus::Failure,
            failure: Some(failure),
        }
    }

    pub fn skipped(info: TestInfo) -> Self {
        Self {
            info,
            status: TestStatus::Skipped,
            failure: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn is_failure(&self) -> bool {
        self.status == TestStatus::Failure
    }
}
