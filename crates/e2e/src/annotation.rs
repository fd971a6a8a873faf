//! Issue tracker links declared per test type

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::HarnessResult;

/// Owner recorded when a link does not name one
pub const DEFAULT_OWNER: &str = "QA Automation";

/// Issue linked to a test type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueAnnotation {
    pub issue_id: String,
    pub owner: String,
}

/// Sidecar entry as written in YAML
#[derive(Debug, Deserialize)]
struct IssueLink {
    test_type: String,
    issue: String,
    #[serde(default)]
    owner: Option<String>,
}

/// Lookup table from test type to its issue link, built when the suite loads
#[derive(Debug, Clone)]
pub struct IssueRegistry {
    links: HashMap<String, IssueAnnotation>,
    default_owner: String,
}

impl Default for IssueRegistry {
    fn default() -> Self {
        Self::with_default_owner(DEFAULT_OWNER)
    }
}

impl IssueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_owner(owner: impl Into<String>) -> Self {
        Self {
            links: HashMap::new(),
            default_owner: owner.into(),
        }
    }

    pub fn register(
        &mut self,
        test_type: impl Into<String>,
        issue_id: impl Into<String>,
        owner: Option<&str>,
    ) {
        self.links.insert(
            test_type.into(),
            IssueAnnotation {
                issue_id: issue_id.into(),
                owner: owner.unwrap_or(&self.default_owner).to_string(),
            },
        );
    }

    pub fn lookup(&self, test_type: &str) -> Option<&IssueAnnotation> {
        self.links.get(test_type)
    }

    /// Parse a YAML list of `{ test_type, issue, owner? }` links
    pub fn from_yaml(yaml: &str, default_owner: &str) -> HarnessResult<Self> {
        let entries: Vec<IssueLink> = serde_yaml::from_str(yaml)?;
        let links = entries
            .into_iter()
            .map(|link| {
                let owner = link.owner.unwrap_or_else(|| default_owner.to_string());
                (
                    link.test_type,
                    IssueAnnotation {
                        issue_id: link.issue,
                        owner,
                    },
                )
            })
            .collect();
        Ok(Self {
            links,
            default_owner: default_owner.to_string(),
        })
    }

    pub fn from_file(path: &Path, default_owner: &str) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content, default_owner)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
