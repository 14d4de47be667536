//! Prompt template catalog and strategy resolution.

mod catalog;

pub use catalog::{PromptCatalog, FALLBACK_STRATEGY};

use serde::{Deserialize, Serialize};

/// Prompt category a job type resolves templates under.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PromptCategory {
    #[serde(rename = "FR")]
    Fr,
    #[serde(rename = "NFR")]
    Nfr,
    #[serde(rename = "SRS")]
    Srs,
    #[serde(rename = "USER_STORIES")]
    UserStories,
}

impl PromptCategory {
    /// Get the string representation (the key used in the catalog file).
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptCategory::Fr => "FR",
            PromptCategory::Nfr => "NFR",
            PromptCategory::Srs => "SRS",
            PromptCategory::UserStories => "USER_STORIES",
        }
    }

    /// Generation categories get the zero-shot fallback on resolution.
    pub fn is_generation(&self) -> bool {
        matches!(self, PromptCategory::Srs | PromptCategory::UserStories)
    }

    /// All categories, in catalog-file order.
    pub fn all() -> [PromptCategory; 4] {
        [
            PromptCategory::Fr,
            PromptCategory::Nfr,
            PromptCategory::Srs,
            PromptCategory::UserStories,
        ]
    }
}

impl std::fmt::Display for PromptCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
