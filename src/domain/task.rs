use serde::{Deserialize, Serialize};

/// 수집 대상 하나 (상호명 + 주소)
///
/// `original_name` is the identifier the document store is keyed by, so it is
/// kept exactly as the task source returned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub original_name: String,
    pub address: Option<String>,
}

impl Task {
    pub fn new(original_name: impl Into<String>, address: Option<String>) -> Self {
        Self {
            original_name: original_name.into(),
            address,
        }
    }

    /// Name with surrounding quotes and whitespace stripped, used for the search query
    pub fn normalized_name(&self) -> &str {
        self.original_name
            .trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'')
    }

    /// Address if present and not blank
    pub fn address(&self) -> Option<&str> {
        self.address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }
}
