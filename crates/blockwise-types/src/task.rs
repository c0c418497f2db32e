use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Languages a task can carry an editor pane for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Solidity,
    Sui,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Solidity, Language::Sui];

    /// Path segment used by the compile endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Solidity => "solidity",
            Language::Sui => "sui",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Language::Solidity => "Solidity",
            Language::Sui => "Sui Move",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLanguage(pub String);

impl fmt::Display for UnknownLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown language `{}` (expected one of: solidity, sui)",
            self.0
        )
    }
}

impl std::error::Error for UnknownLanguage {}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solidity" | "sol" => Ok(Language::Solidity),
            "sui" | "move" | "sui-move" => Ok(Language::Sui),
            other => Err(UnknownLanguage(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Tab {
    #[serde(rename = "tabName", default)]
    pub name: String,
    #[serde(rename = "tabContent", default)]
    pub content: String,
}

impl Tab {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// One language's code as stored on a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CodeSection {
    #[serde(default)]
    pub current_tab: Tab,
    #[serde(default)]
    pub tabs: Vec<Tab>,
    // Carried as fetched; no client behavior reads it.
    #[serde(default)]
    pub test: Tab,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub solidity: CodeSection,
    #[serde(default)]
    pub sui: CodeSection,
}

impl Task {
    pub fn section(&self, language: Language) -> &CodeSection {
        match language {
            Language::Solidity => &self.solidity,
            Language::Sui => &self.sui,
        }
    }

    /// Lesson-only tasks are stored with an unnamed Sui editor tab.
    pub fn is_text_only(&self) -> bool {
        self.sui.current_tab.name.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskSummary {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateTaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub title: String,
    pub description: String,
    pub text: String,
    pub sui: CodeSection,
    pub solidity: CodeSection,
}
