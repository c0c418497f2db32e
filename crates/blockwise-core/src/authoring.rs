use std::collections::HashSet;

use blockwise_types::{
    AssignmentAction, ChapterChangeRequest, CodeSection, CreateChapterRequest, CreateTaskRequest,
    Language, Tab,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("title is required")]
    MissingTitle,
    #[error("{language} reference tab #{index} has content but no name")]
    UnnamedTab { language: Language, index: usize },
    #[error("{language} tab name `{name}` is used more than once")]
    DuplicateTabName { language: Language, name: String },
    #[error("{language} has no reference tab #{index}")]
    NoSuchTab { language: Language, index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabField {
    Name,
    Content,
}

/// Authoring form state for one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDraft {
    #[serde(default)]
    pub current: Tab,
    #[serde(default)]
    pub test: Tab,
    #[serde(default)]
    tabs: Vec<Tab>,
}

impl Default for SectionDraft {
    // The form opens with one blank reference row.
    fn default() -> Self {
        Self {
            current: Tab::default(),
            test: Tab::default(),
            tabs: vec![Tab::default()],
        }
    }
}

impl SectionDraft {
    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn add_tab(&mut self) -> usize {
        self.tabs.push(Tab::default());
        self.tabs.len() - 1
    }

    pub fn push_tab(&mut self, tab: Tab) {
        self.tabs.push(tab);
    }

    pub fn update_tab(
        &mut self,
        language: Language,
        index: usize,
        field: TabField,
        value: impl Into<String>,
    ) -> Result<(), DraftError> {
        let tab = self
            .tabs
            .get_mut(index)
            .ok_or(DraftError::NoSuchTab { language, index })?;
        match field {
            TabField::Name => tab.name = value.into(),
            TabField::Content => tab.content = value.into(),
        }
        Ok(())
    }

    pub fn remove_tab(&mut self, language: Language, index: usize) -> Result<Tab, DraftError> {
        if index >= self.tabs.len() {
            return Err(DraftError::NoSuchTab { language, index });
        }
        Ok(self.tabs.remove(index))
    }

    fn build(&self, language: Language) -> Result<CodeSection, DraftError> {
        let mut tabs = Vec::with_capacity(self.tabs.len());
        for (index, tab) in self.tabs.iter().enumerate() {
            let name = tab.name.trim();
            if name.is_empty() && tab.content.trim().is_empty() {
                continue;
            }
            if name.is_empty() {
                return Err(DraftError::UnnamedTab { language, index });
            }
            tabs.push(Tab::new(name, tab.content.clone()));
        }

        let current = Tab::new(self.current.name.trim(), self.current.content.clone());
        let mut seen = HashSet::new();
        if !current.name.is_empty() {
            seen.insert(current.name.clone());
        }
        for tab in &tabs {
            if !seen.insert(tab.name.clone()) {
                return Err(DraftError::DuplicateTabName {
                    language,
                    name: tab.name.clone(),
                });
            }
        }

        Ok(CodeSection {
            current_tab: current,
            tabs,
            test: Tab::new(self.test.name.trim(), self.test.content.clone()),
        })
    }
}

/// Builder for a create-task request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub solidity: SectionDraft,
    #[serde(default)]
    pub sui: SectionDraft,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn section_mut(&mut self, language: Language) -> &mut SectionDraft {
        match language {
            Language::Solidity => &mut self.solidity,
            Language::Sui => &mut self.sui,
        }
    }

    pub fn build(&self) -> Result<CreateTaskRequest, DraftError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(DraftError::MissingTitle);
        }
        Ok(CreateTaskRequest {
            id: self.id,
            title: title.to_string(),
            description: self.description.trim().to_string(),
            text: self.text.clone(),
            solidity: self.solidity.build(Language::Solidity)?,
            sui: self.sui.build(Language::Sui)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterDraft {
    pub id: Option<i64>,
    pub title: String,
    pub description: String,
}

impl ChapterDraft {
    pub fn build(&self) -> Result<CreateChapterRequest, DraftError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(DraftError::MissingTitle);
        }
        Ok(CreateChapterRequest {
            id: self.id,
            title: title.to_string(),
            description: self.description.trim().to_string(),
        })
    }
}

pub fn chapter_assignment(
    chapter_id: i64,
    task_id: i64,
    action: AssignmentAction,
) -> ChapterChangeRequest {
    ChapterChangeRequest::new(chapter_id, task_id, action)
}
