use std::iter;

use blockwise_types::{CodeSection, Tab};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TabError {
    #[error("tab index {index} is out of range for a pane with {len} tabs")]
    OutOfRange { index: usize, len: usize },
}

/// What a Run sends: the editable tab's name and the live buffer, captured
/// at the moment Run is triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub tab_name: String,
    pub content: String,
}

/// Tab state for one language pane.
///
/// The visible sequence is `[current, ..references]`. Only index 0 accepts
/// edits; reference tabs always show the content they were loaded with.
/// Switching tabs reloads the buffer from stored content, so unsubmitted
/// edits on tab 0 are discarded when the user looks at another tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabModel {
    current: Tab,
    references: Vec<Tab>,
    selected: usize,
    buffer: String,
}

impl TabModel {
    pub fn new(current: Tab, references: Vec<Tab>) -> Self {
        let buffer = current.content.clone();
        Self {
            current,
            references,
            selected: 0,
            buffer,
        }
    }

    pub fn from_section(section: &CodeSection) -> Self {
        Self::new(section.current_tab.clone(), section.tabs.clone())
    }

    pub fn tab_count(&self) -> usize {
        self.references.len() + 1
    }

    pub fn tab(&self, index: usize) -> Option<&Tab> {
        match index {
            0 => Some(&self.current),
            n => self.references.get(n - 1),
        }
    }

    pub fn visible_tabs(&self) -> impl Iterator<Item = &Tab> {
        iter::once(&self.current).chain(self.references.iter())
    }

    pub fn current_tab(&self) -> &Tab {
        &self.current
    }

    pub fn reference_tabs(&self) -> &[Tab] {
        &self.references
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_tab(&self) -> &Tab {
        self.tab(self.selected).unwrap_or(&self.current)
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn is_editable(&self) -> bool {
        self.selected == 0
    }

    /// True when the editable buffer no longer matches the stored content.
    pub fn is_dirty(&self) -> bool {
        self.is_editable() && self.buffer != self.current.content
    }

    pub fn select_tab(&mut self, index: usize) -> Result<(), TabError> {
        let Some(tab) = self.tab(index) else {
            return Err(TabError::OutOfRange {
                index,
                len: self.tab_count(),
            });
        };
        self.buffer = tab.content.clone();
        self.selected = index;
        Ok(())
    }

    pub fn select_next(&mut self) {
        let next = (self.selected + 1) % self.tab_count();
        let _ = self.select_tab(next);
    }

    pub fn select_previous(&mut self) {
        let count = self.tab_count();
        let prev = (self.selected + count - 1) % count;
        let _ = self.select_tab(prev);
    }

    /// Replaces the buffer when the editable tab is selected. Returns whether
    /// the edit applied; edits to reference tabs are dropped silently.
    pub fn edit_content(&mut self, text: impl Into<String>) -> bool {
        if !self.is_editable() {
            return false;
        }
        self.buffer = text.into();
        true
    }

    /// Swaps in freshly loaded pane data.
    ///
    /// The new current tab's name is looked up in the new reference list; the
    /// first match's position becomes the selection (it indexes the visible
    /// sequence, which is one longer than the reference list). Without a match
    /// the editable tab is selected. The buffer always follows the selection.
    pub fn on_current_tab_replaced(&mut self, current: Tab, references: Vec<Tab>) {
        let selected = references
            .iter()
            .position(|tab| tab.name == current.name)
            .unwrap_or(0);
        self.current = current;
        self.references = references;
        self.selected = selected;
        self.buffer = self
            .tab(selected)
            .map(|tab| tab.content.clone())
            .unwrap_or_default();
    }

    pub fn submission(&self) -> Submission {
        Submission {
            tab_name: self.current.name.clone(),
            content: self.buffer.clone(),
        }
    }
}
