use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chapter {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateChapterRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentAction {
    Add,
    Remove,
}

impl AssignmentAction {
    /// Numeric code the backend expects in the `type` field.
    pub fn code(self) -> u8 {
        match self {
            AssignmentAction::Add => 0,
            AssignmentAction::Remove => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChapterChangeRequest {
    pub chapter_id: i64,
    pub task_id: i64,
    #[serde(rename = "type")]
    pub kind: u8,
}

impl ChapterChangeRequest {
    pub fn new(chapter_id: i64, task_id: i64, action: AssignmentAction) -> Self {
        Self {
            chapter_id,
            task_id,
            kind: action.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_request_uses_backend_field_names() {
        let value = serde_json::to_value(ChapterChangeRequest::new(3, 9, AssignmentAction::Remove))
            .expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({"chapterId": 3, "taskId": 9, "type": 1})
        );
    }
}
