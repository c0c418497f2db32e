use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompileCode {
    pub tab_content: String,
    pub tab_name: String,
}

/// Body of `POST /compile/{language}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompileRequest {
    pub id: String,
    pub code: CompileCode,
}

impl CompileRequest {
    pub fn new(
        task_id: impl Into<String>,
        tab_content: impl Into<String>,
        tab_name: impl Into<String>,
    ) -> Self {
        Self {
            id: task_id.into(),
            code: CompileCode {
                tab_content: tab_content.into(),
                tab_name: tab_name.into(),
            },
        }
    }
}

/// The compile service answers with the bare word `yes` on success. A body
/// that decodes as the JSON string `"yes"` also counts; anything else,
/// including a padded bare `yes`, is a failure.
pub fn is_compile_success_body(body: &str) -> bool {
    body == "yes" || serde_json::from_str::<String>(body).is_ok_and(|decoded| decoded == "yes")
}
