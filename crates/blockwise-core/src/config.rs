use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::fs;
use tokio::sync::RwLock;

use crate::DEFAULT_API_URL;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub api_url: String,
    pub compile_url: Option<String>,
    pub request_timeout_secs: u64,
    pub session_max_age_secs: u64,
    pub log_retention_days: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            compile_url: None,
            request_timeout_secs: 30,
            session_max_age_secs: 60 * 60,
            log_retention_days: blockwise_observability::DEFAULT_LOG_RETENTION_DAYS,
        }
    }
}

impl AppConfig {
    pub fn api_base(&self) -> String {
        normalize_base_url(&self.api_url)
    }

    /// The compile service shares the API host unless configured apart.
    pub fn compile_base(&self) -> String {
        self.compile_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(normalize_base_url)
            .unwrap_or_else(|| self.api_base())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn session_max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_max_age_secs.max(1) as i64)
    }
}

pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[derive(Debug, Clone, Default)]
struct ConfigLayers {
    global: Value,
    project: Value,
    env: Value,
    runtime: Value,
    cli: Value,
}

/// Layered JSON configuration: global file, project file, environment,
/// runtime patches and command-line overrides, merged in that order.
#[derive(Clone)]
pub struct ConfigStore {
    project_path: PathBuf,
    global_path: PathBuf,
    layers: Arc<RwLock<ConfigLayers>>,
}

impl ConfigStore {
    pub async fn new(project_path: impl AsRef<Path>, cli_overrides: Option<Value>) -> anyhow::Result<Self> {
        let global_path = resolve_global_config_path().await?;
        Self::with_layers(global_path, project_path, env_layer(), cli_overrides).await
    }

    pub async fn with_layers(
        global_path: impl AsRef<Path>,
        project_path: impl AsRef<Path>,
        env: Value,
        cli_overrides: Option<Value>,
    ) -> anyhow::Result<Self> {
        let global_path = global_path.as_ref().to_path_buf();
        let project_path = project_path.as_ref().to_path_buf();

        let global = read_json_file(&global_path)
            .await
            .unwrap_or_else(|_| empty_object());
        let project = read_json_file(&project_path)
            .await
            .unwrap_or_else(|_| empty_object());

        let layers = ConfigLayers {
            global,
            project,
            env,
            runtime: empty_object(),
            cli: cli_overrides.unwrap_or_else(empty_object),
        };

        Ok(Self {
            project_path,
            global_path,
            layers: Arc::new(RwLock::new(layers)),
        })
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn global_path(&self) -> &Path {
        &self.global_path
    }

    pub async fn get(&self) -> AppConfig {
        let merged = self.get_effective_value().await;
        match serde_json::from_value(merged) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("invalid configuration, using defaults: {err}");
                AppConfig::default()
            }
        }
    }

    pub async fn get_effective_value(&self) -> Value {
        let layers = self.layers.read().await.clone();
        let mut merged = serde_json::to_value(AppConfig::default()).unwrap_or_else(|_| empty_object());
        deep_merge(&mut merged, &layers.global);
        deep_merge(&mut merged, &layers.project);
        deep_merge(&mut merged, &layers.env);
        deep_merge(&mut merged, &layers.runtime);
        deep_merge(&mut merged, &layers.cli);
        merged
    }

    pub async fn get_layers_value(&self) -> Value {
        let layers = self.layers.read().await;
        json!({
            "global": layers.global,
            "project": layers.project,
            "env": layers.env,
            "runtime": layers.runtime,
            "cli": layers.cli
        })
    }

    /// Merges `patch` into the project file and persists it.
    pub async fn patch_project(&self, patch: Value) -> anyhow::Result<Value> {
        let updated = {
            let mut layers = self.layers.write().await;
            deep_merge(&mut layers.project, &patch);
            layers.project.clone()
        };
        write_json_file(&self.project_path, &updated).await?;
        Ok(updated)
    }

    /// In-memory override for the lifetime of this process.
    pub async fn patch_runtime(&self, patch: Value) -> Value {
        let mut layers = self.layers.write().await;
        deep_merge(&mut layers.runtime, &patch);
        layers.runtime.clone()
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

async fn read_json_file(path: &Path) -> anyhow::Result<Value> {
    if !path.exists() {
        return Ok(empty_object());
    }
    let raw = fs::read_to_string(path).await?;
    Ok(serde_json::from_str::<Value>(&raw).unwrap_or_else(|_| empty_object()))
}

async fn write_json_file(path: &Path, value: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let raw = serde_json::to_string_pretty(value)?;
    fs::write(path, raw).await?;
    Ok(())
}

async fn resolve_global_config_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("BLOCKWISE_GLOBAL_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    if let Some(config_dir) = dirs::config_dir() {
        return Ok(config_dir.join("blockwise").join("config.json"));
    }
    Ok(PathBuf::from(".blockwise/global_config.json"))
}

fn env_layer() -> Value {
    env_layer_from(|key| std::env::var(key).ok())
}

fn env_layer_from(lookup: impl Fn(&str) -> Option<String>) -> Value {
    let mut root = empty_object();

    if let Some(url) = lookup("BLOCKWISE_API_URL").filter(|v| !v.trim().is_empty()) {
        deep_merge(&mut root, &json!({ "api_url": url.trim() }));
    }
    if let Some(url) = lookup("BLOCKWISE_COMPILE_URL").filter(|v| !v.trim().is_empty()) {
        deep_merge(&mut root, &json!({ "compile_url": url.trim() }));
    }
    if let Some(secs) = lookup("BLOCKWISE_REQUEST_TIMEOUT_SECS") {
        match secs.trim().parse::<u64>() {
            Ok(secs) => deep_merge(&mut root, &json!({ "request_timeout_secs": secs })),
            Err(_) => tracing::warn!("ignoring BLOCKWISE_REQUEST_TIMEOUT_SECS={secs:?}"),
        }
    }

    root
}

/// Parses a `config set` value: JSON when it parses, plain text otherwise.
pub fn parse_config_value(raw: &str) -> Value {
    serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn deep_merge(base: &mut Value, overlay: &Value) {
    if overlay.is_null() {
        return;
    }
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if value.is_null() {
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn compile_base_falls_back_to_api_base() {
        let mut config = AppConfig {
            api_url: "http://api.example/ ".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.api_base(), "http://api.example");
        assert_eq!(config.compile_base(), "http://api.example");

        config.compile_url = Some("http://compile.example:8084/".to_string());
        assert_eq!(config.compile_base(), "http://compile.example:8084");

        config.compile_url = Some("  ".to_string());
        assert_eq!(config.compile_base(), "http://api.example");
    }

    #[test]
    fn env_layer_reads_known_keys_and_skips_bad_numbers() {
        let vars = HashMap::from([
            ("BLOCKWISE_API_URL", "http://env.example"),
            ("BLOCKWISE_REQUEST_TIMEOUT_SECS", "soon"),
        ]);
        let layer = env_layer_from(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(layer, json!({ "api_url": "http://env.example" }));
    }

    #[test]
    fn config_values_parse_as_json_or_text() {
        assert_eq!(parse_config_value("45"), json!(45));
        assert_eq!(parse_config_value("http://x"), json!("http://x"));
    }

    #[tokio::test]
    async fn layers_merge_in_precedence_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let global = dir.path().join("global.json");
        let project = dir.path().join("project.json");
        fs::write(
            &global,
            r#"{"api_url":"http://global","request_timeout_secs":5,"log_retention_days":3}"#,
        )
        .await
        .expect("write global");
        fs::write(&project, r#"{"api_url":"http://project"}"#)
            .await
            .expect("write project");

        let store = ConfigStore::with_layers(
            &global,
            &project,
            json!({ "request_timeout_secs": 9 }),
            Some(json!({ "compile_url": "http://cli" })),
        )
        .await
        .expect("store");

        let config = store.get().await;
        assert_eq!(config.api_url, "http://project");
        assert_eq!(config.request_timeout_secs, 9);
        assert_eq!(config.log_retention_days, 3);
        assert_eq!(config.compile_base(), "http://cli");
        assert_eq!(config.session_max_age_secs, 3600);
    }

    #[tokio::test]
    async fn patch_project_persists_and_applies() {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = dir.path().join("nested").join("config.json");
        let store = ConfigStore::with_layers(
            dir.path().join("missing-global.json"),
            &project,
            empty_object(),
            None,
        )
        .await
        .expect("store");

        store
            .patch_project(json!({ "api_url": "http://patched" }))
            .await
            .expect("patch");
        assert_eq!(store.get().await.api_url, "http://patched");

        let persisted: Value =
            serde_json::from_str(&fs::read_to_string(&project).await.expect("read"))
                .expect("parse");
        assert_eq!(persisted["api_url"], "http://patched");

        store.patch_runtime(json!({ "api_url": "http://runtime" })).await;
        assert_eq!(store.get().await.api_url, "http://runtime");
    }

    #[tokio::test]
    async fn invalid_layer_types_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ConfigStore::with_layers(
            dir.path().join("g.json"),
            dir.path().join("p.json"),
            json!({ "request_timeout_secs": "thirty" }),
            None,
        )
        .await
        .expect("store");
        assert_eq!(store.get().await, AppConfig::default());
    }
}
