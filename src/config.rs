// Copyright 2026 Storysearch Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

pub const DEFAULT_LOCALE: &str = "en";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub index_dir: PathBuf,
    /// Supported locales; the first one is the default locale.
    pub locales: Vec<String>,
    pub source: SourceConfig,
    pub search: SearchConfig,
    pub scheduler: SchedulerConfig,
    pub roles: RolesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("storysearch-index"),
            locales: vec![DEFAULT_LOCALE.to_string()],
            source: SourceConfig::default(),
            search: SearchConfig::default(),
            scheduler: SchedulerConfig::default(),
            roles: RolesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// `dir` or `storyblok`.
    pub kind: String,
    pub base_url: String,
    pub api_key_public: Option<String>,
    pub api_key_preview: Option<String>,
    pub include_drafts: bool,
    pub per_page: usize,
    pub cache_seconds: u64,
    pub timeout_seconds: u64,
    pub content_dir: PathBuf,
    pub pattern: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: "dir".to_string(),
            base_url: "https://api.storyblok.com/v1/cdn".to_string(),
            api_key_public: None,
            api_key_preview: None,
            include_drafts: false,
            per_page: 100,
            cache_seconds: 900,
            timeout_seconds: 30,
            content_dir: PathBuf::from("content"),
            pattern: "**/*.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub snippet_chars: usize,
    pub title_weight: f64,
    pub body_weight: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            snippet_chars: 300,
            title_weight: 2.0,
            body_weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_seconds: u64,
    pub interval_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 3,
            interval_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RolesConfig {
    /// Content field holding role tags (array or comma-separated string).
    pub field: Option<String>,
    /// Document id to role tags.
    pub slugs: HashMap<String, Vec<String>>,
}

impl Config {
    /// Reads `explicit` when given (it must exist), else the global config
    /// file when present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("config file not found: {}", path.display());
                }
                read_config(path)?
            }
            None => load_global_config()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Configured locales in order, without duplicates; never empty.
    pub fn locales(&self) -> Vec<String> {
        let mut locales: Vec<String> = Vec::new();
        for locale in &self.locales {
            let locale = locale.trim();
            if !locale.is_empty() && !locales.iter().any(|l| l == locale) {
                locales.push(locale.to_string());
            }
        }
        if locales.is_empty() {
            locales.push(DEFAULT_LOCALE.to_string());
        }
        locales
    }

    pub fn default_locale(&self) -> String {
        self.locales()
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string())
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.per_page == 0 {
            anyhow::bail!("source.per_page must be at least 1");
        }
        if self.search.snippet_chars < 40 {
            anyhow::bail!("search.snippet_chars must be at least 40");
        }
        if !(self.search.title_weight > 0.0) {
            anyhow::bail!("search.title_weight must be positive");
        }
        if !(self.search.body_weight > 0.0) {
            anyhow::bail!("search.body_weight must be positive");
        }
        if self.scheduler.tick_seconds == 0 {
            anyhow::bail!("scheduler.tick_seconds must be at least 1");
        }
        match self.source.kind.as_str() {
            "dir" => {}
            "storyblok" => {
                if is_blank(&self.source.api_key_public) {
                    anyhow::bail!("source.api_key_public is required for the storyblok source");
                }
                if self.source.include_drafts && is_blank(&self.source.api_key_preview) {
                    anyhow::bail!("source.api_key_preview is required when include_drafts is set");
                }
            }
            other => anyhow::bail!("source.kind must be \"dir\" or \"storyblok\", got {other:?}"),
        }
        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

/// A loaded config plus the directory relative paths resolve against.
#[derive(Debug, Clone)]
pub struct ConfigCtx {
    pub root: PathBuf,
    pub config: Config,
}

impl ConfigCtx {
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let root = std::env::current_dir().context("get current dir")?;
        Ok(Self {
            root,
            config: Config::load(explicit)?,
        })
    }

    pub fn index_dir(&self) -> PathBuf {
        self.resolve(&self.config.index_dir)
    }

    pub fn content_dir(&self) -> PathBuf {
        self.resolve(&self.config.source.content_dir)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn config_dir() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return Some(PathBuf::from(appdata));
        }
        if let Ok(profile) = std::env::var("USERPROFILE") {
            return Some(PathBuf::from(profile).join("AppData").join("Roaming"));
        }
        return None;
    }

    if cfg!(target_os = "macos") {
        let home = std::env::var("HOME").ok()?;
        return Some(
            PathBuf::from(home)
                .join("Library")
                .join("Application Support"),
        );
    }

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg));
    }
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".config"))
}

pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("storysearch").join("storysearch.toml"))
}

pub fn load_global_config() -> Result<Config> {
    let Some(path) = global_config_path() else {
        return Ok(Config::default());
    };
    if !path.exists() {
        return Ok(Config::default());
    }
    read_config(&path)
}

pub fn read_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let config: Config =
        toml::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use tempfile::tempdir;

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn config_path(config_root: &Path) -> PathBuf {
        let base = if cfg!(target_os = "macos") {
            config_root.join("Library").join("Application Support")
        } else {
            config_root.to_path_buf()
        };
        base.join("storysearch").join("storysearch.toml")
    }

    fn with_env<T>(config_root: &Path, f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().expect("env lock");
        let old_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        let old_home = std::env::var("HOME").ok();
        let old_appdata = std::env::var("APPDATA").ok();
        set_env_var("XDG_CONFIG_HOME", config_root);
        set_env_var("HOME", config_root);
        set_env_var("APPDATA", config_root);
        let result = f();
        match old_xdg {
            Some(val) => set_env_var("XDG_CONFIG_HOME", val),
            None => remove_env_var("XDG_CONFIG_HOME"),
        }
        match old_home {
            Some(val) => set_env_var("HOME", val),
            None => remove_env_var("HOME"),
        }
        match old_appdata {
            Some(val) => set_env_var("APPDATA", val),
            None => remove_env_var("APPDATA"),
        }
        result
    }

    fn set_env_var(key: &str, value: impl AsRef<std::ffi::OsStr>) {
        unsafe {
            std::env::set_var(key, value);
        }
    }

    fn remove_env_var(key: &str) {
        unsafe {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn partial_file_keeps_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("storysearch.toml");
        std::fs::write(
            &path,
            "locales = [\"en\", \"de\", \"en\"]\n\n[search]\nsnippet_chars = 120\n\n[roles.slugs]\n\"page-table\" = [\"some_role\"]\n",
        )?;
        let config = Config::load(Some(&path))?;
        assert_eq!(config.locales(), vec!["en".to_string(), "de".to_string()]);
        assert_eq!(config.search.snippet_chars, 120);
        assert_eq!(config.search.default_limit, 10);
        assert_eq!(config.source.kind, "dir");
        assert_eq!(config.scheduler.interval_seconds, 3600);
        assert_eq!(
            config.roles.slugs.get("page-table"),
            Some(&vec!["some_role".to_string()])
        );
        Ok(())
    }

    #[test]
    fn empty_locales_fall_back_to_english() {
        let config = Config {
            locales: Vec::new(),
            ..Config::default()
        };
        assert_eq!(config.locales(), vec![DEFAULT_LOCALE.to_string()]);
        assert_eq!(config.default_locale(), DEFAULT_LOCALE);
    }

    #[test]
    fn validation_names_the_offending_key() {
        let mut config = Config::default();
        config.source.kind = "storyblok".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("source.api_key_public"));

        let mut config = Config::default();
        config.search.snippet_chars = 10;
        assert!(config.validate().unwrap_err().to_string().contains("snippet_chars"));

        let mut config = Config::default();
        config.source.kind = "ftp".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let err = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn global_config_is_used_when_present() {
        let config_dir = tempdir().expect("config dir");
        let path = config_path(config_dir.path());
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "index_dir = \"/var/lib/storysearch\"\n").expect("write");
        with_env(config_dir.path(), || {
            let config = Config::load(None).expect("load");
            assert_eq!(config.index_dir, PathBuf::from("/var/lib/storysearch"));
        });
    }
}
