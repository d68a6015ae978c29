use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 配置项前缀，配置变更事件中的 key 形如 `pip-manager.source`
pub const CONFIG_SECTION: &str = "pip-manager";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// 内置镜像名：pypi / tsinghua / aliyun / douban
    pub source: String,
    /// 自定义镜像地址，非空时覆盖 source
    pub source_custom: String,
    pub python_path: Option<String>,
    pub search_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: "pypi".to_string(),
            source_custom: String::new(),
            python_path: None,
            search_url: "https://pypi.org/search/".to_string(),
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".config/pip-manager/config.toml")
    }

    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// 一次配置变更所影响的 key 集合
#[derive(Debug, Clone, Default)]
pub struct ConfigChange {
    keys: Vec<String>,
}

impl ConfigChange {
    pub fn new(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// 比较两份配置，得到变化的 key
    pub fn between(old: &Config, new: &Config) -> Self {
        let mut keys = Vec::new();
        if old.source != new.source {
            keys.push(format!("{}.source", CONFIG_SECTION));
        }
        if old.source_custom != new.source_custom {
            keys.push(format!("{}.sourceCustom", CONFIG_SECTION));
        }
        if old.python_path != new.python_path {
            keys.push(format!("{}.pythonPath", CONFIG_SECTION));
        }
        if old.search_url != new.search_url {
            keys.push(format!("{}.searchUrl", CONFIG_SECTION));
        }
        Self { keys }
    }

    pub fn affects_configuration(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
