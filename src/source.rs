//! 镜像源：内置镜像枚举与当前生效源的解析

use crate::config::{Config, ConfigChange, CONFIG_SECTION};
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Pypi,
    Tsinghua,
    Aliyun,
    Douban,
}

impl Source {
    pub const ALL: [Source; 4] = [Source::Pypi, Source::Tsinghua, Source::Aliyun, Source::Douban];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pypi" => Some(Source::Pypi),
            "tsinghua" => Some(Source::Tsinghua),
            "aliyun" => Some(Source::Aliyun),
            "douban" => Some(Source::Douban),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Source::Pypi => "pypi",
            Source::Tsinghua => "tsinghua",
            Source::Aliyun => "aliyun",
            Source::Douban => "douban",
        }
    }

    pub fn url(&self) -> &'static str {
        match self {
            Source::Pypi => "https://pypi.python.org/simple",
            Source::Tsinghua => "https://pypi.tuna.tsinghua.edu.cn/simple",
            Source::Aliyun => "http://mirrors.aliyun.com/pypi/simple",
            Source::Douban => "http://pypi.douban.com/simple",
        }
    }
}

/// 自定义地址优先；否则按名称映射内置镜像；未知名称得到空串（不传 `-i`）
pub fn resolve_source(source: &str, source_custom: &str) -> String {
    if !source_custom.is_empty() {
        return source_custom.to_string();
    }
    Source::from_name(source)
        .map(|s| s.url().to_string())
        .unwrap_or_default()
}

/// 当前生效的镜像源，由配置变更监听方调用 `refresh` 更新
#[derive(Debug, Default)]
pub struct SourceSetting {
    active: RwLock<String>,
}

impl SourceSetting {
    pub fn from_config(config: &Config) -> Self {
        let setting = Self::default();
        setting.refresh(config);
        setting
    }

    pub fn refresh(&self, config: &Config) {
        let resolved = resolve_source(&config.source, &config.source_custom);
        log::info!("镜像源: {}", if resolved.is_empty() { "(默认)" } else { resolved.as_str() });
        if let Ok(mut active) = self.active.write() {
            *active = resolved;
        }
    }

    /// 只关心 source / sourceCustom 两个 key，返回是否刷新了
    pub fn on_config_change(&self, change: &ConfigChange, config: &Config) -> bool {
        let affected = ["source", "sourceCustom"]
            .iter()
            .any(|key| change.affects_configuration(&format!("{}.{}", CONFIG_SECTION, key)));
        if affected {
            self.refresh(config);
        }
        affected
    }

    pub fn get(&self) -> String {
        self.active.read().map(|s| s.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_source_wins() {
        assert_eq!(resolve_source("aliyun", "http://x"), "http://x");
    }

    #[test]
    fn test_named_source() {
        assert_eq!(
            resolve_source("aliyun", ""),
            "http://mirrors.aliyun.com/pypi/simple"
        );
        for source in Source::ALL {
            assert_eq!(Source::from_name(source.name()), Some(source));
        }
    }

    #[test]
    fn test_unknown_source_is_empty() {
        assert_eq!(resolve_source("nowhere", ""), "");
        assert_eq!(resolve_source("", ""), "");
    }

    #[test]
    fn test_refresh_only_on_relevant_change() {
        let mut config = Config {
            source: "tsinghua".to_string(),
            ..Config::default()
        };
        let setting = SourceSetting::from_config(&config);
        assert_eq!(setting.get(), "https://pypi.tuna.tsinghua.edu.cn/simple");

        config.source = "douban".to_string();
        let unrelated = ConfigChange::new(["pip-manager.pythonPath"]);
        assert!(!setting.on_config_change(&unrelated, &config));
        assert_eq!(setting.get(), "https://pypi.tuna.tsinghua.edu.cn/simple");

        let relevant = ConfigChange::new(["pip-manager.source"]);
        assert!(setting.on_config_change(&relevant, &config));
        assert_eq!(setting.get(), "http://pypi.douban.com/simple");
    }
}
