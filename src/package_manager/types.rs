//! PackageManager 相关数据类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 不允许卸载的基础包
pub const NECESSARY_PACKAGES: [&str; 3] = ["pip", "setuptools", "wheel"];

pub fn is_necessary_package(name: &str) -> bool {
    NECESSARY_PACKAGES.contains(&name)
}

/// 包名与可选版本；名称保证非空
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    name: String,
    version: Option<String>,
}

impl PackageInfo {
    pub fn new(name: impl Into<String>, version: Option<String>) -> Option<Self> {
        let name = name.into();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name,
            version: version.filter(|v| !v.is_empty()),
        })
    }

    pub fn by_name(name: impl Into<String>) -> Option<Self> {
        Self::new(name, None)
    }

    pub fn by_name_version(name: impl Into<String>, version: impl Into<String>) -> Option<Self> {
        Self::new(name, Some(version.into()))
    }

    /// 解析 `name` 或 `name==version`（按第一个 `==` 切分）
    pub fn parse(spec: &str) -> Option<Self> {
        match spec.split_once("==") {
            Some((name, version)) => Self::new(name, Some(version.to_string())),
            None => Self::new(spec, None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl fmt::Display for PackageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}=={}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}

/// 操作接受的包参数：原始字符串或结构化的名称 + 版本
#[derive(Debug, Clone)]
pub enum PackageArg {
    Text(String),
    Structured { name: String, version: Option<String> },
}

impl PackageArg {
    pub fn resolve(self) -> Option<PackageInfo> {
        match self {
            PackageArg::Text(spec) => PackageInfo::parse(&spec),
            PackageArg::Structured { name, version } => PackageInfo::new(name, version),
        }
    }
}

impl From<&str> for PackageArg {
    fn from(spec: &str) -> Self {
        PackageArg::Text(spec.to_string())
    }
}

impl From<String> for PackageArg {
    fn from(spec: String) -> Self {
        PackageArg::Text(spec)
    }
}

impl From<PackageInfo> for PackageArg {
    fn from(info: PackageInfo) -> Self {
        PackageArg::Structured {
            name: info.name,
            version: info.version,
        }
    }
}

/// 已安装包（`pip list --format json` 的一行），合并后可能带最新版本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageVersionInfo {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
}

/// 可更新包（`pip list --outdated --format json` 的一行）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutdatedPackage {
    pub name: String,
    /// 合并时只按名称匹配，行里缺少 version 也接受
    #[serde(default)]
    pub version: String,
    pub latest_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_filetype: Option<String>,
}

/// 搜索结果条目
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResultItem {
    pub name: String,
    pub version: String,
    pub description: String,
    pub detail: String,
    pub released: Option<DateTime<Utc>>,
}

/// 一页搜索结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultPage {
    pub list: Vec<SearchResultItem>,
    pub total_pages: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_with_version() {
        let info = PackageInfo::parse("requests==2.31.0").unwrap();
        assert_eq!(info.name(), "requests");
        assert_eq!(info.version(), Some("2.31.0"));
        assert_eq!(info.to_string(), "requests==2.31.0");
    }

    #[test]
    fn test_round_trip_name_only() {
        let info = PackageInfo::parse("numpy").unwrap();
        assert_eq!(info.version(), None);
        assert_eq!(info.to_string(), "numpy");
    }

    #[test]
    fn test_trailing_separator_drops_version() {
        let info = PackageInfo::parse("numpy==").unwrap();
        assert_eq!(info.to_string(), "numpy");
    }

    #[test]
    fn test_splits_on_first_separator() {
        let info = PackageInfo::parse("a==1==2").unwrap();
        assert_eq!(info.name(), "a");
        assert_eq!(info.version(), Some("1==2"));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(PackageInfo::parse("").is_none());
        assert!(PackageInfo::parse("==1.0").is_none());
        assert!(PackageInfo::new("", Some("1.0".to_string())).is_none());
        let arg = PackageArg::Structured {
            name: String::new(),
            version: None,
        };
        assert!(arg.resolve().is_none());
    }

    #[test]
    fn test_arg_from_info() {
        let info = PackageInfo::by_name_version("flask", "3.0.0").unwrap();
        let resolved = PackageArg::from(info.clone()).resolve().unwrap();
        assert_eq!(resolved, info);
    }

    #[test]
    fn test_necessary_packages() {
        assert!(is_necessary_package("pip"));
        assert!(is_necessary_package("setuptools"));
        assert!(is_necessary_package("wheel"));
        assert!(!is_necessary_package("requests"));
    }
}
