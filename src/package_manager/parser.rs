//! 输出解析函数

use super::types::{OutdatedPackage, PackageVersionInfo};
use crate::error::{PipError, Result};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::OnceLock;

/// 解析 `pip list --format json` 的输出
pub fn parse_pip_list_json<T: DeserializeOwned>(output: &str) -> Result<Vec<T>> {
    serde_json::from_str(output.trim()).map_err(|e| PipError::Parse {
        message: format!(
            "Get package failed, please run \"pip list --format json\" or \"pip3 list --format json\" check pip support json format: {}",
            e
        ),
    })
}

/// 按包名左连接，给已安装列表附上 latest_version
pub fn merge_with_update(
    packages: Vec<PackageVersionInfo>,
    updates: &[OutdatedPackage],
) -> Vec<PackageVersionInfo> {
    if updates.is_empty() {
        return packages;
    }

    let latest: HashMap<&str, &str> = updates
        .iter()
        .map(|u| (u.name.as_str(), u.latest_version.as_str()))
        .collect();

    packages
        .into_iter()
        .map(|mut info| {
            if let Some(version) = latest.get(info.name.as_str()).filter(|v| !v.is_empty()) {
                info.latest_version = Some(version.to_string());
            }
            info
        })
        .collect()
}

fn versions_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\(from versions: (.+)\)").unwrap())
}

/// 从 `pip install <name>==` 的报错中提取可用版本，最新的在前。
///
/// 依赖 pip 报错的原文 `(from versions: 1.0, 1.1, ...)`，pip 改变措辞后
/// 只会得到空列表。找不到该子句时返回空列表而不是错误。
pub fn parse_available_versions(message: &str) -> Vec<String> {
    let Some(caps) = versions_pattern().captures(message) else {
        return Vec::new();
    };

    let mut versions: Vec<String> = caps[1]
        .split(',')
        .map(|v| v.split_whitespace().collect::<String>())
        .filter(|v| !v.is_empty() && v != "none")
        .collect();
    versions.reverse();
    versions
}
