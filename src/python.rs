//! Python 解释器路径查找

use crate::config::Config;
use std::path::PathBuf;

/// 未获得解释器路径时使用的默认路径
pub fn default_python_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".codejiang")
        .join("python")
        .join("bin")
        .join("python3")
        .to_string_lossy()
        .to_string()
}

/// 按优先级查找解释器: 配置 > 虚拟环境 > PATH 中的 python3 / python
pub fn discover(config: &Config) -> Option<String> {
    if let Some(path) = config.python_path.as_deref().filter(|p| !p.is_empty()) {
        return Some(path.to_string());
    }

    if let Ok(venv) = std::env::var("VIRTUAL_ENV") {
        let candidate = PathBuf::from(venv).join("bin").join("python");
        if candidate.exists() {
            return Some(candidate.to_string_lossy().to_string());
        }
    }

    for name in ["python3", "python"] {
        if let Ok(path) = which::which(name) {
            return Some(path.to_string_lossy().to_string());
        }
    }

    None
}
