//! 包管理器模块 — 对 `python -m pip` 的封装

pub mod parser;
pub mod search;
pub mod types;

// 重新导出常用类型和函数
pub use parser::{merge_with_update, parse_available_versions};
pub use search::{IndexSearch, PypiIndex};
pub use types::{
    is_necessary_package, OutdatedPackage, PackageArg, PackageInfo, PackageVersionInfo,
    SearchResultItem, SearchResultPage, NECESSARY_PACKAGES,
};

use crate::config::{Config, ConfigChange};
use crate::error::{PipError, Result};
use crate::executor::Executor;
use crate::python::default_python_path;
use crate::source::SourceSetting;
use parser::parse_pip_list_json;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;

/// 在参数末尾追加 `-i <source>`（source 为空时不追加）
pub fn pip_args_with_source(args: &[&str], source: &str) -> Vec<String> {
    let mut out: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    if !source.is_empty() {
        out.push("-i".to_string());
        out.push(source.to_string());
    }
    out
}

pub struct PackageManager {
    executor: Executor,
    index: Arc<dyn IndexSearch>,
    python_path: RwLock<Option<String>>,
    source: SourceSetting,
}

impl PackageManager {
    pub fn new(config: &Config, executor: Executor) -> Self {
        Self::with_index(config, executor, Arc::new(PypiIndex::new(&config.search_url)))
    }

    pub fn with_index(config: &Config, executor: Executor, index: Arc<dyn IndexSearch>) -> Self {
        Self {
            executor,
            index,
            python_path: RwLock::new(config.python_path.clone().filter(|p| !p.is_empty())),
            source: SourceSetting::from_config(config),
        }
    }

    // ===== 状态 =====

    /// 解释器路径变化时由外部回调；空串恢复为默认路径
    pub fn update_python_path(&self, path: &str) {
        if let Ok(mut current) = self.python_path.write() {
            *current = Some(path.to_string()).filter(|p| !p.is_empty());
        }
    }

    pub fn python_path(&self) -> String {
        self.python_path
            .read()
            .ok()
            .and_then(|p| p.clone())
            .unwrap_or_else(default_python_path)
    }

    pub fn source(&self) -> String {
        self.source.get()
    }

    /// 重新从配置读取镜像源
    pub fn update_source(&self, config: &Config) {
        self.source.refresh(config);
    }

    /// 配置变更监听入口，只在 source / sourceCustom 变化时刷新
    pub fn on_config_update(&self, change: &ConfigChange, config: &Config) {
        self.source.on_config_change(change, config);
    }

    // ===== 命令 =====

    async fn pip(&self, args: Vec<String>, cancel: Option<&CancellationToken>) -> Result<String> {
        let python = self.python_path();
        let mut full_args = vec!["-m".to_string(), "pip".to_string()];
        full_args.extend(args);
        self.executor.execute(&python, &full_args, cancel).await
    }

    async fn pip_with_source(
        &self,
        args: &[&str],
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        let args = pip_args_with_source(args, &self.source());
        self.pip(args, cancel).await
    }

    async fn install_package(
        &self,
        args: &[&str],
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let mut full_args = vec!["install", "-U"];
        full_args.extend_from_slice(args);
        self.pip_with_source(&full_args, cancel).await?;
        Ok(())
    }

    // ===== 查询 =====

    /// 已安装包列表 (`pip list --format json`)
    pub async fn get_package_list(&self) -> Result<Vec<PackageVersionInfo>> {
        let output = self
            .pip(vec!["list".into(), "--format".into(), "json".into()], None)
            .await?;
        parse_pip_list_json(&output)
    }

    /// 可更新包列表 (`pip list --outdated --format json`)
    pub async fn get_package_update(&self) -> Result<Vec<OutdatedPackage>> {
        let output = self
            .pip_with_source(&["list", "--outdated", "--format", "json"], None)
            .await?;
        parse_pip_list_json(&output)
    }

    pub fn merge_with_update(
        &self,
        packages: Vec<PackageVersionInfo>,
        updates: &[OutdatedPackage],
    ) -> Vec<PackageVersionInfo> {
        merge_with_update(packages, updates)
    }

    /// 已安装包列表并标注最新版本；获取更新失败时返回普通列表
    pub async fn get_package_list_with_update(&self) -> Result<Vec<PackageVersionInfo>> {
        let packages = self.get_package_list().await?;
        match self.get_package_update().await {
            Ok(updates) => Ok(merge_with_update(packages, &updates)),
            Err(e) => {
                log::warn!("获取可更新包失败: {}", e);
                Ok(packages)
            }
        }
    }

    // ===== 安装 / 卸载 =====

    pub async fn add_package(
        &self,
        pack: impl Into<PackageArg>,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let info = pack.into().resolve().ok_or(PipError::InvalidName)?;
        let spec = info.to_string();
        self.install_package(&[spec.as_str()], cancel).await
    }

    pub async fn update_package(
        &self,
        pack: impl Into<PackageArg>,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let info = pack.into().resolve().ok_or(PipError::InvalidName)?;
        let spec = info.to_string();
        self.install_package(&["--upgrade", spec.as_str()], cancel).await
    }

    /// 从 requirements 文件安装
    pub async fn add_package_from_file(
        &self,
        path: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        if path.is_empty() {
            return Err(PipError::InvalidPath);
        }
        self.install_package(&["-r", path], cancel).await
    }

    /// 卸载；pip / setuptools / wheel 直接忽略
    pub async fn remove_package(&self, pack: impl Into<PackageArg>) -> Result<()> {
        let info = pack.into().resolve().ok_or(PipError::InvalidName)?;
        if is_necessary_package(info.name()) {
            log::info!("跳过卸载基础包 {}", info.name());
            return Ok(());
        }

        self.pip(
            vec!["uninstall".into(), info.name().to_string(), "-y".into()],
            None,
        )
        .await?;
        Ok(())
    }

    /// 可用版本列表，最新的在前。
    ///
    /// 通过安装一个不存在的版本 (`<name>==`) 让 pip 在报错中列出全部版本，
    /// 结果依赖 pip 报错的原文措辞，属于尽力而为。命令意外成功或报错中没有
    /// 版本列表时返回空列表；取消仍以错误返回。
    pub async fn get_package_version_list(
        &self,
        pack: impl Into<PackageArg>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<String>> {
        let info = pack.into().resolve().ok_or(PipError::InvalidName)?;
        let probe = format!("{}==", info.name());

        match self.pip_with_source(&["install", probe.as_str()], cancel).await {
            Ok(_) => Ok(Vec::new()),
            Err(PipError::Process { message, .. }) => Ok(parse_available_versions(&message)),
            Err(e) => Err(e),
        }
    }

    // ===== 搜索 =====

    /// 搜索 PyPI，`page` 从 1 开始。取消时立即中止请求并返回 [`PipError::Cancelled`]。
    pub async fn search_from_index(
        &self,
        keyword: &str,
        page: u32,
        cancel: Option<&CancellationToken>,
    ) -> Result<SearchResultPage> {
        let page = page.max(1);
        let search = self.index.search_remote_index(keyword, page);

        match cancel {
            Some(token) => tokio::select! {
                result = search => result,
                _ = token.cancelled() => Err(PipError::Cancelled),
            },
            None => search.await,
        }
    }
}
