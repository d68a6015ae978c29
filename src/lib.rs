//! pip 包管理前端：执行 `python -m pip`、解析其输出、搜索 PyPI

pub mod config;
pub mod error;
pub mod executor;
pub mod package_manager;
pub mod python;
pub mod source;

pub use config::{Config, ConfigChange};
pub use error::{PipError, Result};
pub use executor::{Executor, OutputSink};
pub use package_manager::PackageManager;
pub use source::{resolve_source, Source, SourceSetting};
