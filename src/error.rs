//! 包操作错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipError {
    /// 包名为空或无法解析
    #[error("Invalid Name")]
    InvalidName,

    /// requirements 文件路径为空
    #[error("Invalid Path")]
    InvalidPath,

    /// 子进程以非零退出码结束；message 为过滤 WARNING 后的 stderr
    #[error("{message}")]
    Process { message: String, code: Option<i32> },

    #[error("无法启动 {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// 预期格式良好的输出（JSON / HTML）解析失败
    #[error("{message}")]
    Parse { message: String },

    /// 搜索页面中没有结果列表
    #[error("no result")]
    NoResult,

    /// 调用方取消了操作
    #[error("操作已取消")]
    Cancelled,

    #[error("请求失败: {0}")]
    Http(#[from] reqwest::Error),
}

impl PipError {
    /// 进程退出码（仅 Process 错误有）
    pub fn code(&self) -> Option<i32> {
        match self {
            PipError::Process { code, .. } => *code,
            _ => None,
        }
    }

    /// 适配层用来区分的错误类别
    pub fn kind(&self) -> &'static str {
        match self {
            PipError::InvalidName | PipError::InvalidPath => "invalid argument",
            PipError::Process { .. } | PipError::Spawn { .. } => "process",
            PipError::Parse { .. } => "parse",
            PipError::NoResult => "no result",
            PipError::Cancelled => "cancelled",
            PipError::Http(_) => "http",
        }
    }

    /// 取消属于正常结果，适配层不应提示错误
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, PipError>;
