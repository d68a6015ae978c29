//! 外部命令执行：流式转发输出、支持取消

use crate::error::{PipError, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 实时输出通道，每条消息为一行
pub type OutputSink = mpsc::UnboundedSender<String>;

/// 取消时 SIGTERM 之后等待进程退出的时间，超时则 SIGKILL
const KILL_GRACE: Duration = Duration::from_secs(2);

/// 取消后等待读取任务收尾的上限（孙进程可能仍持有管道）
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default)]
pub struct Executor {
    output: Option<OutputSink>,
}

impl Executor {
    pub fn new(output: OutputSink) -> Self {
        Self {
            output: Some(output),
        }
    }

    /// 不转发输出，只写日志
    pub fn silent() -> Self {
        Self::default()
    }

    fn emit(&self, line: &str) {
        log::debug!("{}", line);
        if let Some(tx) = &self.output {
            let _ = tx.send(line.to_string());
        }
    }

    /// 执行命令并返回完整 stdout。
    ///
    /// 参数以独立向量传递，不经过 shell。stdout / stderr 逐行转发到输出通道；
    /// 以 `WARNING` 开头的 stderr 行只转发，不计入错误信息。
    /// 退出码非零时返回 [`PipError::Process`]，携带 stderr 与退出码。
    /// `cancel` 触发后终止整个进程组，等待其退出后返回 [`PipError::Cancelled`]。
    pub async fn execute(
        &self,
        command: &str,
        args: &[String],
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        if cancel.is_some_and(|token| token.is_cancelled()) {
            return Err(PipError::Cancelled);
        }

        self.emit(&format!("exec {} {}", command, args.join(" ")));

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // 独立进程组，取消时连同 pip 派生的构建进程一起终止
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| PipError::Spawn {
            command: command.to_string(),
            source,
        })?;

        let stdout_handle = tokio::spawn(read_stream_lines(
            child.stdout.take(),
            self.output.clone(),
            false,
        ));
        let stderr_handle = tokio::spawn(read_stream_lines(
            child.stderr.take(),
            self.output.clone(),
            true,
        ));

        let waited = match cancel {
            Some(token) => tokio::select! {
                status = child.wait() => Some(status),
                _ = token.cancelled() => None,
            },
            None => Some(child.wait().await),
        };

        let status = match waited {
            Some(status) => status.map_err(|source| PipError::Spawn {
                command: command.to_string(),
                source,
            })?,
            None => {
                self.emit("cancel command");
                terminate(&mut child).await;
                drain(stdout_handle).await;
                drain(stderr_handle).await;
                self.emit("");
                return Err(PipError::Cancelled);
            }
        };

        let all_stdout = stdout_handle.await.unwrap_or_default();
        let all_stderr = stderr_handle.await.unwrap_or_default();
        self.emit("");

        if status.success() {
            Ok(all_stdout)
        } else {
            Err(PipError::Process {
                message: all_stderr,
                code: status.code(),
            })
        }
    }
}

/// 终止子进程：unix 下先对进程组发 SIGTERM，超时后 SIGKILL
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        let pgid = -(pid as i32);
        unsafe {
            libc::kill(pgid, libc::SIGTERM);
        }
        let exited = tokio::time::timeout(KILL_GRACE, child.wait()).await.is_ok();
        // 组长已退出时组内可能还有残留进程
        unsafe {
            libc::kill(pgid, libc::SIGKILL);
        }
        if exited {
            return;
        }
    }
    let _ = child.kill().await;
}

/// 等待读取任务收尾；超时则中止任务，释放它持有的输出通道
async fn drain(mut handle: JoinHandle<String>) {
    if tokio::time::timeout(DRAIN_TIMEOUT, &mut handle).await.is_err() {
        log::warn!("取消后读取输出超时");
        handle.abort();
    }
}

/// 从流中逐行读取并转发，返回累积的文本（stderr 跳过 WARNING 行）
async fn read_stream_lines<R>(stream: Option<R>, tx: Option<OutputSink>, is_stderr: bool) -> String
where
    R: AsyncRead + Unpin,
{
    let mut result = String::new();
    let Some(stream) = stream else {
        return result;
    };

    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);

        log::debug!("{}", line);
        if let Some(tx) = &tx {
            let _ = tx.send(line.to_string());
        }

        if is_stderr && line.starts_with("WARNING") {
            continue;
        }
        result.push_str(line);
        result.push('\n');
    }
    result
}
