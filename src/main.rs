use anyhow::Result;
use clap::{Parser, Subcommand};
use pip_manager::package_manager::{PackageVersionInfo, SearchResultPage};
use pip_manager::{python, Config, Executor, PackageManager, PipError};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "pip-manager", version, about = "管理 Python 包：安装、升级、卸载与搜索")]
struct Cli {
    /// Python 解释器路径（默认自动查找）
    #[arg(long, global = true)]
    python: Option<String>,

    /// 配置文件（默认 ~/.config/pip-manager/config.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 以 JSON 输出结果
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 已安装的包（标注可更新版本）
    List,
    /// 可更新的包
    Outdated,
    /// 安装包，或用 -r 从 requirements 文件安装
    Install {
        packages: Vec<String>,
        #[arg(short = 'r', long)]
        requirement: Option<String>,
    },
    /// 升级包
    Upgrade { package: String },
    /// 卸载包
    Uninstall { packages: Vec<String> },
    /// 列出包的可用版本
    Versions { package: String },
    /// 搜索 PyPI
    Search {
        keyword: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// 显示当前镜像源与解释器
    Source,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    // 加载配置
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_default()?,
    };

    // pip 的实时输出打印到 stderr
    let (output_tx, mut output_rx) = mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(async move {
        while let Some(line) = output_rx.recv().await {
            eprintln!("{}", line);
        }
    });

    let manager = PackageManager::new(&config, Executor::new(output_tx));
    // 解释器优先级：命令行 > 配置 / 自动查找 > 默认路径
    if let Some(path) = cli.python.clone().or_else(|| python::discover(&config)) {
        manager.update_python_path(&path);
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let result = run(cli.command, cli.json, &manager, &cancel).await;

    drop(manager);
    let _ = printer.await;

    match result {
        Err(e) if e.is_cancelled() => {
            eprintln!("已取消");
            Ok(())
        }
        Err(PipError::NoResult) => {
            println!("没有找到结果");
            Ok(())
        }
        other => Ok(other?),
    }
}

async fn run(
    command: Commands,
    json: bool,
    manager: &PackageManager,
    cancel: &CancellationToken,
) -> pip_manager::Result<()> {
    match command {
        Commands::List => {
            let list = manager.get_package_list_with_update().await?;
            print_packages(&list, json);
        }
        Commands::Outdated => {
            let updates = manager.get_package_update().await?;
            if json {
                print_json(&updates);
            } else {
                for u in &updates {
                    println!("{:<32} {:<16} -> {}", u.name, u.version, u.latest_version);
                }
            }
        }
        Commands::Install {
            packages,
            requirement,
        } => {
            if let Some(path) = requirement {
                manager.add_package_from_file(&path, Some(cancel)).await?;
            }
            for pack in packages {
                manager.add_package(pack, Some(cancel)).await?;
            }
        }
        Commands::Upgrade { package } => {
            manager.update_package(package, Some(cancel)).await?;
        }
        Commands::Uninstall { packages } => {
            for pack in packages {
                manager.remove_package(pack).await?;
            }
        }
        Commands::Versions { package } => {
            let versions = manager.get_package_version_list(package, Some(cancel)).await?;
            if json {
                print_json(&versions);
            } else {
                for v in &versions {
                    println!("{}", v);
                }
            }
        }
        Commands::Search { keyword, page } => {
            let keyword = keyword.unwrap_or_default();
            let result = manager.search_from_index(&keyword, page, Some(cancel)).await?;
            print_search(&result, page, json);
        }
        Commands::Source => {
            let source = manager.source();
            println!("source: {}", if source.is_empty() { "(pip 默认)" } else { source.as_str() });
            println!("python: {}", manager.python_path());
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => log::error!("JSON 输出失败: {}", e),
    }
}

fn print_packages(list: &[PackageVersionInfo], json: bool) {
    if json {
        print_json(list);
        return;
    }
    for info in list {
        match &info.latest_version {
            Some(latest) => println!("{:<32} {:<16} -> {}", info.name, info.version, latest),
            None => println!("{:<32} {}", info.name, info.version),
        }
    }
}

fn print_search(result: &SearchResultPage, page: u32, json: bool) {
    if json {
        print_json(result);
        return;
    }
    for item in &result.list {
        println!("{:<32} {}", item.name, item.version);
        if !item.detail.is_empty() {
            println!("    {}", item.detail);
        }
    }
    println!("第 {}/{} 页", page.max(1), result.total_pages);
}
