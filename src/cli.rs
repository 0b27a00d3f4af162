use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use restbundle::config::{AppConfig, ConfigLoader};
use restbundle::http::{CancelToken, Client};
use restbundle::parser::{Bundle, parse_file};
use restbundle::runner::{RunEnvironment, RunReport, TestExecutor, TestReporter};
use restbundle::variable::{EnvironmentSet, VariableFileLoader};

pub type Result<T> = std::result::Result<T, anyhow::Error>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 执行 bundle 中的一个或全部请求
    Run {
        /// bundle 文件路径
        bundle: PathBuf,

        /// 环境名称
        #[arg(short, long)]
        env: Option<String>,

        /// 外部变量文件，可多次指定
        #[arg(long = "var-file", value_name = "PATH")]
        var_files: Vec<PathBuf>,

        /// 变量覆盖 key=value，可多次指定
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        /// 只执行指定名称的请求
        #[arg(short, long)]
        request: Option<String>,

        /// 配置文件路径
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 列出可用环境
    Envs {
        bundle: PathBuf,

        #[arg(long = "var-file", value_name = "PATH")]
        var_files: Vec<PathBuf>,
    },
}

fn parse_var(s: &str) -> std::result::Result<(String, String), String> {
    VariableFileLoader::parse_cli_var(s)
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}

fn load_bundle(path: &Path) -> Result<Bundle> {
    parse_file(path).with_context(|| format!("Failed to load bundle {}", path.display()))
}

/// 配置文件中的变量文件在前，命令行指定的在后
fn load_var_files(config: &AppConfig, extra: &[PathBuf]) -> Result<Vec<EnvironmentSet>> {
    let paths: Vec<&PathBuf> = config.run.var_files.iter().chain(extra).collect();
    Ok(VariableFileLoader::load_all(&paths)?)
}

pub struct RunArgs {
    pub bundle: PathBuf,
    pub env: Option<String>,
    pub var_files: Vec<PathBuf>,
    pub vars: Vec<(String, String)>,
    pub request: Option<String>,
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

/// 执行 run 子命令，返回是否全部成功
pub async fn run(args: RunArgs, cancel: CancelToken) -> Result<bool> {
    let config = ConfigLoader::load(args.config.as_deref())?;
    let bundle = load_bundle(&args.bundle)?;

    let environment = RunEnvironment {
        env_name: args.env.or_else(|| config.run.env.clone()),
        external: load_var_files(&config, &args.var_files)?,
        overrides: args.vars,
    };
    if let Some(env) = &environment.env_name {
        let known = bundle.variables.get_environment(env).is_some()
            || environment
                .external
                .iter()
                .any(|set| set.get_environment(env).is_some());
        if !known {
            tracing::warn!("Environment '{}' is not defined in any variable source", env);
        }
    }

    let client = Client::new(config.http.client_config());
    let executor = TestExecutor::new(bundle, client, environment)
        .with_progress_interval(config.run.progress_interval());
    let reporter = TestReporter::new(args.verbose);

    let report: RunReport = match &args.request {
        Some(name) => executor.execute_request(name, &cancel).await?,
        None => {
            reporter.print_header(
                &args.bundle.display().to_string(),
                executor.bundle().requests.len(),
            );
            executor.execute_all(&cancel).await
        }
    };

    for result in &report.results {
        reporter.print_result(result);
    }

    let summary = report.summary();
    reporter.print_summary(&summary);
    Ok(summary.is_success())
}

/// 执行 envs 子命令
pub fn list_envs(bundle: &Path, var_files: &[PathBuf]) -> Result<()> {
    let bundle = load_bundle(bundle)?;
    let mut all = EnvironmentSet::new();
    for set in VariableFileLoader::load_all(var_files)? {
        all.merge(&set);
    }
    all.merge(&bundle.variables);

    if all.is_empty() {
        println!("No environments defined");
        return Ok(());
    }
    for name in all.names() {
        println!("{}", name);
    }
    Ok(())
}
