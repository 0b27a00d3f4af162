mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, RunArgs};
use restbundle::http::CancelToken;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志系统
    restbundle::logger::init_logger(if cli.verbose { "debug" } else { "info" });

    match cli.command {
        Commands::Run {
            bundle,
            env,
            var_files,
            vars,
            request,
            config,
        } => {
            let cancel = CancelToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling run");
                    on_interrupt.cancel();
                }
            });

            let args = RunArgs {
                bundle,
                env,
                var_files,
                vars,
                request,
                config,
                verbose: cli.verbose,
            };
            if !cli::run(args, cancel).await? {
                std::process::exit(1);
            }
        }
        Commands::Envs { bundle, var_files } => cli::list_envs(&bundle, &var_files)?,
    }
    Ok(())
}
