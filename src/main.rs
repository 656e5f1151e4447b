// src/main.rs

use batchflow::{RunReport, cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(report) if report.is_success() => {}
        Ok(report) => {
            eprintln!("batchflow: {report:?}");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("batchflow error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<RunReport> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
