use log::error;
use rdt::{segments_from_bytes, Sender};
use rdt_cli::SenderConfig;
use rdt_log::RdtLogger;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    RdtLogger::init(log_level()).expect("logger already initialized");

    let config = match SenderConfig::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = config.validate() {
        error!("invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    let bytes = match std::fs::read(&config.file_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("failed to read {}: {e}", config.file_path.display());
            return ExitCode::FAILURE;
        }
    };
    let segments = segments_from_bytes(&bytes);

    let sender = match Sender::connect(
        config.peer,
        segments,
        config.loss_rate,
        config.max_window,
        config.delay_ms,
    )
    .await
    {
        Ok(sender) => sender,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = sender.run().await {
        error!("transfer aborted: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn log_level() -> log::Level {
    match std::env::var("RDT_LOG").as_deref() {
        Ok("trace") => log::Level::Trace,
        Ok("debug") => log::Level::Debug,
        Ok("warn") => log::Level::Warn,
        Ok("error") => log::Level::Error,
        _ => log::Level::Info,
    }
}
