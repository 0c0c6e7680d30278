use log::error;
use rdt::Receiver;
use rdt_cli::ReceiverConfig;
use rdt_log::RdtLogger;
use std::process::ExitCode;
use tokio::fs::File;

#[tokio::main]
async fn main() -> ExitCode {
    RdtLogger::init(log_level()).expect("logger already initialized");

    let config = match ReceiverConfig::from_args(std::env::args().skip(1)) {
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

    let sink = match File::create(&config.output_path).await {
        Ok(file) => file,
        Err(e) => {
            error!("failed to create {}: {e}", config.output_path.display());
            return ExitCode::FAILURE;
        }
    };

    let receiver = match Receiver::bind(config.listen_addr, sink, config.rcv_window).await {
        Ok(receiver) => receiver,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = receiver.run().await {
        error!("receive loop aborted: {e}");
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
