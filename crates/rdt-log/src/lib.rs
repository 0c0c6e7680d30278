//! Channel-backed `log::Log` implementation shared by the sender and receiver
//! binaries, so formatting and writing log records never blocks the transfer
//! loop.

use chrono::Local;
use log::{Level, Log, SetLoggerError, set_boxed_logger, set_max_level};
use std::io::{BufWriter, Write, stdout};
use std::sync::mpsc;
use std::thread;

enum LogCommand {
    Record(String),
    Flush,
}

pub struct RdtLogger {
    max_level: Level,
    sender: mpsc::SyncSender<LogCommand>,
}

impl RdtLogger {
    fn new(max_level: Level, buffer_size: usize) -> (Self, mpsc::Receiver<LogCommand>) {
        let (sender, receiver) = mpsc::sync_channel(buffer_size);
        (RdtLogger { max_level, sender }, receiver)
    }

    /// Installs the logger as the global `log` sink. Call once, at process start.
    pub fn init(max_level: Level) -> Result<(), SetLoggerError> {
        let (logger, receiver) = RdtLogger::new(max_level, 1024);

        thread::Builder::new()
            .name("rdt-log-writer".into())
            .spawn(move || {
                let mut writer = BufWriter::new(stdout());
                while let Ok(command) = receiver.recv() {
                    match command {
                        LogCommand::Record(message) => {
                            if let Err(e) = writer.write_all(message.as_bytes()) {
                                eprintln!("[rdt-log] failed to write log record: {e}");
                            }
                        }
                        LogCommand::Flush => {
                            let _ = writer.flush();
                        }
                    }
                }
                let _ = writer.flush();
            })
            .expect("failed to spawn log writer thread");

        set_boxed_logger(Box::new(logger))?;
        set_max_level(max_level.to_level_filter());
        Ok(())
    }
}

impl Log for RdtLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now = Local::now();
        let message = format!(
            "{} {} [{}] {}\n",
            now.format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        );
        if let Err(e) = self.sender.try_send(LogCommand::Record(message)) {
            eprintln!("[rdt-log] failed to send log record: {e}");
        }
    }

    fn flush(&self) {
        let _ = self.sender.send(LogCommand::Flush);
    }
}
