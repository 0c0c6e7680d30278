//! Argument parsing and validation shared by the `rdt-sender` and
//! `rdt-receiver` binaries, in the teacher's validate-then-run `Config`
//! shape, minus any on-disk persistence — the external interface here is
//! exhaustively the command line.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("usage: {usage}")]
    Usage { usage: &'static str },

    #[error("invalid {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },

    #[error("input file does not exist or is not readable: {0}")]
    InputNotReadable(PathBuf),

    #[error("output directory does not exist: {0}")]
    OutputDirMissing(PathBuf),
}

const SENDER_USAGE: &str =
    "rdt-sender <peer_addr> <peer_port> <file_path> [loss_rate] [max_window] [delay_ms]";

pub struct SenderConfig {
    pub peer: SocketAddr,
    pub file_path: PathBuf,
    pub loss_rate: f64,
    pub max_window: u32,
    pub delay_ms: u64,
}

impl SenderConfig {
    pub fn from_args<I: Iterator<Item = String>>(mut args: I) -> Result<SenderConfig, ConfigError> {
        let peer_addr = args.next().ok_or(ConfigError::Usage { usage: SENDER_USAGE })?;
        let peer_port = args.next().ok_or(ConfigError::Usage { usage: SENDER_USAGE })?;
        let file_path = args.next().ok_or(ConfigError::Usage { usage: SENDER_USAGE })?;

        let ip: IpAddr = peer_addr
            .parse()
            .map_err(|_| ConfigError::InvalidValue { field: "peer_addr", value: peer_addr })?;
        let port: u16 = peer_port
            .parse()
            .map_err(|_| ConfigError::InvalidValue { field: "peer_port", value: peer_port })?;

        let loss_rate = parse_optional(args.next(), "loss_rate", 0.0)?;
        let max_window = parse_optional(args.next(), "max_window", 20)?;
        let delay_ms = parse_optional(args.next(), "delay_ms", 0)?;

        Ok(SenderConfig {
            peer: SocketAddr::new(ip, port),
            file_path: PathBuf::from(file_path),
            loss_rate,
            max_window,
            delay_ms,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.file_path.is_file() {
            return Err(ConfigError::InputNotReadable(self.file_path.clone()));
        }
        if !(0.0..=1.0).contains(&self.loss_rate) {
            return Err(ConfigError::InvalidValue {
                field: "loss_rate",
                value: self.loss_rate.to_string(),
            });
        }
        Ok(())
    }
}

const RECEIVER_USAGE: &str = "rdt-receiver <port> <output_file> [rcv_window]";

pub struct ReceiverConfig {
    pub listen_addr: SocketAddr,
    pub output_path: PathBuf,
    pub rcv_window: u32,
}

impl ReceiverConfig {
    pub fn from_args<I: Iterator<Item = String>>(mut args: I) -> Result<ReceiverConfig, ConfigError> {
        let port_arg = args.next().ok_or(ConfigError::Usage { usage: RECEIVER_USAGE })?;
        let output_path = args.next().ok_or(ConfigError::Usage { usage: RECEIVER_USAGE })?;

        let port: u16 = port_arg
            .parse()
            .map_err(|_| ConfigError::InvalidValue { field: "port", value: port_arg })?;
        let rcv_window = parse_optional(args.next(), "rcv_window", 20)?;

        Ok(ReceiverConfig {
            listen_addr: SocketAddr::new(IpAddr::from([0, 0, 0, 0]), port),
            output_path: PathBuf::from(output_path),
            rcv_window,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let parent = self.output_path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            if !parent.is_dir() {
                return Err(ConfigError::OutputDirMissing(parent.to_path_buf()));
            }
        }
        Ok(())
    }
}

fn parse_optional<T: std::str::FromStr>(
    raw: Option<String>,
    field: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { field, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_config_applies_defaults() {
        let args = vec!["127.0.0.1".to_string(), "9000".to_string(), "/tmp/x".to_string()];
        let config = SenderConfig::from_args(args.into_iter()).unwrap();
        assert_eq!(config.loss_rate, 0.0);
        assert_eq!(config.max_window, 20);
        assert_eq!(config.delay_ms, 0);
    }

    #[test]
    fn sender_config_rejects_missing_args() {
        let args = vec!["127.0.0.1".to_string()];
        assert!(SenderConfig::from_args(args.into_iter()).is_err());
    }

    #[test]
    fn receiver_config_applies_default_window() {
        let args = vec!["9000".to_string(), "/tmp/out.bin".to_string()];
        let config = ReceiverConfig::from_args(args.into_iter()).unwrap();
        assert_eq!(config.rcv_window, 20);
    }
}
