//! Argument parsing for running from the command line

use std::{net::IpAddr, path::PathBuf, time::Duration};

use clap::Parser;
use iq_slurper::TransportConfig;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Address of the device streaming I/Q datagrams
    #[clap(short, long, default_value = "192.168.0.174")]
    pub address: IpAddr,
    /// Port the device streams from
    #[clap(short, long, default_value_t = 5555)]
    #[clap(value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,
    /// Local address to bind to
    #[clap(short, long, default_value = "0.0.0.0:0")]
    pub bind: std::net::SocketAddr,
    /// Send and receive timeout in milliseconds
    #[clap(short, long, default_value_t = 1000)]
    #[clap(value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: u64,
    /// Largest datagram we expect, in bytes (at least one sample)
    #[clap(short, long, default_value_t = 65536, value_parser = valid_datagram_size)]
    pub max_datagram: usize,
    /// Directory to write a cf32 capture into instead of just monitoring
    #[clap(short, long)]
    pub output: Option<PathBuf>,
    /// Depth of the hand-off queue between acquisition and monitoring, in datagrams
    #[clap(long, default_value_t = 256)]
    pub queue: usize,
    /// Seconds between stats reports
    #[clap(short, long, default_value_t = 5)]
    #[clap(value_parser = clap::value_parser!(u64).range(1..))]
    pub stats_secs: u64,
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,
}

impl Args {
    pub fn transport(&self) -> TransportConfig {
        let timeout = Duration::from_millis(self.timeout_ms);
        TransportConfig {
            remote: (self.address, self.port).into(),
            bind: self.bind,
            recv_timeout: timeout,
            send_timeout: timeout,
            max_datagram_size: self.max_datagram,
        }
    }
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

fn valid_datagram_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(n) if n >= 2 => Ok(n),
        Ok(_) => Err("Must hold at least one I/Q pair (2 bytes)".to_string()),
        Err(_) => Err("Invalid datagram size".to_string()),
    }
}
