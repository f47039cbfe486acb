use std::{fs, net::IpAddr, path::PathBuf, time::Duration};

use anyhow::{Result, bail};
use clap::Parser;
use codec::Protocol;

/// How long one blocking read on the capture handle may take. Bounded so
/// the consumer can poll its termination slot on idle links.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
)]
struct Cli {
    ///
    /// Network interface to capture from, or an offline pcap file to read.
    ///
    #[arg(short = 'i', long)]
    interface: String,
    ///
    /// Write the captured packets to this pcap file.
    ///
    #[arg(short = 'o', long)]
    out_file: Option<PathBuf>,
    ///
    /// Capture only packets for these IPs, comma separated.
    ///
    #[arg(short = 's', long, value_delimiter = ',')]
    ips: Vec<String>,
    ///
    /// Capture only packets for these ports, comma separated.
    ///
    #[arg(short = 'p', long, value_delimiter = ',')]
    ports: Vec<String>,
    ///
    /// Application protocol of the captured payloads:
    /// raw/dns/http/redis/memcached/mysql.
    ///
    #[arg(short = 'm', long, default_value = "raw")]
    protocol: String,
    ///
    /// Threshold for slow exchanges, in milliseconds.
    ///
    #[arg(short = 't', long, default_value_t = 5)]
    slow_threshold: u64,
    ///
    /// Stop capturing after this many seconds. 0 means unlimited.
    ///
    #[arg(short = 'd', long, default_value_t = 0)]
    duration: u64,
    ///
    /// Lua script that takes over per-packet processing.
    ///
    #[arg(short = 'x', long)]
    script: Option<PathBuf>,
    ///
    /// Maximum number of bytes captured per packet.
    ///
    #[arg(short = 'n', long, default_value_t = 1500)]
    snaplen: i32,
    ///
    /// Custom bpf filter appended to the generated one.
    ///
    #[arg(short = 'e', long)]
    filter: Option<String>,
    ///
    /// Include the response content in slow log lines.
    ///
    #[arg(short = 'a', long)]
    show_response: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Live interface name or offline capture path.
    pub source: String,
    pub out_file: Option<PathBuf>,
    pub ips: Vec<IpAddr>,
    pub ports: Vec<u16>,
    pub protocol: Protocol,
    pub slow_threshold: Duration,
    /// Zero disables the wall-clock limit.
    pub duration: Duration,
    pub script: Option<PathBuf>,
    pub snaplen: i32,
    pub custom_filter: Option<String>,
    pub show_response: bool,
    pub read_timeout: Duration,
}

impl Config {
    ///
    /// Load and validate the command line parameters. Validation failures
    /// are fatal and reported before any capture handle is opened.
    ///
    pub fn load() -> Result<Self> {
        Self::validate(Cli::parse())
    }

    fn validate(cli: Cli) -> Result<Self> {
        if cli.snaplen <= 0 {
            bail!("snaplen must be positive, got {}", cli.snaplen);
        }

        let mut ips = Vec::new();
        for value in cli.ips.iter().filter(|value| !value.is_empty()) {
            match value.parse::<IpAddr>() {
                Ok(ip) => ips.push(ip),
                Err(_) => bail!("ip {value} is illegal"),
            }
        }

        let mut ports = Vec::new();
        for value in cli.ports.iter().filter(|value| !value.is_empty()) {
            match value.parse::<u16>() {
                Ok(port) => ports.push(port),
                Err(_) => bail!("port {value} is illegal"),
            }
        }

        let protocol = cli.protocol.parse::<Protocol>()?;

        if let Some(path) = &cli.out_file {
            if path.exists() {
                bail!("out file {} already exists", path.display());
            }
        }

        if let Some(path) = &cli.script {
            if let Err(e) = fs::metadata(path) {
                bail!("script {} is not readable: {e}", path.display());
            }
        }

        Ok(Self {
            source: cli.interface,
            out_file: cli.out_file,
            ips,
            ports,
            protocol,
            slow_threshold: Duration::from_millis(cli.slow_threshold),
            duration: Duration::from_secs(cli.duration),
            script: cli.script,
            snaplen: cli.snaplen,
            custom_filter: cli.filter,
            show_response: cli.show_response,
            read_timeout: READ_TIMEOUT,
        })
    }
}
