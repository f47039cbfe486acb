use std::{
    net::IpAddr,
    path::Path,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use ahash::AHashSet;
use anyhow::{Context, Result};
use pcap::{Activated, Capture, Device, Savefile};

use crate::config::Config;

/// One frame lifted off the capture handle, with the metadata the frame
/// decoder needs.
pub struct RawFrame {
    pub timestamp: SystemTime,
    pub capture_len: usize,
    pub data: Vec<u8>,
}

/// The packet source: a bpf-filtered live NIC or an offline capture file,
/// plus the optional output writer and the addresses of the monitored
/// device.
pub struct Sniffer {
    capture: Capture<dyn Activated>,
    writer: Option<Savefile>,
    local_ips: AHashSet<IpAddr>,
}

impl Sniffer {
    ///
    /// Open the capture target named by the configuration. A path that
    /// exists on disk is read as an offline capture, anything else is
    /// treated as a live interface in promiscuous mode.
    ///
    /// Open and filter errors are fatal, per the error policy: without a
    /// working handle there is no pipeline to run.
    ///
    pub fn open(config: &Config) -> Result<Self> {
        let offline = Path::new(&config.source).is_file();

        let mut capture: Capture<dyn Activated> = if offline {
            Capture::from_file(&config.source)
                .with_context(|| format!("open capture file {} failed", config.source))?
                .into()
        } else {
            Capture::from_device(config.source.as_str())
                .with_context(|| format!("open device {} failed", config.source))?
                .snaplen(config.snaplen)
                .promisc(true)
                .timeout(config.read_timeout.as_millis() as i32)
                .open()
                .with_context(|| format!("activate device {} failed", config.source))?
                .into()
        };

        let filter = filter_expression(
            &config.ports,
            &config.ips,
            config.custom_filter.as_deref(),
        );
        if !filter.is_empty() {
            log::info!("bpf filter: {filter}");
            capture
                .filter(&filter, true)
                .context("set bpf filter failed")?;
        }

        let writer = match &config.out_file {
            Some(path) => Some(
                capture
                    .savefile(path)
                    .with_context(|| format!("create out file {} failed", path.display()))?,
            ),
            None => None,
        };

        let local_ips = if offline {
            AHashSet::new()
        } else {
            device_addresses(&config.source)
        };

        Ok(Self {
            capture,
            writer,
            local_ips,
        })
    }

    /// Addresses of the monitored device, for direction classification.
    pub fn local_ips(&self) -> &AHashSet<IpAddr> {
        &self.local_ips
    }

    ///
    /// Read the next frame, writing it to the output file on the way.
    /// Returns `Ok(None)` when the read timeout elapsed without traffic so
    /// the caller can poll its termination channel and try again.
    ///
    pub fn poll(&mut self) -> Result<Option<RawFrame>, pcap::Error> {
        match self.capture.next_packet() {
            Ok(packet) => {
                if let Some(writer) = self.writer.as_mut() {
                    writer.write(&packet);
                }

                Ok(Some(RawFrame {
                    timestamp: frame_timestamp(
                        packet.header.ts.tv_sec as i64,
                        packet.header.ts.tv_usec as i64,
                    ),
                    capture_len: packet.header.caplen as usize,
                    data: packet.data.to_vec(),
                }))
            }
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Flush the output writer. Failures are logged, not fatal: losing the
    /// tail of the dump must not lose the report.
    pub fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                log::warn!("flush out file failed: {e}");
            }
        }
    }
}

fn frame_timestamp(sec: i64, usec: i64) -> SystemTime {
    UNIX_EPOCH + Duration::new(sec.max(0) as u64, (usec.max(0) as u32).saturating_mul(1000))
}

/// Collect the addresses of the named device and log its details, the
/// way the capture backend reports them. A device that cannot be listed
/// yields an empty set; opening it will surface the real error.
fn device_addresses(name: &str) -> AHashSet<IpAddr> {
    let Ok(devices) = Device::list() else {
        return AHashSet::new();
    };

    let Some(device) = devices.into_iter().find(|device| device.name == name) else {
        return AHashSet::new();
    };

    log::info!(
        "device {}: {}",
        device.name,
        device.desc.as_deref().unwrap_or("no description")
    );
    for address in &device.addresses {
        match address.netmask {
            Some(netmask) => log::info!("- address {} netmask {netmask}", address.addr),
            None => log::info!("- address {}", address.addr),
        }
    }

    device.addresses.iter().map(|address| address.addr).collect()
}

///
/// Assemble the bpf expression from the configured ports, hosts and the
/// custom clause. Each group is a disjunction of parenthesized clauses;
/// non-empty groups are chained with `and`, the first one taken as is.
///
pub fn filter_expression(ports: &[u16], ips: &[IpAddr], custom: Option<&str>) -> String {
    let port_clauses = ports
        .iter()
        .map(|port| format!("(port {port})"))
        .collect::<Vec<_>>()
        .join(" or ");

    let host_clauses = ips
        .iter()
        .map(|ip| format!("(host {ip})"))
        .collect::<Vec<_>>()
        .join(" or ");

    let custom_clause = custom
        .filter(|value| !value.is_empty())
        .map(|value| format!("({value})"))
        .unwrap_or_default();

    let mut filter = String::new();
    for clauses in [port_clauses, host_clauses, custom_clause] {
        if clauses.is_empty() {
            continue;
        }
        if filter.is_empty() {
            filter = clauses;
        } else {
            filter = format!("{filter} and ({clauses})");
        }
    }

    filter
}
