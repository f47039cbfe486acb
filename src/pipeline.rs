use std::{net::IpAddr, time::Duration};

use ahash::AHashSet;
use anyhow::Result;
use chrono::{DateTime, Local};
use codec::{FIN, Packet, PayloadDecoder, RST, SYN, frame};
use tokio::{
    signal::unix::{SignalKind, signal},
    sync::oneshot::{self, error::TryRecvError},
};

use crate::{
    capture::Sniffer, config::Config, correlation::PendingTable, script::ScriptHook,
    statistics::Statistics,
};

/// Why the pipeline is being asked to stop. The supervisor emits exactly
/// one of these into a single-slot channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Signal,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Starting,
    Running,
    Draining,
    Stopped,
}

///
/// Watch for termination conditions and report the first one. The
/// timeout clock starts here, which is right before the consumer starts
/// accepting packets; a zero duration disables it.
///
pub fn supervise(duration: Duration) -> Result<oneshot::Receiver<ExitReason>> {
    let mut terminate = signal(SignalKind::terminate())?;
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let timeout = async {
            if duration.is_zero() {
                std::future::pending::<()>().await
            } else {
                tokio::time::sleep(duration).await
            }
        };

        let reason = tokio::select! {
            _ = tokio::signal::ctrl_c() => ExitReason::Signal,
            _ = terminate.recv() => ExitReason::Signal,
            _ = timeout => ExitReason::Timeout,
        };

        // The consumer may already be gone after a drained offline file.
        let _ = tx.send(reason);
    });

    Ok(rx)
}

/// The per-packet half of the pipeline: direction classification, the
/// script hook, payload decoding, correlation and latency recording.
/// Owned by the single consumer, so no state in here is shared.
pub struct Processor {
    decoder: Box<dyn PayloadDecoder + Send>,
    hook: ScriptHook,
    table: PendingTable,
    statistics: Statistics,
    local_ips: AHashSet<IpAddr>,
    ports: Vec<u16>,
    show_response: bool,
}

impl Processor {
    pub fn new(config: &Config, local_ips: AHashSet<IpAddr>, hook: ScriptHook) -> Self {
        Self {
            decoder: config.protocol.decoder(),
            hook,
            table: PendingTable::default(),
            statistics: Statistics::new(config.slow_threshold),
            local_ips,
            ports: config.ports.clone(),
            show_response: config.show_response,
        }
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Run one decoded packet through the whole pipeline.
    pub fn process(&mut self, mut packet: Packet) {
        self.classify(&mut packet);
        self.statistics.record_direction(packet.request);

        if self.hook.run(&packet) {
            return;
        }

        if !packet.payload.is_empty() {
            self.decoder.decode(&mut packet);
        }

        self.correlate(packet);
    }

    ///
    /// Decide whether the packet is a request or a response:
    ///
    /// 1. An address of the monitored device marks the local side, with
    ///    the destination winning when both sides match.
    /// 2. When both ports are known, the first hit in the configured
    ///    port set decides.
    /// 3. An already pending reverse flow marks this packet as the
    ///    answer to an observed first leg.
    ///
    /// Later rules override earlier ones; a packet no rule applies to
    /// keeps its default, which is Request.
    ///
    fn classify(&self, packet: &mut Packet) {
        if let Some(ip) = packet.src_ip {
            if self.local_ips.contains(&IpAddr::V4(ip)) {
                packet.request = false;
            }
        }
        if let Some(ip) = packet.dst_ip {
            if self.local_ips.contains(&IpAddr::V4(ip)) {
                packet.request = true;
            }
        }

        if let (Some(src_port), Some(dst_port)) = (packet.src_port, packet.dst_port) {
            for port in &self.ports {
                if src_port == *port {
                    packet.request = false;
                    break;
                }
                if dst_port == *port {
                    packet.request = true;
                    break;
                }
            }
        }

        if let Some(key) = packet.reverse_key() {
            if self.table.contains(&key) {
                packet.request = false;
            }
        }
    }

    ///
    /// Update the pending table with this packet and, when it answers a
    /// pending request, record the pair's latency.
    ///
    /// Empty payloads only matter for connection lifecycle: a fresh SYN
    /// clears a stale entry left on a reused ephemeral port, an RST or
    /// FIN response tears the pending entry down.
    ///
    fn correlate(&mut self, packet: Packet) {
        if packet.payload.is_empty() {
            if packet.request && packet.flags & SYN != 0 {
                if let Some(key) = packet.flow_key() {
                    self.table.remove(&key);
                }
            }
            if !packet.request && packet.flags & (RST | FIN) != 0 {
                if let Some(key) = packet.reverse_key() {
                    self.table.remove(&key);
                }
            }
            return;
        }

        if packet.request {
            if packet.ignore {
                return;
            }
            if let Some(key) = packet.flow_key() {
                self.table.put(key, Box::new(packet));
            }
            return;
        }

        let Some(key) = packet.reverse_key() else {
            return;
        };
        let Some(pending) = self.table.get(&key) else {
            // A response nobody asked for, or a later segment of a reply
            // whose first segment already completed the pair.
            return;
        };

        let latency = packet
            .timestamp
            .duration_since(pending.timestamp)
            .unwrap_or_default();

        if self.statistics.is_slow(latency) {
            let timestamp: DateTime<Local> = pending.timestamp.into();
            let mut line = format!(
                "{} | {} | {:?} | {}",
                timestamp.format("%Y-%m-%d %H:%M:%S"),
                key,
                latency,
                pending.content,
            );
            if self.show_response {
                line.push_str(&format!(" | {}", packet.content));
            }
            println!("{line}");
        }

        self.statistics.record_latency(latency);
        self.table.remove(&key);
    }
}

/// The consumer: one packet source, one processor, one termination slot.
pub struct Pipeline {
    sniffer: Sniffer,
    processor: Processor,
}

impl Pipeline {
    pub fn new(config: &Config, sniffer: Sniffer, hook: ScriptHook) -> Self {
        let local_ips = sniffer.local_ips().clone();

        Self {
            processor: Processor::new(config, local_ips, hook),
            sniffer,
        }
    }

    ///
    /// Read frames until the source drains or the supervisor reports a
    /// termination reason, then render the final report. The termination
    /// slot is polled once per iteration, so a live capture notices a
    /// signal no later than one read timeout after it arrives.
    ///
    pub fn run(mut self, mut done: oneshot::Receiver<ExitReason>) -> Result<()> {
        let mut state = State::Starting;
        transition(&mut state, State::Running);

        loop {
            match done.try_recv() {
                Ok(ExitReason::Signal) => {
                    println!("\nWill exit for signal...");
                    break;
                }
                Ok(ExitReason::Timeout) => {
                    println!("\nWill exit for run timeout...");
                    break;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => {}
            }

            match self.sniffer.poll() {
                Ok(Some(frame)) => {
                    let packet = frame::decode(&frame.data, frame.timestamp, frame.capture_len);
                    self.processor.process(packet);
                }
                // Idle read timeout, go poll the termination slot again.
                Ok(None) => {}
                Err(pcap::Error::NoMorePackets) => {
                    log::info!("capture source drained");
                    break;
                }
                Err(e) => {
                    log::warn!("capture read failed: {e}");
                    break;
                }
            }
        }

        transition(&mut state, State::Draining);
        self.sniffer.flush();
        println!("{}", self.processor.statistics().render());
        transition(&mut state, State::Stopped);

        Ok(())
    }
}

fn transition(state: &mut State, to: State) {
    log::debug!("pipeline state: {state:?} -> {to:?}");
    *state = to;
}
