//! Demo harness: stands in for the external collaborators by wiring the
//! pipeline end to end -- seed the allow-list from config, drain telemetry
//! on a background thread, and push synthetic ingress traffic through the
//! engine.

use clap::Parser;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flowgate::config::{CliArgs, Config};
use flowgate::{telemetry_channel, AdmissionEngine, TelemetryDrain, Verdict};

/// Interface index reported for all synthetic packets.
const DEMO_INGRESS_IF: u32 = 1;

fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();

    // Load config from file if provided, otherwise use defaults.
    let mut config = if let Some(ref config_path) = cli.config {
        Config::from_file(Path::new(config_path))?
    } else {
        Config::default()
    };
    config.merge_cli(&cli);
    config.validate()?;

    // Logging.
    if config.quiet {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new("error"))
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
            ))
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // ── Pipeline ──────────────────────────────────────────────────────
    let allow = Arc::new(config.build_allowlist()?);
    let (emitter, drain) = telemetry_channel(config.ring_bytes);
    let engine = Arc::new(AdmissionEngine::new(allow.clone(), emitter));
    tracing::info!(
        ring_bytes = config.ring_bytes,
        ring_records = drain.capacity(),
        allow_entries = allow.len(),
        "pipeline ready"
    );

    // ── Telemetry drain ───────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let drain_running = running.clone();
    let drain_handle = thread::spawn(move || drain_loop(drain, drain_running));

    // ── Synthetic ingress ─────────────────────────────────────────────
    let allowed: Vec<Ipv4Addr> = config
        .allowed_ips
        .iter()
        .filter_map(|ip| ip.parse().ok())
        .collect();
    run_scenario(&engine, &allowed, cli.rounds);

    // Give the drain a moment to catch up, then stop it.
    thread::sleep(Duration::from_millis(20));
    running.store(false, Ordering::Relaxed);
    let _ = drain_handle.join();

    let stats = engine.stats();
    tracing::info!(
        passed = stats.passed.load(Ordering::Relaxed),
        dropped = stats.dropped.load(Ordering::Relaxed),
        malformed = stats.malformed.load(Ordering::Relaxed),
        non_tcp = stats.non_tcp.load(Ordering::Relaxed),
        telemetry_full = stats.telemetry_full.load(Ordering::Relaxed),
        "scenario complete"
    );

    Ok(())
}

/// Continuously pop published records and log them, yielding briefly when
/// the channel is empty to avoid busy-spinning.
fn drain_loop(mut drain: TelemetryDrain, running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        while let Some(record) = drain.try_next() {
            tracing::info!(
                src = %Ipv4Addr::from(record.src_addr),
                dst = %Ipv4Addr::from(record.dst_addr),
                src_port = record.src_port,
                dst_port = record.dst_port,
                pkt_len = record.pkt_len,
                ingress_if = record.ingress_if,
                "flow"
            );
        }
        thread::sleep(Duration::from_millis(1));
    }
}

/// Push a fixed traffic mix through the engine: TCP from each permitted
/// source, TCP from an unlisted source, a UDP datagram, and a truncated
/// frame.
fn run_scenario(engine: &AdmissionEngine, allowed: &[Ipv4Addr], rounds: u32) {
    let unlisted = Ipv4Addr::new(203, 0, 113, 9);
    let dst = Ipv4Addr::new(10, 0, 0, 2);

    for round in 0..rounds {
        let dst_port = 51000u16.wrapping_add(round as u16);
        for src in allowed {
            let frame = tcp_frame(*src, dst, 443, dst_port);
            log_verdict("tcp/allowed", *src, engine.admit(&frame, DEMO_INGRESS_IF));
        }

        let frame = tcp_frame(unlisted, dst, 443, dst_port);
        log_verdict("tcp/unlisted", unlisted, engine.admit(&frame, DEMO_INGRESS_IF));

        let datagram = udp_frame(Ipv4Addr::new(198, 51, 100, 7), dst, 53);
        log_verdict(
            "udp",
            Ipv4Addr::new(198, 51, 100, 7),
            engine.admit(&datagram, DEMO_INGRESS_IF),
        );

        let full = tcp_frame(unlisted, dst, 443, 80);
        log_verdict("truncated", unlisted, engine.admit(&full[..34], DEMO_INGRESS_IF));
    }
}

fn log_verdict(kind: &str, src: Ipv4Addr, verdict: Verdict) {
    match verdict {
        Verdict::Pass => tracing::debug!(kind, %src, "pass"),
        Verdict::Drop => tracing::debug!(kind, %src, "drop"),
    }
}

// ── Synthetic frames ──────────────────────────────────────────────────
// Hand-assembled in network order; checksums stay zero because the
// pipeline never verifies them.

fn ipv4_frame(protocol: u8, src: Ipv4Addr, dst: Ipv4Addr, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(34 + payload.len());
    frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x01]);
    frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x02]);
    frame.extend_from_slice(&0x0800u16.to_be_bytes());

    frame.push(0x45);
    frame.push(0);
    frame.extend_from_slice(&((20 + payload.len()) as u16).to_be_bytes());
    frame.extend_from_slice(&0u16.to_be_bytes());
    frame.extend_from_slice(&0u16.to_be_bytes());
    frame.push(64);
    frame.push(protocol);
    frame.extend_from_slice(&0u16.to_be_bytes());
    frame.extend_from_slice(&src.octets());
    frame.extend_from_slice(&dst.octets());

    frame.extend_from_slice(payload);
    frame
}

fn tcp_frame(src: Ipv4Addr, dst: Ipv4Addr, src_port: u16, dst_port: u16) -> Vec<u8> {
    let mut tcp = Vec::with_capacity(20);
    tcp.extend_from_slice(&src_port.to_be_bytes());
    tcp.extend_from_slice(&dst_port.to_be_bytes());
    tcp.extend_from_slice(&1u32.to_be_bytes());
    tcp.extend_from_slice(&0u32.to_be_bytes());
    tcp.extend_from_slice(&0x5002u16.to_be_bytes()); // data offset 5, SYN
    tcp.extend_from_slice(&0xFFFFu16.to_be_bytes());
    tcp.extend_from_slice(&0u16.to_be_bytes());
    tcp.extend_from_slice(&0u16.to_be_bytes());
    ipv4_frame(6, src, dst, &tcp)
}

fn udp_frame(src: Ipv4Addr, dst: Ipv4Addr, dst_port: u16) -> Vec<u8> {
    let mut udp = Vec::with_capacity(8);
    udp.extend_from_slice(&53000u16.to_be_bytes());
    udp.extend_from_slice(&dst_port.to_be_bytes());
    udp.extend_from_slice(&8u16.to_be_bytes());
    udp.extend_from_slice(&0u16.to_be_bytes());
    ipv4_frame(17, src, dst, &udp)
}
