//! Talaria Client Binary - Demo Originator
//!
//! Peer referensi untuk talaria_server:
//! - Handshake Hello -> Welcome
//! - Ping pada rate tetap dengan pengukuran round-trip latency
//! - Mode --flood: sengaja membanjiri budget server untuk
//!   mendemonstrasikan overflow disconnect
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin talaria_client -- --host 127.0.0.1:7979 --duration 10
//! ```
//!
//! # Options
//!
//! - `--host ADDR` - Server address (default: 127.0.0.1:7979)
//! - `--duration SEC` - Run duration in seconds (default: 10)
//! - `--rate N` - Pings per second (default: 20)
//! - `--flood` - Saturate the server's inbound budget

use std::net::TcpStream;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use talaria::diag::TraceSink;
use talaria::network::{ConnHandler, HandlerConfig, TcpTransport};
use talaria::protocol::{frame_len, Message, Side, MAX_FRAME_SIZE};

/// High-resolution timestamp in nanoseconds
#[inline(always)]
fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

struct ClientConfig {
    host: String,
    duration_secs: u64,
    pings_per_sec: u32,
    flood: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1:7979".to_string(),
            duration_secs: 10,
            pings_per_sec: 20,
            flood: false,
        }
    }
}

fn run_client(config: ClientConfig) -> std::io::Result<()> {
    println!("🚀 TALARIA CLIENT - Demo Originator");
    println!("===================================\n");

    let stream = TcpStream::connect(&config.host)?;
    println!("✅ Connected to {}", config.host);

    let transport = TcpTransport::new(stream)?;

    // Inbound dibiarkan longgar (kita percaya server). Mode flood juga
    // melonggarkan outbound supaya yang memutus adalah server, bukan
    // rate limiter kita sendiri.
    let handler_config = HandlerConfig {
        max_inbound_bytes_per_tick: u64::MAX / 128,
        max_outbound_bytes_per_tick: if config.flood {
            u64::MAX / 128
        } else {
            HandlerConfig::default().max_outbound_bytes_per_tick
        },
        ..HandlerConfig::default()
    };
    let mut handler = ConnHandler::new(
        transport,
        Side::Originator,
        handler_config,
        Box::new(TraceSink),
    );

    handler.write(&Message::Hello {
        client: "talaria_client",
    });

    let flood_payload = vec![0xA5u8; 4 * 1024];
    let mut latencies: Vec<u64> = Vec::with_capacity(4096);
    let mut data_received = 0u64;
    let mut server_reason: Option<String> = None;

    let ping_interval = Duration::from_nanos(1_000_000_000 / config.pings_per_sec.max(1) as u64);
    let tick_interval = Duration::from_nanos(1_000_000_000 / 60);

    let deadline = Instant::now() + Duration::from_secs(config.duration_secs);
    let mut next_ping = Instant::now();
    let mut next_tick = Instant::now() + tick_interval;

    'session: while Instant::now() < deadline && handler.connected() {
        // Kirim ping pada cadence yang diminta
        let now = Instant::now();
        if now >= next_ping {
            handler.write(&Message::Ping { nonce: now_ns() });
            next_ping = now + ping_interval;
        }

        if config.flood {
            handler.write(&Message::Data {
                payload: &flood_payload,
            });
        }

        // Tarik balasan server
        match handler.transport_mut().fill_read_buffer() {
            Ok(_) => {}
            Err(_) => {
                println!("🔌 Connection closed by server");
                break 'session;
            }
        }

        while handler.connected() {
            let readable = handler.transport_mut().readable();
            let Some(total) = frame_len(readable) else {
                break;
            };
            if total > MAX_FRAME_SIZE {
                handler.disconnect(Some("oversized frame"));
                break;
            }
            if readable.len() < total {
                break;
            }

            let frame = readable[..total].to_vec();
            handler.transport_mut().consume(total);

            let Some(msg) = handler.read(&frame) else {
                continue;
            };

            match msg {
                Message::Welcome { session } => {
                    println!("👋 Session established: #{}", session);
                }
                Message::Pong { nonce } => {
                    latencies.push(now_ns().saturating_sub(nonce));
                }
                Message::Data { payload } => {
                    data_received += payload.len() as u64;
                }
                Message::Disconnect { reason } => {
                    println!("❌ Server disconnected us: '{}'", reason);
                    server_reason = Some(reason.to_string());
                    handler.disconnect(None);
                }
                _ => {}
            }
        }

        // Tick rate limiter pada 60 Hz
        let now = Instant::now();
        if now >= next_tick {
            handler.tick();
            next_tick += tick_interval;
        }

        // Flood tetap butuh jeda kecil supaya write buffer sempat kosong
        let pause = if config.flood {
            Duration::from_micros(200)
        } else {
            Duration::from_millis(1)
        };
        std::thread::sleep(pause);
    }

    if handler.connected() {
        handler.disconnect(Some("client done"));
    }

    print_report(&mut latencies, data_received, server_reason.as_deref());
    Ok(())
}

fn print_report(latencies: &mut Vec<u64>, data_received: u64, server_reason: Option<&str>) {
    println!("\n📊 CLIENT REPORT");
    println!("================");
    println!("  Pongs received: {}", latencies.len());
    println!("  Data bytes in:  {}", data_received);

    if let Some(reason) = server_reason {
        println!("  Kicked by server: '{}'", reason);
    }

    if latencies.is_empty() {
        return;
    }

    latencies.sort_unstable();
    let min = latencies[0];
    let max = latencies[latencies.len() - 1];
    let avg: u64 = latencies.iter().sum::<u64>() / latencies.len() as u64;
    let p50 = latencies[latencies.len() / 2];
    let p99 = latencies[(latencies.len() * 99 / 100).min(latencies.len() - 1)];

    println!("\nRound-trip latency:");
    println!("  Min:       {:.2} μs", min as f64 / 1000.0);
    println!("  Max:       {:.2} μs", max as f64 / 1000.0);
    println!("  Avg:       {:.2} μs", avg as f64 / 1000.0);
    println!("  P50:       {:.2} μs", p50 as f64 / 1000.0);
    println!("  P99:       {:.2} μs", p99 as f64 / 1000.0);
}

fn parse_args() -> ClientConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                if i + 1 < args.len() {
                    config.host = args[i + 1].clone();
                    i += 1;
                }
            }
            "--duration" => {
                if i + 1 < args.len() {
                    config.duration_secs = args[i + 1].parse().unwrap_or(10);
                    i += 1;
                }
            }
            "--rate" => {
                if i + 1 < args.len() {
                    config.pings_per_sec = args[i + 1].parse().unwrap_or(20);
                    i += 1;
                }
            }
            "--flood" => {
                config.flood = true;
            }
            "--help" | "-h" => {
                println!("Talaria Client - Demo Originator\n");
                println!("Usage: talaria_client [OPTIONS]\n");
                println!("Options:");
                println!("  --host <ADDR>     Server address (default: 127.0.0.1:7979)");
                println!("  --duration <SEC>  Run duration (default: 10)");
                println!("  --rate <N>        Pings per second (default: 20)");
                println!("  --flood           Saturate the server's inbound budget");
                println!("  -h, --help        Show this help");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn main() {
    tracing_subscriber::fmt::init();

    let config = parse_args();

    if let Err(e) = run_client(config) {
        eprintln!("❌ Client error: {}", e);
        std::process::exit(1);
    }
}
