//! Talaria Server Binary - Demo Host
//!
//! Host referensi yang mendorong shim sesuai kontraknya:
//! - mio event loop (epoll/kqueue/IOCP) untuk accept/read/write
//! - satu ConnHandler per koneksi (side = Recipient)
//! - tick rate limiter pada cadence tetap lewat poll timeout
//! - TCP_NODELAY + socket buffer tuning
//!
//! Usage:
//!   cargo run --release --bin talaria_server [OPTIONS]

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::time::{Duration, Instant};

use mio::net::{TcpListener as MioTcpListener, TcpStream as MioTcpStream};
use mio::{Events, Interest, Poll, Token};

use talaria::diag::TraceSink;
use talaria::network::{
    ConnHandler, HandlerConfig, TcpTransport, REASON_INBOUND_OVERFLOW, REASON_OUTBOUND_OVERFLOW,
};
use talaria::protocol::{frame_len, Message, Side, MAX_FRAME_SIZE};

const SERVER_TOKEN: Token = Token(0);
const MAX_CONNECTIONS: usize = 1024;
const EVENTS_CAPACITY: usize = 1024;

/// Server configuration
struct ServerConfig {
    bind_addr: String,
    tick_rate: u32,
    budget: u64,
    verbose: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:7979".to_string(),
            tick_rate: 60,
            budget: 50_000,
            verbose: false,
        }
    }
}

/// Server statistics (single-threaded, plain counters)
#[derive(Default)]
struct ServerStats {
    messages_in: u64,
    messages_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    connections_total: u64,
    overflow_disconnects: u64,
}

impl ServerStats {
    fn print_stats(&self, uptime: Duration, active: usize) {
        let rate_in = self.messages_in as f64 / uptime.as_secs_f64();
        let rate_out = self.messages_out as f64 / uptime.as_secs_f64();

        println!("\n📊 Server Stats (uptime: {:.1}s)", uptime.as_secs_f64());
        println!("   Messages IN:   {} ({:.1}/sec)", self.messages_in, rate_in);
        println!("   Messages OUT:  {} ({:.1}/sec)", self.messages_out, rate_out);
        println!("   Bytes IN/OUT:  {} / {}", self.bytes_in, self.bytes_out);
        println!(
            "   Connections:   {} active / {} total",
            active, self.connections_total
        );
        println!("   Overflow kicks: {}", self.overflow_disconnects);
    }
}

/// Satu koneksi yang di-host: handler + registrasi mio-nya
struct Session {
    handler: ConnHandler<TcpTransport>,
    // Clone fd yang terdaftar di poll; harus tetap hidup selama sesi
    _registration: MioTcpStream,
    addr: SocketAddr,
    session_id: u64,
}

/// Tuning socket buffer (unix only, best effort)
#[cfg(unix)]
fn tune_socket(stream: &std::net::TcpStream) {
    use std::os::unix::io::AsRawFd;
    let fd = stream.as_raw_fd();
    unsafe {
        let optval: libc::c_int = 256 * 1024; // 256KB
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_SNDBUF,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
}

#[cfg(not(unix))]
fn tune_socket(_stream: &std::net::TcpStream) {}

/// Convert mio stream ke std stream (ownership fd ikut pindah)
fn into_std_stream(stream: MioTcpStream) -> std::net::TcpStream {
    #[cfg(unix)]
    {
        use std::os::unix::io::{FromRawFd, IntoRawFd};
        unsafe { std::net::TcpStream::from_raw_fd(stream.into_raw_fd()) }
    }

    #[cfg(windows)]
    {
        use std::os::windows::io::{FromRawSocket, IntoRawSocket};
        unsafe { std::net::TcpStream::from_raw_socket(stream.into_raw_socket()) }
    }
}

fn run_server(config: ServerConfig) -> io::Result<()> {
    println!("🚀 TALARIA SERVER - Transport Shim Demo Host");
    println!("============================================\n");

    let mut poll = Poll::new()?;

    let listener = TcpListener::bind(&config.bind_addr)?;
    listener.set_nonblocking(true)?;
    let mut listener = MioTcpListener::from_std(listener);

    poll.registry()
        .register(&mut listener, SERVER_TOKEN, Interest::READABLE)?;

    println!("🔌 Listening on {}", config.bind_addr);
    println!("⏱️  Tick rate: {} Hz", config.tick_rate);
    println!("📏 Budget: {} bytes/tick per direction", config.budget);
    println!("\n📡 Waiting for connections...\n");

    let handler_config = HandlerConfig {
        max_inbound_bytes_per_tick: config.budget,
        max_outbound_bytes_per_tick: config.budget,
        ..HandlerConfig::default()
    };

    let mut events = Events::with_capacity(EVENTS_CAPACITY);
    let mut sessions: HashMap<Token, Session> = HashMap::new();
    let mut next_token = 1usize;
    let mut stats = ServerStats::default();

    let start_time = Instant::now();
    let mut last_stats_print = Instant::now();

    let tick_interval = Duration::from_nanos(1_000_000_000 / config.tick_rate.max(1) as u64);
    let mut next_tick = Instant::now() + tick_interval;

    loop {
        // Poll sampai tick berikutnya jatuh tempo
        let timeout = next_tick.saturating_duration_since(Instant::now());
        poll.poll(&mut events, Some(timeout))?;

        // (source_token, payload) yang harus di-broadcast setelah fase read
        let mut broadcasts: Vec<(Token, Vec<u8>)> = Vec::new();

        for event in events.iter() {
            match event.token() {
                SERVER_TOKEN => loop {
                    match listener.accept() {
                        Ok((stream, addr)) => {
                            if sessions.len() >= MAX_CONNECTIONS {
                                eprintln!("⚠️ Max connections reached, rejecting {}", addr);
                                continue;
                            }

                            let std_stream = into_std_stream(stream);
                            tune_socket(&std_stream);

                            let token = Token(next_token);
                            next_token += 1;

                            let registration = match std_stream.try_clone() {
                                Ok(clone) => MioTcpStream::from_std(clone),
                                Err(e) => {
                                    eprintln!("⚠️ Failed to clone stream for {}: {}", addr, e);
                                    continue;
                                }
                            };

                            let transport = match TcpTransport::new(std_stream) {
                                Ok(t) => t,
                                Err(e) => {
                                    eprintln!("⚠️ Failed to setup transport for {}: {}", addr, e);
                                    continue;
                                }
                            };

                            let mut session = Session {
                                handler: ConnHandler::new(
                                    transport,
                                    Side::Recipient,
                                    handler_config.clone(),
                                    Box::new(TraceSink),
                                ),
                                _registration: registration,
                                addr,
                                session_id: token.0 as u64,
                            };

                            if let Err(e) = poll.registry().register(
                                &mut session._registration,
                                token,
                                Interest::READABLE | Interest::WRITABLE,
                            ) {
                                eprintln!("⚠️ Failed to register {}: {}", addr, e);
                                continue;
                            }

                            println!("✅ [{}] Connected: {}", token.0, addr);
                            stats.connections_total += 1;
                            sessions.insert(token, session);
                        }
                        Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                        Err(e) => {
                            eprintln!("Accept error: {}", e);
                            break;
                        }
                    }
                },
                token => {
                    if event.is_readable() {
                        if let Some(session) = sessions.get_mut(&token) {
                            pump_session(session, &config, &mut stats, &mut broadcasts);
                        }
                    }
                    if event.is_writable() {
                        if let Some(session) = sessions.get_mut(&token) {
                            session.handler.transport_mut().flush_write_buffer().ok();
                        }
                    }
                }
            }
        }

        // Broadcast Data ke semua sesi lain yang masih hidup
        for (source, payload) in broadcasts {
            for (&token, session) in sessions.iter_mut() {
                if token == source || !session.handler.connected() {
                    continue;
                }
                session.handler.write(&Message::Data { payload: &payload });
                stats.messages_out += 1;
                stats.bytes_out += payload.len() as u64;
            }
        }

        // Tick semua handler pada cadence tetap
        let now = Instant::now();
        if now >= next_tick {
            next_tick += tick_interval;

            for session in sessions.values_mut() {
                session.handler.tick();
            }

            sessions.retain(|_, session| {
                if session.handler.connected() {
                    return true;
                }
                let reason = session.handler.disconnect_reason().unwrap_or("peer closed");
                if reason == REASON_INBOUND_OVERFLOW || reason == REASON_OUTBOUND_OVERFLOW {
                    stats.overflow_disconnects += 1;
                }
                println!(
                    "❌ [{}] Disconnected: {} ({})",
                    session.session_id, session.addr, reason
                );
                false
            });

            if last_stats_print.elapsed() > Duration::from_secs(5) {
                stats.print_stats(start_time.elapsed(), sessions.len());
                last_stats_print = Instant::now();
            }
        }
    }
}

/// Tarik byte dari socket, potong jadi frame, dispatch ke handler
fn pump_session(
    session: &mut Session,
    config: &ServerConfig,
    stats: &mut ServerStats,
    broadcasts: &mut Vec<(Token, Vec<u8>)>,
) {
    let token = Token(session.session_id as usize);

    match session.handler.transport_mut().fill_read_buffer() {
        Ok(_) => {}
        Err(ref e) if e.kind() == io::ErrorKind::ConnectionReset => {
            session.handler.disconnect(None);
            return;
        }
        Err(e) => {
            eprintln!("⚠️ [{}] Read error: {}", session.session_id, e);
            session.handler.disconnect(None);
            return;
        }
    }

    while session.handler.connected() {
        let readable = session.handler.transport_mut().readable();
        let Some(total) = frame_len(readable) else {
            break;
        };

        if total > MAX_FRAME_SIZE {
            // Field panjang tidak masuk akal; stream sudah tidak bisa dipercaya
            session.handler.disconnect(Some("oversized frame"));
            break;
        }
        if readable.len() < total {
            break;
        }

        // Copy frame supaya read buffer bisa langsung di-consume
        let frame = readable[..total].to_vec();
        session.handler.transport_mut().consume(total);

        stats.bytes_in += total as u64;

        let Some(msg) = session.handler.read(&frame) else {
            // Frame rusak sudah di-log oleh handler; lanjut ke frame berikutnya
            continue;
        };

        stats.messages_in += 1;
        if config.verbose {
            println!("   [{}] {:?}", session.session_id, msg.kind());
        }

        match msg {
            Message::Hello { client } => {
                println!("👋 [{}] Hello from '{}'", session.session_id, client);
                let welcome = Message::Welcome {
                    session: session.session_id,
                };
                session.handler.write(&welcome);
                stats.messages_out += 1;
            }
            Message::Ping { nonce } => {
                session.handler.write(&Message::Pong { nonce });
                stats.messages_out += 1;
            }
            Message::Data { payload } => {
                broadcasts.push((token, payload.to_vec()));
            }
            Message::Disconnect { reason } => {
                println!("👋 [{}] Peer disconnecting: '{}'", session.session_id, reason);
                session.handler.disconnect(None);
            }
            // Welcome/Pong tidak mungkin lolos decode di sisi recipient
            _ => {}
        }
    }
}

fn parse_args() -> ServerConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_addr = args[i + 1].clone();
                    i += 1;
                }
            }
            "--tick-rate" => {
                if i + 1 < args.len() {
                    config.tick_rate = args[i + 1].parse().unwrap_or(60);
                    i += 1;
                }
            }
            "--budget" => {
                if i + 1 < args.len() {
                    config.budget = args[i + 1].parse().unwrap_or(50_000);
                    i += 1;
                }
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--help" | "-h" => {
                println!("Talaria Server - Transport Shim Demo Host\n");
                println!("Usage: talaria_server [OPTIONS]\n");
                println!("Options:");
                println!("  -b, --bind <ADDR>    Bind address (default: 0.0.0.0:7979)");
                println!("      --tick-rate <HZ> Maintenance tick rate (default: 60)");
                println!("      --budget <BYTES> Per-tick byte budget each way (default: 50000)");
                println!("  -v, --verbose        Verbose output");
                println!("  -h, --help           Show this help");
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

    if let Err(e) = run_server(config) {
        eprintln!("❌ Server error: {}", e);
        std::process::exit(1);
    }
}
