//! Network Layer: Transport + Rate Limiting + Connection Lifecycle
//!
//! Satu [`ConnHandler`] per koneksi hidup, memiliki transport-nya secara
//! eksklusif. Semua operasi sinkron, single-threaded, dan tidak pernah
//! blocking; host memanggil `tick` pada cadence tetap, `read` saat byte
//! datang, dan `write` saat mau mengirim.

mod handler;
mod rate;
mod transport;

pub use handler::{
    ConnHandler, HandlerConfig, REASON_INBOUND_OVERFLOW, REASON_OUTBOUND_OVERFLOW,
};
pub use rate::RateCounter;
pub use transport::{TcpTransport, Transport, TransportError};
