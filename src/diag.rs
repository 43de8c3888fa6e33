//! Diagnostic Sink
//!
//! Kapabilitas logging yang di-inject ke handler saat konstruksi,
//! bukan global mutable. Kegagalan non-fatal (frame rusak, send gagal)
//! dilaporkan lewat sink ini dan tidak pernah menjadi error ke caller.

use tracing::{error, info};

/// Penampung pesan diagnostik
pub trait DiagSink {
    fn log(&self, message: &str, is_error: bool);
}

/// Sink default: meneruskan ke `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceSink;

impl DiagSink for TraceSink {
    fn log(&self, message: &str, is_error: bool) {
        if is_error {
            error!(target: "talaria", "{message}");
        } else {
            info!(target: "talaria", "{message}");
        }
    }
}

/// Sink yang membuang semua pesan (untuk benchmark)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagSink for NullSink {
    fn log(&self, _message: &str, _is_error: bool) {}
}
