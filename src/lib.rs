//! Talaria - Per-Connection Transport Shim
//!
//! Duduk di antara aplikasi dan koneksi byte duplex (socket), dengan:
//! - Tick-Based Rate Limiting: leaky-bucket per arah, toleran burst
//! - Side-Aware Codec: frame biner flat, arah pengiriman divalidasi
//! - Failure Isolation: satu frame rusak tidak pernah merusak state
//! - One-Way Lifecycle: connected -> disconnected, idempotent
//!
//! Host memanggil [`network::ConnHandler::tick`] sekali per scheduling
//! tick, [`network::ConnHandler::read`] saat ada byte masuk, dan
//! [`network::ConnHandler::write`] saat mau mengirim pesan. Tidak ada
//! operasi yang blocking atau melempar error ke caller.

pub mod diag;
pub mod network;
pub mod protocol;
