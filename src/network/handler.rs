//! Connection Handler: Pipeline Read/Write + Disconnect State Machine
//!
//! Satu instance per koneksi hidup. Handler memiliki transport-nya
//! secara eksklusif, menjalankan codec di kedua arah, dan memegang
//! keputusan disconnect. Satu frame rusak tidak pernah fatal; rate
//! limiter adalah backstop untuk abuse yang berkelanjutan.
//!
//! Semua operasi sinkron dan tidak pernah blocking. Setelah
//! `connected == false`, semua operasi menjadi no-op.

use std::time::Duration;

use crate::diag::DiagSink;
use crate::protocol::{decode, Encoder, Message, Side, MAX_FRAME_SIZE};

use super::rate::RateCounter;
use super::transport::Transport;

/// Alasan disconnect saat arah inbound melewati ambang overflow
pub const REASON_INBOUND_OVERFLOW: &str = "inbound byte budget overflow";
/// Alasan disconnect saat arah outbound melewati ambang overflow
pub const REASON_OUTBOUND_OVERFLOW: &str = "outbound byte budget overflow";

/// Konfigurasi per-koneksi, immutable setelah konstruksi
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub max_inbound_bytes_per_tick: u64,
    pub max_outbound_bytes_per_tick: u64,
    /// Berapa tick excess boleh menumpuk sebelum dianggap abuse
    pub overflow_window_ticks: u64,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            max_inbound_bytes_per_tick: 50_000,
            max_outbound_bytes_per_tick: 50_000,
            overflow_window_ticks: 60,
        }
    }
}

impl HandlerConfig {
    /// Nyatakan window overflow dalam wall-clock, bukan jumlah tick
    ///
    /// Ambang burst mengikuti cadence tick host: host 60 Hz dengan
    /// window 1 detik menghasilkan 60 tick, sama dengan default.
    pub fn overflow_window(mut self, tick_interval: Duration, window: Duration) -> Self {
        let interval = tick_interval.as_nanos().max(1);
        self.overflow_window_ticks = ((window.as_nanos() / interval).max(1)) as u64;
        self
    }
}

/// Guard yang menjamin `connected = false` di semua jalur keluar
/// disconnect, termasuk panic dari codec atau transport.
struct ConnectedGuard<'a>(&'a mut bool);

impl Drop for ConnectedGuard<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

/// Shim transport per-koneksi
///
/// State machine-nya satu arah: `CONNECTED -> DISCONNECTED`, tanpa
/// jalan kembali. Handler yang sudah disconnected menyerap semua
/// operasi sebagai no-op.
pub struct ConnHandler<T: Transport> {
    transport: T,
    side: Side,
    sink: Box<dyn DiagSink>,
    encoder: Encoder,
    inbound: RateCounter,
    outbound: RateCounter,
    connected: bool,
    disconnect_reason: Option<String>,
    tick_count: u64,
}

impl<T: Transport> ConnHandler<T> {
    pub fn new(transport: T, side: Side, config: HandlerConfig, sink: Box<dyn DiagSink>) -> Self {
        Self {
            transport,
            side,
            sink,
            encoder: Encoder::new(MAX_FRAME_SIZE),
            inbound: RateCounter::new(
                config.max_inbound_bytes_per_tick,
                config.overflow_window_ticks,
            ),
            outbound: RateCounter::new(
                config.max_outbound_bytes_per_tick,
                config.overflow_window_ticks,
            ),
            connected: true,
            disconnect_reason: None,
            tick_count: 0,
        }
    }

    /// Maintenance per tick, dipanggil host pada cadence tetap
    ///
    /// Decay inbound dulu, lalu outbound kalau masih connected.
    /// Disconnect memotong sisa tick; `tick_count` hanya maju pada
    /// tick yang selesai bersih.
    pub fn tick(&mut self) {
        if !self.connected {
            return;
        }

        if self.inbound.on_tick() {
            self.disconnect(Some(REASON_INBOUND_OVERFLOW));
            return;
        }

        if self.outbound.on_tick() {
            self.disconnect(Some(REASON_OUTBOUND_OVERFLOW));
            return;
        }

        self.tick_count += 1;
    }

    /// Baca satu frame mentah dari peer
    ///
    /// Byte masuk selalu dihitung ke counter inbound, berhasil parse
    /// atau tidak. Frame yang gagal decode di-log dan diisolasi;
    /// koneksi tetap hidup.
    pub fn read<'a>(&mut self, raw: &'a [u8]) -> Option<Message<'a>> {
        if !self.connected {
            return None;
        }

        self.inbound.charge(raw.len());

        match decode(raw, self.side) {
            Ok(msg) => Some(msg),
            Err(err) => {
                self.sink.log(&format!("dropping inbound frame: {err}"), true);
                None
            }
        }
    }

    /// Tulis satu pesan ke peer
    ///
    /// Tiga titik kegagalan (encode, ekstraksi frame, send) masing-
    /// masing diisolasi dan di-log; tidak pernah ada byte setengah jadi
    /// yang terkirim. Counter outbound hanya naik setelah send sukses.
    pub fn write(&mut self, msg: &Message<'_>) {
        if !self.connected {
            return;
        }

        self.encoder.reset();
        if let Some(sent) =
            push_frame(&mut self.encoder, &mut self.transport, self.sink.as_ref(), self.side, msg)
        {
            self.outbound.charge(sent);
        }
    }

    /// Transisi satu arah ke DISCONNECTED; idempotent
    ///
    /// Best-effort: kirim disconnect notice berisi alasan, lalu minta
    /// transport ditutup. Peer bisa saja sudah hilang, jadi kegagalan
    /// keduanya hanya di-log. `connected = false` dijamin terjadi di
    /// semua jalur keluar.
    pub fn disconnect(&mut self, reason: Option<&str>) {
        if !self.connected {
            return;
        }

        if let Some(reason) = reason {
            self.sink.log(&format!("disconnecting: {reason}"), false);
        }
        self.disconnect_reason = reason.map(str::to_owned);

        let _guard = ConnectedGuard(&mut self.connected);

        let notice = Message::Disconnect {
            reason: reason.unwrap_or(""),
        };
        self.encoder.reset();
        push_frame(
            &mut self.encoder,
            &mut self.transport,
            self.sink.as_ref(),
            self.side,
            &notice,
        );

        if let Err(err) = self.transport.close() {
            self.sink.log(&format!("closing transport: {err}"), true);
        }
    }

    #[inline(always)]
    pub fn connected(&self) -> bool {
        self.connected
    }

    #[inline(always)]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Jumlah tick maintenance yang selesai bersih (diagnostik)
    #[inline(always)]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Alasan disconnect, kalau ada yang tercatat
    pub fn disconnect_reason(&self) -> Option<&str> {
        self.disconnect_reason.as_deref()
    }

    /// Excess byte inbound saat ini (diagnostik)
    #[inline(always)]
    pub fn inbound_excess(&self) -> u64 {
        self.inbound.excess()
    }

    /// Excess byte outbound saat ini (diagnostik)
    #[inline(always)]
    pub fn outbound_excess(&self) -> u64 {
        self.outbound.excess()
    }

    /// Akses transport untuk host (polling, flush, read buffer)
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

/// Encode + kirim satu frame; tiga titik kegagalan di-log terpisah.
///
/// Free function (bukan method) supaya disconnect bisa memakainya
/// sambil guard memegang mutable borrow ke flag `connected`.
fn push_frame<T: Transport>(
    encoder: &mut Encoder,
    transport: &mut T,
    sink: &dyn DiagSink,
    side: Side,
    msg: &Message<'_>,
) -> Option<usize> {
    let frame = match encoder.encode(msg, side) {
        Ok(frame) => frame,
        Err(err) => {
            sink.log(&format!("encode failed: {err}"), true);
            return None;
        }
    };

    let bytes = match frame.bytes() {
        Ok(bytes) => bytes,
        Err(err) => {
            sink.log(&format!("frame extraction failed: {err}"), true);
            return None;
        }
    };

    if let Err(err) = transport.send(bytes) {
        sink.log(&format!("send failed: {err}"), true);
        return None;
    }

    Some(bytes.len())
}
