//! Duplex Transport dengan Buffered I/O
//!
//! Pre-allocated buffers untuk zero-allocation pada hot path.
//! Trait [`Transport`] adalah kontrak minimal yang dibutuhkan handler:
//! kirim byte dan tutup koneksi; keduanya boleh gagal dan kegagalannya
//! adalah nilai, bukan panic.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

use thiserror::Error;

/// Buffer sizes - tuned untuk typical frame sizes
const READ_BUFFER_SIZE: usize = 64 * 1024; // 64KB
// Harus muat satu frame maksimum, supaya queue_write all-or-nothing
const WRITE_BUFFER_SIZE: usize = 128 * 1024; // 128KB

/// Kegagalan operasi transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    #[error("close failed: {0}")]
    Close(#[source] io::Error),
}

/// Kanal duplex opaque milik satu connection handler
pub trait Transport {
    /// Kirim byte ke peer. Sukses berarti byte sudah diterima stack
    /// jaringan (boleh saja masih antri di write buffer internal).
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Minta koneksi ditutup
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Transport TCP non-blocking dengan buffered I/O
///
/// Menggunakan pre-allocated buffers untuk menghindari
/// alokasi pada setiap read/write.
pub struct TcpTransport {
    stream: TcpStream,
    read_buffer: Box<[u8]>,
    write_buffer: Box<[u8]>,
    read_pos: usize,
    read_len: usize,
    write_pos: usize,
}

impl TcpTransport {
    /// Wrap TcpStream dengan buffered I/O
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        // Set non-blocking mode
        stream.set_nonblocking(true)?;

        // Disable Nagle's algorithm untuk lower latency
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            read_buffer: vec![0u8; READ_BUFFER_SIZE].into_boxed_slice(),
            write_buffer: vec![0u8; WRITE_BUFFER_SIZE].into_boxed_slice(),
            read_pos: 0,
            read_len: 0,
            write_pos: 0,
        })
    }

    /// Read data ke internal buffer
    ///
    /// Returns jumlah bytes yang tersedia untuk dibaca.
    #[inline]
    pub fn fill_read_buffer(&mut self) -> io::Result<usize> {
        // Compact buffer jika perlu
        if self.read_pos > 0 {
            let remaining = self.read_len - self.read_pos;
            if remaining > 0 {
                self.read_buffer
                    .copy_within(self.read_pos..self.read_len, 0);
            }
            self.read_len = remaining;
            self.read_pos = 0;
        }

        // Read dari socket
        match self.stream.read(&mut self.read_buffer[self.read_len..]) {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "Connection closed",
            )),
            Ok(n) => {
                self.read_len += n;
                Ok(self.read_len)
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                Ok(self.read_len - self.read_pos)
            }
            Err(e) => Err(e),
        }
    }

    /// Get readable data slice (zero-copy)
    #[inline(always)]
    pub fn readable(&self) -> &[u8] {
        &self.read_buffer[self.read_pos..self.read_len]
    }

    /// Consume n bytes dari read buffer
    #[inline(always)]
    pub fn consume(&mut self, n: usize) {
        self.read_pos += n.min(self.read_len - self.read_pos);
    }

    /// Queue data untuk write (copy ke write buffer), all-or-nothing
    ///
    /// Frame yang tidak muat setelah flush di-reject utuh; tidak pernah
    /// ada prefix frame yang nyangkut di stream.
    #[inline]
    fn queue_write(&mut self, data: &[u8]) -> io::Result<()> {
        if self.write_pos + data.len() > self.write_buffer.len() {
            // Flush dulu jika buffer penuh
            self.flush_write_buffer()?;
        }

        if self.write_pos + data.len() > self.write_buffer.len() {
            // Socket macet dan buffer masih penuh; caller men-drop pesan
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "write buffer full",
            ));
        }

        self.write_buffer[self.write_pos..self.write_pos + data.len()].copy_from_slice(data);
        self.write_pos += data.len();

        Ok(())
    }

    /// Flush write buffer ke socket
    ///
    /// `WouldBlock` bukan error: sisa data di-compact dan menunggu
    /// writable event berikutnya.
    #[inline]
    pub fn flush_write_buffer(&mut self) -> io::Result<()> {
        if self.write_pos == 0 {
            return Ok(());
        }

        let mut written = 0;
        while written < self.write_pos {
            match self
                .stream
                .write(&self.write_buffer[written..self.write_pos])
            {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "Failed to write to socket",
                    ));
                }
                Ok(n) => written += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    // Partial write, compact buffer
                    if written > 0 {
                        self.write_buffer.copy_within(written..self.write_pos, 0);
                        self.write_pos -= written;
                    }
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }

        self.write_pos = 0;
        Ok(())
    }

    /// Get underlying stream untuk polling
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// Bytes pending in write buffer
    #[inline(always)]
    pub fn write_pending(&self) -> usize {
        self.write_pos
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.queue_write(bytes).map_err(TransportError::Send)?;
        self.flush_write_buffer().map_err(TransportError::Send)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        // Best-effort flush sebelum shutdown; sisa yang WouldBlock dibiarkan
        self.flush_write_buffer().ok();
        self.stream
            .shutdown(Shutdown::Both)
            .map_err(TransportError::Close)
    }
}
