//! Encoder/Decoder Frame dengan Validasi Arah
//!
//! Encode dilakukan ke pre-allocated buffer (tidak ada alokasi di hot
//! path); decode meminjam payload langsung dari buffer input. Setiap
//! kegagalan adalah nilai `CodecError`, bukan panic, supaya caller bisa
//! mengisolasi frame yang rusak tanpa merusak state koneksi.

use thiserror::Error;

use super::message::{
    crc32_fast, Message, MessageKind, Side, HEADER_SIZE, MAGIC, MAX_PAYLOAD_SIZE, VERSION,
};

/// Kegagalan encode/decode satu frame
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("frame truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("bad magic 0x{0:08x}")]
    BadMagic(u32),

    #[error("unsupported protocol version {0}")]
    BadVersion(u8),

    #[error("reserved flags must be zero, got 0x{0:04x}")]
    BadFlags(u16),

    #[error("unknown message kind {0}")]
    UnknownKind(u8),

    #[error("payload length {0} exceeds limit")]
    Oversized(usize),

    #[error("{0} trailing bytes after frame")]
    TrailingBytes(usize),

    #[error("payload checksum mismatch")]
    ChecksumMismatch,

    #[error("message kind {kind:?} is not legal for {side:?} to send")]
    IllegalDirection { kind: MessageKind, side: Side },

    #[error("malformed {kind:?} payload")]
    MalformedPayload { kind: MessageKind },

    #[error("encode buffer full")]
    BufferFull,

    #[error("incomplete frame: declared {declared} bytes, built {built}")]
    IncompleteFrame { declared: usize, built: usize },
}

/// Pre-allocated encoder buffer
///
/// Semua operasi encode dilakukan ke buffer internal;
/// tidak ada alokasi dinamis setelah inisialisasi.
pub struct Encoder {
    buffer: Box<[u8]>,
    write_pos: usize,
}

impl Encoder {
    /// Membuat encoder dengan buffer size tertentu
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            write_pos: 0,
        }
    }

    /// Reset encoder untuk reuse
    #[inline(always)]
    pub fn reset(&mut self) {
        self.write_pos = 0;
    }

    /// Encode satu pesan ke buffer
    ///
    /// Gagal jika `msg` tidak legal untuk dikirim oleh `side`, payload
    /// melebihi limit, atau buffer penuh.
    pub fn encode(&mut self, msg: &Message<'_>, side: Side) -> Result<EncodedFrame<'_>, CodecError> {
        let kind = msg.kind();
        if !kind.legal_from(side) {
            return Err(CodecError::IllegalDirection { kind, side });
        }

        let payload_len = msg.payload_len();
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(CodecError::Oversized(payload_len));
        }

        let total = HEADER_SIZE + payload_len;
        if self.write_pos + total > self.buffer.len() {
            return Err(CodecError::BufferFull);
        }

        let start = self.write_pos;
        let payload_start = start + HEADER_SIZE;

        // Payload dulu, supaya checksum bisa dihitung dari buffer
        match msg {
            Message::Hello { client } => {
                self.buffer[payload_start..payload_start + payload_len]
                    .copy_from_slice(client.as_bytes());
            }
            Message::Welcome { session } => {
                self.buffer[payload_start..payload_start + 8].copy_from_slice(&session.to_le_bytes());
            }
            Message::Ping { nonce } | Message::Pong { nonce } => {
                self.buffer[payload_start..payload_start + 8].copy_from_slice(&nonce.to_le_bytes());
            }
            Message::Data { payload } => {
                self.buffer[payload_start..payload_start + payload_len].copy_from_slice(payload);
            }
            Message::Disconnect { reason } => {
                self.buffer[payload_start..payload_start + payload_len]
                    .copy_from_slice(reason.as_bytes());
            }
        }

        let checksum = crc32_fast(&self.buffer[payload_start..payload_start + payload_len]);

        // Header (little-endian)
        self.buffer[start..start + 4].copy_from_slice(&MAGIC.to_le_bytes());
        self.buffer[start + 4] = VERSION;
        self.buffer[start + 5] = kind as u8;
        self.buffer[start + 6..start + 8].copy_from_slice(&0u16.to_le_bytes());
        self.buffer[start + 8..start + 12].copy_from_slice(&(payload_len as u32).to_le_bytes());
        self.buffer[start + 12..start + 16].copy_from_slice(&checksum.to_le_bytes());

        self.write_pos = start + total;

        Ok(EncodedFrame {
            buf: &self.buffer[start..self.write_pos],
        })
    }

    /// Sisa kapasitas buffer
    #[inline(always)]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.write_pos
    }
}

/// Satu frame hasil encode
///
/// Ekstraksi byte final divalidasi terhadap panjang yang dideklarasikan
/// di header; frame setengah jadi tidak pernah sampai ke wire.
#[derive(Debug)]
pub struct EncodedFrame<'a> {
    buf: &'a [u8],
}

impl<'a> EncodedFrame<'a> {
    /// Byte final yang siap dikirim
    pub fn bytes(&self) -> Result<&'a [u8], CodecError> {
        if self.buf.len() < HEADER_SIZE {
            return Err(CodecError::IncompleteFrame {
                declared: HEADER_SIZE,
                built: self.buf.len(),
            });
        }
        let payload_len =
            u32::from_le_bytes([self.buf[8], self.buf[9], self.buf[10], self.buf[11]]) as usize;
        let declared = HEADER_SIZE + payload_len;
        if declared != self.buf.len() {
            return Err(CodecError::IncompleteFrame {
                declared,
                built: self.buf.len(),
            });
        }
        Ok(self.buf)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Panjang total frame berikutnya, kalau header-nya sudah lengkap
///
/// Untuk host yang memotong byte stream menjadi frame. Caller wajib
/// membandingkan hasilnya dengan [`MAX_FRAME_SIZE`](super::MAX_FRAME_SIZE)
/// sebelum menunggu sisa byte, karena field panjang belum divalidasi.
#[inline(always)]
pub fn frame_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < HEADER_SIZE {
        return None;
    }
    let payload_len = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]) as usize;
    Some(HEADER_SIZE + payload_len)
}

/// Decode tepat satu frame
///
/// `side` adalah identitas pihak yang membaca; frame ditolak jika
/// kind-nya tidak legal untuk dikirim oleh peer dari `side`.
pub fn decode<'a>(buf: &'a [u8], side: Side) -> Result<Message<'a>, CodecError> {
    if buf.len() < HEADER_SIZE {
        return Err(CodecError::Truncated {
            need: HEADER_SIZE,
            have: buf.len(),
        });
    }

    let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if magic != MAGIC {
        return Err(CodecError::BadMagic(magic));
    }

    let version = buf[4];
    if version != VERSION {
        return Err(CodecError::BadVersion(version));
    }

    let flags = u16::from_le_bytes([buf[6], buf[7]]);
    if flags != 0 {
        return Err(CodecError::BadFlags(flags));
    }

    let kind_raw = buf[5];
    let kind = MessageKind::from_u8(kind_raw).ok_or(CodecError::UnknownKind(kind_raw))?;

    let payload_len = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]) as usize;
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(CodecError::Oversized(payload_len));
    }

    let total = HEADER_SIZE + payload_len;
    if buf.len() < total {
        return Err(CodecError::Truncated {
            need: total,
            have: buf.len(),
        });
    }
    if buf.len() > total {
        return Err(CodecError::TrailingBytes(buf.len() - total));
    }

    let payload = &buf[HEADER_SIZE..total];
    let checksum = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);
    if crc32_fast(payload) != checksum {
        return Err(CodecError::ChecksumMismatch);
    }

    let sender = side.peer();
    if !kind.legal_from(sender) {
        return Err(CodecError::IllegalDirection { kind, side: sender });
    }

    match kind {
        MessageKind::Hello => std::str::from_utf8(payload)
            .map(|client| Message::Hello { client })
            .map_err(|_| CodecError::MalformedPayload { kind }),
        MessageKind::Welcome => parse_u64(payload)
            .map(|session| Message::Welcome { session })
            .ok_or(CodecError::MalformedPayload { kind }),
        MessageKind::Ping => parse_u64(payload)
            .map(|nonce| Message::Ping { nonce })
            .ok_or(CodecError::MalformedPayload { kind }),
        MessageKind::Pong => parse_u64(payload)
            .map(|nonce| Message::Pong { nonce })
            .ok_or(CodecError::MalformedPayload { kind }),
        MessageKind::Data => Ok(Message::Data { payload }),
        MessageKind::Disconnect => std::str::from_utf8(payload)
            .map(|reason| Message::Disconnect { reason })
            .map_err(|_| CodecError::MalformedPayload { kind }),
    }
}

#[inline(always)]
fn parse_u64(payload: &[u8]) -> Option<u64> {
    let fixed: [u8; 8] = payload.try_into().ok()?;
    Some(u64::from_le_bytes(fixed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_bytes(msg: &Message<'_>, side: Side) -> Vec<u8> {
        let mut encoder = Encoder::new(4096);
        let frame = encoder.encode(msg, side).unwrap();
        frame.bytes().unwrap().to_vec()
    }

    #[test]
    fn test_roundtrip_every_kind() {
        let cases: Vec<(Message<'_>, Side)> = vec![
            (Message::Hello { client: "talaria-demo" }, Side::Originator),
            (Message::Welcome { session: 7 }, Side::Recipient),
            (Message::Ping { nonce: 123456789 }, Side::Originator),
            (Message::Pong { nonce: 123456789 }, Side::Recipient),
            (Message::Data { payload: b"state sync blob" }, Side::Originator),
            (Message::Data { payload: b"" }, Side::Recipient),
            (Message::Disconnect { reason: "bye" }, Side::Recipient),
            (Message::Disconnect { reason: "" }, Side::Originator),
        ];

        for (msg, sender) in cases {
            let bytes = encode_bytes(&msg, sender);
            let decoded = decode(&bytes, sender.peer()).unwrap();
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn test_encode_rejects_illegal_direction() {
        let mut encoder = Encoder::new(4096);
        let err = encoder
            .encode(&Message::Welcome { session: 1 }, Side::Originator)
            .unwrap_err();
        assert_eq!(
            err,
            CodecError::IllegalDirection {
                kind: MessageKind::Welcome,
                side: Side::Originator,
            }
        );
    }

    #[test]
    fn test_decode_rejects_illegal_direction() {
        // Ping sah dikirim originator, tapi originator tidak boleh menerimanya
        let bytes = encode_bytes(&Message::Ping { nonce: 1 }, Side::Originator);
        let err = decode(&bytes, Side::Originator).unwrap_err();
        assert!(matches!(err, CodecError::IllegalDirection { .. }));
    }

    #[test]
    fn test_decode_bad_magic() {
        let mut bytes = encode_bytes(&Message::Ping { nonce: 1 }, Side::Originator);
        bytes[0] ^= 0xFF;
        assert!(matches!(
            decode(&bytes, Side::Recipient),
            Err(CodecError::BadMagic(_))
        ));
    }

    #[test]
    fn test_decode_bad_version() {
        let mut bytes = encode_bytes(&Message::Ping { nonce: 1 }, Side::Originator);
        bytes[4] = 9;
        assert_eq!(decode(&bytes, Side::Recipient), Err(CodecError::BadVersion(9)));
    }

    #[test]
    fn test_decode_unknown_kind() {
        let mut bytes = encode_bytes(&Message::Ping { nonce: 1 }, Side::Originator);
        bytes[5] = 200;
        assert_eq!(
            decode(&bytes, Side::Recipient),
            Err(CodecError::UnknownKind(200))
        );
    }

    #[test]
    fn test_decode_truncated() {
        let bytes = encode_bytes(&Message::Ping { nonce: 1 }, Side::Originator);
        assert!(matches!(
            decode(&bytes[..HEADER_SIZE - 1], Side::Recipient),
            Err(CodecError::Truncated { .. })
        ));
        assert!(matches!(
            decode(&bytes[..bytes.len() - 1], Side::Recipient),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut bytes = encode_bytes(&Message::Ping { nonce: 1 }, Side::Originator);
        bytes.push(0);
        assert_eq!(
            decode(&bytes, Side::Recipient),
            Err(CodecError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        let mut bytes = encode_bytes(&Message::Data { payload: b"abcd" }, Side::Originator);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert_eq!(
            decode(&bytes, Side::Recipient),
            Err(CodecError::ChecksumMismatch)
        );
    }

    #[test]
    fn test_decode_malformed_fixed_width() {
        // Pong dengan payload 4 byte, header dan checksum tetap konsisten
        let mut encoder = Encoder::new(4096);
        let frame = encoder
            .encode(&Message::Data { payload: &[1, 2, 3, 4] }, Side::Recipient)
            .unwrap();
        let mut bytes = frame.bytes().unwrap().to_vec();
        bytes[5] = MessageKind::Pong as u8;
        assert_eq!(
            decode(&bytes, Side::Originator),
            Err(CodecError::MalformedPayload {
                kind: MessageKind::Pong
            })
        );
    }

    #[test]
    fn test_decode_garbage() {
        assert!(decode(b"not a frame at all", Side::Recipient).is_err());
        assert!(decode(&[], Side::Recipient).is_err());
    }

    #[test]
    fn test_encoder_buffer_full() {
        let mut encoder = Encoder::new(8); // lebih kecil dari header
        let err = encoder
            .encode(&Message::Ping { nonce: 1 }, Side::Originator)
            .unwrap_err();
        assert_eq!(err, CodecError::BufferFull);
    }

    #[test]
    fn test_encoder_reuse_after_reset() {
        let mut encoder = Encoder::new(64);
        for _ in 0..10 {
            encoder.reset();
            let frame = encoder
                .encode(&Message::Ping { nonce: 42 }, Side::Originator)
                .unwrap();
            assert_eq!(frame.len(), HEADER_SIZE + 8);
        }
    }

    #[test]
    fn test_frame_len_peek() {
        let bytes = encode_bytes(&Message::Data { payload: b"xyz" }, Side::Originator);
        assert_eq!(frame_len(&bytes), Some(bytes.len()));
        assert_eq!(frame_len(&bytes[..HEADER_SIZE]), Some(bytes.len()));
        assert_eq!(frame_len(&bytes[..HEADER_SIZE - 1]), None);
    }
}
