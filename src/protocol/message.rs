//! Format Frame Biner Side-Aware
//!
//! Layout:
//! ┌─────────────────────────────────────────────────────┐
//! │ FrameHeader (16 bytes, fixed)                       │
//! ├─────────────────────────────────────────────────────┤
//! │ Payload (variable, max 64KB)                        │
//! └─────────────────────────────────────────────────────┘
//!
//! Setiap message kind punya arah pengiriman yang legal (originator vs
//! recipient), sehingga decoder bisa menolak pesan yang tidak sah
//! untuk dikirim oleh peer.

/// Sisi mana yang sedang melakukan encode/decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Pihak yang membuka koneksi
    Originator,
    /// Pihak yang menerima koneksi
    Recipient,
}

impl Side {
    /// Lawan bicara dari sisi ini
    #[inline(always)]
    pub fn peer(self) -> Side {
        match self {
            Side::Originator => Side::Recipient,
            Side::Recipient => Side::Originator,
        }
    }
}

/// Tipe pesan dalam protokol
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Handshake pembuka dari originator
    Hello = 1,
    /// Balasan handshake dengan session id
    Welcome = 2,
    /// Probe latency dari originator
    Ping = 3,
    /// Echo nonce dari recipient
    Pong = 4,
    /// Payload aplikasi opaque
    Data = 5,
    /// Disconnect notice dengan alasan (boleh kosong)
    Disconnect = 6,
}

impl MessageKind {
    #[inline(always)]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Hello),
            2 => Some(Self::Welcome),
            3 => Some(Self::Ping),
            4 => Some(Self::Pong),
            5 => Some(Self::Data),
            6 => Some(Self::Disconnect),
            _ => None,
        }
    }

    /// Apakah `side` boleh mengirim kind ini
    #[inline(always)]
    pub fn legal_from(self, side: Side) -> bool {
        match self {
            Self::Hello | Self::Ping => side == Side::Originator,
            Self::Welcome | Self::Pong => side == Side::Recipient,
            Self::Data | Self::Disconnect => true,
        }
    }
}

/// Pesan hasil decode; payload meminjam langsung dari buffer input
/// (zero-copy untuk `Hello`, `Data`, dan `Disconnect`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message<'a> {
    Hello { client: &'a str },
    Welcome { session: u64 },
    Ping { nonce: u64 },
    Pong { nonce: u64 },
    Data { payload: &'a [u8] },
    Disconnect { reason: &'a str },
}

impl Message<'_> {
    #[inline(always)]
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Hello { .. } => MessageKind::Hello,
            Message::Welcome { .. } => MessageKind::Welcome,
            Message::Ping { .. } => MessageKind::Ping,
            Message::Pong { .. } => MessageKind::Pong,
            Message::Data { .. } => MessageKind::Data,
            Message::Disconnect { .. } => MessageKind::Disconnect,
        }
    }

    /// Panjang payload setelah di-encode
    #[inline(always)]
    pub fn payload_len(&self) -> usize {
        match self {
            Message::Hello { client } => client.len(),
            Message::Welcome { .. } | Message::Ping { .. } | Message::Pong { .. } => 8,
            Message::Data { payload } => payload.len(),
            Message::Disconnect { reason } => reason.len(),
        }
    }
}

pub const HEADER_SIZE: usize = 16;
pub const MAGIC: u32 = 0x544C_5241; // "TLRA"
pub const VERSION: u8 = 1;
pub const MAX_PAYLOAD_SIZE: usize = 65536; // 64KB max payload
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// Checksum payload (simple, fast)
#[inline(always)]
pub fn crc32_fast(data: &[u8]) -> u32 {
    // Simple Adler-32 variant untuk speed
    let mut a: u32 = 1;
    let mut b: u32 = 0;

    for &byte in data {
        a = a.wrapping_add(byte as u32);
        b = b.wrapping_add(a);
    }

    (b << 16) | a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for raw in 1u8..=6 {
            let kind = MessageKind::from_u8(raw).unwrap();
            assert_eq!(kind as u8, raw);
        }
        assert_eq!(MessageKind::from_u8(0), None);
        assert_eq!(MessageKind::from_u8(7), None);
        assert_eq!(MessageKind::from_u8(255), None);
    }

    #[test]
    fn test_direction_rules() {
        assert!(MessageKind::Hello.legal_from(Side::Originator));
        assert!(!MessageKind::Hello.legal_from(Side::Recipient));
        assert!(MessageKind::Welcome.legal_from(Side::Recipient));
        assert!(!MessageKind::Welcome.legal_from(Side::Originator));
        assert!(!MessageKind::Pong.legal_from(Side::Originator));

        // Data dan Disconnect boleh dari dua arah
        for side in [Side::Originator, Side::Recipient] {
            assert!(MessageKind::Data.legal_from(side));
            assert!(MessageKind::Disconnect.legal_from(side));
        }
    }

    #[test]
    fn test_peer_is_involution() {
        assert_eq!(Side::Originator.peer(), Side::Recipient);
        assert_eq!(Side::Recipient.peer().peer(), Side::Recipient);
    }

    #[test]
    fn test_checksum_never_zero() {
        // Adler variant dimulai dari a=1, jadi 0 tidak mungkin muncul
        assert_ne!(crc32_fast(&[]), 0);
        assert_ne!(crc32_fast(&[0u8; 64]), 0);
    }
}
