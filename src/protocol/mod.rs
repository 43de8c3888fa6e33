//! Protocol Layer: Flat Binary Frames, Side-Aware
//!
//! Prinsip desain:
//! - Flat binary: header fixed 16 byte, payload langsung di belakangnya
//! - Direction checking: setiap kind tahu sisi mana yang boleh mengirimnya
//! - No allocation: encode ke pre-allocated buffer, decode meminjam input

mod encoder;
mod message;

pub use encoder::{decode, frame_len, CodecError, EncodedFrame, Encoder};
pub use message::{
    crc32_fast, Message, MessageKind, Side, HEADER_SIZE, MAGIC, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE,
    VERSION,
};
