//! Protocol module - the Pixelflut line codec.
//!
//! Pixelflut is a newline-terminated ASCII protocol with three messages:
//! size query, pixel read, and pixel write. This module is pure
//! encode/decode with no I/O; the [`crate::connection`] module drives it
//! over a socket.

mod wire;

pub use wire::{
    decode_read_response, decode_size_response, encode_read_request, encode_size_request,
    encode_write_request, write_read_request, write_write_request, PX_COMMAND, SIZE_COMMAND,
};
