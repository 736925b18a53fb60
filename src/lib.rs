//! # `bkrcodec` main library
//!
//! This library implements the Backer format: a way of recording arbitrary
//! digital data as an ordinary analog video signal, so that a consumer VCR
//! can stand in for a tape streamer. It covers everything between a flat
//! byte stream and a field of video samples.
//!
//! ## Architecture
//!
//! The format is a stack of independent codec stages, each owning one
//! transformation and handing its output to the next:
//! * [`sector`] frames a fixed-size chunk of user data with a numbered
//!   header, whitens it, and protects it with an inner Reed-Solomon code.
//! * [`outer`] spreads a 235-sector group of payload across a further
//!   Reed-Solomon code, column-wise, to survive whole dropped sectors
//!   (high-density EP modes only).
//! * [`rll`] run-length-limits the sector bytes into a 9-bit line code
//!   suitable for the tape channel (EP modes only).
//! * [`frame`] assembles/disassembles one video field: leader, a
//!   self-locating key pattern interleaved through the active area,
//!   trailer, and interlace padding.
//! * [`stream`] wires the stages together into whole-tape `Encoder`/
//!   `Decoder` pairs, including beginning/end-of-record framing and
//!   sequence-number tracking across dropouts.
//!
//! [`format`] is the configuration surface: a [`format::Mode`] resolves to
//! an immutable [`format::FormatRecord`] that every stage above sizes
//! itself from. [`rs`] is the shared Reed-Solomon primitive the sector and
//! outer stages both build on. [`error`] collects the taxonomy of things
//! that can go wrong while encoding or decoding.

pub mod error;
pub mod format;
pub mod frame;
pub mod outer;
pub mod ring;
pub mod rll;
pub mod rs;
pub mod sector;
pub mod stream;

pub use error::Error;
pub use format::Mode;
pub use stream::{Decoder, Encoder};
