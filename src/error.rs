//! # Error taxonomy
//!
//! One enum per concern, `thiserror`-derived, the way the rest of this crate
//! names its errors (see `commands::CommandError`, `img::Error`).

/// Errors returned by the Reed-Solomon kernel's decoder.
///
/// Named after the numeric codes in the original C decoder
/// (`RS_EDEGENERATEROOTS`, `RS_EFORNEY`, `RS_EINVALIDROOT`).
#[derive(thiserror::Error,Debug,Clone,Copy,PartialEq,Eq)]
pub enum RsError {
    #[error("error locator polynomial has degenerate roots")]
    DegenerateRoots,
    #[error("division by zero in Forney's algorithm")]
    Forney,
    #[error("erasure or error location outside [0,n)")]
    InvalidRoot,
}

/// Codec-stage error taxonomy, per the error handling design.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    /// Transient: input not yet full, or output has no room for one chunk.
    #[error("would block")]
    WouldBlock,
    /// Terminal: decoder reached EOR, or encoder's source hit EOF.
    #[error("end of stream")]
    EndOfStream,
    /// A sector's inner RS decode failed.
    #[error("bad sector")]
    BadSector,
    /// Outer RS decode found more erasures than parity allows.
    #[error("uncorrectable")]
    Uncorrectable,
    /// RS decoder invariant violated.
    #[error("malformed codec state: {0}")]
    MalformedCodec(#[from] RsError),
    /// No progress within the stage's timeout.
    #[error("timeout")]
    Timeout,
    /// Fatal at setup; never raised mid-stream.
    #[error("out of memory")]
    OutOfMemory,
    /// A mode bitfield did not decode to a known video/density/format triple.
    #[error("invalid mode bits: {0:#06x}")]
    InvalidMode(u16),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type DYNERR = Box<dyn std::error::Error>;
pub type STDRESULT = Result<(),DYNERR>;
