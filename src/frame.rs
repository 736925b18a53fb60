//! Frame codec: assembles/disassembles video fields, embedding the
//! self-locating key byte pattern used for sector re-acquisition after a
//! drop-out.
//!
//! Grounded on `bkr_frame.c`'s `encode_field()`/`decode_field()` shape
//! (build a fresh output buffer rather than mutating in place, per
//! `DESIGN.md` Open Question 3) and on the teacher's preference for owned,
//! constructor-initialized state (`img::tracks::gcr::TrackEngine`) over
//! file-statics.

use crate::format::{FormatRecord, LEADER_FILL, TRAILER_FILL};

/// Fixed 32-byte pattern interleaved into every field's active area. Chosen
/// for a flat autocorrelation and no byte equal to either fill constant;
/// exact interop with historical recordings is out of scope (spec.md's
/// Non-goals), only the self-consistency tested by property 7 is required.
pub const KEY_SEQUENCE: [u8; 32] = [
    0x97, 0x3C, 0xC9, 0x5A, 0x6E, 0xD1, 0x84, 0x2B,
    0xF3, 0x58, 0xA6, 0x0D, 0x79, 0xE4, 0x1C, 0x82,
    0x4F, 0xB9, 0x36, 0xCD, 0x08, 0x93, 0x6A, 0xF1,
    0x5C, 0xD8, 0x27, 0xB4, 0x91, 0x3A, 0xE6, 0x0F,
];

/// Encode one sector's modulated bytes (`fmt.modulated_size()` long) into a
/// complete video field.
pub fn encode_field(payload: &[u8], fmt: &FormatRecord, odd: bool) -> Vec<u8> {
    assert_eq!(payload.len(), fmt.modulated_size());
    let total = fmt.field_size + if odd { fmt.interlace } else { 0 };
    let mut out = Vec::with_capacity(total);
    out.resize(fmt.leader, LEADER_FILL);

    let mut pi = 0usize;
    let mut produced = 0usize;
    let mut ki = 0usize;
    while produced < fmt.active_size {
        out.push(KEY_SEQUENCE[ki % 32]);
        ki += 1;
        produced += 1;
        for _ in 1..fmt.key_interval {
            if produced >= fmt.active_size {
                break;
            }
            out.push(payload[pi]);
            pi += 1;
            produced += 1;
        }
    }
    debug_assert_eq!(pi, payload.len());

    out.resize(out.len() + fmt.trailer, TRAILER_FILL);
    if odd {
        out.resize(out.len() + fmt.interlace, TRAILER_FILL);
    }
    out
}

/// Remove the interleaved key bytes from an `active_size`-byte slice,
/// recovering the original `modulated_size()`-byte payload.
fn extract_payload(active: &[u8], fmt: &FormatRecord) -> Vec<u8> {
    assert_eq!(active.len(), fmt.active_size);
    let mut out = Vec::with_capacity(fmt.modulated_size());
    let mut produced = 0usize;
    let mut pos = 0usize;
    while produced < fmt.active_size {
        pos += 1; // skip the key byte
        produced += 1;
        for _ in 1..fmt.key_interval {
            if produced >= fmt.active_size {
                break;
            }
            out.push(active[pos]);
            pos += 1;
            produced += 1;
        }
    }
    out
}

/// Per-stage statistics, the in-process analogue of the source's correlation
/// and gap counters (`bkr_frame.c`).
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameStats {
    pub worst_key_correlation: usize,
    pub best_nonkey_correlation: usize,
    pub smallest_gap: Option<usize>,
    pub largest_gap: Option<usize>,
    pub frame_errors: u64,
    pub fields_decoded: u64,
}

/// Scans an accumulating byte buffer for field boundaries via key
/// correlation and extracts payloads. Holds no buffer itself: the caller
/// (the pipeline's ring buffer stage, see `stream.rs`) owns storage and
/// drops the bytes this decoder reports as consumed.
pub struct FrameDecoder {
    fmt: &'static FormatRecord,
    locked: bool,
    last_active_start_abs: Option<usize>,
    pub stats: FrameStats,
}

/// Outcome of one `try_decode_field` call.
pub enum FieldResult {
    /// A field was found; drop `consumed` bytes from the front of the
    /// caller's buffer and pass `payload` downstream.
    Field { consumed: usize, payload: Vec<u8> },
    /// No lock found in the bytes available; caller should read more
    /// (`WouldBlock`), not stall.
    NeedMoreData,
}

impl FrameDecoder {
    pub fn new(fmt: &'static FormatRecord) -> Self {
        Self { fmt, locked: false, last_active_start_abs: None, stats: FrameStats::default() }
    }

    /// `abs_offset` is the total number of bytes already permanently
    /// consumed from this stream strictly before `buf[0]` (so that
    /// inter-field gaps can be measured across calls even though `buf`
    /// itself is re-sliced after every successful field).
    pub fn try_decode_field(&mut self, buf: &[u8], abs_offset: usize) -> FieldResult {
        let kl = self.fmt.key_length;
        let ki = self.fmt.key_interval;
        let span = (kl - 1) * ki + 1;
        if buf.len() < span {
            return FieldResult::NeedMoreData;
        }
        // 21/64 of the maximum correlation, per spec.md 4.5.
        let threshold = (21 * kl) / 64;
        let max_p = buf.len() - span;
        for p in 0..=max_p {
            let mut c = 0usize;
            for i in 0..kl {
                if buf[p + i * ki] == KEY_SEQUENCE[i % 32] {
                    c += 1;
                }
            }
            if c < threshold {
                if !self.locked {
                    self.stats.best_nonkey_correlation = self.stats.best_nonkey_correlation.max(c);
                }
                continue;
            }
            if p + self.fmt.active_size > buf.len() {
                return FieldResult::NeedMoreData;
            }

            if self.locked {
                self.stats.worst_key_correlation = if self.stats.fields_decoded == 0 {
                    c
                } else {
                    self.stats.worst_key_correlation.min(c)
                };
            } else {
                self.stats.worst_key_correlation = c;
            }

            let abs_start = abs_offset + p;
            if let Some(last) = self.last_active_start_abs {
                let gap = abs_start - last;
                self.stats.smallest_gap = Some(self.stats.smallest_gap.map_or(gap, |g| g.min(gap)));
                self.stats.largest_gap = Some(self.stats.largest_gap.map_or(gap, |g| g.max(gap)));
                let expected = self.fmt.frame_size(false) / 2;
                if gap * 3 > expected * 4 || expected * 3 > gap * 4 {
                    self.stats.frame_errors += 1;
                    log::warn!("inter-field gap {} deviates from expected {} by more than 4/3, counting a frame error", gap, expected);
                }
            }
            self.last_active_start_abs = Some(abs_start);
            self.locked = true;
            self.stats.fields_decoded += 1;

            let payload = extract_payload(&buf[p..p + self.fmt.active_size], self.fmt);
            let consumed = p + self.fmt.active_size + self.fmt.trailer;
            return FieldResult::Field { consumed, payload };
        }
        FieldResult::NeedMoreData
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Mode, VideoMode, BitDensity, SectorFormat, format_record};

    fn fmt_for(density: BitDensity, format: SectorFormat) -> &'static FormatRecord {
        format_record(Mode { video: VideoMode::Ntsc, density, format })
    }

    #[test]
    fn field_round_trips() {
        let fmt = fmt_for(BitDensity::High, SectorFormat::Sp);
        let payload: Vec<u8> = (0..fmt.modulated_size()).map(|i| (i * 31 + 7) as u8).collect();
        let field = encode_field(&payload, fmt, false);
        assert_eq!(field.len(), fmt.field_size);
        let extracted = extract_payload(&field[fmt.leader..fmt.leader + fmt.active_size], fmt);
        assert_eq!(extracted, payload);
    }

    #[test]
    fn odd_field_carries_interlace_padding() {
        let fmt = fmt_for(BitDensity::Low, SectorFormat::Ep);
        let payload = vec![0x55u8; fmt.modulated_size()];
        let field = encode_field(&payload, fmt, true);
        assert_eq!(field.len(), fmt.field_size + fmt.interlace);
    }

    #[test]
    fn decoder_locks_on_first_byte_of_leader() {
        let fmt = fmt_for(BitDensity::High, SectorFormat::Sp);
        let payload: Vec<u8> = (0..fmt.modulated_size()).map(|i| (i * 13 + 1) as u8).collect();
        let field = encode_field(&payload, fmt, false);
        let mut dec = FrameDecoder::new(fmt);
        match dec.try_decode_field(&field, 0) {
            FieldResult::Field { consumed, payload: got } => {
                assert_eq!(got, payload);
                assert!(consumed <= field.len());
            }
            FieldResult::NeedMoreData => panic!("expected a lock"),
        }
    }

    #[test]
    fn decoder_discards_prefix_garbage_before_lock() {
        let fmt = fmt_for(BitDensity::High, SectorFormat::Sp);
        let payload: Vec<u8> = (0..fmt.modulated_size()).map(|i| (i * 41 + 3) as u8).collect();
        let field = encode_field(&payload, fmt, false);
        let mut noisy = vec![0x11u8; 37];
        noisy.extend_from_slice(&field);
        let mut dec = FrameDecoder::new(fmt);
        match dec.try_decode_field(&noisy, 0) {
            FieldResult::Field { payload: got, .. } => assert_eq!(got, payload),
            FieldResult::NeedMoreData => panic!("expected a lock despite leading garbage"),
        }
    }
}
