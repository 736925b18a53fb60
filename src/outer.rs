//! Outer ECC codec (EP only): an RS(255,235) layer spread across a group of
//! 255 sectors, tolerating whole-sector erasures that the sector codec could
//! not correct.
//!
//! A group is logically a `255 x capacity` matrix: row `r` is sector `r`'s
//! `capacity`-byte payload, column `p` is one RS codeword. Stored row-major
//! in one flat buffer, a column's symbols sit `capacity` bytes apart, which
//! is exactly the `interleave` stride `rs::ReedSolomon` already supports.

use crate::error::Error;
use crate::format::{FormatRecord, GENERIC_FILL};
use crate::rs::{GaloisField, ReedSolomon};

pub const GROUP_SECTORS: usize = 255;
pub const OUTER_K: usize = 235;
pub const OUTER_PARITY: usize = GROUP_SECTORS - OUTER_K;

/// Running counters for the outer ECC stage, the in-process analogue of the
/// source's `/proc` group statistics (`bkr_ecc2.c`'s `worst_group`).
#[derive(Debug,Default,Clone,Copy)]
pub struct OuterStats {
    pub groups_encoded: u64,
    pub groups_decoded: u64,
    pub worst_erasures_in_a_group: usize,
    pub uncorrectable_columns: u64,
}

pub struct OuterCodec {
    rs: ReedSolomon,
    capacity: usize,
}

impl OuterCodec {
    pub fn new(fmt: &'static FormatRecord) -> Self {
        let gf = GaloisField::backer_default();
        let rs = ReedSolomon::new(gf, GROUP_SECTORS, OUTER_K);
        Self { rs, capacity: fmt.sector_capacity }
    }

    pub fn capacity(&self) -> usize { self.capacity }
    /// Max user bytes one group can carry (reserves the trailing length word).
    pub fn max_payload(&self) -> usize { OUTER_K * self.capacity - 4 }

    /// Encode `payload` (`<= max_payload()`) into 255 sector-sized rows
    /// (`GROUP_SECTORS * capacity` bytes total, row `r` at `[r*capacity,
    /// (r+1)*capacity)`), ready to be handed one row at a time to the
    /// sector encoder.
    pub fn encode_group(&self, payload: &[u8]) -> Vec<Vec<u8>> {
        assert!(payload.len() <= self.max_payload());
        let cap = self.capacity;
        let mut data = vec![0u8; OUTER_K * cap];
        data[..payload.len()].copy_from_slice(payload);
        for b in data[payload.len()..OUTER_K * cap - 4].iter_mut() {
            *b = GENERIC_FILL;
        }
        let len_pos = OUTER_K * cap - 4;
        data[len_pos..len_pos + 4].copy_from_slice(&(payload.len() as u32).to_le_bytes());

        let mut parity = vec![0u8; OUTER_PARITY * cap];
        for p in 0..cap {
            self.rs.encode(&data[p..], cap, &mut parity[p..], cap);
        }

        let mut rows = Vec::with_capacity(GROUP_SECTORS);
        for r in 0..OUTER_K {
            rows.push(data[r * cap..(r + 1) * cap].to_vec());
        }
        for r in 0..OUTER_PARITY {
            rows.push(parity[r * cap..(r + 1) * cap].to_vec());
        }
        rows
    }

    /// Decode a group of exactly `GROUP_SECTORS` rows (`capacity` bytes
    /// each; missing/uncorrectable rows may be any placeholder content as
    /// long as their index is listed in `erasures`). Returns the recovered
    /// user payload. Never fails outright: per spec.md's "Failure
    /// semantics", more than `OUTER_PARITY` erasures in a column leaves that
    /// column's bytes as received and is counted in `stats`.
    pub fn decode_group(&self, rows: &[Vec<u8>], erasures: &[usize], stats: &mut OuterStats) -> Result<Vec<u8>,Error> {
        assert_eq!(rows.len(), GROUP_SECTORS);
        let cap = self.capacity;
        let mut data = vec![0u8; OUTER_K * cap];
        let mut parity = vec![0u8; OUTER_PARITY * cap];
        for (r, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), cap);
            if r < OUTER_K {
                data[r * cap..(r + 1) * cap].copy_from_slice(row);
            } else {
                let pr = r - OUTER_K;
                parity[pr * cap..(pr + 1) * cap].copy_from_slice(row);
            }
        }

        // RS codeword positions: [0,parity) address the parity rows,
        // [parity,n) address data rows at (pos - parity).
        let rs_erasures: Vec<usize> = erasures.iter().map(|&r| {
            if r >= OUTER_K { r - OUTER_K } else { OUTER_PARITY + r }
        }).collect();

        stats.groups_decoded += 1;
        stats.worst_erasures_in_a_group = stats.worst_erasures_in_a_group.max(erasures.len());

        for p in 0..cap {
            let mut col_erasures = rs_erasures.clone();
            col_erasures.sort_unstable();
            if self.rs.decode(&mut parity[p..], cap, &mut data[p..], cap, &col_erasures).is_err() {
                stats.uncorrectable_columns += 1;
                log::warn!("outer RS column {} uncorrectable with {} erasure(s), bytes left as received", p, col_erasures.len());
            }
        }

        let len_pos = OUTER_K * cap - 4;
        let declared = u32::from_le_bytes(data[len_pos..len_pos + 4].try_into().unwrap()) as usize;
        let declared = declared.min(self.max_payload());
        Ok(data[..declared].to_vec())
    }
}
