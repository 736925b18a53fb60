//! RLL codec (EP only): an 8-to-9-bit run-length-limiting line code with
//! differential whitening, bounding run lengths of equal bits for the tape
//! drive's PLL.
//!
//! `ENCODE_TABLE` is transcribed verbatim from
//! `original_source/codecs/bkr_rll.c`'s `rll_encode[]` (the source's own
//! 256-entry constant; spec.md 4.4 states this table "is a fixed constant
//! embedded in the implementation", so it is copied rather than re-derived
//! from a weight/run-length rule). The 512-entry inverse is built once from
//! it, matching `bkr_rll.c`'s own init-time loop (`rll_decode[rll_encode[i]]
//! = i`, with unmapped entries left as a sentinel) rather than being part of
//! the literal constant itself.

use once_cell::sync::Lazy;

const SYMBOL_BITS: u32 = 9;
const STATE_MASK: u16 = 0x1FF;
const INVALID_BYTE: u8 = 0;

/// `bkr_rll.c`'s `static const guint16 rll_encode[]`.
pub static ENCODE_TABLE: [u16; 256] = [
    0x089, 0x08a, 0x08b, 0x08c, 0x08d, 0x08e, 0x091, 0x092,
    0x093, 0x094, 0x095, 0x096, 0x099, 0x09a, 0x09b, 0x09c,
    0x09d, 0x09e, 0x0a2, 0x0a3, 0x0a4, 0x0a5, 0x0a6, 0x0a9,
    0x0aa, 0x0ab, 0x0ac, 0x0ad, 0x0ae, 0x0b1, 0x0b2, 0x0b3,
    0x0b4, 0x0b5, 0x0b6, 0x0b9, 0x0ba, 0x0bb, 0x0bc, 0x0bd,
    0x0be, 0x0c2, 0x0c3, 0x0c4, 0x0c5, 0x0c6, 0x0c9, 0x0ca,
    0x0cb, 0x0cc, 0x0cd, 0x0ce, 0x0d1, 0x0d2, 0x0d3, 0x0d4,
    0x0d5, 0x0d6, 0x0d9, 0x0da, 0x0db, 0x0dc, 0x0dd, 0x0de,
    0x0e1, 0x0e2, 0x0e3, 0x0e4, 0x0e5, 0x0e6, 0x0e9, 0x0ea,
    0x0eb, 0x0ec, 0x0ed, 0x0ee, 0x0f1, 0x0f2, 0x0f3, 0x0f4,
    0x0f5, 0x0f6, 0x0f9, 0x0fa, 0x0fb, 0x0fc, 0x0fd, 0x109,
    0x10a, 0x10b, 0x10c, 0x10d, 0x10e, 0x111, 0x112, 0x113,
    0x114, 0x115, 0x116, 0x119, 0x11a, 0x11b, 0x11c, 0x11d,
    0x11e, 0x121, 0x122, 0x123, 0x124, 0x125, 0x126, 0x129,
    0x12a, 0x12b, 0x12c, 0x12d, 0x12e, 0x131, 0x132, 0x133,
    0x134, 0x135, 0x136, 0x139, 0x13a, 0x13b, 0x13c, 0x13d,
    0x13e, 0x142, 0x143, 0x144, 0x145, 0x146, 0x149, 0x14a,
    0x14b, 0x14c, 0x14d, 0x14e, 0x151, 0x152, 0x153, 0x154,
    0x155, 0x156, 0x159, 0x15a, 0x15b, 0x15c, 0x15d, 0x15e,
    0x161, 0x162, 0x163, 0x164, 0x165, 0x166, 0x169, 0x16a,
    0x16b, 0x16c, 0x16d, 0x16e, 0x171, 0x172, 0x173, 0x174,
    0x175, 0x176, 0x179, 0x17a, 0x17b, 0x17c, 0x17d, 0x17e,
    0x184, 0x185, 0x186, 0x189, 0x18a, 0x18b, 0x18c, 0x18d,
    0x18e, 0x191, 0x192, 0x193, 0x194, 0x195, 0x196, 0x199,
    0x19a, 0x19b, 0x19c, 0x19d, 0x19e, 0x1a1, 0x1a2, 0x1a3,
    0x1a4, 0x1a5, 0x1a6, 0x1a9, 0x1aa, 0x1ab, 0x1ac, 0x1ad,
    0x1ae, 0x1b1, 0x1b2, 0x1b3, 0x1b4, 0x1b5, 0x1b6, 0x1b9,
    0x1ba, 0x1bb, 0x1bc, 0x1bd, 0x1be, 0x1c2, 0x1c3, 0x1c4,
    0x1c5, 0x1c6, 0x1c9, 0x1ca, 0x1cb, 0x1cc, 0x1cd, 0x1ce,
    0x1d1, 0x1d2, 0x1d3, 0x1d4, 0x1d5, 0x1d6, 0x1d9, 0x1da,
    0x1db, 0x1dc, 0x1dd, 0x1de, 0x1e1, 0x1e2, 0x1e3, 0x1e4,
    0x1e5, 0x1e6, 0x1e9, 0x1ea, 0x1eb, 0x1ec, 0x1ed, 0x1ee,
];

/// Built once from `ENCODE_TABLE`, the way `bkr_rll.c` populates its own
/// `rll_decode[512]` from `rll_encode[]` at init time. `once_cell::sync::Lazy`
/// is still needed here (unlike `format::FORMAT_TABLE`'s plain `static`)
/// because this table is an inversion computed from the literal constant
/// above, not itself a literal.
static DECODE_TABLE: Lazy<[i16; 512]> = Lazy::new(|| {
    let mut decode = [-1i16; 512];
    for (byte, &word) in ENCODE_TABLE.iter().enumerate() {
        decode[word as usize] = byte as i16;
    }
    decode
});

/// Encode `input` into a 9-bit-per-symbol modulated stream, packed MSB-first
/// into bytes. For `input.len()` a multiple of 8 the output is exactly
/// `9 * input.len() / 8` bytes with no partial trailing symbol.
pub fn rll_encode(input: &[u8]) -> Vec<u8> {
    let mut state: u16 = 0;
    let mut acc: u32 = 0;
    let mut nbits: u32 = 0;
    let mut out = Vec::with_capacity((input.len() * 9 + 7) / 8);
    for &b in input {
        let mut word = ENCODE_TABLE[b as usize];
        let mask = if state & 1 == 1 { STATE_MASK } else { 0 };
        word ^= mask;
        state = word & 1;

        acc = (acc << SYMBOL_BITS) | word as u32;
        nbits += SYMBOL_BITS;
        while nbits >= 8 {
            let shift = nbits - 8;
            out.push(((acc >> shift) & 0xFF) as u8);
            nbits -= 8;
        }
        acc &= (1u32 << nbits) - 1;
    }
    if nbits > 0 {
        out.push(((acc << (8 - nbits)) & 0xFF) as u8);
    }
    out
}

/// Inverse of `rll_encode`. Decodes as many whole 9-bit symbols as
/// `input.len() * 8 / 9` allows; a codeword with no table entry decodes to
/// a sentinel byte (the sector codec's RS layer is what actually flags the
/// corruption, per spec.md 4.4's "Decode" paragraph).
pub fn rll_decode(input: &[u8]) -> Vec<u8> {
    let decode = &*DECODE_TABLE;
    let nsymbols = input.len() * 8 / SYMBOL_BITS as usize;
    let mut out = Vec::with_capacity(nsymbols);
    let mut state: u16 = 0;
    let mut acc: u32 = 0;
    let mut nbits: u32 = 0;
    for &byte in input {
        acc = (acc << 8) | byte as u32;
        nbits += 8;
        while nbits >= SYMBOL_BITS && out.len() < nsymbols {
            let shift = nbits - SYMBOL_BITS;
            let raw = ((acc >> shift) & (STATE_MASK as u32)) as u16;
            nbits -= SYMBOL_BITS;
            acc &= (1u32 << nbits) - 1;

            let mask = if state & 1 == 1 { STATE_MASK } else { 0 };
            let word = raw ^ mask;
            state = raw & 1;

            let entry = decode[word as usize];
            out.push(if entry >= 0 { entry as u8 } else { INVALID_BYTE });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_table_is_a_bijection_on_256_entries() {
        let mut seen = std::collections::HashSet::new();
        for &w in ENCODE_TABLE.iter() {
            assert!(seen.insert(w), "duplicate codeword {:09b}", w);
        }
    }

    #[test]
    fn round_trips_aligned_lengths() {
        for len in [8usize, 16, 800, 2072] {
            let input: Vec<u8> = (0..len).map(|i| (i * 37 + 5) as u8).collect();
            let encoded = rll_encode(&input);
            assert_eq!(encoded.len(), len * 9 / 8);
            let decoded = rll_decode(&encoded);
            assert_eq!(decoded, input);
        }
    }

    #[test]
    fn round_trips_all_zero_and_all_one_bytes() {
        for fill in [0x00u8, 0xFF] {
            let input = vec![fill; 64];
            let encoded = rll_encode(&input);
            let decoded = rll_decode(&encoded);
            assert_eq!(decoded, input);
        }
    }
}
