//! Mode resolution and the static format table.
//!
//! A [`Mode`] is the crate's only configuration surface: `(VideoMode,
//! BitDensity, SectorFormat)`. It is resolved once and then used to look up
//! an immutable [`FormatRecord`] that every codec stage sizes itself from.

use crate::error::Error;

#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash)]
pub enum VideoMode {
    Ntsc,
    Pal,
}

#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash)]
pub enum BitDensity {
    Low,
    High,
}

#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash)]
pub enum SectorFormat {
    Sp,
    Ep,
}

/// `(videomode, bitdensity, sectorformat)`, immutable for the lifetime of a pipeline.
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash)]
pub struct Mode {
    pub video: VideoMode,
    pub density: BitDensity,
    pub format: SectorFormat,
}

// Mode bitfield, exposed historically through /proc and MTIOCGET.mt_dsreg.
pub const BKR_NTSC: u16 = 0x0001;
pub const BKR_PAL: u16 = 0x0002;
pub const BKR_LOW: u16 = 0x0004;
pub const BKR_HIGH: u16 = 0x0008;
pub const BKR_RAW: u16 = 0x0000;
pub const BKR_SP: u16 = 0x0010;
pub const BKR_EP: u16 = 0x0020;

impl Mode {
    pub fn to_bits(&self) -> u16 {
        let video = match self.video { VideoMode::Ntsc => BKR_NTSC, VideoMode::Pal => BKR_PAL };
        let density = match self.density { BitDensity::Low => BKR_LOW, BitDensity::High => BKR_HIGH };
        let format = match self.format { SectorFormat::Sp => BKR_SP, SectorFormat::Ep => BKR_EP };
        video | density | format
    }

    pub fn from_bits(bits: u16) -> Result<Self,Error> {
        let video = match bits & (BKR_NTSC|BKR_PAL) {
            BKR_NTSC => VideoMode::Ntsc,
            BKR_PAL => VideoMode::Pal,
            _ => return Err(Error::InvalidMode(bits)),
        };
        let density = match bits & (BKR_LOW|BKR_HIGH) {
            BKR_LOW => BitDensity::Low,
            BKR_HIGH => BitDensity::High,
            _ => return Err(Error::InvalidMode(bits)),
        };
        let format = match bits & (BKR_RAW|BKR_SP|BKR_EP) {
            BKR_SP => SectorFormat::Sp,
            BKR_EP => SectorFormat::Ep,
            _ => return Err(Error::InvalidMode(bits)),
        };
        Ok(Self { video, density, format })
    }

    /// Fields per second of raw video at this mode's video standard.
    pub fn fields_per_second(&self) -> u32 {
        match self.video {
            VideoMode::Ntsc => 60,
            VideoMode::Pal => 50,
        }
    }

    /// Sectors per second, used to size BOR/EOR record framing.
    pub fn sectors_per_second(&self) -> u32 {
        2 * self.fields_per_second()
    }

    pub fn format_record(&self) -> &'static FormatRecord {
        format_record(*self)
    }
}

/// One row of the format table: every byte count a codec stage needs to size
/// its buffers, for one `Mode`.
#[derive(Debug,Clone,Copy)]
pub struct FormatRecord {
    pub bytes_per_line: usize,
    pub field_size: usize,
    pub interlace: usize,
    pub leader: usize,
    pub trailer: usize,
    pub active_size: usize,
    pub key_interval: usize,
    pub key_length: usize,
    pub rll: bool,
    /// Pre-modulation byte count fed to the RLL codec (`data_size +
    /// parity_size`); zero/unused when `rll` is false.
    pub rll_capacity: usize,
    pub modulation_pad: usize,
    pub interleave: usize,
    pub parity_size: usize,
    pub data_size: usize,
    /// User payload bytes per sector, i.e. `data_size - sizeof(header)`.
    pub sector_capacity: usize,
}

impl FormatRecord {
    pub fn frame_size(&self, field_is_odd: bool) -> usize {
        2 * self.field_size + if field_is_odd { self.interlace } else { 0 }
    }

    /// Post-modulation byte count the frame layer's active area must carry
    /// for one sector, excluding the embedded key bytes.
    pub fn modulated_size(&self) -> usize {
        if self.rll { self.rll_capacity + self.modulation_pad } else { self.data_size + self.parity_size }
    }
}

// Eight rows, one per (density, videomode, format) combination. RAW mode has
// no sector/RS framing of its own and is out of scope (see spec Non-goals).
//
// `data_size`/`parity_size`/`interleave`/`sector_capacity` are grounded on
// original_source/codecs/bkr_splp.c's format() table (struct bkr_splp_format
// is { data_size, parity_size, capacity, interleave }, with
// `capacity = data_size - sizeof(header)` per that file's own comment).
// `field_size`, `interlace`, `leader`, `trailer`, `active_size`, `key_length`
// are grounded on bkr_frame.c's format() table. `bytes_per_line` is
// density-only (BYTES_PER_LINE_LOW/HIGH in backer_driv/backer.h).
// `rll_capacity`/`modulation_pad` (EP rows only) are grounded on
// bkr_rll.c's compute_format() table; `rll_capacity` there equals
// `data_size + parity_size` for the same row (the RLL codec modulates the
// sector codec's full on-wire output, not just its data region), and
// `rll_capacity + modulation_pad` equals `active_size - key_length` (the
// modulated bytes plus the interleaved key bytes exactly fill the active
// area) for every EP row below.
//
// `key_interval` diverges from spec.md's own three-row excerpt by a small
// amount (e.g. the low-NTSC-EP row's key_interval is 44 here vs. 42 in the
// excerpt). The excerpt's value fails the format's own stated invariant
// (key_length == ceil(active_size/key_interval): ceil(940/42) = 23, not the
// excerpt's stated 22) while the source's value satisfies it exactly
// (ceil(940/44) = 22), so the source is treated as authoritative here; see
// DESIGN.md.
static FORMAT_TABLE: [FormatRecord;8] = [
    // low, NTSC, EP ("nle")
    FormatRecord { bytes_per_line: 4, field_size: 1012, interlace: 4, leader: 40, trailer: 32,
        active_size: 940, key_interval: 44, key_length: 22, rll: true, rll_capacity: 816, modulation_pad: 102,
        interleave: 12, parity_size: 96, data_size: 720, sector_capacity: 716 },
    // low, NTSC, SP
    FormatRecord { bytes_per_line: 4, field_size: 1012, interlace: 4, leader: 32, trailer: 28,
        active_size: 952, key_interval: 45, key_length: 22, rll: false, rll_capacity: 0, modulation_pad: 0,
        interleave: 10, parity_size: 100, data_size: 830, sector_capacity: 826 },
    // low, PAL, EP
    FormatRecord { bytes_per_line: 4, field_size: 1220, interlace: 0, leader: 48, trailer: 36,
        active_size: 1136, key_interval: 40, key_length: 29, rll: true, rll_capacity: 984, modulation_pad: 123,
        interleave: 12, parity_size: 96, data_size: 888, sector_capacity: 884 },
    // low, PAL, SP
    FormatRecord { bytes_per_line: 4, field_size: 1220, interlace: 0, leader: 40, trailer: 36,
        active_size: 1144, key_interval: 49, key_length: 24, rll: false, rll_capacity: 0, modulation_pad: 0,
        interleave: 14, parity_size: 140, data_size: 980, sector_capacity: 976 },
    // high, NTSC, EP
    FormatRecord { bytes_per_line: 10, field_size: 2530, interlace: 10, leader: 100, trailer: 70,
        active_size: 2360, key_interval: 84, key_length: 29, rll: true, rll_capacity: 2072, modulation_pad: 259,
        interleave: 28, parity_size: 224, data_size: 1848, sector_capacity: 1844 },
    // high, NTSC, SP
    FormatRecord { bytes_per_line: 10, field_size: 2530, interlace: 10, leader: 80, trailer: 70,
        active_size: 2380, key_interval: 125, key_length: 20, rll: false, rll_capacity: 0, modulation_pad: 0,
        interleave: 20, parity_size: 200, data_size: 2160, sector_capacity: 2156 },
    // high, PAL, EP
    FormatRecord { bytes_per_line: 10, field_size: 3050, interlace: 0, leader: 120, trailer: 90,
        active_size: 2840, key_interval: 91, key_length: 32, rll: true, rll_capacity: 2496, modulation_pad: 312,
        interleave: 26, parity_size: 208, data_size: 2288, sector_capacity: 2284 },
    // high, PAL, SP
    FormatRecord { bytes_per_line: 10, field_size: 3050, interlace: 0, leader: 100, trailer: 90,
        active_size: 2860, key_interval: 136, key_length: 22, rll: false, rll_capacity: 0, modulation_pad: 0,
        interleave: 22, parity_size: 220, data_size: 2618, sector_capacity: 2614 },
];

fn table_index(mode: Mode) -> usize {
    let density = match mode.density { BitDensity::Low => 0, BitDensity::High => 4 };
    let video = match mode.video { VideoMode::Ntsc => 0, VideoMode::Pal => 2 };
    let format = match mode.format { SectorFormat::Ep => 0, SectorFormat::Sp => 1 };
    density + video + format
}

pub fn format_record(mode: Mode) -> &'static FormatRecord {
    &FORMAT_TABLE[table_index(mode)]
}

pub const LEADER_FILL: u8 = 0xE2;
pub const TRAILER_FILL: u8 = 0x33;
pub const GENERIC_FILL: u8 = 0x33;
pub const RANDOMIZER_MULTIPLIER: u32 = 1664525;
pub const RANDOMIZER_OFFSET: u32 = 1013904223;
pub const RS_GENERATOR_POLY: u16 = 0x11D;
pub const BOR_LENGTH_SECONDS: u32 = 5;
pub const EOR_LENGTH_SECONDS: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_round_trip() {
        for video in [VideoMode::Ntsc, VideoMode::Pal] {
            for density in [BitDensity::Low, BitDensity::High] {
                for format in [SectorFormat::Sp, SectorFormat::Ep] {
                    let mode = Mode { video, density, format };
                    let back = Mode::from_bits(mode.to_bits()).unwrap();
                    assert_eq!(mode, back);
                }
            }
        }
    }

    #[test]
    fn mode_bits_match_spec_constants() {
        assert_eq!(BKR_NTSC, 0x0001);
        assert_eq!(BKR_PAL, 0x0002);
        assert_eq!(BKR_LOW, 0x0004);
        assert_eq!(BKR_HIGH, 0x0008);
        assert_eq!(BKR_RAW, 0x0000);
        assert_eq!(BKR_SP, 0x0010);
        assert_eq!(BKR_EP, 0x0020);
    }

    #[test]
    fn key_length_matches_active_size_invariant() {
        for rec in FORMAT_TABLE.iter() {
            let expected = (rec.active_size + rec.key_interval - 1) / rec.key_interval;
            assert_eq!(rec.key_length, expected);
        }
    }

    #[test]
    fn modulated_size_plus_keys_fills_active_area() {
        for rec in FORMAT_TABLE.iter().filter(|r| r.rll) {
            assert_eq!(rec.modulated_size() + rec.key_length, rec.active_size);
        }
    }

    #[test]
    fn data_size_divides_evenly_by_interleave() {
        for rec in FORMAT_TABLE.iter() {
            assert_eq!(rec.data_size % rec.interleave, 0);
            assert_eq!(rec.parity_size % rec.interleave, 0);
        }
    }

    #[test]
    fn fields_per_second_matches_video_standard() {
        let ntsc = Mode { video: VideoMode::Ntsc, density: BitDensity::Low, format: SectorFormat::Ep };
        let pal = Mode { video: VideoMode::Pal, density: BitDensity::Low, format: SectorFormat::Ep };
        assert_eq!(ntsc.fields_per_second(), 60);
        assert_eq!(pal.fields_per_second(), 50);
    }
}
