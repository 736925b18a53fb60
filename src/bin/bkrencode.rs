//! # Command line front end
//!
//! Reads a raw byte stream from stdin, runs it through the codec pipeline in
//! one direction or the other, and writes the result to stdout. Set
//! `RUST_LOG` to control logging verbosity (levels: trace,debug,info,warn,error).

use std::io::{Read, Write};

use clap::{arg, crate_version, ArgAction, Command};

use bkrcodec::format::{BitDensity, Mode, SectorFormat, VideoMode};
use bkrcodec::sector::SectorCodec;
use bkrcodec::{Decoder, Encoder};

#[derive(thiserror::Error, Debug)]
enum CommandError {
    #[error("could not read stdin: {0}")]
    Stdin(std::io::Error),
    #[error("could not write stdout: {0}")]
    Stdout(std::io::Error),
}

fn build_cli() -> Command {
    let long_help = "bkrencode converts between a raw byte stream and a Backer-format \
video byte stream.
Set RUST_LOG to control logging verbosity.
  levels: trace,debug,info,warn,error

Examples:
---------
Encode for recording:   `bkrencode -Dh -Fe -Vn < data.bin > tape.bkr`
Decode after playback:  `bkrencode -u -Dh -Fe -Vn < tape.bkr > data.bin`";
    Command::new("bkrencode")
        .version(crate_version!())
        .about("encode or decode a Backer-format video byte stream")
        .long_about(long_help)
        .arg(arg!(-D --density <density> "bit density").value_parser(["h", "l"]).default_value("h"))
        .arg(arg!(-F --format <format> "sector format").value_parser(["s", "e"]).default_value("e"))
        .arg(arg!(-V --video <standard> "video standard").value_parser(["n", "p"]).default_value("n"))
        .arg(arg!(-u --decode "decode instead of encode").action(ArgAction::SetTrue))
        .arg(arg!(-s --"skip-bad" "skip sectors the inner code cannot correct instead of counting them").action(ArgAction::SetTrue))
        .arg(arg!(-t --"time-only" "report the estimated record duration and exit, without coding").action(ArgAction::SetTrue))
        .arg(arg!(-v --verbose "print stage statistics to stderr on completion").action(ArgAction::SetTrue))
}

fn mode_from_matches(matches: &clap::ArgMatches) -> Mode {
    let density = match matches.get_one::<String>("density").map(String::as_str) {
        Some("l") => BitDensity::Low,
        _ => BitDensity::High,
    };
    let format = match matches.get_one::<String>("format").map(String::as_str) {
        Some("s") => SectorFormat::Sp,
        _ => SectorFormat::Ep,
    };
    let video = match matches.get_one::<String>("video").map(String::as_str) {
        Some("p") => VideoMode::Pal,
        _ => VideoMode::Ntsc,
    };
    Mode { video, density, format }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let matches = build_cli().get_matches();
    let mode = mode_from_matches(&matches);
    let verbose = matches.get_flag("verbose");

    if matches.get_flag("time-only") {
        let mut input = Vec::new();
        std::io::stdin().read_to_end(&mut input).map_err(CommandError::Stdin)?;
        let fields = estimate_field_count(&input, mode);
        let seconds = fields as f64 / mode.fields_per_second() as f64;
        println!("{:.2} seconds", seconds);
        return Ok(());
    }

    let mut input = Vec::new();
    std::io::stdin().read_to_end(&mut input).map_err(CommandError::Stdin)?;

    if matches.get_flag("decode") {
        let mut decoder = Decoder::new(mode);
        decoder.push(&input);
        let output = decoder.take_output();
        std::io::stdout().write_all(&output).map_err(CommandError::Stdout)?;
        if verbose {
            eprintln!("{:?}", decoder.stats);
            eprintln!("{:?}", decoder.sector_stats);
            eprintln!("{:?}", decoder.frame_stats());
            eprintln!("{:?}", decoder.outer_stats);
        }
        if !matches.get_flag("skip-bad") && decoder.stats.sectors_lost > 0 {
            return Err(format!("{} sector(s) could not be recovered", decoder.stats.sectors_lost).into());
        }
    } else {
        let mut encoder = Encoder::new(mode, 0);
        let output = encoder.encode(&input);
        std::io::stdout().write_all(&output).map_err(CommandError::Stdout)?;
    }
    Ok(())
}

/// Number of fields a stream of `input.len()` data bytes will occupy once
/// BOR/EOR framing and per-sector overhead are accounted for; used only by
/// `--time-only`, which never actually runs the codec.
fn estimate_field_count(input: &[u8], mode: Mode) -> u64 {
    let capacity = SectorCodec::new(mode.format_record()).capacity() as u64;
    let data_fields = if capacity == 0 { 0 } else { (input.len() as u64 + capacity - 1) / capacity };
    let bor_fields = bkrcodec::format::BOR_LENGTH_SECONDS as u64 * mode.sectors_per_second() as u64;
    let eor_fields = bkrcodec::format::EOR_LENGTH_SECONDS as u64 * mode.sectors_per_second() as u64;
    data_fields + bor_fields + eor_fields
}
