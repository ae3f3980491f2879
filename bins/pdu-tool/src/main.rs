use clap::Parser;

use docsis_core::{BitBuffer, Direction, PduParseErr};

mod entities;
use entities::mac::MacParser;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "DOCSIS Raw MAC Frame Decoder",
    long_about = "Decodes a raw MAC frame, given as hex or as a bitstring, and prints its headers and payload"
)]
struct Args {
    /// Direction: upstream or downstream
    #[arg(help = "Direction: [ us | ds ]")]
    direction: String,

    /// Raw frame to decode
    #[arg(help = "Frame bytes as hex (whitespace and ':' allowed), or a bitstring with --bits")]
    frame: String,

    #[arg(short = 'b', long = "bits", help = "Interpret the frame argument as a string of 0s and 1s")]
    bits: bool,
}

fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
    let digits = digits.strip_prefix("0x").unwrap_or(&digits);
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits ({})", digits.len()));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|e| format!("bad hex at {}: {}", i, e)))
        .collect()
}

fn parse_bits(s: &str) -> Result<Vec<u8>, String> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    match BitBuffer::from_bitstr(&digits) {
        Ok(buf) => Ok(buf.into_bytes()),
        Err(PduParseErr::InvalidValue { value, .. }) => Err(format!("bitstring may only hold 0 and 1, found '{}'", digits.chars().nth(value as usize).unwrap_or('?'))),
        Err(e) => Err(e.to_string()),
    }
}

fn main() {
    eprintln!("[+] DOCSIS MAC frame decoding tool");

    let args = Args::parse();

    let direction = match args.direction.to_lowercase().as_str() {
        "us" | "up" | "upstream" => Direction::Upstream,
        "ds" | "down" | "downstream" => Direction::Downstream,
        _ => {
            eprintln!("Error: Unsupported direction '{}'. Use: us, ds", args.direction);
            std::process::exit(1);
        }
    };

    let parsed = if args.bits { parse_bits(&args.frame) } else { parse_hex(&args.frame) };
    let frame = match parsed {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    MacParser::parse(&frame, direction);
}
