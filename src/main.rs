//! Campus Card History CLI
//!
//! Reads a saved self-service response, decrypts it and outputs the
//! transactions as CSV, most recent first. Each row also carries the
//! narration, direction and signed yuan amount; a footer line closes the file
//! with the date range and net total.
//!
//! # Usage
//!
//! ```bash
//! ECARD_AES_KEY=... cargo run -- response.json > history.csv
//! ```
//!
//! Pass `-` to read the response from stdin.
//!
//! # Environment Variables
//!
//! - `ECARD_AES_KEY`: the shared AES key as text (16, 24 or 32 bytes)
//! - `ECARD_AES_KEY_HEX`: the same key hex-encoded, used when `ECARD_AES_KEY` is unset
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity

use ecard_history::{dedup_by_journal, write_csv, DecryptionKey, HistoryDecoder, HistoryError, Result};
use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(HistoryError::MissingArgument);
    }

    let key = DecryptionKey::from_env()?;

    let input_path = &args[1];
    let body = if input_path == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(input_path)?
    };

    let decoder = HistoryDecoder::new(key);
    let records = dedup_by_journal(decoder.decode_response(&body)?);

    let stdout = io::stdout();
    let handle = stdout.lock();
    write_csv(&records, handle)?;

    Ok(())
}
