//! # Campus Card History Decoder
//!
//! Decrypts the transaction history returned by the campus card self-service
//! endpoint and produces records ordered from most recent to oldest.
//!
//! ## Design Principles
//!
//! - **Opaque transport**: the HTTP call is someone else's job; decoding starts
//!   from the single encrypted string the service returns
//! - **Injected key**: the AES key comes from configuration, never from code
//! - **Open records**: only `txdate` is typed, every other field passes through
//! - **Deterministic output**: stable descending sort on the date string
//!
//! ## Example
//!
//! ```no_run
//! use ecard_history::{DecryptionKey, HistoryDecoder};
//!
//! let key = DecryptionKey::from_env().unwrap();
//! let decoder = HistoryDecoder::new(key);
//! let body = std::fs::read_to_string("response.json").unwrap();
//! let records = decoder.decode_response(&body).unwrap();
//! ecard_history::write_csv(&records, std::io::stdout()).unwrap();
//! ```

pub mod cipher;
pub mod envelope;
pub mod error;
pub mod money;
pub mod pipeline;
pub mod record;

pub use cipher::DecryptionKey;
pub use envelope::Envelope;
pub use error::{EnvelopeDefect, HistoryError, Result};
pub use money::Yuan;
pub use pipeline::{write_csv, HistoryDecoder};
pub use record::{
    dedup_by_journal, order_by_date_desc, parse_payload, Direction, TransactionRecord,
};
