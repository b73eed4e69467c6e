//! Decrypt-decode pipeline.
//!
//! Splits the envelope, decrypts it, parses the payload and orders the rows.
//! The first failing stage ends the run; no partial results are returned.

use crate::cipher::DecryptionKey;
use crate::envelope::Envelope;
use crate::error::Result;
use crate::money::Yuan;
use crate::record::{order_by_date_desc, parse_payload, TransactionRecord};
use csv::WriterBuilder;
use log::{debug, info, warn};
use serde_json::Value;
use std::io::Write;

/// Card statement columns, in export order.
pub const CSV_COLUMNS: [&str; 24] = [
    "summary",
    "posjourno",
    "idserial",
    "txaccno",
    "inputuserid",
    "pcode",
    "poscode",
    "accno",
    "txcode",
    "cardno",
    "txdate",
    "txname",
    "stationcode",
    "identityno",
    "sts",
    "balance",
    "journo",
    "regdate",
    "departid",
    "id",
    "txamt",
    "meraddr",
    "username",
    "mername",
];

/// Columns computed from each record, appended after [`CSV_COLUMNS`].
pub const DERIVED_COLUMNS: [&str; 4] = ["narration", "direction", "amount_yuan", "balance_yuan"];

/// Turns encrypted history envelopes into ordered transaction records.
///
/// Holds only the immutable key, so one decoder can serve any number of
/// envelopes, including from several threads at once.
#[derive(Debug, Clone)]
pub struct HistoryDecoder {
    key: DecryptionKey,
}

impl HistoryDecoder {
    /// Creates a decoder for the given shared key.
    pub fn new(key: DecryptionKey) -> Self {
        HistoryDecoder { key }
    }

    /// Decodes one envelope into records, most recent first.
    pub fn decode(&self, envelope: &Envelope) -> Result<Vec<TransactionRecord>> {
        let (iv, ciphertext) = envelope.split()?;
        debug!("Split envelope: {} byte IV, {} byte ciphertext", iv.len(), ciphertext.len());

        let plaintext = self.key.decrypt(iv, ciphertext)?;
        let records = parse_payload(&plaintext)?;
        let ordered = order_by_date_desc(records);

        info!("Decoded {} transaction records", ordered.len());
        Ok(ordered)
    }

    /// Decodes a raw transport response body (`{"data": "..."}` or the bare
    /// envelope).
    pub fn decode_response(&self, body: &str) -> Result<Vec<TransactionRecord>> {
        let envelope = Envelope::from_response_body(body)?;
        self.decode(&envelope)
    }
}

/// Writes records as a card statement CSV.
///
/// Layout:
/// - a header row of [`CSV_COLUMNS`] followed by [`DERIVED_COLUMNS`]
/// - one row per record, in the given order; raw fields are written as-is
///   (strings verbatim, other scalars as JSON text, null or missing as empty)
/// - a single-cell footer line with the record count, the date range
///   (oldest first) and the net signed amount
///
/// Statement readers skip the header and the footer, and take the end date
/// from the first data row and the start date from the footer.
pub fn write_csv<W: Write>(records: &[TransactionRecord], writer: W) -> Result<()> {
    let mut csv_writer = WriterBuilder::new().flexible(true).from_writer(writer);

    csv_writer.write_record(CSV_COLUMNS.iter().chain(DERIVED_COLUMNS.iter()))?;

    let mut net = Yuan::ZERO;
    let mut unclassified = 0usize;

    for record in records {
        let raw = CSV_COLUMNS.iter().map(|&column| {
            if column == "txdate" {
                record.txdate().to_string()
            } else {
                record.get(column).map(cell).unwrap_or_default()
            }
        });

        let direction = record.direction();
        if direction.is_none() {
            unclassified += 1;
            warn!(
                "Record on {}: Unknown transaction type {:?}, leaving direction empty",
                record.txdate(),
                record.narration().unwrap_or_default()
            );
        }

        let signed = record.signed_amount();
        if let Some(amount) = signed {
            net += amount;
        }

        let derived = [
            record.narration().unwrap_or_default(),
            direction.map(|d| d.as_str().to_string()).unwrap_or_default(),
            signed.map(|a| a.to_string()).unwrap_or_default(),
            record.balance().map(|b| b.to_string()).unwrap_or_default(),
        ];

        csv_writer.write_record(raw.chain(derived))?;
    }

    csv_writer.write_record([footer(records, net, unclassified)])?;

    csv_writer.flush()?;
    Ok(())
}

fn footer(records: &[TransactionRecord], net: Yuan, unclassified: usize) -> String {
    // records are newest first, so the range reads last .. first
    let mut text = match (records.last(), records.first()) {
        (Some(oldest), Some(newest)) => format!(
            "{} records from {} to {}; net {} CNY",
            records.len(),
            oldest.txdate(),
            newest.txdate(),
            net
        ),
        _ => "0 records".to_string(),
    };
    if unclassified > 0 {
        text.push_str(&format!("; {} unclassified", unclassified));
    }
    text
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EnvelopeDefect, HistoryError};

    const IV: &str = "0102030405060708";

    fn decoder() -> HistoryDecoder {
        HistoryDecoder::new(DecryptionKey::from_bytes(b"0123456789abcdef").unwrap())
    }

    fn seal(plaintext: &str) -> Envelope {
        let key = DecryptionKey::from_bytes(b"0123456789abcdef").unwrap();
        Envelope::new(key.encrypt_envelope(IV, plaintext).unwrap())
    }

    #[test]
    fn test_decode_orders_records() {
        let envelope = seal(
            r#"{"resultData":{"rows":[
                {"txdate":"2024-01-01","amt":5},
                {"txdate":"2024-03-01","amt":2},
                {"txdate":"2024-01-01","amt":1}
            ]}}"#,
        );

        let records = decoder().decode(&envelope).unwrap();
        let summary: Vec<(&str, &Value)> = records
            .iter()
            .map(|r| (r.txdate(), r.get("amt").unwrap()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("2024-03-01", &Value::from(2)),
                ("2024-01-01", &Value::from(5)),
                ("2024-01-01", &Value::from(1)),
            ]
        );
    }

    #[test]
    fn test_decode_short_envelope() {
        let result = decoder().decode(&Envelope::new("0123456789"));
        assert!(matches!(
            result,
            Err(HistoryError::MalformedEnvelope(EnvelopeDefect::TooShort(10)))
        ));
    }

    #[test]
    fn test_decode_schema_violation() {
        let envelope = seal(r#"{"resultData":{"total":0}}"#);
        assert!(matches!(
            decoder().decode(&envelope),
            Err(HistoryError::SchemaViolation(_))
        ));
    }

    #[test]
    fn test_decode_response_body() {
        let envelope = seal(r#"{"resultData":{"rows":[{"txdate":"2024-05-05"}]}}"#);
        let body = format!(r#"{{"success":true,"data":"{}"}}"#, envelope.as_str());

        let records = decoder().decode_response(&body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].txdate(), "2024-05-05");
    }

    fn csv_lines(records: &[TransactionRecord]) -> Vec<String> {
        let mut output = Vec::new();
        write_csv(records, &mut output).unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    fn header() -> String {
        format!("{},{}", CSV_COLUMNS.join(","), DERIVED_COLUMNS.join(","))
    }

    #[test]
    fn test_write_csv() {
        let envelope = seal(
            r#"{"resultData":{"rows":[
                {"txdate":"2024-01-02 08:00:00","txamt":350,"balance":9650,"mername":"Canteen, East","summary":"消费","sts":null},
                {"txdate":"2024-01-03 12:00:00","txamt":10000,"posjourno":"P9","summary":"充值","txname":"银行圈存"}
            ]}}"#,
        );
        let records = decoder().decode(&envelope).unwrap();
        let lines = csv_lines(&records);

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], header());
        assert_eq!(
            lines[1],
            "充值,P9,,,,,,,,,2024-01-03 12:00:00,银行圈存,,,,,,,,,10000,,,,充值_银行圈存,income,100.00,"
        );
        assert_eq!(
            lines[2],
            "消费,,,,,,,,,,2024-01-02 08:00:00,,,,,9650,,,,,350,,,\"Canteen, East\",消费,expense,-3.50,96.50"
        );
        assert_eq!(
            lines[3],
            "2 records from 2024-01-02 08:00:00 to 2024-01-03 12:00:00; net 96.50 CNY"
        );
    }

    #[test]
    fn test_write_csv_footer_keeps_oldest_row() {
        let envelope = seal(
            r#"{"resultData":{"rows":[
                {"txdate":"2024-01-01","summary":"消费","txamt":500},
                {"txdate":"2023-01-01","summary":"充值","txamt":2000}
            ]}}"#,
        );
        let records = decoder().decode(&envelope).unwrap();
        let lines = csv_lines(&records);

        // header, two data rows, footer
        assert_eq!(lines.len(), 4);
        assert!(lines[1].contains(",2024-01-01,"));
        assert!(lines[2].contains(",2023-01-01,"));

        let footer = lines.last().unwrap();
        assert!(!footer.contains(','));
        assert!(footer.starts_with("2 records from 2023-01-01 to 2024-01-01"));
        assert!(footer.ends_with("net 15.00 CNY"));
    }

    #[test]
    fn test_write_csv_counts_unclassified() {
        let envelope = seal(
            r#"{"resultData":{"rows":[
                {"txdate":"2024-02-01","summary":"冲正","txamt":100},
                {"txdate":"2024-01-01","summary":"消费","txamt":100}
            ]}}"#,
        );
        let records = decoder().decode(&envelope).unwrap();
        let lines = csv_lines(&records);

        assert!(lines[1].ends_with(",冲正,,,"));
        assert_eq!(
            lines[3],
            "2 records from 2024-01-01 to 2024-02-01; net -1.00 CNY; 1 unclassified"
        );
    }

    #[test]
    fn test_write_csv_empty() {
        let lines = csv_lines(&[]);
        assert_eq!(lines, vec![header(), "0 records".to_string()]);
    }
}
