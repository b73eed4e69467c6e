//! Transaction records decoded from a history payload.

use crate::error::{HistoryError, Result};
use crate::money::Yuan;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One row of account activity.
///
/// Only `txdate` is typed. Every other field the service sends is kept
/// verbatim, in the order it arrived, so schema additions pass straight
/// through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    txdate: String,

    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl TransactionRecord {
    /// Creates a record from a date and the remaining fields.
    pub fn new(txdate: impl Into<String>, fields: Map<String, Value>) -> Self {
        TransactionRecord {
            txdate: txdate.into(),
            fields,
        }
    }

    /// Transaction date, e.g. `2024-03-01 12:30:00`.
    pub fn txdate(&self) -> &str {
        &self.txdate
    }

    /// Looks up any field other than `txdate`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// All fields other than `txdate`.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// POS journal number, used to detect duplicate rows.
    pub fn journal(&self) -> Option<&str> {
        match self.fields.get("posjourno") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }

    /// Transaction amount (`txamt`, in fen) as yuan.
    pub fn amount(&self) -> Option<Yuan> {
        self.fields.get("txamt").and_then(fen_value)
    }

    /// Card balance after the transaction (`balance`, in fen) as yuan.
    pub fn balance(&self) -> Option<Yuan> {
        self.fields.get("balance").and_then(fen_value)
    }

    /// Statement narration: `summary`, joined with `txname` as
    /// `summary_txname` when the two differ.
    pub fn narration(&self) -> Option<String> {
        let summary = self.text_field("summary");
        let txname = self.text_field("txname");

        match (summary, txname) {
            ("", "") => None,
            (s, "") => Some(s.to_string()),
            ("", t) => Some(t.to_string()),
            (s, t) if s == t => Some(s.to_string()),
            (s, t) => Some(format!("{}_{}", s, t)),
        }
    }

    /// Whether money left or entered the card, judged from the narration.
    ///
    /// Returns `None` for transaction types the card service has not been
    /// seen to use.
    pub fn direction(&self) -> Option<Direction> {
        Direction::classify(&self.narration()?)
    }

    /// Amount with its sign: negative for expenses, positive for income.
    pub fn signed_amount(&self) -> Option<Yuan> {
        let amount = self.amount()?;
        match self.direction()? {
            Direction::Expense => Some(-amount),
            Direction::Income => Some(amount),
        }
    }

    fn text_field(&self, name: &str) -> &str {
        match self.fields.get(name) {
            Some(Value::String(s)) => s.trim(),
            _ => "",
        }
    }
}

/// Direction of a card transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Purchases and card replacement fees.
    Expense,

    /// Top-ups, payroll transfers and bank transfers onto the card.
    Income,
}

impl Direction {
    const EXPENSE_KEYWORDS: [&'static str; 2] = ["消费", "补卡"];
    const INCOME_KEYWORDS: [&'static str; 3] = ["充值", "代发", "圈存"];

    /// Classifies a narration by keyword. Expense keywords win.
    pub fn classify(narration: &str) -> Option<Self> {
        if Self::EXPENSE_KEYWORDS.iter().any(|k| narration.contains(k)) {
            Some(Direction::Expense)
        } else if Self::INCOME_KEYWORDS.iter().any(|k| narration.contains(k)) {
            Some(Direction::Income)
        } else {
            None
        }
    }

    /// Lowercase label used in exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Expense => "expense",
            Direction::Income => "income",
        }
    }
}

fn fen_value(value: &Value) -> Option<Yuan> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(fen) => Some(Yuan::from_fen(fen)),
            None => Yuan::parse_fen(&n.to_string()),
        },
        Value::String(s) => Yuan::parse_fen(s),
        _ => None,
    }
}

#[derive(Deserialize)]
struct Payload {
    #[serde(rename = "resultData")]
    result_data: ResultData,
}

#[derive(Deserialize)]
struct ResultData {
    rows: Vec<TransactionRecord>,
}

/// Parses decrypted text and extracts `resultData.rows`.
///
/// Fails with [`HistoryError::SchemaViolation`] if the text is not JSON, the
/// field path is missing, or a row has no string `txdate`.
pub fn parse_payload(plaintext: &str) -> Result<Vec<TransactionRecord>> {
    let payload: Payload = serde_json::from_str(plaintext)
        .map_err(|e| HistoryError::SchemaViolation(e.to_string()))?;

    let rows = payload.result_data.rows;
    debug!("Parsed {} rows from payload", rows.len());
    Ok(rows)
}

/// Returns the records sorted by `txdate`, most recent first.
///
/// Dates are compared as plain strings, so they must share one sortable
/// format. Records with equal dates keep their input order.
pub fn order_by_date_desc(records: Vec<TransactionRecord>) -> Vec<TransactionRecord> {
    let mut ordered = records;
    ordered.sort_by(|a, b| b.txdate.cmp(&a.txdate));
    ordered
}

/// Drops records whose POS journal number was already seen.
///
/// The first occurrence wins. Records without a journal number are kept.
pub fn dedup_by_journal(records: Vec<TransactionRecord>) -> Vec<TransactionRecord> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(records.len());

    for (idx, record) in records.into_iter().enumerate() {
        if let Some(journal) = record.journal() {
            if !seen.insert(journal.to_string()) {
                warn!(
                    "Record {}: Duplicate posjourno {} on {}, ignoring",
                    idx,
                    journal,
                    record.txdate()
                );
                continue;
            }
        }
        kept.push(record);
    }

    kept
}
