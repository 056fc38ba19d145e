//! Spend-ledger entries.

use serde::{Deserialize, Serialize};

/// One recorded transaction amount.
///
/// Amounts are non-negative; entries are append-only except for
/// time-window eviction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendRecord {
    pub id: String,
    pub amount: f64,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_are_omitted() {
        let r = SpendRecord {
            id: "t1".into(),
            amount: 12.5,
            timestamp: 1_000,
            approved: true,
            transaction_id: None,
            domain: None,
        };
        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("transactionId").is_none());
        assert!(json.get("domain").is_none());
    }
}
