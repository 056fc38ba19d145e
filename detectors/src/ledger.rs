//! The spend ledger: a bounded transaction log with a rolling 24-hour
//! window and limit checks.

use std::sync::Mutex;

use clawsec_config::SpendLimits;
use clawsec_types::{SpendRecord, now_ms};
use uuid::Uuid;

/// Rolling window for the daily total, in milliseconds.
pub const SPEND_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

/// Which configured limit a transaction exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceededLimit {
    PerTransaction,
    Daily,
}

impl ExceededLimit {
    /// Wire/metadata name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PerTransaction => "perTransaction",
            Self::Daily => "daily",
        }
    }
}

/// Outcome of a limit check.
#[derive(Debug, Clone, Copy)]
pub struct SpendCheck {
    pub exceeded: Option<ExceededLimit>,
    /// Sum of approved amounts in the trailing 24 hours, excluding the
    /// amount being checked.
    pub current_daily_total: f64,
}

/// Append-only transaction log, evicted by the 24-hour window.
///
/// Reads and writes are serialized per ledger instance; the interior
/// mutex keeps limit checks and records consistent under concurrency.
#[derive(Debug, Default)]
pub struct SpendLedger {
    records: Mutex<Vec<SpendRecord>>,
}

impl SpendLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transaction at the current time.
    pub fn record(
        &self,
        amount: f64,
        approved: bool,
        transaction_id: Option<String>,
        domain: Option<String>,
    ) -> SpendRecord {
        self.record_at(now_ms(), amount, approved, transaction_id, domain)
    }

    /// Append a transaction with an explicit timestamp.
    ///
    /// Exposed so window behavior is testable without sleeping.
    pub fn record_at(
        &self,
        timestamp: i64,
        amount: f64,
        approved: bool,
        transaction_id: Option<String>,
        domain: Option<String>,
    ) -> SpendRecord {
        let record = SpendRecord {
            id: Uuid::new_v4().to_string(),
            amount: amount.max(0.0),
            timestamp,
            approved,
            transaction_id,
            domain,
        };
        let mut records = self.records.lock().expect("spend ledger lock");
        Self::evict(&mut records, timestamp);
        records.push(record.clone());
        tracing::debug!(amount = record.amount, approved, "spend recorded");
        record
    }

    /// Sum of approved amounts within the trailing window ending at `now`.
    ///
    /// Entries with `timestamp < now - 24h` are excluded; the boundary
    /// entry at exactly `now - 24h` still counts.
    #[must_use]
    pub fn daily_total_at(&self, now: i64) -> f64 {
        let records = self.records.lock().expect("spend ledger lock");
        records
            .iter()
            .filter(|r| r.approved && r.timestamp >= now - SPEND_WINDOW_MS)
            .map(|r| r.amount)
            .sum()
    }

    #[must_use]
    pub fn current_daily_total(&self) -> f64 {
        self.daily_total_at(now_ms())
    }

    /// Check `amount` against the configured limits at `now`.
    ///
    /// Per-transaction is checked before daily. Amounts exactly equal to a
    /// limit are allowed; only strictly greater sums exceed.
    #[must_use]
    pub fn check_at(&self, amount: f64, limits: &SpendLimits, now: i64) -> SpendCheck {
        let current_daily_total = self.daily_total_at(now);

        let exceeded = if amount > limits.per_transaction {
            Some(ExceededLimit::PerTransaction)
        } else if current_daily_total + amount > limits.daily {
            Some(ExceededLimit::Daily)
        } else {
            None
        };

        SpendCheck {
            exceeded,
            current_daily_total,
        }
    }

    #[must_use]
    pub fn check(&self, amount: f64, limits: &SpendLimits) -> SpendCheck {
        self.check_at(amount, limits, now_ms())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().expect("spend ledger lock").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records.lock().expect("spend ledger lock").clear();
    }

    fn evict(records: &mut Vec<SpendRecord>, now: i64) {
        records.retain(|r| r.timestamp >= now - SPEND_WINDOW_MS);
    }
}
