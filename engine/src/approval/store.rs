//! TTL'd state machine over pending approvals.
//!
//! ```text
//!        approve()
//! pending ────────► approved   (terminal)
//!    │ deny()
//!    ├─────────────► denied     (terminal)
//!    │ now ≥ expiresAt (lazy on read, or periodic sweep)
//!    └─────────────► expired    (terminal)
//! ```
//!
//! Terminal states are immutable. All transitions happen under the store
//! lock, so a losing concurrent approve observes the terminal state and
//! returns `false` without corrupting anything.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use clawsec_types::{ApprovalStatus, PendingApprovalRecord, now_ms};

#[derive(Debug, Default)]
pub struct PendingApprovalStore {
    records: Mutex<HashMap<String, PendingApprovalRecord>>,
    /// When set, `cleanup` also deletes terminal records instead of
    /// retaining them for idempotent read-after-decision.
    remove_on_expiry: bool,
}

impl PendingApprovalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_remove_on_expiry(remove_on_expiry: bool) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            remove_on_expiry,
        }
    }

    /// Upsert by id.
    pub fn add(&self, record: PendingApprovalRecord) {
        let mut records = self.records.lock().expect("approval store lock");
        records.insert(record.id.clone(), record);
    }

    /// Read a record, lazily expiring it first if its TTL has elapsed.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<PendingApprovalRecord> {
        let now = now_ms();
        let mut records = self.records.lock().expect("approval store lock");
        let record = records.get_mut(id.trim())?;
        expire_if_due(record, now);
        Some(record.clone())
    }

    /// Transition `pending -> approved`. Fails (returns `false`) for
    /// missing, expired, or terminal records.
    pub fn approve(&self, id: &str, approved_by: Option<&str>) -> bool {
        let now = now_ms();
        let mut records = self.records.lock().expect("approval store lock");
        let Some(record) = records.get_mut(id.trim()) else {
            return false;
        };
        expire_if_due(record, now);
        if record.status != ApprovalStatus::Pending {
            return false;
        }
        record.status = ApprovalStatus::Approved;
        record.approved_at = Some(now);
        record.approved_by = approved_by.map(str::to_string);
        true
    }

    /// Transition `pending -> denied`; same guard as [`approve`](Self::approve).
    /// No approver is recorded.
    pub fn deny(&self, id: &str) -> bool {
        let now = now_ms();
        let mut records = self.records.lock().expect("approval store lock");
        let Some(record) = records.get_mut(id.trim()) else {
            return false;
        };
        expire_if_due(record, now);
        if record.status != ApprovalStatus::Pending {
            return false;
        }
        record.status = ApprovalStatus::Denied;
        true
    }

    /// Idempotent delete.
    pub fn remove(&self, id: &str) {
        let mut records = self.records.lock().expect("approval store lock");
        records.remove(id.trim());
    }

    /// Records that are currently pending (triggers lazy expiry).
    #[must_use]
    pub fn get_pending(&self) -> Vec<PendingApprovalRecord> {
        let now = now_ms();
        let mut records = self.records.lock().expect("approval store lock");
        records
            .values_mut()
            .filter_map(|record| {
                expire_if_due(record, now);
                (record.status == ApprovalStatus::Pending).then(|| record.clone())
            })
            .collect()
    }

    /// Sweep: expire overdue pending records and, when configured, drop
    /// terminal ones.
    pub fn cleanup(&self) {
        let now = now_ms();
        let mut records = self.records.lock().expect("approval store lock");
        for record in records.values_mut() {
            expire_if_due(record, now);
        }
        if self.remove_on_expiry {
            records.retain(|_, record| record.status == ApprovalStatus::Pending);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().expect("approval store lock").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records.lock().expect("approval store lock").clear();
    }
}

fn expire_if_due(record: &mut PendingApprovalRecord, now: i64) {
    if record.status == ApprovalStatus::Pending && record.is_expired_at(now) {
        record.status = ApprovalStatus::Expired;
    }
}

/// Handle to the periodic sweep task; aborts the task when stopped or
/// dropped.
#[derive(Debug)]
pub struct SweeperHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl SweeperHandle {
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawn the periodic sweep. An interval of `0` disables sweeping
/// entirely (lazy expiry on read still applies).
#[must_use]
pub fn spawn_sweeper(
    store: Arc<PendingApprovalStore>,
    interval_ms: u64,
) -> Option<SweeperHandle> {
    if interval_ms == 0 {
        return None;
    }
    let period = std::time::Duration::from_millis(interval_ms);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick fires immediately; skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            store.cleanup();
        }
    });
    Some(SweeperHandle { handle })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawsec_types::{Detection, Severity, ThreatCategory, ToolCallContext};
    use serde_json::Map;

    fn record(id: &str, expires_at: i64) -> PendingApprovalRecord {
        PendingApprovalRecord::new(
            id,
            now_ms(),
            expires_at,
            Detection::new(ThreatCategory::Destructive, Severity::Critical, 0.95, "rm"),
            ToolCallContext::new("Bash", Map::new()),
        )
    }

    fn live(id: &str) -> PendingApprovalRecord {
        record(id, now_ms() + 60_000)
    }

    fn expired(id: &str) -> PendingApprovalRecord {
        record(id, now_ms() - 1)
    }

    #[test]
    fn add_then_get_round_trips() {
        let store = PendingApprovalStore::new();
        let r = live("approval-a-1");
        store.add(r.clone());
        assert_eq!(store.get("approval-a-1").unwrap(), r);
    }

    #[test]
    fn add_is_upsert() {
        let store = PendingApprovalStore::new();
        store.add(live("approval-a-1"));
        let mut replacement = live("approval-a-1");
        replacement.detection.reason = "other".into();
        store.add(replacement.clone());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("approval-a-1").unwrap().detection.reason, "other");
    }

    #[test]
    fn get_trims_ids() {
        let store = PendingApprovalStore::new();
        store.add(live("approval-a-1"));
        assert!(store.get("  approval-a-1  ").is_some());
    }

    #[test]
    fn approve_succeeds_once() {
        let store = PendingApprovalStore::new();
        store.add(live("approval-a-1"));
        assert!(store.approve("approval-a-1", Some("alice")));
        let record = store.get("approval-a-1").unwrap();
        assert_eq!(record.status, ApprovalStatus::Approved);
        assert_eq!(record.approved_by.as_deref(), Some("alice"));
        assert!(record.approved_at.is_some());

        // Terminal: every later attempt fails and changes nothing.
        assert!(!store.approve("approval-a-1", Some("bob")));
        assert!(!store.deny("approval-a-1"));
        let unchanged = store.get("approval-a-1").unwrap();
        assert_eq!(unchanged.approved_by.as_deref(), Some("alice"));
    }

    #[test]
    fn deny_records_no_approver() {
        let store = PendingApprovalStore::new();
        store.add(live("approval-a-1"));
        assert!(store.deny("approval-a-1"));
        let record = store.get("approval-a-1").unwrap();
        assert_eq!(record.status, ApprovalStatus::Denied);
        assert!(record.approved_by.is_none());
        assert!(!store.approve("approval-a-1", None));
    }

    #[test]
    fn expired_records_lazily_transition_on_read() {
        let store = PendingApprovalStore::new();
        store.add(expired("approval-a-1"));
        assert_eq!(
            store.get("approval-a-1").unwrap().status,
            ApprovalStatus::Expired
        );
        assert!(!store.approve("approval-a-1", None));
        assert!(!store.deny("approval-a-1"));
    }

    #[test]
    fn expiry_boundary_now_equal_is_expired() {
        let store = PendingApprovalStore::new();
        store.add(record("approval-a-1", now_ms()));
        assert_eq!(
            store.get("approval-a-1").unwrap().status,
            ApprovalStatus::Expired
        );
    }

    #[test]
    fn get_pending_filters_and_expires() {
        let store = PendingApprovalStore::new();
        store.add(live("approval-live"));
        store.add(expired("approval-old"));
        store.add(live("approval-done"));
        store.approve("approval-done", None);

        let pending = store.get_pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "approval-live");
    }

    #[test]
    fn cleanup_retains_terminal_records_by_default() {
        let store = PendingApprovalStore::new();
        store.add(expired("approval-old"));
        store.cleanup();
        assert_eq!(
            store.get("approval-old").unwrap().status,
            ApprovalStatus::Expired
        );
    }

    #[test]
    fn cleanup_removes_terminal_records_when_configured() {
        let store = PendingApprovalStore::with_remove_on_expiry(true);
        store.add(expired("approval-old"));
        store.add(live("approval-live"));
        store.add(live("approval-done"));
        store.approve("approval-done", None);
        store.cleanup();
        assert_eq!(store.len(), 1);
        assert!(store.get("approval-live").is_some());
    }

    #[test]
    fn remove_is_idempotent() {
        let store = PendingApprovalStore::new();
        store.add(live("approval-a-1"));
        store.remove("approval-a-1");
        store.remove("approval-a-1");
        assert!(store.get("approval-a-1").is_none());
    }

    #[test]
    fn clear_empties_the_store() {
        let store = PendingApprovalStore::new();
        store.add(live("approval-a-1"));
        store.clear();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn sweeper_zero_interval_is_disabled() {
        let store = Arc::new(PendingApprovalStore::new());
        assert!(spawn_sweeper(store, 0).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_expires_records_periodically() {
        let store = Arc::new(PendingApprovalStore::with_remove_on_expiry(true));
        store.add(expired("approval-old"));
        let handle = spawn_sweeper(Arc::clone(&store), 10).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        // Let the sweep task run.
        tokio::task::yield_now().await;
        assert!(store.is_empty());
        handle.stop();
    }
}
