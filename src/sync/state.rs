// file: src/sync/state.rs
use super::fingerprint::GroupFingerprint;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// What the reconciler remembers about one group between ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupState {
    pub fingerprint: Option<GroupFingerprint>,
    pub sync_complete: bool,
}

/// In-memory per-group state. Lives as long as the reconciler; a restart
/// starts empty and every group gets a full resync.
#[derive(Debug, Default)]
pub struct GroupStateStore {
    groups: RwLock<HashMap<String, GroupState>>,
}

impl GroupStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, sink_group: &str) -> GroupState {
        self.groups.read().await.get(sink_group).cloned().unwrap_or_default()
    }

    /// True when the last run for the group finished and saw `fingerprint`.
    pub async fn is_up_to_date(&self, sink_group: &str, fingerprint: &GroupFingerprint) -> bool {
        match self.groups.read().await.get(sink_group) {
            Some(state) => state.sync_complete && state.fingerprint.as_ref() == Some(fingerprint),
            None => false,
        }
    }

    /// Stores the fingerprint a reconciliation is about to act on and clears
    /// the completion flag until it finishes.
    pub async fn begin(&self, sink_group: &str, fingerprint: GroupFingerprint) {
        let mut groups = self.groups.write().await;
        groups.insert(
            sink_group.to_string(),
            GroupState {
                fingerprint: Some(fingerprint),
                sync_complete: false,
            },
        );
    }

    pub async fn complete(&self, sink_group: &str, fingerprint: GroupFingerprint) {
        let mut groups = self.groups.write().await;
        let state = groups.entry(sink_group.to_string()).or_default();
        state.fingerprint = Some(fingerprint);
        state.sync_complete = true;
    }

    /// Forgets every group not in `mapped`. Returns how many were dropped.
    pub async fn retain_mapped(&self, mapped: &[String]) -> usize {
        let mut groups = self.groups.write().await;
        let before = groups.len();
        groups.retain(|group, _| mapped.contains(group));
        before - groups.len()
    }
}
