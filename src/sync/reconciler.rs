//! Per-group reconciliation.
//!
//! Each group moves through `Detecting -> {Skipped | Reconciling} -> {Done | Error}`.
//! Detecting compares a fresh [`GroupFingerprint`] with the one remembered from
//! the last finished run; Reconciling tears every derived event down and
//! rebuilds the group from the current source records.

use super::fingerprint::GroupFingerprint;
use super::state::GroupStateStore;
use crate::adapters::{SinkAdapter, SourceAdapter};
use crate::database::Database;
use crate::error::{SyncError, SyncResult};
use crate::models::{Category, GroupOutcome, SinkEvent, SourceRecord, SyncReport, SyncStatus};
use crate::translator::{describe, render, CompiledTemplate, FieldManifest, TemplateSet};
use crate::utils::logging::{log_group_outcome, log_sync_run};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_MAX_WORKERS: usize = 8;

pub struct Reconciler {
    db: Database,
    source: Arc<dyn SourceAdapter>,
    sink: Arc<dyn SinkAdapter>,
    state: GroupStateStore,
    max_workers: usize,
}

impl Reconciler {
    pub fn new(db: Database, source: Arc<dyn SourceAdapter>, sink: Arc<dyn SinkAdapter>, max_workers: usize) -> Self {
        Self {
            db,
            source,
            sink,
            state: GroupStateStore::new(),
            max_workers: max_workers.max(1),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn state(&self) -> &GroupStateStore {
        &self.state
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Reconciles every mapped group, at most `max_workers` at a time. A
    /// failing group never stops the others.
    pub async fn sync_all(&self) -> SyncReport {
        let mut report = SyncReport::new(Utc::now());

        let groups = match self.db.list_distinct_sink_groups().await {
            Ok(groups) => groups,
            Err(e) => {
                error!("Could not list mapped groups: {}", e);
                report.finished_at = Utc::now();
                return report;
            }
        };

        // Without a complete fallback no group can render
        let templates = match self.load_templates().await {
            Ok(templates) => templates,
            Err(e) => {
                error!("Aborting sync run: {}", e);
                for group in &groups {
                    self.persist_status(group, SyncStatus::Error).await;
                    let outcome = failed(&e);
                    log_group_outcome(group, &outcome);
                    report.record(&outcome);
                }
                report.finished_at = Utc::now();
                log_sync_run(&report);
                return report;
            }
        };

        let templates = &templates;
        let outcomes: Vec<GroupOutcome> = stream::iter(groups)
            .map(|group| async move {
                let outcome = self.reconcile_with(&group, templates).await;
                log_group_outcome(&group, &outcome);
                outcome
            })
            .buffer_unordered(self.max_workers)
            .collect()
            .await;

        for outcome in &outcomes {
            report.record(outcome);
        }
        self.forget_unmapped_groups().await;
        report.finished_at = Utc::now();
        log_sync_run(&report);
        report
    }

    /// Drops remembered state for groups that no longer have any mapping.
    async fn forget_unmapped_groups(&self) {
        match self.db.list_distinct_sink_groups().await {
            Ok(mapped) => {
                let dropped = self.state.retain_mapped(&mapped).await;
                if dropped > 0 {
                    debug!("Forgot state for {} unmapped groups", dropped);
                }
            }
            Err(e) => warn!("Could not list mapped groups to prune state: {}", e),
        }
    }

    /// Returns true if the group was reconciled, false if it was skipped or failed.
    pub async fn sync_one(&self, sink_group: &str) -> bool {
        let outcome = self.reconcile(sink_group).await;
        log_group_outcome(sink_group, &outcome);
        outcome.is_reconciled()
    }

    pub async fn reconcile(&self, sink_group: &str) -> GroupOutcome {
        match self.load_templates().await {
            Ok(templates) => self.reconcile_with(sink_group, &templates).await,
            Err(e) => {
                self.persist_status(sink_group, SyncStatus::Error).await;
                failed(&e)
            }
        }
    }

    async fn reconcile_with(&self, sink_group: &str, templates: &TemplateSet) -> GroupOutcome {
        match self.run_group(sink_group, templates).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.persist_status(sink_group, SyncStatus::Error).await;
                failed(&e)
            }
        }
    }

    async fn run_group(&self, sink_group: &str, templates: &TemplateSet) -> SyncResult<GroupOutcome> {
        let template = templates.resolve_or_err(sink_group)?;

        let source_groups = self.db.active_source_groups(sink_group).await?;
        let current = self.fetch_records(&source_groups, &FieldManifest::default()).await?;
        let tagged = self.sink.list_tagged_events(sink_group).await?;
        let fingerprint = GroupFingerprint::compute(&source_groups, &current, &tagged, template);
        debug!("Fingerprint for group {}: {:?}", sink_group, fingerprint);

        if self.state.is_up_to_date(sink_group, &fingerprint).await {
            return Ok(GroupOutcome::Skipped);
        }

        info!(
            "Reconciling group {} ({} source groups, {} tagged events)",
            sink_group,
            source_groups.len(),
            tagged.len()
        );
        debug!(
            "Group {} renders title from [{}] using the {} template",
            sink_group,
            describe(template, Category::Title),
            template.scope()
        );
        self.state.begin(sink_group, fingerprint.clone()).await;
        self.persist_status(sink_group, SyncStatus::InProgress).await;

        let deleted = self.tear_down(sink_group, &tagged).await?;

        // Mappings flagged while the deletes ran are gone now
        let remaining = self.db.active_source_groups(sink_group).await?;
        let records = self.fetch_records(&remaining, &template.field_manifest()).await?;
        let created = self.push_records(sink_group, template, &records).await?;

        // Events edited by others between the push and this listing go unnoticed
        // until something else about the group changes.
        let pushed = self.sink.list_tagged_events(sink_group).await?;
        self.state.complete(sink_group, fingerprint.with_sink_events(&pushed)).await;
        self.persist_status(sink_group, SyncStatus::Success).await;

        Ok(GroupOutcome::Reconciled { deleted, created })
    }

    /// Deletes every event this group owns, then drops its links and any
    /// mappings flagged for deletion.
    async fn tear_down(&self, sink_group: &str, tagged: &[SinkEvent]) -> SyncResult<usize> {
        let links = self.db.list_derived_events(sink_group).await?;
        let linked: HashSet<&str> = links.iter().map(|l| l.sink_event_id.as_str()).collect();
        let mut deleted = 0;

        for link in &links {
            self.sink.delete_event(&link.sink_event_id).await?;
            self.db.forget_derived_event(&link.sink_event_id).await?;
            deleted += 1;
        }

        for event in tagged.iter().filter(|e| !linked.contains(e.id.as_str())) {
            self.sink.delete_event(&event.id).await?;
            deleted += 1;
        }

        let (_, removed) = self.db.finish_teardown(sink_group).await?;
        if removed > 0 {
            info!("Removed {} flagged mappings for group {}", removed, sink_group);
        }

        Ok(deleted)
    }

    /// Creates one event per record. Each link row is written as soon as its
    /// event exists, so a failure later in the batch leaves no untracked event
    /// behind. Delivery is at-least-once.
    async fn push_records(
        &self,
        sink_group: &str,
        template: &CompiledTemplate,
        records: &[SourceRecord],
    ) -> SyncResult<usize> {
        let mut created = 0;
        for record in records {
            let payload = render(template, record, &self.source.record_url(&record.id));
            let event = self.sink.create_event(sink_group, &payload).await?;
            self.db.record_derived_event(&event.id, &record.id, sink_group).await?;
            created += 1;
        }
        Ok(created)
    }

    async fn fetch_records(&self, source_groups: &[String], manifest: &FieldManifest) -> SyncResult<Vec<SourceRecord>> {
        // An empty query means "everything" to the scheduling system
        if source_groups.is_empty() {
            return Ok(Vec::new());
        }
        self.source.fetch_records(source_groups, manifest).await
    }

    async fn load_templates(&self) -> SyncResult<TemplateSet> {
        let rules = self.db.list_template_rules().await?;
        TemplateSet::compile(&rules)
    }

    async fn persist_status(&self, sink_group: &str, status: SyncStatus) {
        if let Err(e) = self.db.set_status(sink_group, status).await {
            warn!("Could not store status '{}' for group {}: {}", status, sink_group, e);
        }
    }
}

fn failed(error: &SyncError) -> GroupOutcome {
    GroupOutcome::Failed {
        kind: error.status_label(),
        message: error.to_string(),
    }
}
