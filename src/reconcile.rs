//! Create-or-update of each changed chat, one at a time.

use crate::changes::{RejectedRow, SyncUnit, UnitFailure};
use crate::collection::CollectionHandle;
use crate::index::RemoteIndex;
use crate::karakeep::BookmarkService;
use crate::state::Watermark;

/// What happened to one unit.
#[derive(Debug)]
pub enum UnitOutcome {
    Created { remote_id: String },
    Updated { remote_id: String },
    Failed(UnitFailure),
}

/// Counts for the end-of-run report, plus the bounds the next watermark must respect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    /// Largest `changed_at` among applied units; `None` when nothing was applied.
    pub max_applied: Option<Watermark>,
    /// Smallest `changed_at` among failed units.
    pub earliest_failed: Option<Watermark>,
}

impl RunSummary {
    pub fn attempted(&self) -> usize {
        self.created + self.updated + self.failed
    }

    /// The watermark to persist, if this run moved past `previous`.
    ///
    /// Never reaches a failed unit's `changed_at`, so every failure stays inside
    /// the next run's change set.
    pub fn advanced_watermark(&self, previous: Watermark) -> Option<Watermark> {
        let max = self.max_applied?;
        let next = match self.earliest_failed {
            Some(failed) => max.min(failed.just_before()),
            None => max,
        };
        (next > previous).then_some(next)
    }

    fn record(&mut self, outcome: &UnitOutcome, changed_at: Watermark) {
        match outcome {
            UnitOutcome::Created { .. } => self.created += 1,
            UnitOutcome::Updated { .. } => self.updated += 1,
            UnitOutcome::Failed(_) => {
                self.record_failure(Some(changed_at));
                return;
            }
        }
        if self.max_applied.is_none_or(|max| changed_at > max) {
            self.max_applied = Some(changed_at);
        }
    }

    fn record_failure(&mut self, changed_at: Option<Watermark>) {
        self.failed += 1;
        if let Some(at) = changed_at
            && self.earliest_failed.is_none_or(|min| at < min)
        {
            self.earliest_failed = Some(at);
        }
    }
}

pub struct Reconciler<'a, S: BookmarkService> {
    service: &'a S,
    collection: &'a CollectionHandle,
    index: RemoteIndex,
    summary: RunSummary,
}

impl<'a, S: BookmarkService> Reconciler<'a, S> {
    pub fn new(service: &'a S, collection: &'a CollectionHandle, index: RemoteIndex) -> Self {
        Self {
            service,
            collection,
            index,
            summary: RunSummary::default(),
        }
    }

    /// Apply one unit. Failures are returned as [`UnitOutcome::Failed`], never propagated.
    pub fn apply(&mut self, unit: &SyncUnit) -> UnitOutcome {
        let existing = self.index.get(&unit.foreign_id).map(|r| r.remote_id.clone());

        let outcome = match existing {
            Some(remote_id) => match self.service.update_entry(&remote_id, &unit.title, &unit.body) {
                Ok(()) => UnitOutcome::Updated { remote_id },
                Err(e) if e.is_not_found() => {
                    tracing::warn!(
                        foreign_id = %unit.foreign_id,
                        remote_id = %remote_id,
                        "bookmark vanished from Karakeep, creating it again"
                    );
                    self.create(unit)
                }
                Err(source) => UnitOutcome::Failed(UnitFailure::Update { remote_id, source }),
            },
            None => self.create(unit),
        };

        match &outcome {
            UnitOutcome::Created { remote_id } => {
                tracing::info!(foreign_id = %unit.foreign_id, remote_id = %remote_id, "created bookmark");
                self.index.insert(&unit.foreign_id, remote_id);
            }
            UnitOutcome::Updated { remote_id } => {
                tracing::info!(foreign_id = %unit.foreign_id, remote_id = %remote_id, "updated bookmark");
            }
            UnitOutcome::Failed(reason) => {
                tracing::error!(foreign_id = %unit.foreign_id, error = %reason, "failed to sync chat");
            }
        }

        self.summary.record(&outcome, unit.changed_at);
        outcome
    }

    fn create(&self, unit: &SyncUnit) -> UnitOutcome {
        let remote_id = match self.service.create_entry(&unit.title, &unit.body) {
            Ok(id) => id,
            Err(e) => return UnitOutcome::Failed(UnitFailure::Create(e)),
        };
        // An unlinked bookmark is not in the list, so the next index build will not
        // see it; the unit stays failed and is retried, possibly leaving an orphan.
        match self
            .service
            .attach_entry_to_collection(&remote_id, &self.collection.id)
        {
            Ok(()) => UnitOutcome::Created { remote_id },
            Err(source) => UnitOutcome::Failed(UnitFailure::Link { remote_id, source }),
        }
    }

    /// Record a row that never became a unit.
    pub fn reject(&mut self, row: RejectedRow) {
        tracing::error!(foreign_id = %row.foreign_id, error = %row.reason, "skipping chat");
        self.summary.record_failure(row.changed_at);
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn finish(self) -> RunSummary {
        self.summary
    }
}
