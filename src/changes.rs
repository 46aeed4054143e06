//! Turns changed OpenWebUI rows into units the reconciler can apply.

use crate::karakeep::RemoteError;
use crate::marker::{self, TitleError};
use crate::render::{self, DecodeError};
use crate::source::{ChatRow, ChatSource};
use crate::state::Watermark;
use eyre::{Context, Result};

/// One chat, ready to be pushed to Karakeep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncUnit {
    pub foreign_id: String,
    /// Final bookmark title, marker included.
    pub title: String,
    pub body: String,
    pub changed_at: Watermark,
}

/// Why a single chat could not be synced. Never fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum UnitFailure {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("updated_at {0} is not a valid timestamp")]
    InvalidTimestamp(i64),

    #[error(transparent)]
    Title(#[from] TitleError),

    #[error("create failed: {0}")]
    Create(#[source] RemoteError),

    #[error("update of bookmark {remote_id} failed: {source}")]
    Update {
        remote_id: String,
        #[source]
        source: RemoteError,
    },

    #[error("linking bookmark {remote_id} to the list failed: {source}")]
    Link {
        remote_id: String,
        #[source]
        source: RemoteError,
    },
}

/// A row that could not be turned into a [`SyncUnit`].
#[derive(Debug)]
pub struct RejectedRow {
    pub foreign_id: String,
    /// `None` when `updated_at` itself is out of range.
    pub changed_at: Option<Watermark>,
    pub reason: UnitFailure,
}

/// Query everything changed after `since` and normalize it lazily, row by row.
///
/// The query itself failing is fatal; a row that fails to normalize only yields an `Err` item.
pub fn resolve<C: ChatSource + ?Sized>(
    source: &C,
    since: Watermark,
) -> Result<impl Iterator<Item = Result<SyncUnit, RejectedRow>> + use<C>> {
    let rows = source
        .list_changed_since(since.epoch_seconds())
        .wrap_err("Failed to query changed chats")?;
    Ok(rows.into_iter().map(to_unit))
}

pub fn to_unit(row: ChatRow) -> Result<SyncUnit, RejectedRow> {
    let parsed_at = Watermark::from_epoch_seconds(row.updated_at);
    let reject = |reason: UnitFailure| RejectedRow {
        foreign_id: row.id.clone(),
        changed_at: parsed_at,
        reason,
    };

    let changed_at = parsed_at.ok_or_else(|| reject(UnitFailure::InvalidTimestamp(row.updated_at)))?;
    let title = marker::build_title(row.title.as_deref(), &row.id).map_err(|e| reject(e.into()))?;
    let body = render::render_body(row.chat.as_deref()).map_err(|e| reject(e.into()))?;

    Ok(SyncUnit {
        foreign_id: row.id,
        title,
        body,
        changed_at,
    })
}
