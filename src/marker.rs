//! Foreign-id marker embedded in Karakeep bookmark titles.
//!
//! A synced bookmark is titled `<chat title> [OW_ID:<chat id>]`. Karakeep has no
//! field for foreign keys, so the title is the only place the OpenWebUI id can
//! survive a round trip. [`build_title`] and [`parse_title`] are kept side by
//! side because they must stay exact inverses: an id that cannot be parsed back
//! turns every later run into a duplicate create.

use regex::Regex;
use std::sync::LazyLock;

pub const TITLE_ID_PREFIX: &str = "[OW_ID:";
pub const TITLE_ID_SUFFIX: &str = "]";
/// Maximum title length accepted by Karakeep, in characters.
pub const MAX_TITLE_LEN: usize = 255;

const ELLIPSIS: &str = "...";

static TITLE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r" {}([A-Za-z0-9-]+){}$",
        regex::escape(TITLE_ID_PREFIX),
        regex::escape(TITLE_ID_SUFFIX)
    ))
    .expect("title marker pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TitleError {
    #[error("chat id {0:?} contains characters the title marker cannot carry")]
    UnparseableId(String),
    #[error("title marker for chat id {id:?} is {len} characters, above the {max} limit")]
    MarkerTooLong { id: String, len: usize, max: usize },
}

fn is_marker_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// The ` [OW_ID:<id>]` tail appended to every synced title.
pub fn marker_suffix(foreign_id: &str) -> String {
    format!(" {}{}{}", TITLE_ID_PREFIX, foreign_id, TITLE_ID_SUFFIX)
}

/// Build the bookmark title for a chat.
///
/// The original title is cut (with a trailing `...` when there is room for one)
/// so that the whole result fits in [`MAX_TITLE_LEN`]; the marker itself is never cut.
/// An empty or missing title becomes `Untitled Chat <id>`.
pub fn build_title(original: Option<&str>, foreign_id: &str) -> Result<String, TitleError> {
    if !is_marker_id(foreign_id) {
        return Err(TitleError::UnparseableId(foreign_id.to_string()));
    }

    let suffix = marker_suffix(foreign_id);
    let suffix_len = suffix.chars().count();
    if suffix_len > MAX_TITLE_LEN {
        return Err(TitleError::MarkerTooLong {
            id: foreign_id.to_string(),
            len: suffix_len,
            max: MAX_TITLE_LEN,
        });
    }

    let fallback;
    let original = match original.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => {
            fallback = format!("Untitled Chat {}", foreign_id);
            fallback.as_str()
        }
    };

    let available = MAX_TITLE_LEN - suffix_len;
    let head = if original.chars().count() <= available {
        original.to_string()
    } else if available >= ELLIPSIS.len() {
        let kept: String = original.chars().take(available - ELLIPSIS.len()).collect();
        kept + ELLIPSIS
    } else {
        original.chars().take(available).collect()
    };

    Ok(head + &suffix)
}

/// Recover the foreign id from a bookmark title, if it carries a marker.
pub fn parse_title(title: &str) -> Option<&str> {
    TITLE_ID_RE
        .captures(title)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}
