use crate::types::TranscriptEntry;
use std::collections::HashSet;

/// Observed upper bound on the number of entries in a single update window.
pub const UPDATE_WINDOW_CAP: usize = 5;

/// Merge an update window into the current transcript.
///
/// A window is the latest state of the transcript tail, not a delta. The oldest
/// `len(current) - len(window)` entries are assumed to lie outside the window and
/// are kept; everything else is replaced by the window, then deduplicated.
///
/// The alignment is purely length based. If the server ever truncates by
/// something other than entry count the two can drift apart.
pub fn merge_update_window(
    current: &[TranscriptEntry],
    window: &[TranscriptEntry],
) -> Vec<TranscriptEntry> {
    if current.is_empty() {
        return window.to_vec();
    }

    let keep = current.len().saturating_sub(window.len());

    let mut merged = Vec::with_capacity(keep + window.len());
    merged.extend_from_slice(&current[..keep]);
    merged.extend_from_slice(window);

    dedupe_entries(merged)
}

/// Keep the first occurrence of every `(role, content)` pair, preserving order.
pub fn dedupe_entries(entries: Vec<TranscriptEntry>) -> Vec<TranscriptEntry> {
    let mut seen = HashSet::with_capacity(entries.len());
    entries
        .into_iter()
        .filter(|e| seen.insert((e.role, e.content.clone())))
        .collect()
}
