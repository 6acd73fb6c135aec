//! Incremental update detection
//! Author: kartik4091
//! Created: 2025-06-08

const STARTXREF: &[u8] = b"startxref";

/// Counts `startxref` keywords in the last `tail_bytes` of the file.
///
/// Every incremental save appends a new cross-reference section, so more
/// than one keyword near the end means earlier revisions are still inside.
pub fn count_startxref(bytes: &[u8], tail_bytes: usize) -> usize {
    let start = bytes.len().saturating_sub(tail_bytes);
    bytes[start..]
        .windows(STARTXREF.len())
        .filter(|window| *window == STARTXREF)
        .count()
}
