//! Registry statistics display.
//!
//! Thin formatting over the metadata projection; no registry access of
//! its own.

use transcache_core::EntryMeta;

/// How many recent acquisitions to show.
const RECENT_COUNT: usize = 5;

/// Render the statistics block for a metadata projection.
pub fn render(rows: &[EntryMeta]) -> String {
    let total_links: usize = rows.iter().map(|row| row.link_count).sum();

    let mut out = String::new();
    out.push_str(&format!("Entries: {}\n", rows.len()));
    out.push_str(&format!("Distribution links: {total_links}\n"));

    if rows.is_empty() {
        return out;
    }

    // acquired_at is fixed-width and lexicographically sortable.
    let mut recent: Vec<&EntryMeta> = rows.iter().collect();
    recent.sort_by(|a, b| b.acquired_at.cmp(&a.acquired_at));

    out.push_str("Recent acquisitions:\n");
    for row in recent.iter().take(RECENT_COUNT) {
        out.push_str(&format!(
            "  {}  {}  {} ({})\n",
            row.acquired_at, row.id, row.title, row.channel
        ));
    }

    out
}
