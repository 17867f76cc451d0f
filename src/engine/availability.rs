use chrono::NaiveDate;

use crate::model::*;

use super::conflict::check_no_conflict;

// ── Slot search ───────────────────────────────────────────────────

/// What one availability search is looking for.
#[derive(Debug, Clone, Copy)]
pub struct SlotQuery {
    pub party_size: u32,
    pub date: NaiveDate,
    /// Requested seating minute. `None` means a walk-in: earliest free slot.
    pub desired: Option<Minute>,
    /// Walk-in scans start here (clamped up to opening time).
    pub earliest: Minute,
    /// Walk-in scan increment.
    pub step: Minute,
}

/// The slot `table` can grant for `query`, given its occupied windows that day.
///
/// A booking's full window, buffers included, must sit inside opening hours
/// and clear every occupied window.
pub fn slot_for_table(table: &Table, occupied: &[OccupiedWindow], query: &SlotQuery) -> Option<TableSlot> {
    if !table.seats(query.party_size) {
        return None;
    }
    let hours = table.opening_hours();
    let grantable = |start: Minute| {
        let window = table.window_at(start);
        hours.contains_span(&window) && check_no_conflict(occupied, &window).is_ok()
    };

    let start = match query.desired {
        Some(t) => Some(t).filter(|&t| grantable(t))?,
        None => {
            let step = query.step.max(1);
            let mut t = query.earliest.max(hours.start + table.buffer_before_minutes as Minute);
            loop {
                if table.window_at(t).end > hours.end {
                    return None;
                }
                if grantable(t) {
                    break t;
                }
                t += step;
            }
        }
    };

    Some(TableSlot {
        table_id: table.id,
        date: query.date,
        time: time_of_minute(start)?,
        window: table.window_at(start),
        fit: table.fit_for(query.party_size),
        gap: table.optimal_capacity.abs_diff(query.party_size),
        priority: table.priority,
    })
}

/// Best candidate first: fit before overflow, then smallest capacity gap,
/// then lowest priority value, then lowest table id.
pub fn rank_slots(slots: &mut [TableSlot]) {
    slots.sort_by_key(TableSlot::rank_key);
}

// ── Interval arithmetic ───────────────────────────────────────────

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end {
                last.end = last.end.max(span.end);
                continue;
            }
        merged.push(span);
    }
    merged
}

/// `base` minus `to_remove`. Both sorted and internally disjoint.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut cursor = b.start;

        while ri < to_remove.len() && to_remove[ri].end <= cursor {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < b.end {
            let r = &to_remove[j];
            if r.start > cursor {
                result.push(Span::new(cursor, r.start));
            }
            cursor = cursor.max(r.end);
            j += 1;
        }

        if cursor < b.end {
            result.push(Span::new(cursor, b.end));
        }
    }

    result
}

/// Gaps in a table's day: opening hours minus every occupied window.
pub fn free_windows(table: &Table, occupied: &[OccupiedWindow]) -> Vec<Span> {
    let mut spans: Vec<Span> = occupied.iter().map(|w| w.span).collect();
    spans.sort_by_key(|s| s.start);
    subtract_intervals(&[table.opening_hours()], &merge_overlapping(&spans))
}
