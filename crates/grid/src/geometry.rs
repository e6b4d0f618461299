//! Slot arithmetic for the virtualized grid.
//!
//! The grid renders every cell as a `vaadin-grid-cell-content` element
//! addressed by a flat slot index. Rows are ten slots wide: slot 0 is
//! the selection checkbox, slot 1 the details toggle, slots 2..=9 carry
//! the data columns. Row r therefore starts its data at `r * 10 + 2`.
//!
//! The scan stops at the first row whose key cell is empty. A grid that
//! rendered interior empty rows would be under-read by this rule; the
//! application always renders matches contiguously from the top, so the
//! first empty key cell marks the end of the result set.

use std::collections::HashMap;

use autot1_core_types::ResultRow;

pub const ROW_WIDTH: usize = 10;
pub const DATA_OFFSET: usize = 2;
/// Registration number, the cell records are matched on.
pub const KEY_OFFSET: usize = 2;
/// Message name, the cell lookup classification reads.
pub const MESSAGE_OFFSET: usize = 7;
/// The grid never renders more than one page of rows.
pub const MAX_ROWS: usize = 10;

pub fn base_slot(row: usize) -> usize {
    row * ROW_WIDTH + DATA_OFFSET
}

fn cell<'a>(slots: &'a HashMap<usize, String>, index: usize) -> &'a str {
    slots.get(&index).map(String::as_str).unwrap_or("")
}

/// Scan rendered rows and keep the fully-populated ones whose
/// registration number equals `filter_key`.
pub fn scan_rows(slots: &HashMap<usize, String>, filter_key: &str) -> Vec<ResultRow> {
    let mut rows = Vec::new();
    for row in 0..MAX_ROWS {
        let base = base_slot(row);
        let key = cell(slots, base + KEY_OFFSET);
        if key.trim().is_empty() {
            break;
        }
        if key != filter_key {
            continue;
        }
        let mut cells: [String; ResultRow::FIELD_COUNT] = Default::default();
        for (offset, slot) in cells.iter_mut().enumerate() {
            *slot = cell(slots, base + offset).to_string();
        }
        let row = ResultRow::from_cells(cells);
        if row.is_complete() {
            rows.push(row);
        }
    }
    rows
}

/// Find the slot index of the message-name cell for the row matching
/// `(key, message_fragment)`. Used to double-click a specific result
/// open.
pub fn find_message_slot(
    slots: &HashMap<usize, String>,
    key: &str,
    message_fragment: &str,
) -> Option<usize> {
    for row in 0..MAX_ROWS {
        let base = base_slot(row);
        let row_key = cell(slots, base + KEY_OFFSET);
        if row_key.trim().is_empty() {
            break;
        }
        if row_key == key && cell(slots, base + MESSAGE_OFFSET).contains(message_fragment) {
            return Some(base + MESSAGE_OFFSET);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[[&str; 8]]) -> HashMap<usize, String> {
        let mut slots = HashMap::new();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                slots.insert(base_slot(r) + c, value.to_string());
            }
        }
        slots
    }

    fn full_row(key: &str, message: &str) -> [&'static str; 8] {
        // Leaked on purpose; test fixtures only.
        let key: &'static str = Box::leak(key.to_string().into_boxed_str());
        let message: &'static str = Box::leak(message.to_string().into_boxed_str());
        [
            "GRP", "CRN1", key, "Registered", "Paid", "01/03", "02/03", message,
        ]
    }

    #[test]
    fn data_starts_after_checkbox_and_details() {
        assert_eq!(base_slot(0), 2);
        assert_eq!(base_slot(3), 32);
    }

    #[test]
    fn matching_rows_are_collected() {
        let slots = grid(&[
            full_row("24IT01", "NCTS Arrival Notification IT"),
            full_row("24IT01", "Rilascio merci"),
            full_row("24IT99", "NCTS Arrival Notification IT"),
        ]);
        let rows = scan_rows(&slots, "24IT01");
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.registration_number == "24IT01"));
    }

    #[test]
    fn no_match_yields_empty() {
        let slots = grid(&[full_row("24IT01", "NCTS Arrival Notification IT")]);
        assert!(scan_rows(&slots, "24IT77").is_empty());
    }

    #[test]
    fn scan_stops_at_first_empty_key_cell() {
        let mut slots = grid(&[
            full_row("24IT01", "NCTS Arrival Notification IT"),
            ["", "", "", "", "", "", "", ""],
            full_row("24IT01", "Rilascio merci"),
        ]);
        // Row 1 has an empty key; row 2 must not be reached.
        slots.insert(base_slot(1) + KEY_OFFSET, String::new());
        let rows = scan_rows(&slots, "24IT01");
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn incomplete_rows_are_dropped() {
        let mut slots = grid(&[full_row("24IT01", "NCTS Arrival Notification IT")]);
        slots.insert(base_slot(0) + 4, String::from("  "));
        assert!(scan_rows(&slots, "24IT01").is_empty());
    }

    #[test]
    fn message_slot_is_located_for_key_and_fragment() {
        let slots = grid(&[
            full_row("24IT01", "Rilascio merci"),
            full_row("24IT01", "NCTS Arrival Notification IT"),
        ]);
        let slot = find_message_slot(&slots, "24IT01", "NCTS Arrival");
        assert_eq!(slot, Some(base_slot(1) + MESSAGE_OFFSET));
        assert_eq!(find_message_slot(&slots, "24IT02", "NCTS"), None);
    }
}
