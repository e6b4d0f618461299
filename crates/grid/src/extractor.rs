//! Browser-facing side of grid extraction.
//!
//! One script snapshots every rendered cell into a slot map; all
//! interpretation happens in [`crate::geometry`] on this side of the
//! boundary.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use autot1_core_types::ResultRow;
use autot1_session::Session;

use crate::errors::GridError;
use crate::geometry;

fn js_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn snapshot_script(grid_selector: &str) -> String {
    format!(
        r#"(function() {{
  const grid = document.querySelector({sel});
  if (!grid) return null;
  const cells = [];
  for (const el of document.querySelectorAll('vaadin-grid-cell-content')) {{
    const slot = el.getAttribute('slot') || '';
    const m = slot.match(/vaadin-grid-cell-content-(\d+)$/);
    if (!m) continue;
    cells.push([parseInt(m[1], 10), (el.textContent || '').trim()]);
  }}
  return cells;
}})()"#,
        sel = js_str(grid_selector),
    )
}

fn headers_script(grid_selector: &str) -> String {
    format!(
        r#"(function() {{
  const grid = document.querySelector({sel});
  if (!grid) return null;
  return Array.from(document.querySelectorAll('vaadin-grid-sorter'))
    .map((s) => (s.textContent || '').trim());
}})()"#,
        sel = js_str(grid_selector),
    )
}

fn double_click_script(slot: usize) -> String {
    format!(
        r#"(function() {{
  const el = document.querySelector('vaadin-grid-cell-content[slot="vaadin-grid-cell-content-{slot}"]');
  if (!el) return false;
  const opts = {{ bubbles: true, composed: true }};
  el.dispatchEvent(new MouseEvent('dblclick', opts));
  return true;
}})()"#,
    )
}

pub struct GridExtractor {
    session: Arc<Session>,
    grid_selector: String,
}

impl GridExtractor {
    pub fn new(session: Arc<Session>, grid_selector: impl Into<String>) -> Self {
        Self {
            session,
            grid_selector: grid_selector.into(),
        }
    }

    async fn snapshot(&self) -> Result<HashMap<usize, String>, GridError> {
        let cells: Option<Vec<(usize, String)>> = self
            .session
            .evaluate(snapshot_script(&self.grid_selector))
            .await?;
        let cells = cells.ok_or_else(|| GridError::NotReady {
            selector: self.grid_selector.clone(),
        })?;
        debug!(cells = cells.len(), "grid snapshot taken");
        Ok(cells.into_iter().collect())
    }

    /// Column headers, left to right.
    pub async fn extract_headers(&self) -> Result<Vec<String>, GridError> {
        let headers: Option<Vec<String>> = self
            .session
            .evaluate(headers_script(&self.grid_selector))
            .await?;
        headers.ok_or_else(|| GridError::NotReady {
            selector: self.grid_selector.clone(),
        })
    }

    /// All fully-populated rows whose registration number equals
    /// `filter_key`. `Ok(None)` when the grid rendered but nothing
    /// matched.
    pub async fn extract_rows(
        &self,
        filter_key: &str,
    ) -> Result<Option<Vec<ResultRow>>, GridError> {
        let slots = self.snapshot().await?;
        let rows = geometry::scan_rows(&slots, filter_key);
        if rows.is_empty() {
            info!(key = filter_key, "no grid rows matched");
            Ok(None)
        } else {
            info!(key = filter_key, rows = rows.len(), "grid rows extracted");
            Ok(Some(rows))
        }
    }

    /// Slot of the message-name cell for `(key, message_fragment)`, if
    /// such a row is rendered.
    pub async fn find_cell_slot(
        &self,
        key: &str,
        message_fragment: &str,
    ) -> Result<Option<usize>, GridError> {
        let slots = self.snapshot().await?;
        Ok(geometry::find_message_slot(&slots, key, message_fragment))
    }

    /// Double-click a cell to open the record behind it.
    pub async fn double_click_cell(&self, slot: usize) -> Result<(), GridError> {
        let clicked: bool = self.session.evaluate(double_click_script(slot)).await?;
        if clicked {
            Ok(())
        } else {
            Err(GridError::CellMissing { slot })
        }
    }
}
