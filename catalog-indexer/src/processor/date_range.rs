//! Date range normalization.
//!
//! Turns the stored date records of an entity into the `date_range` value and
//! `_display` string written to the search document.

use catalog_indexer_shared::{DateRange, DateRecord, PartialDate};

use crate::errors::IngestError;

/// A date selected from an entity's date records.
///
/// `range` is absent when the record carries neither a stored range nor a
/// single value; `display` is computed from the record's own fields and never
/// from `range`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedDate {
    pub range: Option<DateRange>,
    pub display: Option<String>,
}

/// Normalize the first date record named `date_type`.
///
/// Returns `Ok(None)` when no record of that type exists or when the record
/// has no usable field at all.
///
/// # Errors
///
/// A stored range whose lower bound starts after its upper bound ends is a
/// data-shape error.
pub fn normalize_date(
    dates: &[DateRecord],
    date_type: &str,
) -> Result<Option<NormalizedDate>, IngestError> {
    let Some(record) = dates.iter().find(|d| d.date_type == date_type) else {
        return Ok(None);
    };

    let stored = record
        .date_range
        .map(|raw| DateRange::new(raw.lower, raw.upper))
        .filter(|range| !range.is_unbounded());

    if let Some(range) = stored {
        if range.is_inverted() {
            return Err(IngestError::data_shape(format!(
                "Date '{}' has inverted range {} - {}",
                date_type,
                render_bound(range.gte),
                render_bound(range.lte)
            )));
        }
    }

    let range = stored.or_else(|| record.date.map(DateRange::single));
    let display = display_for(record);

    if range.is_none() && display.is_none() {
        return Ok(None);
    }

    Ok(Some(NormalizedDate { range, display }))
}

/// Display precedence: stored display string, single value, stored bounds.
fn display_for(record: &DateRecord) -> Option<String> {
    if let Some(display) = record
        .display_date
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
    {
        return Some(display.to_string());
    }

    if let Some(date) = record.date {
        return Some(date.to_string());
    }

    match record.date_range {
        Some(raw) => match (raw.lower, raw.upper) {
            (Some(lower), Some(upper)) if lower == upper => Some(lower.to_string()),
            (Some(lower), Some(upper)) => Some(format!("{} - {}", lower, upper)),
            (Some(lower), None) => Some(format!("{} -", lower)),
            (None, Some(upper)) => Some(format!("- {}", upper)),
            (None, None) => None,
        },
        None => None,
    }
}

fn render_bound(bound: Option<PartialDate>) -> String {
    bound.map(|d| d.to_string()).unwrap_or_default()
}
