//! Sorted, numbered views over the store's items.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::models::{Item, ListedItem, status_text};

/// Column to sort by
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SortKey {
    /// Snapshot order
    #[default]
    None,
    Name,
    Size,
    Status,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortConfig {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    pub fn ascending(key: SortKey) -> Self {
        Self::new(key, SortDirection::Ascending)
    }

    pub fn descending(key: SortKey) -> Self {
        Self::new(key, SortDirection::Descending)
    }

    /// Column-header click: ascending, then descending, then back to
    /// unsorted. A different column always starts at ascending.
    pub fn cycle(self, key: SortKey) -> Self {
        if key == SortKey::None {
            return Self::default();
        }
        match (self.key == key, self.direction) {
            (false, _) => Self::ascending(key),
            (true, SortDirection::Ascending) => Self::descending(key),
            (true, SortDirection::Descending) => Self::default(),
        }
    }
}

/// Leading numeric value of a free-text size.
///
/// Reads the longest numeric prefix after leading whitespace (sign, digits,
/// fraction, exponent, or `Infinity`), so "1 Litre" is 1 and "500 g" is 500.
/// Text without a numeric prefix, and zero, come out as 0.
pub fn leading_number(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if s[end..].starts_with("Infinity") {
        return if bytes[0] == b'-' {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return 0.0;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }

    match s[..end].parse::<f64>() {
        Ok(value) if value != 0.0 && !value.is_nan() => value,
        _ => 0.0,
    }
}

fn compare(key: SortKey, a: &Item, b: &Item) -> Ordering {
    match key {
        SortKey::None => Ordering::Equal,
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::Size => leading_number(&a.size).total_cmp(&leading_number(&b.size)),
        SortKey::Status => status_text(a.status).cmp(status_text(b.status)),
    }
}

/// Sort items and number them from 1.
///
/// The sort is stable in both directions: items with equal keys keep the
/// order they had in the input.
pub fn project<'a, I>(items: I, sort: SortConfig) -> Vec<ListedItem>
where
    I: IntoIterator<Item = &'a Item>,
{
    let mut sorted: Vec<&Item> = items.into_iter().collect();
    sorted.sort_by(|a, b| {
        let ordering = compare(sort.key, a, b);
        match sort.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });

    sorted
        .into_iter()
        .enumerate()
        .map(|(position, item)| ListedItem {
            display_index: position + 1,
            item: item.clone(),
        })
        .collect()
}
