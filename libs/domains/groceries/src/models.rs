use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use validator::{Validate, ValidationError};

/// Opaque item identifier assigned by the remote collection.
///
/// Stable for the lifetime of an item. Never derived from list position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Pick status of an item.
///
/// The third state, "unset", is the absence of a status (`Option::None`),
/// which is also how it is stored remotely (`null`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum PickStatus {
    #[serde(rename = "picked")]
    #[strum(serialize = "picked")]
    Picked,
    #[serde(rename = "not picked")]
    #[strum(serialize = "not picked")]
    NotPicked,
}

impl PickStatus {
    /// Status for a checkbox state: checked means picked, unchecked means
    /// explicitly not picked.
    pub fn from_checked(checked: bool) -> Self {
        if checked {
            PickStatus::Picked
        } else {
            PickStatus::NotPicked
        }
    }
}

/// Text form of a tri-state status, empty when unset.
pub fn status_text(status: Option<PickStatus>) -> &'static str {
    match status {
        Some(PickStatus::Picked) => "picked",
        Some(PickStatus::NotPicked) => "not picked",
        None => "",
    }
}

/// A grocery item as held in the remote collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(default)]
    pub name: String,
    /// Free-text size, e.g. "1 Litre" or "500 g"
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub status: Option<PickStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Item {
    /// Build an item from a create request and the id the remote assigned
    pub fn from_new(id: ItemId, input: NewItem) -> Self {
        Self {
            id,
            name: input.name,
            size: input.size,
            status: input.status,
            notes: input.notes,
        }
    }

    /// Apply a partial update. Fields absent from the patch are left alone.
    pub fn apply_patch(&mut self, patch: ItemPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
    }
}

/// Create request for a new item.
///
/// Status and notes always start unset; they are still sent explicitly as
/// `null` so the remote document carries every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewItem {
    #[validate(custom(function = "validate_name"))]
    pub name: String,
    pub size: String,
    pub status: Option<PickStatus>,
    pub notes: Option<String>,
}

impl NewItem {
    pub fn new(name: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: size.into(),
            status: None,
            notes: None,
        }
    }
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new("blank_name").with_message("item name must not be blank".into()));
    }
    Ok(())
}

/// Partial update of an item.
///
/// The outer `Option` says whether a field is touched; the inner one is the
/// new value, where `None` clears it. Untouched fields are skipped when
/// serialized and cleared fields serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Option<PickStatus>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
}

impl ItemPatch {
    pub fn status(status: PickStatus) -> Self {
        Self {
            status: Some(Some(status)),
            ..Default::default()
        }
    }

    /// Set notes; empty text clears them
    pub fn notes(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            notes: Some((!text.is_empty()).then_some(text)),
            ..Default::default()
        }
    }

    /// Clear both status and notes
    pub fn reset() -> Self {
        Self {
            status: Some(None),
            notes: Some(None),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.notes.is_none()
    }
}

/// Complete contents of the remote collection at one point in time, in the
/// order the remote delivered them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub items: Vec<Item>,
}

impl From<Vec<Item>> for Snapshot {
    fn from(items: Vec<Item>) -> Self {
        Self { items }
    }
}

/// An item positioned in a projected list.
///
/// `display_index` is 1-based and only meaningful for the projection that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedItem {
    pub display_index: usize,
    #[serde(flatten)]
    pub item: Item,
}
