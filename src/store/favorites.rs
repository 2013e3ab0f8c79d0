//! Favorites slice: a list of snapshots, unique by id, in insertion order.
use serde_json::Value;

use crate::model::{ContentKind, FavoriteItem};

#[derive(Debug, Clone, PartialEq)]
pub enum FavoritesAction {
    /// Insert unless an entry with the same id exists.
    Add(FavoriteItem),
    /// Remove by id; unknown ids are ignored.
    Remove(String),
    /// Startup load from the durable store.
    Rehydrate(Vec<FavoriteItem>),
}

impl FavoritesAction {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, FavoritesAction::Rehydrate(_))
    }
}

pub fn contains(items: &[FavoriteItem], id: &str) -> bool {
    items.iter().any(|f| f.id == id)
}

pub fn reduce(items: &mut Vec<FavoriteItem>, action: &FavoritesAction) {
    match action {
        FavoritesAction::Add(item) => {
            if contains(items, &item.id) {
                tracing::debug!(id = %item.id, "Already a favorite");
            } else {
                items.push(item.clone());
            }
        }
        FavoritesAction::Remove(id) => items.retain(|f| &f.id != id),
        FavoritesAction::Rehydrate(loaded) => *items = dedup(loaded.clone()),
    }
}

/// Keep the first entry for each id.
fn dedup(items: Vec<FavoriteItem>) -> Vec<FavoriteItem> {
    let mut out: Vec<FavoriteItem> = Vec::with_capacity(items.len());
    for item in items {
        if !contains(&out, &item.id) {
            out.push(item);
        }
    }
    out
}

/// Recover favorites from a stored blob.
///
/// Entries are read one at a time: an entry without a usable id is skipped,
/// a missing `type` is inferred from the id (numeric ids are movies), and
/// other missing fields take their defaults.
pub fn from_stored(value: Value) -> Vec<FavoriteItem> {
    let Value::Array(entries) = value else {
        tracing::warn!("Stored favorites are not a list, using defaults");
        return Vec::new();
    };

    let total = entries.len();
    let items: Vec<FavoriteItem> = entries.iter().filter_map(entry_from_stored).collect();
    if items.len() < total {
        tracing::warn!(
            skipped = total - items.len(),
            "Skipped unreadable favorites"
        );
    }
    dedup(items)
}

fn entry_from_stored(entry: &Value) -> Option<FavoriteItem> {
    let obj = entry.as_object()?;
    let id = match obj.get("id")? {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let text = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let kind = match obj.get("type").and_then(Value::as_str) {
        Some("news") => ContentKind::News,
        Some("movie") => ContentKind::Movie,
        _ if id.parse::<u64>().is_ok() => ContentKind::Movie,
        _ => ContentKind::News,
    };

    Some(FavoriteItem {
        title: text("title").unwrap_or_default(),
        description: text("description"),
        image_url: text("imageUrl"),
        url: text("url"),
        id,
        kind,
    })
}
