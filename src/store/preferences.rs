//! Preferences slice: dark mode and the selected news categories.
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User preferences, persisted under `userPreferences`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub dark_mode: bool,
    /// Ordered category tags, OR-joined into the news feed query.
    pub favorite_categories: Vec<String>,
}

impl Preferences {
    /// Recover preferences from a stored blob field by field.
    ///
    /// A field that is missing or has the wrong type falls back to its
    /// default without discarding the others. Non-string category entries
    /// are skipped.
    pub fn from_stored(value: Value) -> Self {
        let defaults = Self::default();
        let Value::Object(map) = value else {
            tracing::warn!("Stored preferences are not an object, using defaults");
            return defaults;
        };

        let dark_mode = match map.get("darkMode") {
            Some(Value::Bool(b)) => *b,
            None => defaults.dark_mode,
            Some(other) => {
                tracing::warn!(value = %other, "Ignoring malformed darkMode");
                defaults.dark_mode
            }
        };

        let favorite_categories = match map.get("favoriteCategories") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            None => defaults.favorite_categories,
            Some(other) => {
                tracing::warn!(value = %other, "Ignoring malformed favoriteCategories");
                defaults.favorite_categories
            }
        };

        Self {
            dark_mode,
            favorite_categories,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PreferencesAction {
    ToggleDarkMode,
    /// Replace the category set wholesale.
    SetFavoriteCategories(Vec<String>),
    /// Startup load from the durable store.
    Rehydrate(Preferences),
}

impl PreferencesAction {
    /// True for actions the user triggers (and that must be persisted).
    pub fn is_mutation(&self) -> bool {
        !matches!(self, PreferencesAction::Rehydrate(_))
    }
}

pub fn reduce(state: &mut Preferences, action: &PreferencesAction) {
    match action {
        PreferencesAction::ToggleDarkMode => state.dark_mode = !state.dark_mode,
        PreferencesAction::SetFavoriteCategories(tags) => {
            state.favorite_categories = tags.clone();
        }
        PreferencesAction::Rehydrate(loaded) => *state = loaded.clone(),
    }
}
