//! Application state container.
//!
//! State is split into three slices, each with a pure reducer:
//! - [`preferences`] - dark mode and category tags
//! - [`favorites`] - deduplicated favorite snapshots
//! - [`content`] - paginated lists, search results and detail slots
//!
//! [`Store::dispatch`] runs the reducer for an action to completion and then
//! hands `(action, new state)` to every listener whose matcher accepts it.
//! Listeners are how side effects (persistence) hang off state changes
//! without the reducers knowing about them.

pub mod content;
pub mod favorites;
pub mod listeners;
pub mod preferences;

pub use content::{
    ContentAction, ContentError, ContentState, Detail, DetailSlot, Items, ListCursor,
    LoadStatus, PagedList, SearchResults,
};
pub use favorites::FavoritesAction;
pub use listeners::{register_persistence, spawn_writer, PersistJob, PersistenceHandle};
pub use preferences::{Preferences, PreferencesAction};

use crate::model::FavoriteItem;

/// Everything the dashboard renders from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub preferences: Preferences,
    pub favorites: Vec<FavoriteItem>,
    pub content: ContentState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Preferences(PreferencesAction),
    Favorites(FavoritesAction),
    Content(ContentAction),
}

impl From<PreferencesAction> for Action {
    fn from(a: PreferencesAction) -> Self {
        Action::Preferences(a)
    }
}

impl From<FavoritesAction> for Action {
    fn from(a: FavoritesAction) -> Self {
        Action::Favorites(a)
    }
}

impl From<ContentAction> for Action {
    fn from(a: ContentAction) -> Self {
        Action::Content(a)
    }
}

pub fn reduce(state: &mut AppState, action: &Action) {
    match action {
        Action::Preferences(a) => preferences::reduce(&mut state.preferences, a),
        Action::Favorites(a) => favorites::reduce(&mut state.favorites, a),
        Action::Content(a) => content::reduce(&mut state.content, a),
    }
}

// ============================================================================
// Listeners
// ============================================================================

/// Handle returned by [`Store::start_listening`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Decides whether a listener fires for an action.
pub type Matcher = fn(&Action) -> bool;

/// Runs after the reducer with the action and the resulting state.
pub type Effect = Box<dyn Fn(&Action, &AppState) + Send + Sync>;

struct Listener {
    id: ListenerId,
    matcher: Matcher,
    effect: Effect,
}

// ============================================================================
// Store
// ============================================================================

/// State container with listener subscriptions.
///
/// Rehydrate actions are accepted only until the user first mutates that
/// slice; a late rehydrate would clobber in-session changes, so it is
/// dropped with a warning.
#[derive(Default)]
pub struct Store {
    state: AppState,
    listeners: Vec<Listener>,
    next_listener: u64,
    preferences_touched: bool,
    favorites_touched: bool,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn dispatch(&mut self, action: impl Into<Action>) {
        let action = action.into();
        match &action {
            Action::Preferences(PreferencesAction::Rehydrate(_)) if self.preferences_touched => {
                tracing::warn!("Ignoring preferences rehydrate after user changes");
                return;
            }
            Action::Favorites(FavoritesAction::Rehydrate(_)) if self.favorites_touched => {
                tracing::warn!("Ignoring favorites rehydrate after user changes");
                return;
            }
            Action::Preferences(a) if a.is_mutation() => self.preferences_touched = true,
            Action::Favorites(a) if a.is_mutation() => self.favorites_touched = true,
            _ => {}
        }

        reduce(&mut self.state, &action);

        for listener in &self.listeners {
            if (listener.matcher)(&action) {
                (listener.effect)(&action, &self.state);
            }
        }
    }

    pub fn start_listening(&mut self, matcher: Matcher, effect: Effect) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push(Listener {
            id,
            matcher,
            effect,
        });
        id
    }

    /// Remove a listener, dropping its effect. Returns false for unknown ids.
    pub fn stop_listening(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() < before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fav(id: &str) -> FavoriteItem {
        FavoriteItem {
            id: id.to_string(),
            kind: ContentKind::News,
            title: id.to_string(),
            description: None,
            image_url: None,
            url: None,
        }
    }

    fn is_favorites(action: &Action) -> bool {
        matches!(action, Action::Favorites(_))
    }

    #[test]
    fn test_listener_sees_post_reduce_state() {
        let mut store = Store::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        store.start_listening(
            is_favorites,
            Box::new(move |_, state| {
                seen_clone.store(state.favorites.len(), Ordering::SeqCst);
            }),
        );

        store.dispatch(FavoritesAction::Add(fav("a")));
        store.dispatch(FavoritesAction::Add(fav("b")));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stop_listening() {
        let mut store = Store::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let id = store.start_listening(
            is_favorites,
            Box::new(move |_, _| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        store.dispatch(FavoritesAction::Add(fav("a")));
        assert!(store.stop_listening(id));
        assert!(!store.stop_listening(id));
        store.dispatch(FavoritesAction::Add(fav("b")));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_rehydrate_after_interaction_is_ignored() {
        let mut store = Store::new();
        store.dispatch(PreferencesAction::ToggleDarkMode);
        store.dispatch(PreferencesAction::Rehydrate(Preferences::default()));
        assert!(store.state().preferences.dark_mode);

        // Favorites were untouched, so their rehydrate still applies.
        store.dispatch(FavoritesAction::Rehydrate(vec![fav("a")]));
        assert_eq!(store.state().favorites.len(), 1);
    }

    #[test]
    fn test_content_actions_reach_content_slice() {
        let mut store = Store::new();
        store.dispatch(ContentAction::Rejected(ContentError::empty_query()));
        assert_eq!(
            store.state().content.error,
            Some(ContentError::empty_query())
        );
    }
}
