//! Persistence-on-change listeners.
//!
//! Two subscriptions snapshot the favorites list and the preferences object
//! after every user mutation and queue them for a single writer task. The
//! channel keeps writes in dispatch order, so the last snapshot per key is
//! the one left in the durable store.
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Action, FavoritesAction, ListenerId, Preferences, PreferencesAction, Store};
use crate::model::FavoriteItem;
use crate::storage::{PersistentBridge, StorageKey};

/// A snapshot waiting to be written.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistJob {
    Favorites(Vec<FavoriteItem>),
    Preferences(Preferences),
}

/// Add and remove; rehydrate never matches.
pub fn is_favorites_mutation(action: &Action) -> bool {
    matches!(
        action,
        Action::Favorites(FavoritesAction::Add(_) | FavoritesAction::Remove(_))
    )
}

/// Dark mode and category changes; rehydrate never matches.
pub fn is_preferences_mutation(action: &Action) -> bool {
    matches!(
        action,
        Action::Preferences(
            PreferencesAction::ToggleDarkMode | PreferencesAction::SetFavoriteCategories(_)
        )
    )
}

/// Subscribe both persistence listeners; each holds a clone of `tx`.
pub fn register_persistence(
    store: &mut Store,
    tx: mpsc::UnboundedSender<PersistJob>,
) -> [ListenerId; 2] {
    let favorites_tx = tx.clone();
    let favorites = store.start_listening(
        is_favorites_mutation,
        Box::new(move |_, state| {
            let job = PersistJob::Favorites(state.favorites.clone());
            if favorites_tx.send(job).is_err() {
                tracing::warn!("Persistence writer gone, favorites not saved");
            }
        }),
    );

    let preferences = store.start_listening(
        is_preferences_mutation,
        Box::new(move |_, state| {
            let job = PersistJob::Preferences(state.preferences.clone());
            if tx.send(job).is_err() {
                tracing::warn!("Persistence writer gone, preferences not saved");
            }
        }),
    );

    [favorites, preferences]
}

/// Apply queued jobs to `bridge` until every sender is dropped.
///
/// The task resolves to the number of jobs written.
pub fn spawn_writer(
    bridge: PersistentBridge,
    mut rx: mpsc::UnboundedReceiver<PersistJob>,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut written = 0;
        while let Some(job) = rx.recv().await {
            match &job {
                PersistJob::Favorites(items) => {
                    bridge.save(StorageKey::Favorites, items).await;
                }
                PersistJob::Preferences(prefs) => {
                    bridge.save(StorageKey::UserPreferences, prefs).await;
                }
            }
            written += 1;
        }
        tracing::debug!(written, "Persistence writer finished");
        written
    })
}

/// Registered listeners plus the writer task behind them.
pub struct PersistenceHandle {
    listeners: [ListenerId; 2],
    writer: JoinHandle<usize>,
}

impl PersistenceHandle {
    /// Register listeners on `store` and start a writer over `bridge`.
    pub fn install(store: &mut Store, bridge: PersistentBridge) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let listeners = register_persistence(store, tx);
        let writer = spawn_writer(bridge, rx);
        Self { listeners, writer }
    }

    /// Unsubscribe and wait for queued writes to land.
    ///
    /// Removing the listeners drops the last senders, which ends the writer.
    pub async fn teardown(self, store: &mut Store) -> usize {
        for id in self.listeners {
            store.stop_listening(id);
        }
        match self.writer.await {
            Ok(written) => written,
            Err(e) => {
                tracing::error!(error = %e, "Persistence writer failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentKind;
    use crate::storage::Database;
    use pretty_assertions::assert_eq;

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

    #[test]
    fn test_matchers_exclude_rehydrate() {
        assert!(!is_favorites_mutation(&Action::Favorites(
            FavoritesAction::Rehydrate(vec![])
        )));
        assert!(!is_preferences_mutation(&Action::Preferences(
            PreferencesAction::Rehydrate(Preferences::default())
        )));
        assert!(is_favorites_mutation(&Action::Favorites(
            FavoritesAction::Remove("a".to_string())
        )));
    }

    #[test]
    fn test_rehydrate_then_add_sends_one_job() {
        let mut store = Store::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        register_persistence(&mut store, tx);

        store.dispatch(FavoritesAction::Rehydrate(vec![fav("a")]));
        store.dispatch(FavoritesAction::Add(fav("b")));

        assert_eq!(
            rx.try_recv().unwrap(),
            PersistJob::Favorites(vec![fav("a"), fav("b")])
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_teardown_flushes_to_bridge() {
        let db = Database::open(":memory:").await.unwrap();
        let bridge = PersistentBridge::new(db);
        let mut store = Store::new();
        let handle = PersistenceHandle::install(&mut store, bridge.clone());

        store.dispatch(PreferencesAction::ToggleDarkMode);
        store.dispatch(PreferencesAction::SetFavoriteCategories(vec![
            "science".to_string(),
        ]));
        store.dispatch(FavoritesAction::Add(fav("a")));

        assert_eq!(handle.teardown(&mut store).await, 3);
        assert_eq!(store.listener_count(), 0);

        let prefs = bridge.load_preferences().await;
        assert!(prefs.dark_mode);
        assert_eq!(prefs.favorite_categories, vec!["science".to_string()]);
        assert_eq!(bridge.load_favorites().await, vec![fav("a")]);
    }
}
