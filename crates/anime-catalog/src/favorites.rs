//! Favorites store.
//!
//! Hydrated once from storage, then every mutation that changes membership
//! writes the whole collection back before returning. Insertion order is
//! the canonical order.

use crate::api::Anime;
use anyhow::{Context, Result};
use chrono::Utc;
use shared::storage::{self, LocalStorage};
use shared::{FavoriteImageSet, FavoriteImages, FavoriteRecord, FavoriteSort};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const FAVORITES_KEY: &str = "favorites";

impl From<&Anime> for FavoriteRecord {
    fn from(anime: &Anime) -> Self {
        Self {
            mal_id: anime.mal_id,
            title: anime.title.clone(),
            images: FavoriteImages {
                jpg: FavoriteImageSet {
                    image_url: anime.images.jpg.image_url.clone(),
                    large_image_url: anime.images.jpg.large_image_url.clone(),
                },
            },
            score: anime.score,
            year: anime.year,
            anime_type: anime.anime_type.clone(),
            episodes: anime.episodes,
            added_at: None,
        }
    }
}

pub struct FavoritesStore<S: LocalStorage> {
    storage: S,
    items: Vec<FavoriteRecord>,
    ids: HashSet<u32>,
}

impl<S: LocalStorage> FavoritesStore<S> {
    /// Hydrate from storage. Missing or corrupt data is an empty store.
    pub fn load(storage: S) -> Self {
        let stored: Vec<FavoriteRecord> = storage::read_json(&storage, FAVORITES_KEY).unwrap_or_default();

        let mut items = Vec::with_capacity(stored.len());
        let mut ids = HashSet::with_capacity(stored.len());
        for record in stored {
            if ids.insert(record.mal_id) {
                items.push(record);
            }
        }

        debug!(count = items.len(), "Loaded favorites");
        Self { storage, items, ids }
    }

    /// Add a record; returns false if it was already a favorite
    pub fn add(&mut self, mut record: FavoriteRecord) -> bool {
        if self.ids.contains(&record.mal_id) {
            return false;
        }
        if record.added_at.is_none() {
            record.added_at = Some(Utc::now());
        }

        info!(mal_id = record.mal_id, title = %record.title, "Added favorite");
        self.ids.insert(record.mal_id);
        self.items.push(record);
        self.persist();
        true
    }

    /// Remove by id; returns false if it was not a favorite
    pub fn remove(&mut self, mal_id: u32) -> bool {
        if !self.ids.remove(&mal_id) {
            return false;
        }

        info!(mal_id = mal_id, "Removed favorite");
        self.items.retain(|r| r.mal_id != mal_id);
        self.persist();
        true
    }

    /// Flip membership; returns whether the record is now a favorite
    pub fn toggle(&mut self, record: FavoriteRecord) -> bool {
        if self.ids.contains(&record.mal_id) {
            self.remove(record.mal_id);
            false
        } else {
            self.add(record)
        }
    }

    pub fn is_favorite(&self, mal_id: u32) -> bool {
        self.ids.contains(&mal_id)
    }

    /// All favorites in insertion order
    pub fn list(&self) -> &[FavoriteRecord] {
        &self.items
    }

    pub fn get(&self, mal_id: u32) -> Option<&FavoriteRecord> {
        if !self.is_favorite(mal_id) {
            return None;
        }
        self.items.iter().find(|r| r.mal_id == mal_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Favorites whose title contains `search` (case-insensitive), ordered
    /// by `sort`. Ties keep insertion order.
    pub fn view(&self, search: &str, sort: FavoriteSort) -> Vec<&FavoriteRecord> {
        let needle = search.trim().to_lowercase();
        let mut matches: Vec<&FavoriteRecord> = self
            .items
            .iter()
            .filter(|r| needle.is_empty() || r.title.to_lowercase().contains(&needle))
            .collect();

        match sort {
            FavoriteSort::Recent => {}
            FavoriteSort::Title => matches.sort_by_key(|r| r.title.to_lowercase()),
            FavoriteSort::Score => {
                matches.sort_by(|a, b| b.score.unwrap_or(0.0).total_cmp(&a.score.unwrap_or(0.0)))
            }
            FavoriteSort::Type => {
                matches.sort_by(|a, b| {
                    let a = a.anime_type.as_deref().unwrap_or("");
                    let b = b.anime_type.as_deref().unwrap_or("");
                    a.to_lowercase().cmp(&b.to_lowercase())
                })
            }
        }

        matches
    }

    /// Write the collection to a JSON file
    pub fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&self.items).context("Failed to serialize favorites")?;
        fs::write(path, json).with_context(|| format!("Failed to write favorites: {}", path.display()))?;

        info!(path = %path.display(), count = self.items.len(), "Exported favorites");
        Ok(())
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn persist(&mut self) {
        storage::write_json(&mut self.storage, FAVORITES_KEY, &self.items);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::MemoryStorage;
    use tempfile::TempDir;

    fn record(mal_id: u32, title: &str) -> FavoriteRecord {
        FavoriteRecord {
            mal_id,
            title: title.to_string(),
            images: FavoriteImages::default(),
            score: None,
            year: None,
            anime_type: None,
            episodes: None,
            added_at: None,
        }
    }

    fn stored(store: &FavoritesStore<MemoryStorage>) -> Vec<FavoriteRecord> {
        storage::read_json(store.storage(), FAVORITES_KEY).unwrap_or_default()
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut store = FavoritesStore::load(MemoryStorage::new());
        assert!(store.add(record(1, "Cowboy Bebop")));
        assert!(!store.add(record(1, "Cowboy Bebop")));

        assert_eq!(store.len(), 1);
        assert!(store.is_favorite(1));
        assert_eq!(stored(&store).len(), 1);
    }

    #[test]
    fn test_toggle_twice_restores_membership() {
        let mut store = FavoritesStore::load(MemoryStorage::new());
        store.add(record(2, "Trigun"));

        assert!(store.toggle(record(1, "Cowboy Bebop")));
        assert!(!store.toggle(record(1, "Cowboy Bebop")));
        assert!(!store.is_favorite(1));

        assert!(!store.toggle(record(2, "Trigun")));
        assert!(store.toggle(record(2, "Trigun")));
        assert!(store.is_favorite(2));

        assert_eq!(stored(&store).len(), 1);
    }

    #[test]
    fn test_remove_missing_is_a_noop() {
        let mut store = FavoritesStore::load(MemoryStorage::new());
        assert!(!store.remove(42));
        assert!(store.storage().is_empty());
    }

    #[test]
    fn test_mutations_survive_reload() {
        let mut store = FavoritesStore::load(MemoryStorage::new());
        store.add(record(1, "Cowboy Bebop"));
        store.add(record(2, "Trigun"));
        store.add(record(3, "Akira"));
        store.remove(2);

        let reloaded = FavoritesStore::load(store.storage().clone());
        let ids: Vec<u32> = reloaded.list().iter().map(|r| r.mal_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(reloaded.list().iter().all(|r| r.added_at.is_some()));
    }

    #[test]
    fn test_corrupt_storage_loads_empty() {
        let mut storage = MemoryStorage::new();
        storage::write_string(&mut storage, FAVORITES_KEY, "[{\"mal_id\": ");
        let store = FavoritesStore::load(storage);
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate_ids_in_storage_collapse() {
        let mut storage = MemoryStorage::new();
        storage::write_json(&mut storage, FAVORITES_KEY, &[record(1, "First"), record(1, "Second")]);
        let store = FavoritesStore::load(storage);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(1).unwrap().title, "First");
    }

    #[test]
    fn test_sorting_is_stable() {
        let mut store = FavoritesStore::load(MemoryStorage::new());
        store.add(record(1, "B"));
        store.add(record(2, "A"));
        store.add(record(3, "C"));

        let titles = |sort| {
            store
                .view("", sort)
                .iter()
                .map(|r| r.title.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(titles(FavoriteSort::Title), vec!["A", "B", "C"]);
        assert_eq!(titles(FavoriteSort::Recent), vec!["B", "A", "C"]);
        // No scores or types: every key ties
        assert_eq!(titles(FavoriteSort::Score), vec!["B", "A", "C"]);
        assert_eq!(titles(FavoriteSort::Type), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_view_filters_and_orders_by_score() {
        let mut store = FavoritesStore::load(MemoryStorage::new());
        store.add(FavoriteRecord {
            score: Some(8.7),
            ..record(1, "Cowboy Bebop")
        });
        store.add(FavoriteRecord {
            score: Some(9.1),
            ..record(2, "Cowboy Bebop: The Movie")
        });
        store.add(record(3, "Akira"));

        let view = store.view("  COWBOY ", FavoriteSort::Score);
        let ids: Vec<u32> = view.iter().map(|r| r.mal_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_projection_from_catalog_item() {
        let anime: Anime = serde_json::from_value(serde_json::json!({
            "mal_id": 1,
            "title": "Cowboy Bebop",
            "images": { "jpg": {
                "image_url": "https://cdn.myanimelist.net/images/anime/4/19644.jpg",
                "large_image_url": "https://cdn.myanimelist.net/images/anime/4/19644l.jpg"
            }},
            "type": "TV",
            "episodes": 26,
            "score": 8.75,
            "year": 1998
        }))
        .unwrap();

        let record = FavoriteRecord::from(&anime);
        assert_eq!(record.mal_id, 1);
        assert_eq!(record.anime_type.as_deref(), Some("TV"));
        assert_eq!(record.episodes, Some(26));
        assert_eq!(record.year, Some(1998));
        assert!(record.images.jpg.large_image_url.unwrap().ends_with("19644l.jpg"));
    }

    #[test]
    fn test_export() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exports").join("favorites.json");

        let mut store = FavoritesStore::load(MemoryStorage::new());
        store.add(record(1, "Cowboy Bebop"));
        store.export(&path).unwrap();

        let written: Vec<FavoriteRecord> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].title, "Cowboy Bebop");
    }
}
