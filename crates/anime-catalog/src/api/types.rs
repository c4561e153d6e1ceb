//! Jikan API v4 response types.
//!
//! These types represent the JSON responses from the Jikan API. Fields the
//! API documents as nullable or omits for some entries are `Option` or
//! defaulted.

use serde::{Deserialize, Serialize};

/// Paginated list envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// Simple data wrapper (without pagination)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// One page of anime search results
pub type AnimePage = PaginatedResponse<Anime>;

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub last_visible_page: u32,
    pub has_next_page: bool,
    #[serde(default = "first_page")]
    pub current_page: u32,
    #[serde(default)]
    pub items: Option<PaginationItems>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            last_visible_page: 1,
            has_next_page: false,
            current_page: 1,
            items: None,
        }
    }
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationItems {
    pub count: u32,
    pub total: u32,
    pub per_page: u32,
}

/// Full anime record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anime {
    pub mal_id: u32,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub images: AnimeImages,
    #[serde(default)]
    pub trailer: Option<Trailer>,
    #[serde(default)]
    pub approved: bool,

    // Titles
    #[serde(default)]
    pub titles: Vec<TitleEntry>,
    pub title: String,
    pub title_english: Option<String>,
    pub title_japanese: Option<String>,
    #[serde(default)]
    pub title_synonyms: Vec<String>,

    // Type and status
    #[serde(rename = "type")]
    pub anime_type: Option<String>,
    pub source: Option<String>,
    pub episodes: Option<u32>,
    pub status: Option<String>,
    #[serde(default)]
    pub airing: bool,

    // Dates
    #[serde(default)]
    pub aired: Option<Aired>,
    pub duration: Option<String>,
    pub rating: Option<String>,

    // Scores and rankings
    pub score: Option<f64>,
    pub scored_by: Option<u32>,
    pub rank: Option<u32>,
    pub popularity: Option<u32>,
    pub members: Option<u32>,
    pub favorites: Option<u32>,

    // Synopsis
    pub synopsis: Option<String>,
    pub background: Option<String>,

    // Season
    pub season: Option<String>,
    pub year: Option<u32>,

    // Broadcast
    #[serde(default)]
    pub broadcast: Option<Broadcast>,

    // Producers, licensors, studios
    #[serde(default)]
    pub producers: Vec<MalEntity>,
    #[serde(default)]
    pub licensors: Vec<MalEntity>,
    #[serde(default)]
    pub studios: Vec<MalEntity>,

    // Genres, themes, demographics
    #[serde(default)]
    pub genres: Vec<MalEntity>,
    #[serde(default)]
    pub explicit_genres: Vec<MalEntity>,
    #[serde(default)]
    pub themes: Vec<MalEntity>,
    #[serde(default)]
    pub demographics: Vec<MalEntity>,
}

impl Anime {
    /// English title when present, otherwise the default one
    pub fn display_title(&self) -> &str {
        self.title_english.as_deref().unwrap_or(&self.title)
    }
}

/// Anime images
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimeImages {
    #[serde(default)]
    pub jpg: ImageSet,
    #[serde(default)]
    pub webp: Option<ImageSet>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageSet {
    pub image_url: Option<String>,
    pub small_image_url: Option<String>,
    pub large_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trailer {
    pub youtube_id: Option<String>,
    pub url: Option<String>,
    pub embed_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleEntry {
    #[serde(rename = "type")]
    pub title_type: String,
    pub title: String,
}

/// Aired dates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aired {
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(default)]
    pub prop: Option<AiredProp>,
    #[serde(default)]
    pub string: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiredProp {
    pub from: DateProp,
    pub to: DateProp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateProp {
    pub day: Option<u32>,
    pub month: Option<u32>,
    pub year: Option<u32>,
}

/// Broadcast information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    pub day: Option<String>,
    pub time: Option<String>,
    pub timezone: Option<String>,
    pub string: Option<String>,
}

/// MAL entity (genre, studio, producer, etc.)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MalEntity {
    pub mal_id: u32,
    #[serde(rename = "type", default)]
    pub entity_type: String,
    pub name: String,
    #[serde(default)]
    pub url: String,
}

// ========== Sub-resources ==========

/// `/anime/{id}/pictures` entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Picture {
    #[serde(default)]
    pub jpg: ImageSet,
    #[serde(default)]
    pub webp: Option<ImageSet>,
}

/// `/anime/{id}/videos`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Videos {
    #[serde(default)]
    pub promo: Vec<PromoVideo>,
    #[serde(default)]
    pub episodes: Vec<EpisodeVideo>,
    #[serde(default)]
    pub music_videos: Vec<MusicVideo>,
}

impl Videos {
    pub fn is_empty(&self) -> bool {
        self.promo.is_empty() && self.episodes.is_empty() && self.music_videos.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoVideo {
    pub title: String,
    #[serde(default)]
    pub trailer: Trailer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeVideo {
    pub mal_id: u32,
    pub title: Option<String>,
    pub episode: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicVideo {
    pub title: String,
    #[serde(default)]
    pub video: Trailer,
    #[serde(default)]
    pub meta: Option<MusicMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MusicMeta {
    pub title: Option<String>,
    pub author: Option<String>,
}

/// `/anime/{id}/statistics`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub watching: Option<u64>,
    pub completed: Option<u64>,
    pub on_hold: Option<u64>,
    pub dropped: Option<u64>,
    pub plan_to_watch: Option<u64>,
    pub total: Option<u64>,
    #[serde(default)]
    pub scores: Vec<ScoreBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBucket {
    pub score: u8,
    pub votes: u64,
    #[serde(default)]
    pub percentage: f64,
}

impl Statistics {
    /// Total number of score votes across all buckets
    pub fn score_votes(&self) -> u64 {
        self.scores.iter().map(|b| b.votes).sum()
    }

    /// Sum of every list status
    pub fn list_total(&self) -> u64 {
        [
            self.watching,
            self.completed,
            self.on_hold,
            self.dropped,
            self.plan_to_watch,
        ]
        .iter()
        .map(|v| v.unwrap_or(0))
        .sum()
    }

    /// Share of watchers who finished, in percent
    pub fn completion_rate(&self) -> Option<f64> {
        let watching = self.watching?;
        let completed = self.completed?;
        let started = watching + completed;
        if started == 0 {
            return None;
        }
        Some(completed as f64 / started as f64 * 100.0)
    }

    /// Drops relative to score votes, in percent
    pub fn drop_rate(&self) -> Option<f64> {
        let dropped = self.dropped?;
        let votes = self.score_votes();
        if votes == 0 {
            return None;
        }
        Some(dropped as f64 / votes as f64 * 100.0)
    }
}

/// `/anime/{id}/relations` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub relation: String,
    #[serde(default)]
    pub entry: Vec<MalEntity>,
}

/// `/anime/{id}/characters` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRole {
    pub character: Character,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub favorites: Option<u32>,
    #[serde(default)]
    pub voice_actors: Vec<VoiceActor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub mal_id: u32,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub images: AnimeImages,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceActor {
    pub person: Person,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub mal_id: u32,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub images: AnimeImages,
    pub name: String,
}

/// Error response from Jikan API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JikanError {
    pub status: u16,
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub error: Option<String>,
}
