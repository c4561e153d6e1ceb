//! Persisted models.
//!
//! Everything in here is written to durable storage or to a shareable URL:
//! the filter bundle and its value types, the list/grid view mode, and the
//! reduced favorite record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Declares a closed set of Jikan query values with their wire strings.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(anyhow::anyhow!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }
    };
}

wire_enum! {
    /// Anime media type
    AnimeType {
        Tv => "tv",
        Movie => "movie",
        Ova => "ova",
        Special => "special",
        Ona => "ona",
        Music => "music",
        Cm => "cm",
        Pv => "pv",
        TvSpecial => "tv_special",
    }
}

wire_enum! {
    /// Airing status filter
    AiringStatus {
        Airing => "airing",
        Complete => "complete",
        Upcoming => "upcoming",
    }
}

wire_enum! {
    /// Audience rating filter
    Rating {
        G => "g",
        Pg => "pg",
        Pg13 => "pg13",
        R17 => "r17",
        R => "r",
        Rx => "rx",
    }
}

wire_enum! {
    /// Field a list query is ordered by
    OrderBy {
        MalId => "mal_id",
        Title => "title",
        StartDate => "start_date",
        EndDate => "end_date",
        Episodes => "episodes",
        Score => "score",
        ScoredBy => "scored_by",
        Rank => "rank",
        Popularity => "popularity",
        Members => "members",
        Favorites => "favorites",
    }
}

wire_enum! {
    /// Sort direction
    SortDirection {
        Asc => "asc",
        Desc => "desc",
    }
}

wire_enum! {
    /// Browse layout
    ViewMode {
        Grid => "grid",
        List => "list",
    }
}

impl Default for ViewMode {
    fn default() -> Self {
        ViewMode::Grid
    }
}

/// The filter bundle persisted as one storage value.
///
/// `None` means "no filter" for every field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSet {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub anime_type: Option<AnimeType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AiringStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortDirection>,
}

impl FilterSet {
    pub fn is_empty(&self) -> bool {
        *self == FilterSet::default()
    }
}

/// Image references kept with a favorite
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FavoriteImages {
    pub jpg: FavoriteImageSet,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FavoriteImageSet {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub large_image_url: Option<String>,
}

/// Reduced projection of a catalog item, stored without needing a refetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteRecord {
    pub mal_id: u32,
    pub title: String,
    #[serde(default)]
    pub images: FavoriteImages,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(rename = "type", default)]
    pub anime_type: Option<String>,
    #[serde(default)]
    pub episodes: Option<u32>,
    /// When the record was favorited; older stores lack it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

wire_enum! {
    /// Ordering of the favorites view
    FavoriteSort {
        Recent => "recent",
        Title => "title",
        Score => "score",
        Type => "type",
    }
}

impl Default for FavoriteSort {
    fn default() -> Self {
        FavoriteSort::Recent
    }
}
