//! Anime detail page: the overview plus lazily loaded sections.

use crate::api::{Anime, CancelToken, CharacterRole, ContextScope, Picture, Relation, Statistics, Videos};
use crate::cache::{Cached, QueryCache};
use crate::error::QueryError;
use anyhow::bail;
use std::sync::Arc;
use tracing::debug;

/// Tabs below the overview. Only the active one is ever fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailSection {
    Characters,
    /// Pictures and videos
    Media,
    Statistics,
    Related,
}

impl DetailSection {
    pub const ALL: [DetailSection; 4] = [
        DetailSection::Characters,
        DetailSection::Media,
        DetailSection::Statistics,
        DetailSection::Related,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetailSection::Characters => "characters",
            DetailSection::Media => "media",
            DetailSection::Statistics => "statistics",
            DetailSection::Related => "related",
        }
    }
}

impl std::fmt::Display for DetailSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DetailSection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match DetailSection::ALL.iter().find(|section| section.as_str() == lower) {
            Some(section) => Ok(*section),
            None => bail!("Unknown detail section: {}", s),
        }
    }
}

/// Loaded content of one section
#[derive(Debug, Clone, PartialEq)]
pub enum SectionData {
    Characters(Arc<Vec<CharacterRole>>),
    Media {
        pictures: Arc<Vec<Picture>>,
        videos: Arc<Videos>,
    },
    Statistics(Arc<Statistics>),
    Related(Arc<Vec<Relation>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionView {
    pub section: DetailSection,
    pub data: SectionData,
    pub is_stale: bool,
}

/// One open detail page.
///
/// The overview lives as long as the page. Sections share a `ContextScope`,
/// so opening one cancels whatever the previous section still had in
/// flight. Dropping the page cancels everything.
pub struct DetailPage {
    cache: QueryCache,
    mal_id: u32,
    page: CancelToken,
    sections: ContextScope,
}

impl DetailPage {
    pub fn new(cache: QueryCache, mal_id: u32) -> Self {
        Self {
            cache,
            mal_id,
            page: CancelToken::new(),
            sections: ContextScope::new(),
        }
    }

    pub fn mal_id(&self) -> u32 {
        self.mal_id
    }

    pub async fn overview(&self) -> Result<Option<Cached<Arc<Anime>>>, QueryError> {
        self.cache.anime(self.mal_id, &self.page).await
    }

    /// Make `section` the active one and load it.
    ///
    /// `Ok(None)` when another section was opened (or the page closed)
    /// before this one finished.
    pub async fn open(&self, section: DetailSection) -> Result<Option<SectionView>, QueryError> {
        let token = self.sections.enter();
        debug!(mal_id = self.mal_id, section = %section, "Opening detail section");

        let id = self.mal_id;
        let loaded = match section {
            DetailSection::Characters => self
                .cache
                .characters(id, &token)
                .await?
                .map(|c| (SectionData::Characters(c.value), c.is_stale)),
            DetailSection::Statistics => self
                .cache
                .statistics(id, &token)
                .await?
                .map(|c| (SectionData::Statistics(c.value), c.is_stale)),
            DetailSection::Related => self
                .cache
                .relations(id, &token)
                .await?
                .map(|c| (SectionData::Related(c.value), c.is_stale)),
            DetailSection::Media => {
                let (pictures, videos) =
                    tokio::try_join!(self.cache.pictures(id, &token), self.cache.videos(id, &token))?;
                match (pictures, videos) {
                    (Some(p), Some(v)) => Some((
                        SectionData::Media {
                            pictures: p.value,
                            videos: v.value,
                        },
                        p.is_stale || v.is_stale,
                    )),
                    _ => None,
                }
            }
        };

        Ok(loaded.map(|(data, is_stale)| SectionView {
            section,
            data,
            is_stale,
        }))
    }

    /// Leave the active section without opening another
    pub fn close_section(&self) {
        self.sections.leave();
    }
}

impl Drop for DetailPage {
    fn drop(&mut self) {
        self.page.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::FakeSource;
    use crate::cache::CacheSettings;
    use std::time::Duration;

    fn page_over(source: &Arc<FakeSource>, mal_id: u32) -> DetailPage {
        DetailPage::new(QueryCache::new(source.clone(), CacheSettings::default()), mal_id)
    }

    #[test]
    fn test_section_names() {
        assert_eq!("Media".parse::<DetailSection>().unwrap(), DetailSection::Media);
        assert_eq!(" related ".parse::<DetailSection>().unwrap(), DetailSection::Related);
        assert!("episodes".parse::<DetailSection>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sections_load_lazily() {
        let source = FakeSource::new(Duration::from_millis(10), 1);
        let page = page_over(&source, 21);

        let view = page.open(DetailSection::Statistics).await.unwrap().unwrap();
        assert!(matches!(view.data, SectionData::Statistics(_)));
        assert!(!view.is_stale);

        assert_eq!(source.calls("statistics:21"), 1);
        assert_eq!(source.calls("characters:21"), 0);
        assert_eq!(source.calls("pictures:21"), 0);
        assert_eq!(source.calls("anime:21"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_media_loads_pictures_and_videos() {
        let source = FakeSource::new(Duration::from_millis(10), 1);
        let page = page_over(&source, 5);

        let view = page.open(DetailSection::Media).await.unwrap().unwrap();
        match view.data {
            SectionData::Media { pictures, videos } => {
                assert_eq!(pictures.len(), 1);
                assert!(videos.is_empty());
            }
            other => panic!("unexpected section data: {:?}", other),
        }
        assert_eq!(source.calls("pictures:5"), 1);
        assert_eq!(source.calls("videos:5"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_sections_cancels_the_previous_one() {
        let source = FakeSource::new(Duration::from_millis(500), 1);
        let page = page_over(&source, 1);

        let (abandoned, active) = tokio::join!(page.open(DetailSection::Characters), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            page.open(DetailSection::Statistics).await
        });

        assert!(matches!(abandoned, Ok(None)));
        assert!(matches!(
            active.unwrap().unwrap().data,
            SectionData::Statistics(_)
        ));

        // The abandoned fetch was started, then aborted without a trace
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.calls("characters:1"), 1);
        assert_eq!(page.cache.stats().entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overview_is_independent_of_sections() {
        let source = FakeSource::new(Duration::from_millis(10), 1);
        let page = page_over(&source, 8);

        page.open(DetailSection::Related).await.unwrap();
        page.close_section();

        let overview = page.overview().await.unwrap().unwrap();
        assert_eq!(overview.value.mal_id, 8);
    }
}
