use anyhow::Result;
use futures::future::join_all;
use tracing::{debug, info};

use crate::container::{Listing, Paging};
use crate::locale::Locale;
use crate::matching::{locate_season, seasons_for_listing, MAX_EPISODE_PAGES};
use crate::metadata::{
    episode_from_record, season_from_record, show_from_series, Children, Metadata, RatingKey,
    ShowRef,
};
use crate::tvdb::{
    EpisodeRecord, SeriesRecord, TvdbApi, DEFAULT_SEASON_TYPE, OFFICIAL_SEASON_TYPE,
};

/// Per-request view of the catalog: who to ask and in which language.
pub struct Library<'a> {
    tvdb: &'a dyn TvdbApi,
    locale: &'a Locale,
    /// Language the upstream already answers in; no translation calls needed.
    upstream_language: &'a str,
}

impl<'a> Library<'a> {
    pub fn new(tvdb: &'a dyn TvdbApi, locale: &'a Locale, upstream_language: &'a str) -> Self {
        Self {
            tvdb,
            locale,
            upstream_language,
        }
    }

    /// Single entity by rating key. `Ok(None)` when the upstream has no such id.
    pub async fn lookup(&self, key: RatingKey, include_children: bool) -> Result<Option<Metadata>> {
        match key {
            RatingKey::Show(id) => {
                let Some(series) = self.tvdb.fetch_series(id).await? else {
                    return Ok(None);
                };
                let mut show = show_from_series(&series, self.locale);
                if include_children {
                    let parent = show.as_parent();
                    let seasons = self.season_entities(&series, &parent, OFFICIAL_SEASON_TYPE);
                    show.children = Some(Children {
                        size: seasons.len(),
                        metadata: seasons,
                    });
                }
                Ok(Some(Metadata::Show(show)))
            }
            RatingKey::Season(id) => {
                let Some(season) = self.tvdb.fetch_season(id).await? else {
                    return Ok(None);
                };
                let Some(series) = self.parent_series(season.series_id).await? else {
                    return Ok(None);
                };
                let show = show_from_series(&series, self.locale).as_parent();
                Ok(Some(Metadata::Season(season_from_record(&season, &show))))
            }
            RatingKey::Episode(id) => {
                let Some(episode) = self.tvdb.fetch_episode(id).await? else {
                    return Ok(None);
                };
                let Some(series) = self.parent_series(episode.series_id).await? else {
                    return Ok(None);
                };
                let show = show_from_series(&series, self.locale).as_parent();
                Ok(Some(self.episode_entity(
                    &series,
                    &show,
                    &episode,
                    DEFAULT_SEASON_TYPE,
                )))
            }
        }
    }

    /// Seasons of a show, or episodes of a season.
    pub async fn children(
        &self,
        key: RatingKey,
        paging: Paging,
        season_type: Option<&str>,
    ) -> Result<Option<Listing>> {
        match key {
            RatingKey::Show(id) => {
                let Some(series) = self.tvdb.fetch_series(id).await? else {
                    return Ok(None);
                };
                let show = show_from_series(&series, self.locale).as_parent();
                let seasons = self.season_entities(
                    &series,
                    &show,
                    season_type.unwrap_or(OFFICIAL_SEASON_TYPE),
                );
                let (total_size, items) = paging.window(seasons);
                Ok(Some(Listing {
                    offset: paging.start,
                    total_size,
                    items,
                }))
            }
            RatingKey::Season(id) => {
                let Some(season) = self.tvdb.fetch_season(id).await? else {
                    return Ok(None);
                };
                let Some(series) = self.parent_series(season.series_id).await? else {
                    return Ok(None);
                };
                let show = show_from_series(&series, self.locale).as_parent();
                let parent = season_from_record(&season, &show).as_parent();

                let mut episodes = season.episodes;
                episodes.sort_by_key(|e| e.number.unwrap_or(i32::MAX));
                let (total_size, page) = paging.window(episodes);
                let items = self
                    .localize(page)
                    .await
                    .iter()
                    .map(|ep| {
                        Metadata::Episode(episode_from_record(ep, Some(&parent), &show, self.locale))
                    })
                    .collect();
                Ok(Some(Listing {
                    offset: paging.start,
                    total_size,
                    items,
                }))
            }
            RatingKey::Episode(_) => Ok(Some(Listing {
                offset: paging.start,
                total_size: 0,
                items: Vec::new(),
            })),
        }
    }

    /// Every episode of a show, in aired order.
    pub async fn grandchildren(
        &self,
        key: RatingKey,
        paging: Paging,
        season_type: Option<&str>,
    ) -> Result<Option<Listing>> {
        let RatingKey::Show(id) = key else {
            return Ok(Some(Listing {
                offset: paging.start,
                total_size: 0,
                items: Vec::new(),
            }));
        };
        let Some(series) = self.tvdb.fetch_series(id).await? else {
            return Ok(None);
        };
        let season_type = season_type.unwrap_or(DEFAULT_SEASON_TYPE);
        let mut episodes = Vec::new();
        for page in 0..MAX_EPISODE_PAGES {
            let listing = self
                .tvdb
                .fetch_episode_page(series.id, season_type, page)
                .await?;
            episodes.extend(listing.episodes);
            if !listing.has_next {
                break;
            }
        }
        debug!(show_id = series.id, episodes = episodes.len(), "Collected episodes");

        let show = show_from_series(&series, self.locale).as_parent();
        let (total_size, page) = paging.window(episodes);
        let items = self
            .localize(page)
            .await
            .iter()
            .map(|ep| self.episode_entity(&series, &show, ep, season_type))
            .collect();
        Ok(Some(Listing {
            offset: paging.start,
            total_size,
            items,
        }))
    }

    async fn parent_series(&self, series_id: Option<i64>) -> Result<Option<SeriesRecord>> {
        match series_id {
            Some(id) => self.tvdb.fetch_series(id).await,
            None => Ok(None),
        }
    }

    fn season_entities(
        &self,
        series: &SeriesRecord,
        show: &ShowRef,
        season_type: &str,
    ) -> Vec<Metadata> {
        seasons_for_listing(&series.seasons, season_type)
            .into_iter()
            .map(|s| Metadata::Season(season_from_record(s, show)))
            .collect()
    }

    fn episode_entity(
        &self,
        series: &SeriesRecord,
        show: &ShowRef,
        episode: &EpisodeRecord,
        season_type: &str,
    ) -> Metadata {
        let season = episode
            .season_number
            .and_then(|n| locate_season(&series.seasons, n, season_type))
            .map(|s| season_from_record(s, show).as_parent());
        Metadata::Episode(episode_from_record(
            episode,
            season.as_ref(),
            show,
            self.locale,
        ))
    }

    /// Fetches translations for a page of episodes concurrently. Failures keep
    /// the untranslated record.
    async fn localize(&self, episodes: Vec<EpisodeRecord>) -> Vec<EpisodeRecord> {
        let language = self.locale.tvdb_language();
        if language == self.upstream_language || episodes.is_empty() {
            return episodes;
        }
        let lookups = episodes
            .iter()
            .map(|ep| self.tvdb.fetch_episode_translation(ep.id, &language));
        let translations = join_all(lookups).await;
        info!(
            language = %language,
            episodes = episodes.len(),
            "Fetched episode translations"
        );
        episodes
            .into_iter()
            .zip(translations)
            .map(|(mut episode, translation)| {
                match translation {
                    Ok(Some(t)) => episode.apply_translation(t),
                    Ok(None) => {}
                    Err(e) => debug!(episode_id = episode.id, "Translation fetch failed: {:#}", e),
                }
                episode
            })
            .collect()
    }
}
