use tracing::{debug, info, warn};

use super::guid::{parse_external_id, ExternalId};
use super::title::{effective_year, split_title_year};
use super::{MatchRequest, MediaType};
use crate::error::MatchError;
use crate::locale::Locale;
use crate::metadata::{
    episode_from_record, season_from_record, show_from_series, Metadata,
};
use crate::tvdb::{
    EpisodeRecord, SearchHit, SeasonRecord, SeriesRecord, TvdbApi, DEFAULT_SEASON_TYPE,
    OFFICIAL_SEASON_TYPE,
};

/// Upper bound on episode pages scanned when matching by air date.
pub const MAX_EPISODE_PAGES: u32 = 20;

/// Resolves a match request to zero or more entities.
///
/// Only an unsupported type or an underspecified episode request is an error;
/// every upstream miss or failure yields an empty list.
pub async fn resolve_match(
    tvdb: &dyn TvdbApi,
    locale: &Locale,
    request: &MatchRequest,
) -> Result<Vec<Metadata>, MatchError> {
    match request.kind()? {
        MediaType::Show => Ok(match_show(tvdb, locale, request).await),
        MediaType::Season => Ok(match_season(tvdb, locale, request).await),
        MediaType::Episode => match_episode(tvdb, locale, request).await,
    }
}

async fn match_show(tvdb: &dyn TvdbApi, locale: &Locale, request: &MatchRequest) -> Vec<Metadata> {
    if let Some(guid) = non_blank(request.guid.as_deref()) {
        match series_by_external_id(tvdb, guid).await {
            Some(series) => {
                info!(show_id = series.id, guid = %guid, "Matched show by external id");
                return vec![Metadata::Show(show_from_series(&series, locale))];
            }
            None => debug!(guid = %guid, "External id did not resolve; trying title"),
        }
    }

    let Some(title) = non_blank(request.title.as_deref()) else {
        return Vec::new();
    };
    let hits = search_shows(tvdb, title, request.year, request.candidate_limit()).await;
    let mut matches = Vec::with_capacity(hits.len());
    for hit in hits {
        let Some(id) = hit.series_id() else {
            continue;
        };
        if let Some(series) = fetch_series_soft(tvdb, id).await {
            matches.push(Metadata::Show(show_from_series(&series, locale)));
        }
    }
    info!(title = %title, candidates = matches.len(), "Show match finished");
    matches
}

async fn match_season(
    tvdb: &dyn TvdbApi,
    locale: &Locale,
    request: &MatchRequest,
) -> Vec<Metadata> {
    let (Some(parent_title), Some(index)) =
        (non_blank(request.parent_title.as_deref()), request.index)
    else {
        debug!("Season match without parentTitle and index");
        return Vec::new();
    };
    let Some(series) = first_show(tvdb, parent_title, request.year).await else {
        return Vec::new();
    };
    let Some(season) = locate_season(&series.seasons, index, request.season_type()) else {
        info!(show_id = series.id, season = index, "Show has no such season");
        return Vec::new();
    };

    let show = show_from_series(&series, locale);
    vec![Metadata::Season(season_from_record(season, &show.as_parent()))]
}

enum EpisodeKey<'a> {
    Numbered { season: i32, episode: i32 },
    Aired(&'a str),
}

async fn match_episode(
    tvdb: &dyn TvdbApi,
    locale: &Locale,
    request: &MatchRequest,
) -> Result<Vec<Metadata>, MatchError> {
    let grandparent_title = non_blank(request.grandparent_title.as_deref())
        .ok_or(MatchError::InvalidEpisodeRequest)?;
    let key = match (
        request.parent_index,
        request.index,
        non_blank(request.date.as_deref()),
    ) {
        (Some(season), Some(episode), _) => EpisodeKey::Numbered { season, episode },
        (_, _, Some(date)) => EpisodeKey::Aired(date),
        _ => return Err(MatchError::InvalidEpisodeRequest),
    };

    let Some(series) = first_show(tvdb, grandparent_title, request.year).await else {
        return Ok(Vec::new());
    };
    let season_type = request.season_type();
    let episode = match key {
        EpisodeKey::Numbered { season, episode } => {
            match tvdb.find_episode(series.id, season_type, season, episode).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(show_id = series.id, season, episode, "Episode lookup failed: {:#}", e);
                    None
                }
            }
        }
        EpisodeKey::Aired(date) => find_episode_by_air_date(tvdb, series.id, season_type, date).await,
    };
    let Some(episode) = episode else {
        info!(show_id = series.id, "No matching episode");
        return Ok(Vec::new());
    };

    let show = show_from_series(&series, locale).as_parent();
    let season = episode
        .season_number
        .and_then(|n| locate_season(&series.seasons, n, season_type))
        .map(|s| season_from_record(s, &show).as_parent());
    Ok(vec![Metadata::Episode(episode_from_record(
        &episode,
        season.as_ref(),
        &show,
        locale,
    ))])
}

async fn series_by_external_id(tvdb: &dyn TvdbApi, guid: &str) -> Option<SeriesRecord> {
    let series_id = match parse_external_id(guid)? {
        ExternalId::Tvdb(value) => match value.trim().parse::<i64>() {
            Ok(id) => id,
            Err(_) => {
                warn!(guid = %guid, "TVDB id is not numeric");
                return None;
            }
        },
        ExternalId::Imdb(value) | ExternalId::Tmdb(value) => {
            match tvdb.search_remote_id(value).await {
                Ok(Some(id)) => id,
                Ok(None) => {
                    debug!(guid = %guid, "No series for remote id");
                    return None;
                }
                Err(e) => {
                    warn!(guid = %guid, "Remote id lookup failed: {:#}", e);
                    return None;
                }
            }
        }
        ExternalId::Unsupported { scheme, .. } => {
            debug!(scheme = %scheme, "Ignoring unsupported guid scheme");
            return None;
        }
    };
    fetch_series_soft(tvdb, series_id).await
}

/// Searches by cleaned title and effective year, English-capable entries first.
async fn search_shows(
    tvdb: &dyn TvdbApi,
    raw_title: &str,
    explicit_year: Option<i32>,
    limit: usize,
) -> Vec<SearchHit> {
    let (title, extracted_year) = split_title_year(raw_title);
    let year = effective_year(explicit_year, extracted_year);
    debug!(title = %title, year = ?year, "Searching upstream for show");
    match tvdb.search_series(&title, year).await {
        Ok(mut hits) => {
            hits.retain(|hit| hit.series_id().is_some());
            rank_by_english(&mut hits);
            hits.truncate(limit);
            for hit in &hits {
                debug!(
                    tvdb_id = ?hit.tvdb_id,
                    name = ?hit.name,
                    year = ?hit.year,
                    "Show candidate"
                );
            }
            hits
        }
        Err(e) => {
            warn!(title = %title, "Show search failed: {:#}", e);
            Vec::new()
        }
    }
}

async fn first_show(
    tvdb: &dyn TvdbApi,
    raw_title: &str,
    explicit_year: Option<i32>,
) -> Option<SeriesRecord> {
    let hit = search_shows(tvdb, raw_title, explicit_year, 1)
        .await
        .into_iter()
        .next();
    let Some(id) = hit.as_ref().and_then(SearchHit::series_id) else {
        info!(title = %raw_title, "No show found");
        return None;
    };
    fetch_series_soft(tvdb, id).await
}

async fn fetch_series_soft(tvdb: &dyn TvdbApi, id: i64) -> Option<SeriesRecord> {
    match tvdb.fetch_series(id).await {
        Ok(Some(series)) => Some(series),
        Ok(None) => {
            debug!(show_id = id, "Series not found upstream");
            None
        }
        Err(e) => {
            warn!(show_id = id, "Failed to fetch series: {:#}", e);
            None
        }
    }
}

async fn find_episode_by_air_date(
    tvdb: &dyn TvdbApi,
    series_id: i64,
    season_type: &str,
    date: &str,
) -> Option<EpisodeRecord> {
    let wanted = date_part(date);
    for page in 0..MAX_EPISODE_PAGES {
        let listing = match tvdb.fetch_episode_page(series_id, season_type, page).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!(show_id = series_id, page, "Episode page fetch failed: {:#}", e);
                return None;
            }
        };
        let has_next = listing.has_next;
        if let Some(found) = listing
            .episodes
            .into_iter()
            .find(|ep| ep.aired.as_deref().map(date_part) == Some(wanted))
        {
            return Some(found);
        }
        if !has_next {
            break;
        }
    }
    None
}

/// Stable sort: entries with an English name or overview come first.
pub fn rank_by_english(hits: &mut [SearchHit]) {
    hits.sort_by_key(|hit| !hit.has_english());
}

/// Finds season `number`, preferring the requested ordering.
///
/// Falls back to the official ordering when `default` was asked for, then to
/// any season carrying that number.
pub fn locate_season<'a>(
    seasons: &'a [SeasonRecord],
    number: i32,
    season_type: &str,
) -> Option<&'a SeasonRecord> {
    let numbered = || seasons.iter().filter(move |s| s.number == number);
    numbered()
        .find(|s| s.kind() == Some(season_type))
        .or_else(|| {
            if season_type == DEFAULT_SEASON_TYPE {
                numbered().find(|s| s.kind() == Some(OFFICIAL_SEASON_TYPE))
            } else {
                None
            }
        })
        .or_else(|| numbered().next())
}

/// Seasons of one ordering for a children listing, sorted by number.
///
/// Uses the same fallback as [`locate_season`], applied to the whole list.
pub fn seasons_for_listing<'a>(
    seasons: &'a [SeasonRecord],
    season_type: &str,
) -> Vec<&'a SeasonRecord> {
    let of_kind = |kind: &str| -> Vec<&'a SeasonRecord> {
        seasons.iter().filter(|s| s.kind() == Some(kind)).collect()
    };
    let mut picked = of_kind(season_type);
    if picked.is_empty() && season_type == DEFAULT_SEASON_TYPE {
        picked = of_kind(OFFICIAL_SEASON_TYPE);
    }
    if picked.is_empty() {
        picked = seasons.iter().collect();
    }
    picked.sort_by_key(|s| s.number);
    picked
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn date_part(value: &str) -> &str {
    let value = value.trim();
    value.split(['T', ' ']).next().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tvdb::SeasonType;
    use std::collections::HashMap;

    fn season(id: i64, number: i32, kind: &str) -> SeasonRecord {
        SeasonRecord {
            id,
            number,
            season_type: Some(SeasonType {
                kind: Some(kind.to_string()),
            }),
            ..Default::default()
        }
    }

    fn hit(id: &str, english: bool) -> SearchHit {
        let mut translations = HashMap::new();
        if english {
            translations.insert("eng".to_string(), format!("Show {id}"));
        }
        SearchHit {
            tvdb_id: Some(id.to_string()),
            translations,
            ..Default::default()
        }
    }

    #[test]
    fn english_hits_sort_first_and_keep_order() {
        let mut hits = vec![hit("1", false), hit("2", true), hit("3", false), hit("4", true)];
        rank_by_english(&mut hits);
        let ids: Vec<_> = hits.iter().filter_map(SearchHit::series_id).collect();
        assert_eq!(ids, vec![2, 4, 1, 3]);
    }

    #[test]
    fn locates_exact_season_type() {
        let seasons = vec![season(1, 1, "official"), season(2, 1, "dvd")];
        assert_eq!(locate_season(&seasons, 1, "dvd").map(|s| s.id), Some(2));
    }

    #[test]
    fn default_falls_back_to_official() {
        let seasons = vec![season(1, 1, "dvd"), season(2, 1, "official")];
        assert_eq!(locate_season(&seasons, 1, "default").map(|s| s.id), Some(2));
    }

    #[test]
    fn falls_back_to_any_type_with_number() {
        let seasons = vec![season(1, 2, "official"), season(3, 1, "absolute")];
        assert_eq!(locate_season(&seasons, 1, "default").map(|s| s.id), Some(3));
        assert_eq!(locate_season(&seasons, 1, "dvd").map(|s| s.id), Some(3));
        assert!(locate_season(&seasons, 7, "default").is_none());
    }

    #[test]
    fn listing_prefers_requested_ordering() {
        let seasons = vec![
            season(3, 2, "official"),
            season(9, 1, "dvd"),
            season(1, 1, "official"),
        ];
        let ids: Vec<_> = seasons_for_listing(&seasons, "official")
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
        let ids: Vec<_> = seasons_for_listing(&seasons, "default")
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
        let ids: Vec<_> = seasons_for_listing(&seasons, "absolute")
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![9, 1, 3]);
    }

    #[test]
    fn compares_date_portion_only() {
        assert_eq!(date_part("1998-10-24T00:00:00Z"), "1998-10-24");
        assert_eq!(date_part(" 1998-10-24 "), "1998-10-24");
    }
}
