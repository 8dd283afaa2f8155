use serde::Serialize;
use std::fmt;

use crate::locale::Locale;
use crate::tvdb::{
    Artwork, EpisodeRecord, SeasonRecord, SeriesRecord, Translations, ARTWORK_BASE,
};

pub const PROVIDER_IDENTIFIER: &str = "tv.plex.agents.custom.tvdb";
pub const PROVIDER_TITLE: &str = "TheTVDB";

const ARTWORK_BACKGROUND: i64 = 3;

/// Identity of a synthesized entity: `tvdb-show-76885` and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingKey {
    Show(i64),
    Season(i64),
    Episode(i64),
}

impl RatingKey {
    pub fn parse(input: &str) -> Option<Self> {
        let rest = input.strip_prefix("tvdb-")?;
        let (kind, id) = rest.split_once('-')?;
        let id: i64 = id.parse().ok().filter(|id| *id > 0)?;
        match kind {
            "show" => Some(Self::Show(id)),
            "season" => Some(Self::Season(id)),
            "episode" => Some(Self::Episode(id)),
            _ => None,
        }
    }

    fn kind(&self) -> (&'static str, i64) {
        match *self {
            Self::Show(id) => ("show", id),
            Self::Season(id) => ("season", id),
            Self::Episode(id) => ("episode", id),
        }
    }

    pub fn guid(&self) -> String {
        let (kind, id) = self.kind();
        format!("{PROVIDER_IDENTIFIER}://{kind}/{id}")
    }

    pub fn key(&self) -> String {
        format!("/library/metadata/{self}")
    }
}

impl fmt::Display for RatingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, id) = self.kind();
        write!(f, "tvdb-{kind}-{id}")
    }
}

/// A resolved show, season or episode, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Metadata {
    Show(Show),
    Season(Season),
    Episode(Episode),
}

impl Metadata {
    pub fn rating_key(&self) -> &str {
        match self {
            Metadata::Show(s) => &s.rating_key,
            Metadata::Season(s) => &s.rating_key,
            Metadata::Episode(e) => &e.rating_key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuidRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Children {
    pub size: usize,
    #[serde(rename = "Metadata")]
    pub metadata: Vec<Metadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Show {
    pub rating_key: String,
    pub key: String,
    pub guid: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub originally_available_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub studio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_rating: Option<String>,
    /// Milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art: Option<String>,
    #[serde(rename = "Genre", skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<Tag>,
    #[serde(rename = "Guid")]
    pub guids: Vec<GuidRef>,
    #[serde(rename = "Children", skip_serializing_if = "Option::is_none")]
    pub children: Option<Children>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub rating_key: String,
    pub key: String,
    pub guid: String,
    pub title: String,
    pub index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art: Option<String>,
    pub parent_rating_key: String,
    pub parent_key: String,
    pub parent_guid: String,
    pub parent_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_thumb: Option<String>,
    #[serde(rename = "Guid")]
    pub guids: Vec<GuidRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub rating_key: String,
    pub key: String,
    pub guid: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absolute_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub originally_available_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_rating_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_thumb: Option<String>,
    pub grandparent_rating_key: String,
    pub grandparent_key: String,
    pub grandparent_guid: String,
    pub grandparent_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grandparent_thumb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grandparent_art: Option<String>,
    #[serde(rename = "Guid")]
    pub guids: Vec<GuidRef>,
}

/// Denormalized copy of a show, captured for child back-references.
#[derive(Debug, Clone, PartialEq)]
pub struct ShowRef {
    pub rating_key: String,
    pub key: String,
    pub guid: String,
    pub title: String,
    pub thumb: Option<String>,
    pub art: Option<String>,
}

impl Show {
    pub fn as_parent(&self) -> ShowRef {
        ShowRef {
            rating_key: self.rating_key.clone(),
            key: self.key.clone(),
            guid: self.guid.clone(),
            title: self.title.clone(),
            thumb: self.thumb.clone(),
            art: self.art.clone(),
        }
    }
}

/// Denormalized copy of a season for episode back-references.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonRef {
    pub rating_key: String,
    pub key: String,
    pub guid: String,
    pub title: String,
    pub thumb: Option<String>,
}

impl Season {
    pub fn as_parent(&self) -> SeasonRef {
        SeasonRef {
            rating_key: self.rating_key.clone(),
            key: self.key.clone(),
            guid: self.guid.clone(),
            title: self.title.clone(),
            thumb: self.thumb.clone(),
        }
    }
}

pub fn show_from_series(series: &SeriesRecord, locale: &Locale) -> Show {
    let key = RatingKey::Show(series.id);
    let language = locale.tvdb_language();
    let translations = series.translations.as_ref();
    let original = series.name.clone().filter(|n| !n.trim().is_empty());
    let title = localized_name(translations, &language)
        .map(str::to_string)
        .or_else(|| original.clone())
        .unwrap_or_else(|| format!("Series {}", series.id));
    let summary = localized_overview(translations, &language)
        .map(str::to_string)
        .or_else(|| series.overview.clone())
        .filter(|s| !s.trim().is_empty());
    let year = series
        .year
        .as_deref()
        .and_then(parse_year)
        .or_else(|| series.first_aired.as_deref().and_then(parse_year));

    let mut guids = vec![GuidRef {
        id: format!("tvdb://{}", series.id),
    }];
    for remote in &series.remote_ids {
        let scheme = match remote.source_name.as_deref() {
            Some("IMDB") => "imdb",
            Some("TheMovieDB.com") => "tmdb",
            _ => continue,
        };
        guids.push(GuidRef {
            id: format!("{scheme}://{}", remote.id),
        });
    }

    let country = locale.tvdb_country();
    let content_rating = series
        .content_ratings
        .iter()
        .find(|r| r.country.as_deref() == Some(country.as_str()))
        .and_then(|r| r.name.clone());

    Show {
        rating_key: key.to_string(),
        key: key.key(),
        guid: key.guid(),
        original_title: original.filter(|o| *o != title),
        title,
        summary,
        year,
        originally_available_at: series.first_aired.clone().filter(|d| !d.is_empty()),
        studio: series.original_network.as_ref().and_then(|n| n.name.clone()),
        content_rating,
        duration: series.average_runtime.map(minutes_to_millis),
        thumb: series.image.as_deref().and_then(artwork_url),
        art: best_background(&series.artworks),
        genres: series
            .genres
            .iter()
            .map(|g| Tag {
                tag: g.name.clone(),
            })
            .collect(),
        guids,
        children: None,
    }
}

pub fn season_from_record(season: &SeasonRecord, show: &ShowRef) -> Season {
    let key = RatingKey::Season(season.id);
    let title = season
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| season_title(season.number));
    Season {
        rating_key: key.to_string(),
        key: key.key(),
        guid: key.guid(),
        title,
        index: season.number,
        summary: None,
        year: season.year.as_deref().and_then(parse_year),
        thumb: season
            .image
            .as_deref()
            .and_then(artwork_url)
            .or_else(|| show.thumb.clone()),
        art: show.art.clone(),
        parent_rating_key: show.rating_key.clone(),
        parent_key: show.key.clone(),
        parent_guid: show.guid.clone(),
        parent_title: show.title.clone(),
        parent_thumb: show.thumb.clone(),
        guids: vec![GuidRef {
            id: format!("tvdb://{}", season.id),
        }],
    }
}

pub fn episode_from_record(
    episode: &EpisodeRecord,
    season: Option<&SeasonRef>,
    show: &ShowRef,
    locale: &Locale,
) -> Episode {
    let key = RatingKey::Episode(episode.id);
    let language = locale.tvdb_language();
    let translations = episode.translations.as_ref();
    let title = localized_name(translations, &language)
        .map(str::to_string)
        .or_else(|| episode.name.clone().filter(|n| !n.trim().is_empty()))
        .unwrap_or_else(|| match episode.number {
            Some(n) => format!("Episode {n}"),
            None => "Episode".to_string(),
        });
    let summary = localized_overview(translations, &language)
        .map(str::to_string)
        .or_else(|| episode.overview.clone())
        .filter(|s| !s.trim().is_empty());
    let aired = episode.aired.clone().filter(|d| !d.is_empty());

    Episode {
        rating_key: key.to_string(),
        key: key.key(),
        guid: key.guid(),
        title,
        index: episode.number,
        parent_index: episode.season_number,
        absolute_index: episode.absolute_number.filter(|n| *n > 0),
        summary,
        year: aired.as_deref().and_then(parse_year),
        originally_available_at: aired,
        duration: episode.runtime.map(minutes_to_millis),
        thumb: episode.image.as_deref().and_then(artwork_url),
        parent_rating_key: season.map(|s| s.rating_key.clone()),
        parent_key: season.map(|s| s.key.clone()),
        parent_guid: season.map(|s| s.guid.clone()),
        parent_title: season.map(|s| s.title.clone()),
        parent_thumb: season.and_then(|s| s.thumb.clone()),
        grandparent_rating_key: show.rating_key.clone(),
        grandparent_key: show.key.clone(),
        grandparent_guid: show.guid.clone(),
        grandparent_title: show.title.clone(),
        grandparent_thumb: show.thumb.clone(),
        grandparent_art: show.art.clone(),
        guids: vec![GuidRef {
            id: format!("tvdb://{}", episode.id),
        }],
    }
}

pub fn season_title(number: i32) -> String {
    if number == 0 {
        "Specials".to_string()
    } else {
        format!("Season {number}")
    }
}

/// Upstream images are usually absolute; older records carry a bare path.
pub fn artwork_url(path: &str) -> Option<String> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    if path.starts_with("http://") || path.starts_with("https://") {
        return Some(path.to_string());
    }
    let sep = if path.starts_with('/') { "" } else { "/" };
    Some(format!("{ARTWORK_BASE}{sep}{path}"))
}

fn best_background(artworks: &[Artwork]) -> Option<String> {
    artworks
        .iter()
        .filter(|a| a.kind == Some(ARTWORK_BACKGROUND))
        .max_by(|a, b| {
            a.score
                .unwrap_or(0.0)
                .partial_cmp(&b.score.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .and_then(|a| a.image.as_deref())
        .and_then(artwork_url)
}

fn localized_name<'a>(translations: Option<&'a Translations>, language: &str) -> Option<&'a str> {
    translations.and_then(|t| t.name(language))
}

fn localized_overview<'a>(
    translations: Option<&'a Translations>,
    language: &str,
) -> Option<&'a str> {
    translations.and_then(|t| t.overview(language))
}

fn parse_year(date: &str) -> Option<i32> {
    date.get(..4).and_then(|y| y.parse().ok())
}

fn minutes_to_millis(minutes: i32) -> i64 {
    i64::from(minutes) * 60_000
}
