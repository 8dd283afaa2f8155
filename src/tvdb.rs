use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{header::ACCEPT_LANGUAGE, Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::Config;

pub const TVDB_BASE: &str = "https://api4.thetvdb.com/v4";
pub const ARTWORK_BASE: &str = "https://artworks.thetvdb.com";
pub const DEFAULT_SEASON_TYPE: &str = "default";
pub const OFFICIAL_SEASON_TYPE: &str = "official";
pub const ENGLISH: &str = "eng";

// Tokens are issued for a month; refresh a little early.
const TOKEN_LIFETIME_DAYS: i64 = 28;

/// Upstream catalog operations used by matching and metadata lookup.
///
/// Not-found is `Ok(None)` so callers can tell a miss from a failed request.
#[async_trait]
pub trait TvdbApi: Send + Sync {
    async fn search_series(&self, query: &str, year: Option<i32>) -> Result<Vec<SearchHit>>;
    /// Resolves an IMDb or TMDB id to a series id.
    async fn search_remote_id(&self, remote_id: &str) -> Result<Option<i64>>;
    async fn fetch_series(&self, id: i64) -> Result<Option<SeriesRecord>>;
    async fn fetch_season(&self, id: i64) -> Result<Option<SeasonRecord>>;
    async fn fetch_episode(&self, id: i64) -> Result<Option<EpisodeRecord>>;
    async fn find_episode(
        &self,
        series_id: i64,
        season_type: &str,
        season: i32,
        episode: i32,
    ) -> Result<Option<EpisodeRecord>>;
    async fn fetch_episode_page(
        &self,
        series_id: i64,
        season_type: &str,
        page: u32,
    ) -> Result<EpisodePage>;
    async fn fetch_episode_translation(
        &self,
        episode_id: i64,
        language: &str,
    ) -> Result<Option<Translation>>;
}

#[derive(Clone)]
pub struct TvdbClient {
    client: Client,
    base_url: String,
    api_key: String,
    pin: Option<String>,
    language: String,
    token: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl TvdbClient {
    pub fn new(config: &Config) -> Result<Self> {
        let user_agent = format!("tvdb-provider/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build TVDB HTTP client")?;
        Ok(Self {
            client,
            base_url: config.tvdb_base_url.trim_end_matches('/').to_string(),
            api_key: config.tvdb_api_key.clone(),
            pin: config.tvdb_pin.clone(),
            language: config.tvdb_language.clone(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    async fn bearer_token(&self) -> Result<String> {
        if let Some(cached) = self.token.read().await.as_ref() {
            if cached.expires_at > Utc::now() {
                return Ok(cached.value.clone());
            }
        }
        // Two requests racing here both log in; the later token simply wins.
        let fresh = self.login().await?;
        let value = fresh.value.clone();
        *self.token.write().await = Some(fresh);
        Ok(value)
    }

    async fn login(&self) -> Result<CachedToken> {
        #[derive(Serialize)]
        struct LoginRequest<'a> {
            apikey: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            pin: Option<&'a str>,
        }
        #[derive(Deserialize)]
        struct LoginData {
            token: String,
        }

        let url = format!("{}/login", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&LoginRequest {
                apikey: &self.api_key,
                pin: self.pin.as_deref(),
            })
            .send()
            .await
            .context("TVDB login request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading login body failed")?;
        if !status.is_success() {
            return Err(anyhow!("TVDB login failed (status {}): {}", status, text));
        }
        let parsed: Envelope<LoginData> =
            serde_json::from_str(&text).context("Failed to parse TVDB login JSON")?;
        let data = parsed
            .data
            .ok_or_else(|| anyhow!("TVDB login returned no token"))?;
        info!("Obtained TVDB access token");
        Ok(CachedToken {
            value: data.token,
            expires_at: Utc::now() + ChronoDuration::days(TOKEN_LIFETIME_DAYS),
        })
    }

    /// GETs `path` (relative to the API base, query string included).
    /// A 404 comes back as `Ok(None)`.
    async fn get_envelope<T: DeserializeOwned>(&self, path: &str) -> Result<Option<Envelope<T>>> {
        let token = self.bearer_token().await?;
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "TVDB request");
        let res = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header(ACCEPT_LANGUAGE, &self.language)
            .send()
            .await
            .with_context(|| format!("TVDB request to {path} failed"))?;
        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == StatusCode::UNAUTHORIZED {
            warn!("TVDB rejected the access token; it will be renewed on the next call");
            self.token.write().await.take();
        }
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!("{} -> {} {}", path, status, text));
        }
        let parsed: Envelope<T> = serde_json::from_str(&text)
            .with_context(|| format!("JSON parse failed for {path}"))?;
        Ok(Some(parsed))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        Ok(self.get_envelope(path).await?.and_then(|e| e.data))
    }
}

#[async_trait]
impl TvdbApi for TvdbClient {
    async fn search_series(&self, query: &str, year: Option<i32>) -> Result<Vec<SearchHit>> {
        let mut path = format!("/search?type=series&query={}", urlencoding::encode(query));
        if let Some(year) = year {
            path.push_str(&format!("&year={year}"));
        }
        let hits: Option<Vec<SearchHit>> = self.get_json(&path).await?;
        Ok(hits.unwrap_or_default())
    }

    async fn search_remote_id(&self, remote_id: &str) -> Result<Option<i64>> {
        #[derive(Deserialize)]
        struct RemoteIdResult {
            series: Option<RemoteIdSeries>,
        }
        #[derive(Deserialize)]
        struct RemoteIdSeries {
            id: i64,
        }

        let path = format!("/search/remoteid/{}", urlencoding::encode(remote_id));
        let results: Option<Vec<RemoteIdResult>> = self.get_json(&path).await?;
        Ok(results
            .unwrap_or_default()
            .into_iter()
            .find_map(|r| r.series)
            .map(|s| s.id))
    }

    async fn fetch_series(&self, id: i64) -> Result<Option<SeriesRecord>> {
        self.get_json(&format!("/series/{id}/extended?meta=translations&short=true"))
            .await
    }

    async fn fetch_season(&self, id: i64) -> Result<Option<SeasonRecord>> {
        self.get_json(&format!("/seasons/{id}/extended")).await
    }

    async fn fetch_episode(&self, id: i64) -> Result<Option<EpisodeRecord>> {
        self.get_json(&format!("/episodes/{id}/extended?meta=translations"))
            .await
    }

    async fn find_episode(
        &self,
        series_id: i64,
        season_type: &str,
        season: i32,
        episode: i32,
    ) -> Result<Option<EpisodeRecord>> {
        let path = format!(
            "/series/{series_id}/episodes/{}?page=0&season={season}&episodeNumber={episode}",
            urlencoding::encode(season_type)
        );
        let listing: Option<EpisodeListing> = self.get_json(&path).await?;
        Ok(listing.and_then(|l| l.episodes.into_iter().next()))
    }

    async fn fetch_episode_page(
        &self,
        series_id: i64,
        season_type: &str,
        page: u32,
    ) -> Result<EpisodePage> {
        let path = format!(
            "/series/{series_id}/episodes/{}?page={page}",
            urlencoding::encode(season_type)
        );
        let Some(envelope) = self.get_envelope::<EpisodeListing>(&path).await? else {
            return Ok(EpisodePage::default());
        };
        let has_next = envelope.links.and_then(|l| l.next).is_some();
        Ok(EpisodePage {
            episodes: envelope.data.map(|d| d.episodes).unwrap_or_default(),
            has_next,
        })
    }

    async fn fetch_episode_translation(
        &self,
        episode_id: i64,
        language: &str,
    ) -> Result<Option<Translation>> {
        self.get_json(&format!(
            "/episodes/{episode_id}/translations/{}",
            urlencoding::encode(language)
        ))
        .await
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    links: Option<Links>,
}

#[derive(Debug, Deserialize)]
struct Links {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EpisodeListing {
    #[serde(default, deserialize_with = "nullable")]
    episodes: Vec<EpisodeRecord>,
}

/// One page of a series' episode list in a given season order.
#[derive(Debug, Clone, Default)]
pub struct EpisodePage {
    pub episodes: Vec<EpisodeRecord>,
    pub has_next: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchHit {
    pub tvdb_id: Option<String>,
    pub name: Option<String>,
    pub year: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub translations: HashMap<String, String>,
    #[serde(default, deserialize_with = "nullable")]
    pub overviews: HashMap<String, String>,
}

impl SearchHit {
    pub fn series_id(&self) -> Option<i64> {
        self.tvdb_id.as_deref().and_then(|id| id.trim().parse().ok())
    }

    pub fn has_english(&self) -> bool {
        self.translations.contains_key(ENGLISH) || self.overviews.contains_key(ENGLISH)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesRecord {
    pub id: i64,
    pub name: Option<String>,
    pub image: Option<String>,
    pub first_aired: Option<String>,
    pub year: Option<String>,
    pub overview: Option<String>,
    pub average_runtime: Option<i32>,
    pub original_network: Option<Company>,
    #[serde(default, deserialize_with = "nullable")]
    pub genres: Vec<Genre>,
    #[serde(default, deserialize_with = "nullable")]
    pub seasons: Vec<SeasonRecord>,
    #[serde(default, deserialize_with = "nullable")]
    pub artworks: Vec<Artwork>,
    #[serde(default, deserialize_with = "nullable")]
    pub remote_ids: Vec<RemoteId>,
    #[serde(default, deserialize_with = "nullable")]
    pub content_ratings: Vec<ContentRating>,
    pub translations: Option<Translations>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonRecord {
    pub id: i64,
    pub series_id: Option<i64>,
    pub number: i32,
    pub name: Option<String>,
    pub image: Option<String>,
    pub year: Option<String>,
    #[serde(rename = "type")]
    pub season_type: Option<SeasonType>,
    #[serde(default, deserialize_with = "nullable")]
    pub episodes: Vec<EpisodeRecord>,
}

impl SeasonRecord {
    /// Upstream ordering name, e.g. `official` or `dvd`.
    pub fn kind(&self) -> Option<&str> {
        self.season_type.as_ref().and_then(|t| t.kind.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeasonType {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeRecord {
    pub id: i64,
    pub series_id: Option<i64>,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub aired: Option<String>,
    pub runtime: Option<i32>,
    pub image: Option<String>,
    pub number: Option<i32>,
    pub season_number: Option<i32>,
    pub absolute_number: Option<i32>,
    pub translations: Option<Translations>,
}

impl EpisodeRecord {
    pub fn apply_translation(&mut self, translation: Translation) {
        if let Some(name) = translation.name.filter(|n| !n.trim().is_empty()) {
            self.name = Some(name);
        }
        if let Some(overview) = translation.overview.filter(|o| !o.trim().is_empty()) {
            self.overview = Some(overview);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translations {
    #[serde(default, deserialize_with = "nullable")]
    pub name_translations: Vec<Translation>,
    #[serde(default, deserialize_with = "nullable")]
    pub overview_translations: Vec<Translation>,
}

impl Translations {
    pub fn name(&self, language: &str) -> Option<&str> {
        self.name_translations
            .iter()
            .find(|t| t.language.as_deref() == Some(language))
            .and_then(|t| t.name.as_deref())
            .filter(|n| !n.trim().is_empty())
    }

    pub fn overview(&self, language: &str) -> Option<&str> {
        self.overview_translations
            .iter()
            .find(|t| t.language.as_deref() == Some(language))
            .and_then(|t| t.overview.as_deref())
            .filter(|o| !o.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Translation {
    pub name: Option<String>,
    pub overview: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Genre {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Company {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentRating {
    pub name: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteId {
    pub id: String,
    pub source_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Artwork {
    pub image: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<i64>,
    pub score: Option<f64>,
}

fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_search_hits_with_translation_maps() {
        let value = json!({
            "status": "success",
            "data": [
                {
                    "tvdb_id": "76885",
                    "name": "Cowboy Bebop",
                    "year": "1998",
                    "translations": { "eng": "Cowboy Bebop", "jpn": "カウボーイビバップ" },
                    "overviews": null
                },
                { "tvdb_id": "1", "name": "No translations" }
            ]
        });
        let parsed: Envelope<Vec<SearchHit>> = serde_json::from_value(value).expect("search");
        let hits = parsed.data.expect("data");
        assert_eq!(hits[0].series_id(), Some(76885));
        assert!(hits[0].has_english());
        assert!(hits[0].overviews.is_empty());
        assert!(!hits[1].has_english());
    }

    #[test]
    fn tolerates_null_collections_on_series() {
        let value = json!({
            "id": 76885,
            "name": "Cowboy Bebop",
            "seasons": [
                { "id": 1, "number": 1, "type": { "id": 1, "type": "official", "name": "Aired Order" } }
            ],
            "remoteIds": null,
            "genres": null,
            "translations": {
                "nameTranslations": [{ "name": "Cowboy Bebop", "language": "eng" }],
                "overviewTranslations": null
            }
        });
        let series: SeriesRecord = serde_json::from_value(value).expect("series");
        assert_eq!(series.seasons[0].kind(), Some("official"));
        assert!(series.remote_ids.is_empty());
        let translations = series.translations.expect("translations");
        assert_eq!(translations.name("eng"), Some("Cowboy Bebop"));
        assert_eq!(translations.overview("eng"), None);
    }

    #[test]
    fn reads_next_link_from_episode_listing() {
        let value = json!({
            "data": {
                "series": { "id": 76885 },
                "episodes": [{ "id": 10, "seasonNumber": 1, "number": 2, "aired": "1998-10-31" }]
            },
            "links": { "prev": null, "self": "x", "next": "y" }
        });
        let parsed: Envelope<EpisodeListing> = serde_json::from_value(value).expect("listing");
        assert!(parsed.links.and_then(|l| l.next).is_some());
        let episodes = parsed.data.expect("data").episodes;
        assert_eq!(episodes[0].aired.as_deref(), Some("1998-10-31"));
        assert_eq!(episodes[0].season_number, Some(1));
    }

    #[test]
    fn blank_translation_keeps_original_text() {
        let mut episode = EpisodeRecord {
            id: 1,
            name: Some("Asteroid Blues".to_string()),
            overview: Some("Spike and Jet".to_string()),
            ..Default::default()
        };
        episode.apply_translation(Translation {
            name: Some("Astéroïde Blues".to_string()),
            overview: Some("  ".to_string()),
            language: Some("fra".to_string()),
        });
        assert_eq!(episode.name.as_deref(), Some("Astéroïde Blues"));
        assert_eq!(episode.overview.as_deref(), Some("Spike and Jet"));
    }
}
