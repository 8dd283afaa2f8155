use serde::{Deserialize, Deserializer};

mod guid;
mod resolve;
mod title;

pub use guid::{parse_external_id, split_guid, ExternalId};
pub use resolve::{
    locate_season, rank_by_english, resolve_match, seasons_for_listing, MAX_EPISODE_PAGES,
};
pub use title::{effective_year, split_title_year};

use crate::error::MatchError;
use crate::tvdb::DEFAULT_SEASON_TYPE;

/// Candidates returned when the user asks for a manual match.
pub const MANUAL_CANDIDATES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Show = 2,
    Season = 3,
    Episode = 4,
}

impl MediaType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            2 => Some(Self::Show),
            3 => Some(Self::Season),
            4 => Some(Self::Episode),
            _ => None,
        }
    }
}

/// Body of `POST /library/metadata/matches`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    #[serde(rename = "type")]
    pub media_type: Option<i64>,
    pub title: Option<String>,
    pub parent_title: Option<String>,
    pub grandparent_title: Option<String>,
    pub year: Option<i32>,
    pub guid: Option<String>,
    pub index: Option<i32>,
    pub parent_index: Option<i32>,
    pub date: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub manual: bool,
    pub episode_order: Option<String>,
}

impl MatchRequest {
    pub fn kind(&self) -> Result<MediaType, MatchError> {
        let code = self.media_type.ok_or(MatchError::MissingType)?;
        MediaType::from_code(code).ok_or(MatchError::UnsupportedType(code))
    }

    /// Upstream season ordering to resolve numbers against.
    pub fn season_type(&self) -> &str {
        self.episode_order
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SEASON_TYPE)
    }

    pub fn candidate_limit(&self) -> usize {
        if self.manual {
            MANUAL_CANDIDATES
        } else {
            1
        }
    }
}

/// Accepts `1`, `"1"`, `true` and `"true"` as set.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(n)) => n != 0,
        Some(Flag::Text(s)) => matches!(s.trim(), "1" | "true" | "TRUE" | "True"),
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_plex_style_body() {
        let req: MatchRequest = serde_json::from_value(json!({
            "type": 4,
            "grandparentTitle": "Cowboy Bebop",
            "parentIndex": 1,
            "index": 5,
            "manual": 1
        }))
        .unwrap();
        assert_eq!(req.kind(), Ok(MediaType::Episode));
        assert_eq!(req.parent_index, Some(1));
        assert!(req.manual);
        assert_eq!(req.candidate_limit(), MANUAL_CANDIDATES);
        assert_eq!(req.season_type(), "default");
    }

    #[test]
    fn manual_flag_variants() {
        for (raw, expected) in [
            (json!(0), false),
            (json!("1"), true),
            (json!(true), true),
            (json!(null), false),
        ] {
            let req: MatchRequest =
                serde_json::from_value(json!({ "type": 2, "manual": raw })).unwrap();
            assert_eq!(req.manual, expected);
        }
    }

    #[test]
    fn rejects_missing_or_unknown_type() {
        let req = MatchRequest::default();
        assert_eq!(req.kind(), Err(MatchError::MissingType));
        let req = MatchRequest {
            media_type: Some(1),
            ..Default::default()
        };
        assert_eq!(req.kind(), Err(MatchError::UnsupportedType(1)));
    }
}
