use serde::Serialize;

use crate::metadata::{Metadata, PROVIDER_IDENTIFIER};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Serialize)]
pub struct MediaContainerResponse {
    #[serde(rename = "MediaContainer")]
    pub media_container: MediaContainer,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaContainer {
    pub offset: usize,
    pub total_size: usize,
    pub identifier: &'static str,
    pub size: usize,
    #[serde(rename = "Metadata")]
    pub metadata: Vec<Metadata>,
}

impl MediaContainerResponse {
    /// Wraps an unpaged result, e.g. match candidates.
    pub fn complete(metadata: Vec<Metadata>) -> Self {
        let size = metadata.len();
        Self::from(MediaContainer {
            offset: 0,
            total_size: size,
            identifier: PROVIDER_IDENTIFIER,
            size,
            metadata,
        })
    }

    pub fn page(listing: Listing) -> Self {
        Self::from(MediaContainer {
            offset: listing.offset,
            total_size: listing.total_size,
            identifier: PROVIDER_IDENTIFIER,
            size: listing.items.len(),
            metadata: listing.items,
        })
    }
}

impl From<MediaContainer> for MediaContainerResponse {
    fn from(media_container: MediaContainer) -> Self {
        Self { media_container }
    }
}

/// One window of a longer list.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub offset: usize,
    pub total_size: usize,
    pub items: Vec<Metadata>,
}

/// Requested window, from `X-Plex-Container-Start` / `X-Plex-Container-Size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub start: usize,
    pub size: usize,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            start: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Paging {
    /// Unparseable values fall back to the defaults; size is clamped.
    pub fn from_raw(start: Option<&str>, size: Option<&str>) -> Self {
        let start = start
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let size = size
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        Self { start, size }
    }

    /// Slices `items`, keeping the full length as the total.
    pub fn window<T>(&self, items: Vec<T>) -> (usize, Vec<T>) {
        let total = items.len();
        let page = items.into_iter().skip(self.start).take(self.size).collect();
        (total, page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_match_still_has_envelope() {
        let value = serde_json::to_value(MediaContainerResponse::complete(Vec::new())).unwrap();
        let container = &value["MediaContainer"];
        assert_eq!(container["size"], 0);
        assert_eq!(container["totalSize"], 0);
        assert_eq!(container["offset"], 0);
        assert_eq!(container["identifier"], PROVIDER_IDENTIFIER);
        assert_eq!(container["Metadata"], serde_json::json!([]));
    }

    #[test]
    fn paging_parses_and_clamps() {
        assert_eq!(Paging::from_raw(None, None), Paging::default());
        assert_eq!(
            Paging::from_raw(Some("40"), Some("500")),
            Paging {
                start: 40,
                size: MAX_PAGE_SIZE
            }
        );
        assert_eq!(
            Paging::from_raw(Some("-1"), Some("0")),
            Paging { start: 0, size: 1 }
        );
    }

    #[test]
    fn window_reports_full_total() {
        let paging = Paging { start: 2, size: 2 };
        let (total, page) = paging.window(vec![1, 2, 3, 4, 5]);
        assert_eq!(total, 5);
        assert_eq!(page, vec![3, 4]);
        let (total, page) = Paging { start: 10, size: 2 }.window(vec![1, 2]);
        assert_eq!(total, 2);
        assert!(page.is_empty());
    }
}
