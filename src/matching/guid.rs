use crate::metadata::PROVIDER_IDENTIFIER;

/// External identifier carried in a match request's `guid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalId<'a> {
    Tvdb(&'a str),
    Imdb(&'a str),
    Tmdb(&'a str),
    Unsupported { scheme: &'a str, value: &'a str },
}

/// Splits `scheme://value`. Returns `None` when there is no separator.
pub fn split_guid(input: &str) -> Option<(&str, &str)> {
    let (scheme, value) = input.trim().split_once("://")?;
    Some((scheme, value))
}

pub fn parse_external_id(input: &str) -> Option<ExternalId<'_>> {
    let (scheme, value) = split_guid(input)?;
    let id = if scheme.eq_ignore_ascii_case("tvdb") {
        ExternalId::Tvdb(value)
    } else if scheme.eq_ignore_ascii_case("imdb") {
        ExternalId::Imdb(value)
    } else if scheme.eq_ignore_ascii_case("tmdb") {
        ExternalId::Tmdb(value)
    } else if let Some(id) = own_show_id(scheme, value) {
        // Our own show guid, sent back on refresh.
        ExternalId::Tvdb(id)
    } else {
        ExternalId::Unsupported { scheme, value }
    };
    Some(id)
}

fn own_show_id<'a>(scheme: &str, value: &'a str) -> Option<&'a str> {
    if scheme != PROVIDER_IDENTIFIER {
        return None;
    }
    value.strip_prefix("show/")
}
