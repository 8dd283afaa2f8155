pub const DEFAULT_LANGUAGE: &str = "en-US";
pub const DEFAULT_COUNTRY: &str = "US";

/// Language and country negotiated for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub language: String,
    pub country: String,
}

impl Default for Locale {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE, DEFAULT_COUNTRY)
    }
}

impl Locale {
    pub fn new(language: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            country: country.into(),
        }
    }

    /// The upstream's three-letter language code for this locale.
    pub fn tvdb_language(&self) -> String {
        let primary = self
            .language
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let code = match primary.as_str() {
            "en" => "eng",
            "fr" => "fra",
            "de" => "deu",
            "es" => "spa",
            "it" => "ita",
            "pt" => "por",
            "nl" => "nld",
            "sv" => "swe",
            "da" => "dan",
            "no" | "nb" => "nor",
            "fi" => "fin",
            "pl" => "pol",
            "ru" => "rus",
            "ja" => "jpn",
            "ko" => "kor",
            "zh" => "zho",
            "tr" => "tur",
            "cs" => "ces",
            "hu" => "hun",
            "el" => "ell",
            "he" => "heb",
            "ar" => "ara",
            _ if primary.len() == 3 => return primary,
            _ => "eng",
        };
        code.to_string()
    }

    /// The upstream's three-letter country code, used for content ratings.
    pub fn tvdb_country(&self) -> String {
        let upper = self.country.trim().to_ascii_uppercase();
        let code = match upper.as_str() {
            "US" => "usa",
            "GB" | "UK" => "gbr",
            "CA" => "can",
            "AU" => "aus",
            "NZ" => "nzl",
            "IE" => "irl",
            "DE" => "deu",
            "FR" => "fra",
            "ES" => "esp",
            "IT" => "ita",
            "NL" => "nld",
            "BR" => "bra",
            "JP" => "jpn",
            "KR" => "kor",
            _ => return upper.to_ascii_lowercase(),
        };
        code.to_string()
    }
}
