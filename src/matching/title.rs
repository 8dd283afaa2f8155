use once_cell::sync::Lazy;
use regex::Regex;

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

// Order matters: the first pattern whose year is in range wins.
static TRAILING_YEAR_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"^(.+?)\s*\((\d{4})\)\s*$").expect("parenthesized year pattern"),
        Regex::new(r"^(.+?)\s*\[(\d{4})\]\s*$").expect("bracketed year pattern"),
        Regex::new(r"^(.+?)\s+-\s+(\d{4})\s*$").expect("dashed year pattern"),
    ]
});

/// Splits a trailing release year off a free-text title.
///
/// Recognizes `Title (1998)`, `Title [1998]` and `Title - 1998`. A year outside
/// 1900..=2100 does not count as a match. When nothing matches the input comes
/// back untouched with no year.
pub fn split_title_year(input: &str) -> (String, Option<i32>) {
    for pattern in TRAILING_YEAR_PATTERNS.iter() {
        let Some(caps) = pattern.captures(input) else {
            continue;
        };
        let year = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<i32>().ok())
            .filter(|y| (MIN_YEAR..=MAX_YEAR).contains(y));
        if let (Some(year), Some(title)) = (year, caps.get(1)) {
            let title = title.as_str().trim();
            if !title.is_empty() {
                return (title.to_string(), Some(year));
            }
        }
    }
    (input.to_string(), None)
}

/// An explicit year from the request always beats one inferred from the title.
pub fn effective_year(explicit: Option<i32>, extracted: Option<i32>) -> Option<i32> {
    explicit.or(extracted)
}
