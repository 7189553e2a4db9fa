//! Human-readable track labels and search links
//!
//! Title and artist can live under several column names; each logical field
//! is an ordered synonym list resolved first-present-wins per row.

use crate::error::Result;
use crate::preprocessing::coerce::column_as_text;
use polars::prelude::*;

pub const TITLE_FIELDS: &[&str] = &["track_name", "name"];
pub const ARTIST_FIELDS: &[&str] = &["artist_name", "artists"];

pub const UNKNOWN_LABEL: &str = "(unknown)";

/// One logical text field backed by candidate columns, in priority order.
#[derive(Debug, Clone, Default)]
pub struct SynonymField {
    columns: Vec<Vec<Option<String>>>,
}

impl SynonymField {
    /// Collect whichever of `names` exist in `df`.
    pub fn resolve(df: &DataFrame, names: &[&str]) -> Result<Self> {
        let mut columns = Vec::new();
        for name in names {
            if let Some(values) = column_as_text(df, name)? {
                columns.push(values);
            }
        }
        Ok(Self { columns })
    }

    pub fn is_present(&self) -> bool {
        !self.columns.is_empty()
    }

    /// First non-empty value for `row`, or `""`.
    pub fn get(&self, row: usize) -> &str {
        self.columns
            .iter()
            .filter_map(|col| col.get(row).and_then(|v| v.as_deref()))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .unwrap_or("")
    }
}

/// `"title — artist"`, whichever half exists, or the unknown placeholder.
pub fn display_name(title: &str, artist: &str) -> String {
    match (title.is_empty(), artist.is_empty()) {
        (false, false) => format!("{title} — {artist}"),
        (false, true) => title.to_string(),
        (true, false) => artist.to_string(),
        (true, true) => UNKNOWN_LABEL.to_string(),
    }
}

/// Search link from the non-empty parts of title and artist; `""` when both
/// are empty.
pub fn search_url(base: &str, title: &str, artist: &str) -> String {
    let query = [title, artist]
        .iter()
        .filter(|v| !v.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("+")
        .replace(' ', "+");
    if query.is_empty() {
        String::new()
    } else {
        format!("{base}{query}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://open.spotify.com/search/";

    #[test]
    fn test_display_name_fallbacks() {
        assert_eq!(display_name("Song A", "Artist X"), "Song A — Artist X");
        assert_eq!(display_name("Song A", ""), "Song A");
        assert_eq!(display_name("", "Artist X"), "Artist X");
        assert_eq!(display_name("", ""), "(unknown)");
    }

    #[test]
    fn test_search_url() {
        assert_eq!(
            search_url(BASE, "Song A", "Artist X"),
            "https://open.spotify.com/search/Song+A+Artist+X"
        );
        assert_eq!(search_url(BASE, "Song A", ""), "https://open.spotify.com/search/Song+A");
        assert_eq!(search_url(BASE, "", ""), "");
    }

    #[test]
    fn test_synonyms_first_present_wins() {
        let df = df!(
            "name" => &[Some("alt title"), Some("alt 2"), None],
            "track_name" => &[Some("Song A"), None, None],
        )
        .unwrap();
        let title = SynonymField::resolve(&df, TITLE_FIELDS).unwrap();

        assert!(title.is_present());
        assert_eq!(title.get(0), "Song A");
        assert_eq!(title.get(1), "alt 2");
        assert_eq!(title.get(2), "");
    }

    #[test]
    fn test_absent_field() {
        let df = df!("track_name" => &["Song A"]).unwrap();
        let artist = SynonymField::resolve(&df, ARTIST_FIELDS).unwrap();
        assert!(!artist.is_present());
        assert_eq!(artist.get(0), "");
    }
}
