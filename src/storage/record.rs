//! The enriched record stored for every harvested item

use crate::storage::ItemId;
use serde::{Deserialize, Deserializer, Serialize};

/// Column order of the dataset snapshot
///
/// Must list the serialized names of [`Record`] in declaration order.
pub const CSV_FIELDS: &[&str] = &[
    "AudioBook_ID",
    "AudioBook_attID",
    "Book_Title",
    "Book_Description",
    "Book_Detail",
    "Book_Language",
    "Book_Country",
    "Book_Author",
    "Book_Translator",
    "Book_Narrator",
    "Book_Director",
    "Book_Producer",
    "Book_SoundEngineer",
    "Book_Effector",
    "Book_Actors",
    "Book_Genre",
    "Book_Category",
    "Book_Duration",
    "Episode_Count",
    "Cover_Image_URL",
    "Source_URL",
    "Player_Link",
    "FullBook_MP3_URL",
    "All_MP3s_Found",
];

/// Structured data for one item
///
/// Records are replaced wholesale when a newer fetch of the same item
/// succeeds; fields are never patched in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "AudioBook_ID", default, deserialize_with = "integer_cell")]
    pub id: Option<ItemId>,

    /// Secondary key needed by the media lookup
    #[serde(rename = "AudioBook_attID", default, deserialize_with = "optional_integer_cell")]
    pub attachment_id: Option<u64>,

    #[serde(rename = "Book_Title")]
    pub title: Option<String>,
    #[serde(rename = "Book_Description")]
    pub description: Option<String>,
    #[serde(rename = "Book_Detail")]
    pub detail: Option<String>,
    #[serde(rename = "Book_Language")]
    pub language: Option<String>,
    #[serde(rename = "Book_Country")]
    pub country: Option<String>,
    #[serde(rename = "Book_Author")]
    pub author: Option<String>,
    #[serde(rename = "Book_Translator")]
    pub translator: Option<String>,
    #[serde(rename = "Book_Narrator")]
    pub narrator: Option<String>,
    #[serde(rename = "Book_Director")]
    pub director: Option<String>,
    #[serde(rename = "Book_Producer")]
    pub producer: Option<String>,
    #[serde(rename = "Book_SoundEngineer")]
    pub sound_engineer: Option<String>,
    #[serde(rename = "Book_Effector")]
    pub effector: Option<String>,
    #[serde(rename = "Book_Actors")]
    pub actors: Option<String>,
    #[serde(rename = "Book_Genre")]
    pub genre: Option<String>,
    #[serde(rename = "Book_Category")]
    pub category: Option<String>,
    #[serde(rename = "Book_Duration")]
    pub duration: Option<String>,
    #[serde(rename = "Episode_Count", default, deserialize_with = "optional_integer_cell")]
    pub episode_count: Option<u32>,
    #[serde(rename = "Cover_Image_URL")]
    pub cover_image_url: Option<String>,

    #[serde(rename = "Source_URL")]
    pub source_url: Option<String>,

    /// Access link built from the two identifiers
    #[serde(rename = "Player_Link")]
    pub player_link: Option<String>,

    #[serde(rename = "FullBook_MP3_URL")]
    pub full_mp3_url: Option<String>,

    /// Every qualifying MP3 link, `", "`-joined
    #[serde(rename = "All_MP3s_Found")]
    pub all_mp3s: Option<String>,
}

impl Record {
    /// A record is complete when both its title and player link are non-empty
    pub fn is_complete(&self) -> bool {
        non_empty(&self.title) && non_empty(&self.player_link)
    }

    /// Names of the required fields that are missing
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !non_empty(&self.title) {
            missing.push("Book_Title");
        }
        if !non_empty(&self.player_link) {
            missing.push("Player_Link");
        }
        missing
    }

    /// Title prefix used in progress lines
    pub fn short_title(&self, max_chars: usize) -> String {
        self.title
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(max_chars)
            .collect()
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// A numeric cell as found in a snapshot or journal line
///
/// Spreadsheet tools and dataframe exports often rewrite integer columns
/// that contain blanks as floats, so `1101.0` must still read as `1101`.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumericCell {
    Int(u64),
    Float(f64),
    Text(String),
    Other(#[allow(dead_code)] serde::de::IgnoredAny),
}

impl NumericCell {
    fn is_blank(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim().is_empty())
    }

    fn to_integer<T: TryFrom<u64>>(&self) -> Option<T> {
        match self {
            Self::Int(value) => T::try_from(*value).ok(),
            Self::Float(value) => float_to_integer(*value),
            Self::Text(text) => parse_integer(text),
            Self::Other(_) => None,
        }
    }
}

fn float_to_integer<T: TryFrom<u64>>(value: f64) -> Option<T> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value >= u64::MAX as f64 {
        return None;
    }
    T::try_from(value as u64).ok()
}

fn parse_integer<T: TryFrom<u64>>(raw: &str) -> Option<T> {
    let raw = raw.trim();
    match raw.parse::<u64>() {
        Ok(value) => T::try_from(value).ok(),
        Err(_) => float_to_integer(raw.parse::<f64>().ok()?),
    }
}

/// Identity column: blank is `None`, anything else must be an integer
fn integer_cell<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    match Option::<NumericCell>::deserialize(deserializer)? {
        None => Ok(None),
        Some(cell) if cell.is_blank() => Ok(None),
        Some(cell) => cell
            .to_integer()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("identity is not a non-negative integer")),
    }
}

/// Secondary numeric column: cells that are not integers are dropped
fn optional_integer_cell<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    let cell = Option::<NumericCell>::deserialize(deserializer)?;
    Ok(cell.and_then(|cell| cell.to_integer()))
}
