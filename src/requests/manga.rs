use serde::{Deserialize, Serialize};

use super::author::Author;
use super::chapter::Chapter;

/// Manga as returned by the endpoints listing mangas
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Manga {
    #[serde(rename = "oid")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Primary author, the first of `authors` when known
    #[serde(skip)]
    pub author: Option<Author>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub author_ids: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub rank: i64,
    #[serde(default)]
    pub updated_chapters: i64,
    #[serde(default)]
    pub new_chapters: Vec<Chapter>,
    // NOTE: the server really spells it this way
    #[serde(rename = "cmpleted", default)]
    pub completed: bool,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Category {
    #[serde(rename = "oid")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Manga with the additional fields only returned when a single manga is requested
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MangaSingle {
    #[serde(flatten)]
    pub manga: Manga,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(rename = "rich_categories", default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub cover: String,
    #[serde(default)]
    pub artworks: Vec<String>,
    #[serde(rename = "alias", default)]
    pub aliases: Vec<String>,
}
