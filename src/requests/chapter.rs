use serde::{Deserialize, Serialize};

/// Chapter of a manga. `pages` is only filled once the chapter is resolved with
/// [`MangaRockClient::chapter`](crate::MangaRockClient::chapter) and keeps the reading order
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Chapter {
    #[serde(rename = "oid")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub pages: Vec<String>,
}
