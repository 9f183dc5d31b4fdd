use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Author {
    #[serde(rename = "oid")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub thumbnail: String,
    /// Only present when the author is listed as part of a manga
    #[serde(default)]
    pub role: String,
}
