use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Error, Result};

pub trait Query: Serialize + std::fmt::Debug {}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Copy)]
pub struct EmptyQuery {}
impl Query for EmptyQuery {}

/// Query addressing a single object by its mangarock id
#[derive(Serialize, Debug, Clone, Copy)]
pub struct OidQuery<'a> {
    pub oid: &'a str,
}
impl Query for OidQuery<'_> {}

/// Body of the series search request
#[derive(Serialize, Debug, Clone)]
pub struct SearchBody<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub keywords: &'a str,
}

impl<'a> SearchBody<'a> {
    pub fn series(keywords: &'a str) -> Self {
        Self {
            kind: "series",
            keywords,
        }
    }
}

pub trait ResponseCodeOk {
    fn response_code_ok(&self) -> Result<()>;
}

impl ResponseCodeOk for Value {
    fn response_code_ok(&self) -> Result<()> {
        let code = match self.get("code") {
            Some(code) => code,
            None => return Err(Error::ParseError),
        };

        let Some(code) = code.as_i64() else {
            return Err(Error::ParseError);
        };

        if code != 0 {
            tracing::warn!("server answered with code {code}");

            return Err(Error::ResponseCodeError(code));
        }

        Ok(())
    }
}
