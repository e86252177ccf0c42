use std::str::FromStr;

use derive_more::{AsRef, Debug, Display};
use serde::Serialize;

use crate::error::ParseError;

#[derive(Debug, Display, AsRef, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Hostname(String);

impl Hostname {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for Hostname {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseError::MalformedLine("empty remote host"));
        }
        Ok(Self(s.into()))
    }
}

/// An HTTP status code in the 100..=599 range.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const MIN: u16 = 100;
    pub const MAX: u16 = 599;

    pub fn new(code: u16) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&code).then_some(Self(code))
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }
}

impl FromStr for StatusCode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ParseError::BadNumber {
            field: "status",
            value: s.to_string(),
        };
        if !crate::parser::is_unsigned_decimal(s) {
            return Err(bad());
        }
        let code: u16 = s.parse().map_err(|_| bad())?;
        Self::new(code).ok_or_else(bad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asserting::prelude::*;

    #[test]
    fn hostname_rejects_empty() {
        assert_that!("".parse::<Hostname>()).is_err();
        assert_that!("10.0.0.1".parse::<Hostname>().map(|h| h.to_string()))
            .is_equal_to(Ok("10.0.0.1".to_string()));
    }

    #[test]
    fn status_code_bounds() {
        assert_that!(StatusCode::new(99)).is_none();
        assert_that!(StatusCode::new(100)).is_some();
        assert_that!(StatusCode::new(599)).is_some();
        assert_that!(StatusCode::new(600)).is_none();
    }

    #[test]
    fn status_code_from_str_reports_bad_number() {
        assert_eq!(
            "20x".parse::<StatusCode>(),
            Err(ParseError::BadNumber {
                field: "status",
                value: "20x".into()
            })
        );
        assert_eq!(
            "700".parse::<StatusCode>(),
            Err(ParseError::BadNumber {
                field: "status",
                value: "700".into()
            })
        );
        assert_eq!(
            "+200".parse::<StatusCode>(),
            Err(ParseError::BadNumber {
                field: "status",
                value: "+200".into()
            })
        );
        assert_eq!("404".parse::<StatusCode>().map(StatusCode::as_u16), Ok(404));
    }
}
