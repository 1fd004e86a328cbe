//! Promotional Codes

use std::{fmt, str::FromStr};

use crate::validation::{CodeFormatError, check_code_format};

/// A well-formed promotional code: 3 to 20 characters of `A-Z` and `0-9`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PromoCode(String);

impl PromoCode {
    /// Parse a candidate code, checking its format.
    ///
    /// Codes are matched exactly; no case folding or trimming happens here.
    ///
    /// # Errors
    ///
    /// Returns a [`CodeFormatError`] describing the first format rule the
    /// candidate breaks.
    pub fn parse(candidate: &str) -> Result<Self, CodeFormatError> {
        check_code_format(candidate)?;

        Ok(Self(candidate.to_string()))
    }

    /// Return the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the code, returning the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PromoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PromoCode {
    type Err = CodeFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PromoCode {
    type Error = CodeFormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        check_code_format(&value)?;

        Ok(Self(value))
    }
}

impl AsRef<str> for PromoCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
