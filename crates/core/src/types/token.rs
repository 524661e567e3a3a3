//! Opaque session token issued by the commerce backend.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Number of characters shown by [`ContextToken::preview`].
const PREVIEW_LENGTH: usize = 20;

/// The backend's session/context token.
///
/// Identifies an anonymous or authenticated session. The value is opaque to
/// the client: it is stored, echoed back on every request and replaced
/// whenever the backend hands out a new one.
///
/// `Debug` only prints a short preview so tokens never end up in logs in
/// full.
///
/// ```
/// use furniture_core::ContextToken;
///
/// let token = ContextToken::parse("a1b2c3d4e5f6a7b8c9d0e1f2a3b4c5d6").unwrap();
/// assert_eq!(token.preview(), "a1b2c3d4e5f6a7b8c9d0...");
/// assert!(ContextToken::parse("   ").is_none());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContextToken(String);

/// Rejected empty or whitespace-only token value.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("context token cannot be empty")]
pub struct EmptyTokenError;

impl ContextToken {
    /// Parse a token from a header or storage value.
    ///
    /// Returns `None` for empty or whitespace-only input; the backend never
    /// issues those and they must not overwrite a stored token.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    /// Returns the raw token value (for request headers).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a log-safe prefix of the token.
    #[must_use]
    pub fn preview(&self) -> String {
        let prefix: String = self.0.chars().take(PREVIEW_LENGTH).collect();
        if prefix.len() < self.0.len() {
            format!("{prefix}...")
        } else {
            prefix
        }
    }
}

impl fmt::Debug for ContextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextToken").field(&self.preview()).finish()
    }
}

impl TryFrom<String> for ContextToken {
    type Error = EmptyTokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(EmptyTokenError)
    }
}

impl From<ContextToken> for String {
    fn from(token: ContextToken) -> Self {
        token.0
    }
}

impl AsRef<str> for ContextToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_rejects_empty() {
        assert_eq!(ContextToken::parse("  abc ").unwrap().as_str(), "abc");
        assert!(ContextToken::parse("").is_none());
    }

    #[test]
    fn test_deserialize_goes_through_parse() {
        let token: ContextToken = serde_json::from_str(r#"" abc ""#).unwrap();
        assert_eq!(token.as_str(), "abc");
        assert_eq!(serde_json::to_string(&token).unwrap(), r#""abc""#);

        assert!(serde_json::from_str::<ContextToken>(r#""""#).is_err());
        let err = serde_json::from_str::<ContextToken>(r#""   ""#).unwrap_err();
        assert!(err.to_string().contains("context token cannot be empty"));
    }

    #[test]
    fn test_short_token_preview_has_no_ellipsis() {
        let token = ContextToken::parse("short").unwrap();
        assert_eq!(token.preview(), "short");
    }

    #[test]
    fn test_debug_does_not_leak_full_token() {
        let token = ContextToken::parse("0123456789abcdefghijSECRETTAIL").unwrap();
        let debug = format!("{token:?}");
        assert!(debug.contains("0123456789abcdefghij..."));
        assert!(!debug.contains("SECRETTAIL"));
    }
}
