use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of leading token characters shown in logs
const LABEL_LEN: usize = 5;

/// A VK access token, one per account
///
/// The full token never appears in logs or `Debug` output; `label()` is the
/// only part meant for humans.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// First few characters of the token, for log lines
    pub fn label(&self) -> String {
        self.token.chars().take(LABEL_LEN).collect()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("label", &self.label())
            .finish_non_exhaustive()
    }
}

/// Long-poll position (`ts`) as issued by the server
///
/// VK sends it as a number on some endpoints and a string on others; it is
/// kept in its decimal text form and echoed back untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializers::deserialize_number_or_string(deserializer).map(Cursor)
    }
}

/// Custom deserializers for VK API types
pub mod deserializers {
    use serde::{de, Deserialize, Deserializer};
    use serde_json::Value;

    /// Accept `123` or `"123"` and return the text form
    pub fn deserialize_number_or_string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(de::Error::custom(format!(
                "expected number or string, got {}",
                other
            ))),
        }
    }
}
