// ABOUTME: Redirect URI parsing and augmentation for authorization responses
// ABOUTME: Sets state/code/error query parameters and rejects fragments per RFC 6749 section 3.1.2
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;

use url::Url;

/// Absolute callback URI used for authorization responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectUri {
    url: Url,
}

impl RedirectUri {
    /// Parse an absolute URI
    ///
    /// # Errors
    ///
    /// Returns an error if `raw` is not an absolute URL
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            url: Url::parse(raw.trim())?,
        })
    }

    /// Whether the URI carries a fragment component (even an empty one)
    #[must_use]
    pub fn has_fragment(&self) -> bool {
        self.url.fragment().is_some()
    }

    /// Exact comparison with a registered redirect URI.
    ///
    /// Both sides are compared in parsed form, so `https://c.example` and
    /// `https://C.example:443/` match while a differing path, query or
    /// port does not.
    #[must_use]
    pub fn matches(&self, registered: &str) -> bool {
        Self::parse(registered).is_ok_and(|registered| registered.url == self.url)
    }

    /// Attach `state`; blank values are ignored
    #[must_use]
    pub fn with_state(mut self, state: &str) -> Self {
        self.set_query("state", state);
        self
    }

    /// Attach the authorization `code`; blank values are ignored
    #[must_use]
    pub fn with_code(mut self, code: &str) -> Self {
        self.set_query("code", code);
        self
    }

    /// Attach an `error` and optional `error_description`
    #[must_use]
    pub fn with_error(mut self, error: &str, description: Option<&str>) -> Self {
        self.set_query("error", error);
        if let Some(description) = description {
            self.set_query("error_description", description);
        }
        self
    }

    /// Current value of a query parameter
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Serialized form
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Consume into the underlying URL
    #[must_use]
    pub fn into_url(self) -> Url {
        self.url
    }

    fn set_query(&mut self, key: &str, value: &str) {
        if value.trim().is_empty() {
            return;
        }
        let retained: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(k, _)| k != key)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        self.url
            .query_pairs_mut()
            .clear()
            .extend_pairs(retained)
            .append_pair(key, value);
    }
}

impl fmt::Display for RedirectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}
