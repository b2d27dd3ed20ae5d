// ABOUTME: Security policy toggles that select hardened or deliberately weakened engine behaviour
// ABOUTME: Every lab variant is a combination of these flags rather than a separate code path
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::env;

use oauth_labs_core::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Named protocol checks the engine can enable or disable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    /// Reject authorize requests without `state`
    pub require_state: bool,
    /// Reject authorize requests without `code_challenge`
    pub require_pkce: bool,
    /// Advertise and accept the `plain` PKCE method
    pub allow_plain_pkce: bool,
    /// An explicit `redirect_uri` must exactly match a registered one
    pub enforce_redirect_uri_registration: bool,
    /// A `redirect_uri` bound to a code must be repeated at the token endpoint
    pub verify_redirect_uri_on_exchange: bool,
    /// Access token `aud` must be exactly `[client_id]`
    pub enforce_audience: bool,
    /// Codes are consumed atomically on redemption. When disabled a code is
    /// never consumed and stays redeemable until its TTL expires.
    pub single_use_codes: bool,
    /// Consent is re-checked at the token endpoint
    pub recheck_consent: bool,
    /// A refresh invalidates earlier access tokens of the pair
    pub revoke_access_tokens_on_refresh: bool,
    /// A refresh issues a new refresh token and revokes the presented one
    pub rotate_refresh_tokens: bool,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            require_state: false,
            require_pkce: false,
            allow_plain_pkce: true,
            enforce_redirect_uri_registration: true,
            verify_redirect_uri_on_exchange: true,
            enforce_audience: true,
            single_use_codes: true,
            recheck_consent: true,
            revoke_access_tokens_on_refresh: true,
            rotate_refresh_tokens: false,
        }
    }
}

impl SecurityPolicy {
    /// Load policy flags from `OAUTH_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a flag is set to something other than a boolean
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            require_state: env_flag("OAUTH_REQUIRE_STATE", defaults.require_state)?,
            require_pkce: env_flag("OAUTH_REQUIRE_PKCE", defaults.require_pkce)?,
            allow_plain_pkce: env_flag("OAUTH_ALLOW_PLAIN_PKCE", defaults.allow_plain_pkce)?,
            enforce_redirect_uri_registration: env_flag(
                "OAUTH_ENFORCE_REDIRECT_URI_REGISTRATION",
                defaults.enforce_redirect_uri_registration,
            )?,
            verify_redirect_uri_on_exchange: env_flag(
                "OAUTH_VERIFY_REDIRECT_URI_ON_EXCHANGE",
                defaults.verify_redirect_uri_on_exchange,
            )?,
            enforce_audience: env_flag("OAUTH_ENFORCE_AUDIENCE", defaults.enforce_audience)?,
            single_use_codes: env_flag("OAUTH_SINGLE_USE_CODES", defaults.single_use_codes)?,
            recheck_consent: env_flag("OAUTH_RECHECK_CONSENT", defaults.recheck_consent)?,
            revoke_access_tokens_on_refresh: env_flag(
                "OAUTH_REVOKE_ACCESS_TOKENS_ON_REFRESH",
                defaults.revoke_access_tokens_on_refresh,
            )?,
            rotate_refresh_tokens: env_flag(
                "OAUTH_ROTATE_REFRESH_TOKENS",
                defaults.rotate_refresh_tokens,
            )?,
        })
    }

    /// Settings that leave a downgrade or replay path open, for startup logging.
    ///
    /// `allow_plain_pkce` is reported while enabled, so the default policy
    /// lists it. `require_state` and `require_pkce` are left out: both are
    /// optional in RFC 6749 and RFC 7636, and turning them on only adds checks.
    #[must_use]
    pub fn weakened_checks(&self) -> Vec<&'static str> {
        [
            (!self.allow_plain_pkce, "allow_plain_pkce"),
            (
                self.enforce_redirect_uri_registration,
                "enforce_redirect_uri_registration",
            ),
            (
                self.verify_redirect_uri_on_exchange,
                "verify_redirect_uri_on_exchange",
            ),
            (self.enforce_audience, "enforce_audience"),
            (self.single_use_codes, "single_use_codes"),
            (self.recheck_consent, "recheck_consent"),
            (
                self.revoke_access_tokens_on_refresh,
                "revoke_access_tokens_on_refresh",
            ),
        ]
        .into_iter()
        .filter_map(|(enabled, name)| (!enabled).then_some(name))
        .collect()
    }
}

fn env_flag(key: &str, default: bool) -> AppResult<bool> {
    match env::var(key) {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(AppError::config_invalid(format!(
                "Invalid {key} value: {other:?}"
            ))),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_policy_only_reports_plain_pkce() {
        let policy = SecurityPolicy::default();
        assert!(policy.enforce_audience);
        assert!(policy.single_use_codes);
        assert!(!policy.rotate_refresh_tokens);
        assert_eq!(policy.weakened_checks(), vec!["allow_plain_pkce"]);

        let strict = SecurityPolicy {
            allow_plain_pkce: false,
            ..policy
        };
        assert!(strict.weakened_checks().is_empty());
    }

    #[test]
    fn test_weakened_checks_are_listed() {
        let policy = SecurityPolicy {
            allow_plain_pkce: false,
            enforce_audience: false,
            single_use_codes: false,
            require_state: true,
            ..SecurityPolicy::default()
        };
        assert_eq!(
            policy.weakened_checks(),
            vec!["enforce_audience", "single_use_codes"]
        );

        let plain = SecurityPolicy {
            allow_plain_pkce: true,
            ..policy
        };
        assert_eq!(
            plain.weakened_checks(),
            vec!["allow_plain_pkce", "enforce_audience", "single_use_codes"]
        );
    }

    #[test]
    #[serial]
    fn test_flags_from_env() {
        env::set_var("OAUTH_REQUIRE_PKCE", "true");
        env::set_var("OAUTH_ALLOW_PLAIN_PKCE", "0");
        let policy = SecurityPolicy::from_env().unwrap();
        assert!(policy.require_pkce);
        assert!(!policy.allow_plain_pkce);

        env::set_var("OAUTH_REQUIRE_PKCE", "sometimes");
        assert!(SecurityPolicy::from_env().is_err());

        env::remove_var("OAUTH_REQUIRE_PKCE");
        env::remove_var("OAUTH_ALLOW_PLAIN_PKCE");
    }
}
