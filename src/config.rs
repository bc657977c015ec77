//! Backend configuration loaded from environment.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

/// Hosted backend configuration.
///
/// The anon key authenticates the application itself; per-user access is
/// carried by the session access token once one exists.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backend base URL, no trailing slash.
    pub base_url: String,
    /// Publishable API key sent with every request.
    pub anon_key: String,
    /// Previously issued access token to restore a session from, if any.
    pub access_token: Option<String>,
}

impl StoreConfig {
    /// Load from `VITRINA_API_URL`, `VITRINA_ANON_KEY` and the optional
    /// `VITRINA_ACCESS_TOKEN`. Returns `None` if a required variable is
    /// missing (the backend is unreachable without both).
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Environment-independent constructor used by `from_env` and tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let base_url = normalize_base_url(&lookup("VITRINA_API_URL")?)?;
        let anon_key = lookup("VITRINA_ANON_KEY").filter(|v| !v.trim().is_empty())?;
        let access_token = lookup("VITRINA_ACCESS_TOKEN").filter(|v| !v.trim().is_empty());
        Some(Self { base_url, anon_key, access_token })
    }
}

/// Trim whitespace and trailing slashes; reject values that are not http(s).
#[must_use]
pub fn normalize_base_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Some(trimmed.to_owned())
    } else {
        None
    }
}
