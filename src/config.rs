//! Framework configuration.
//!
//! Reserved attribute names, the router base path, and the fallback text shown
//! for unmatched routes. Carried by [`AppContext`](crate::AppContext) so every
//! engine and router built from one context agrees on them.

/// Framework-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Attribute marking child slot placeholders in component markup.
    pub slot_attribute: String,
    /// Attribute marking links the router intercepts.
    pub link_attribute: String,
    /// Prefix stripped from locations before matching and prepended on navigate.
    pub base_path: String,
    /// Text rendered when no route matches and no not-found component is set.
    pub not_found_text: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slot_attribute: "data-slot".to_string(),
            link_attribute: "data-link".to_string(),
            base_path: String::new(),
            not_found_text: "404 - Page not found".to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_slot_attribute(mut self, name: impl Into<String>) -> Self {
        self.slot_attribute = name.into();
        self
    }

    #[must_use]
    pub fn with_link_attribute(mut self, name: impl Into<String>) -> Self {
        self.link_attribute = name.into();
        self
    }

    /// Set the base path. Trailing slashes are dropped; `"/"` means no base.
    #[must_use]
    pub fn with_base_path(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.base_path = base.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_not_found_text(mut self, text: impl Into<String>) -> Self {
        self.not_found_text = text.into();
        self
    }

    /// Remove the base path from a location. Locations outside the base are
    /// returned unchanged.
    pub(crate) fn strip_base<'a>(&self, location: &'a str) -> &'a str {
        if self.base_path.is_empty() {
            return location;
        }
        match location.strip_prefix(self.base_path.as_str()) {
            Some("") => "/",
            Some(rest) if rest.starts_with(['/', '?', '#']) => rest,
            _ => location,
        }
    }

    /// Prefix an application path with the base path.
    pub(crate) fn apply_base(&self, path: &str) -> String {
        if self.base_path.is_empty() {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_path, path)
        } else {
            format!("{}/{}", self.base_path, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.slot_attribute, "data-slot");
        assert_eq!(config.link_attribute, "data-link");
        assert!(config.base_path.is_empty());
    }

    #[test]
    fn test_base_path_round_trip() {
        let config = Config::new().with_base_path("/app/");
        assert_eq!(config.base_path, "/app");
        assert_eq!(config.apply_base("/users"), "/app/users");
        assert_eq!(config.strip_base("/app/users"), "/users");
        assert_eq!(config.strip_base("/app"), "/");
        assert_eq!(config.strip_base("/app?tab=1"), "?tab=1");
        // Not under the base
        assert_eq!(config.strip_base("/application"), "/application");
    }

    #[test]
    fn test_no_base_is_identity() {
        let config = Config::new().with_base_path("/");
        assert_eq!(config.apply_base("/x"), "/x");
        assert_eq!(config.strip_base("/x"), "/x");
    }
}
