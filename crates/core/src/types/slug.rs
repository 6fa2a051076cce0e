//! URL-safe profile slugs.
//!
//! A slug is derived from a display name by [`slugify`]. Uniqueness across
//! profiles is not a property of the string itself; the server's slug
//! allocator checks candidates against the profile store and appends numeric
//! suffixes (see [`Slug::with_suffix`]).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// The input string is empty.
    #[error("slug cannot be empty")]
    Empty,
    /// The input contains characters other than `a-z`, `0-9` and single inner hyphens.
    #[error("slug must match ^[a-z0-9]+(-[a-z0-9]+)*$: {0}")]
    Malformed(String),
}

/// A URL-safe identifier matching `^[a-z0-9]+(-[a-z0-9]+)*$`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Base used when a name has nothing slug-worthy in it.
    pub const FALLBACK_BASE: &'static str = "agent";

    /// The [`Slug::FALLBACK_BASE`] slug.
    #[must_use]
    pub fn fallback() -> Self {
        Self(Self::FALLBACK_BASE.to_owned())
    }

    /// Parse an already-derived slug, validating its shape.
    ///
    /// # Errors
    ///
    /// Returns `SlugError` if the input is empty or not in canonical form.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        let canonical = s
            .split('-')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
        if !canonical {
            return Err(SlugError::Malformed(s.to_owned()));
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the candidate for the `n`th collision: `base-n`.
    #[must_use]
    pub fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}-{n}", self.0))
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Derive a slug from a display name.
///
/// Lower-cases the input, replaces each run of non-alphanumeric characters
/// (anything outside ASCII `a-z0-9`) with a single hyphen and trims leading
/// and trailing hyphens. Returns `None` when nothing alphanumeric remains.
///
/// ```
/// use listing_portal_core::slugify;
///
/// assert_eq!(slugify("Jane  O'Neil").unwrap().as_str(), "jane-o-neil");
/// assert!(slugify("!!!").is_none());
/// ```
#[must_use]
pub fn slugify(base_name: &str) -> Option<Slug> {
    let mut out = String::with_capacity(base_name.len());
    let mut pending_hyphen = false;

    for c in base_name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    if out.is_empty() { None } else { Some(Slug(out)) }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn is_canonical(s: &str) -> bool {
        Slug::parse(s).is_ok()
    }

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Jane Doe").unwrap().as_str(), "jane-doe");
        assert_eq!(slugify("  ACME Realty, Inc. ").unwrap().as_str(), "acme-realty-inc");
        assert_eq!(slugify("--Agent__007--").unwrap().as_str(), "agent-007");
    }

    #[test]
    fn test_slugify_non_ascii_is_a_separator() {
        assert_eq!(slugify("José Núñez").unwrap().as_str(), "jos-n-ez");
    }

    #[test]
    fn test_slugify_empty_results() {
        assert!(slugify("").is_none());
        assert!(slugify(" -_- ").is_none());
        assert!(slugify("日本").is_none());
    }

    #[test]
    fn test_slugify_always_canonical() {
        let names = [
            "Jane Doe",
            "a",
            "Mary-Kate   Olsen",
            "O'Brien & Sons",
            "x1 y2 z3",
            "__lead__",
            "Ünïcödé Name 42",
        ];
        for name in names {
            let slug = slugify(name).unwrap();
            assert!(is_canonical(slug.as_str()), "{name} -> {slug}");
        }
    }

    #[test]
    fn test_fallback_is_canonical() {
        assert!(is_canonical(Slug::fallback().as_str()));
    }

    #[test]
    fn test_with_suffix() {
        let slug = slugify("Jane Doe").unwrap();
        assert_eq!(slug.with_suffix(1).as_str(), "jane-doe-1");
        assert_eq!(slug.with_suffix(12).as_str(), "jane-doe-12");
        assert!(is_canonical(slug.with_suffix(3).as_str()));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
        assert!(Slug::parse("Jane").is_err());
        assert!(Slug::parse("jane--doe").is_err());
        assert!(Slug::parse("-jane").is_err());
        assert!(Slug::parse("jane-").is_err());
        assert!(Slug::parse("jane_doe").is_err());
    }

    #[test]
    fn test_serde_validates() {
        let ok: Slug = serde_json::from_str("\"jane-doe\"").unwrap();
        assert_eq!(ok.as_str(), "jane-doe");
        assert!(serde_json::from_str::<Slug>("\"Jane Doe\"").is_err());
    }
}
