//! URL slugs for products and categories.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug cannot be empty")]
    Empty,
    #[error("slug must be at most {max} characters")]
    TooLong { max: usize },
    #[error("slug may only contain lowercase letters, digits and single hyphens")]
    InvalidCharacters,
}

/// A validated slug: lowercase ASCII alphanumerics separated by single
/// hyphens, with no leading or trailing hyphen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    pub const MAX_LENGTH: usize = 120;

    /// Validate an existing slug.
    ///
    /// # Errors
    ///
    /// Returns a [`SlugError`] if `s` is not already in slug form.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        let valid = s.split('-').all(|part| {
            !part.is_empty()
                && part
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        });
        if !valid {
            return Err(SlugError::InvalidCharacters);
        }
        Ok(Self(s.to_owned()))
    }

    /// Derive a slug from a human title ("Kopi O Kosong 250g" -> "kopi-o-kosong-250g").
    ///
    /// # Errors
    ///
    /// Returns `SlugError::Empty` if the title has no ASCII alphanumerics.
    pub fn from_title(title: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(title.len());
        let mut pending_hyphen = false;
        for c in title.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_hyphen = true;
            }
        }
        if out.len() > Self::MAX_LENGTH {
            out.truncate(Self::MAX_LENGTH);
            while out.ends_with('-') {
                out.pop();
            }
        }
        Self::parse(&out)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
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

    #[test]
    fn test_from_title() {
        assert_eq!(
            Slug::from_title("  Kopi O Kosong (250g) ").unwrap().as_str(),
            "kopi-o-kosong-250g"
        );
        assert_eq!(Slug::from_title("Teh--Tarik!!").unwrap().as_str(), "teh-tarik");
        assert_eq!(Slug::from_title("!!!"), Err(SlugError::Empty));
    }

    #[test]
    fn test_parse() {
        assert!(Slug::parse("batik-scarf-2").is_ok());
        assert_eq!(Slug::parse("Batik"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse("-batik"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse("batik--scarf"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
    }

    #[test]
    fn test_long_titles_are_truncated_cleanly() {
        let title = format!("{} tail", "a".repeat(119));
        let slug = Slug::from_title(&title).unwrap();
        assert!(slug.as_str().len() <= Slug::MAX_LENGTH);
        assert!(!slug.as_str().ends_with('-'));
    }
}
