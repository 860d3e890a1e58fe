//! Composite display names.
//!
//! Operating systems are identified remotely by three fields (`name`,
//! `major`, `minor`) but appear in CSV files as one string such as
//! `"RedHat 7.2"`. The grammar is exactly `BASE[ MAJOR[.MINOR]]`.

use crate::{Error, Result};
use std::fmt;

/// The structured form of a composite display name.
///
/// Absent segments are empty strings, never `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompositeName {
    /// Base name, e.g. `RedHat`.
    pub base: String,
    /// Major version, or empty.
    pub major: String,
    /// Minor version, or empty.
    pub minor: String,
}

impl CompositeName {
    /// Rebuilds the display string.
    ///
    /// # Errors
    ///
    /// Returns an error if `minor` is set without `major`.
    pub fn to_display(&self) -> Result<String> {
        compose(&self.base, &self.major, &self.minor)
    }
}

impl fmt::Display for CompositeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        if !self.major.is_empty() {
            write!(f, " {}", self.major)?;
        }
        if !self.minor.is_empty() {
            write!(f, ".{}", self.minor)?;
        }
        Ok(())
    }
}

/// Splits a display name into base, major and minor.
///
/// # Errors
///
/// Returns [`Error::MalformedCompositeName`] for blank input, more than one
/// version token, more than two version segments, or an empty segment
/// around the dot.
///
/// # Examples
///
/// ```rust
/// use csvbridge::decompose;
///
/// let name = decompose("RedHat 7.2").unwrap();
/// assert_eq!((name.base.as_str(), name.major.as_str(), name.minor.as_str()), ("RedHat", "7", "2"));
/// ```
pub fn decompose(display: &str) -> Result<CompositeName> {
    let mut tokens = display.split_whitespace();
    let base = tokens
        .next()
        .ok_or_else(|| Error::MalformedCompositeName("empty name".to_string()))?;
    let version = tokens.next();
    if tokens.next().is_some() {
        return Err(Error::MalformedCompositeName(format!(
            "'{display}' has more than one version token"
        )));
    }

    let Some(version) = version else {
        return Ok(CompositeName {
            base: base.to_string(),
            ..CompositeName::default()
        });
    };

    let mut segments = version.split('.');
    let major = segments.next().unwrap_or_default();
    let minor = segments.next();
    if segments.next().is_some() {
        return Err(Error::MalformedCompositeName(format!(
            "'{display}' has more than two version segments"
        )));
    }
    if major.is_empty() || minor.is_some_and(str::is_empty) {
        return Err(Error::MalformedCompositeName(format!(
            "'{display}' has an empty version segment"
        )));
    }

    Ok(CompositeName {
        base: base.to_string(),
        major: major.to_string(),
        minor: minor.unwrap_or_default().to_string(),
    })
}

/// Builds a display name from its three remote fields.
///
/// # Errors
///
/// Returns [`Error::MalformedCompositeName`] if `minor` is non-empty while
/// `major` is empty; such a name would not decompose back to its fields.
pub fn compose(base: &str, major: &str, minor: &str) -> Result<String> {
    if major.is_empty() && !minor.is_empty() {
        return Err(Error::MalformedCompositeName(format!(
            "'{base}' has minor version '{minor}' without a major version"
        )));
    }
    let mut name = base.to_string();
    if !major.is_empty() {
        name.push(' ');
        name.push_str(major);
    }
    if !minor.is_empty() {
        name.push('.');
        name.push_str(minor);
    }
    Ok(name)
}
