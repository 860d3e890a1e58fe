//! Sequential name generation from printf-style templates.

use crate::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

/// `%%`, or `%` with optional `0` flag, width and conversion letter.
static CONVERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%(?:(%)|(0?)([0-9]*)([A-Za-z]?))").unwrap_or_else(|_| unreachable!())
});

/// Widest field a template may request.
const MAX_FIELD_WIDTH: usize = 64;

/// Substitutes `number` into a name template such as `host-%03d`.
///
/// Templates without `%` are returned unchanged. Supported conversions are
/// `%d`, `%i`, `%u` and `%s`, with an optional `0` flag and width; `%%` is a
/// literal percent sign. A template may contain at most one conversion.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for unknown or dangling conversions, for
/// field widths above 64 and for templates with more than one conversion.
///
/// # Examples
///
/// ```rust
/// use csvbridge::namify;
///
/// assert_eq!(namify("host-%d", 7).unwrap(), "host-7");
/// assert_eq!(namify("host-%03d", 7).unwrap(), "host-007");
/// assert_eq!(namify("static", 7).unwrap(), "static");
/// ```
pub fn namify(template: &str, number: u64) -> Result<String> {
    if !template.contains('%') {
        return Ok(template.to_string());
    }

    let mut out = String::with_capacity(template.len() + 8);
    let mut last = 0;
    let mut substituted = false;

    for cap in CONVERSION_PATTERN.captures_iter(template) {
        let Some(full) = cap.get(0) else { continue };
        out.push_str(&template[last..full.start()]);
        last = full.end();

        if cap.get(1).is_some() {
            out.push('%');
            continue;
        }

        let zero_pad = cap.get(2).is_some_and(|m| !m.as_str().is_empty());
        let width = cap
            .get(3)
            .map(|m| m.as_str())
            .filter(|w| !w.is_empty())
            .map_or(Ok(0), str::parse::<usize>)
            .ok()
            .filter(|w| *w <= MAX_FIELD_WIDTH)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "field width above {MAX_FIELD_WIDTH} in name template '{template}'"
                ))
            })?;

        match cap.get(4).map(|m| m.as_str()) {
            Some(conversion @ ("d" | "i" | "u" | "s")) => {
                if substituted {
                    return Err(Error::InvalidInput(format!(
                        "name template '{template}' has more than one conversion"
                    )));
                }
                substituted = true;
                if zero_pad && conversion != "s" {
                    out.push_str(&format!("{number:0>width$}"));
                } else {
                    out.push_str(&format!("{number:>width$}"));
                }
            },
            Some(other) if !other.is_empty() => {
                return Err(Error::InvalidInput(format!(
                    "unsupported conversion '%{other}' in name template '{template}'"
                )));
            },
            _ => {
                return Err(Error::InvalidInput(format!(
                    "dangling '%' in name template '{template}'"
                )));
            },
        }
    }

    out.push_str(&template[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("host-%d", 7, "host-7" ; "plain")]
    #[test_case("host-%i", 12, "host-12" ; "i conversion")]
    #[test_case("host-%s", 3, "host-3" ; "s conversion")]
    #[test_case("host-%03d", 7, "host-007" ; "zero padded")]
    #[test_case("host-%3d", 7, "host-  7" ; "space padded")]
    #[test_case("host-%02d", 123, "host-123" ; "wider than width")]
    #[test_case("%d.example.com", 5, "5.example.com" ; "leading")]
    #[test_case("100%%-host-%d", 1, "100%-host-1" ; "escaped percent")]
    #[test_case("static-name", 9, "static-name" ; "no placeholder")]
    #[test_case("only %% here", 9, "only % here" ; "escape only")]
    fn test_namify(template: &str, number: u64, expected: &str) {
        assert_eq!(namify(template, number).unwrap(), expected);
    }

    #[test]
    fn test_namify_widest_field() {
        let name = namify("host-%064d", 42).unwrap();
        assert_eq!(name.len(), "host-".len() + 64);
        assert!(name.ends_with("00042"));
    }

    #[test_case("host-%x" ; "unknown conversion")]
    #[test_case("host-%" ; "dangling")]
    #[test_case("%d-%d" ; "two conversions")]
    #[test_case("host-%65d" ; "width above limit")]
    #[test_case("host-%01000000000d" ; "huge zero padded width")]
    #[test_case("host-%1000000000d" ; "huge width")]
    #[test_case("host-%99999999999999999999999d" ; "width overflows usize")]
    fn test_namify_rejects(template: &str) {
        assert!(matches!(namify(template, 1), Err(Error::InvalidInput(_))));
    }
}
