//! URL template resolution
//!
//! Expands the `{x}`, `{y}` and `{z}` placeholders of a tile source template
//! into a concrete, validated URL. Templates come from the overlay
//! configuration and look like `https://tiles.example.com/{z}/{x}/{y}.png`.

use thiserror::Error;
use url::Url;

use crate::coord::TileCoord;

/// Errors produced while resolving a URL template.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A `{...}` placeholder other than `{x}`/`{y}`/`{z}` survived
    /// substitution. The URL parser would happily percent-encode the braces,
    /// so this is rejected explicitly.
    #[error("unresolved placeholder {{{0}}} in URL template")]
    UnresolvedPlaceholder(String),

    /// The substituted string is not a well-formed URL.
    #[error("invalid tile URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Resolves a tile URL template for the given coordinate.
///
/// Substitutes `{x}`, `{y}` and `{z}` with the decimal renderings of the
/// coordinate fields, then parses the result. Deterministic and
/// side-effect free.
///
/// # Example
///
/// ```
/// use maplayer::coord::TileCoord;
/// use maplayer::template::resolve;
///
/// let url = resolve("https://x/{z}/{x}/{y}.png", TileCoord::new(3, 5, 7)).unwrap();
/// assert_eq!(url.as_str(), "https://x/7/3/5.png");
/// ```
pub fn resolve(template: &str, coord: TileCoord) -> Result<Url, TemplateError> {
    let substituted = template
        .replace("{x}", &coord.x.to_string())
        .replace("{y}", &coord.y.to_string())
        .replace("{z}", &coord.zoom.to_string());

    if let Some(placeholder) = leftover_placeholder(&substituted) {
        return Err(TemplateError::UnresolvedPlaceholder(placeholder));
    }

    Url::parse(&substituted).map_err(|source| TemplateError::InvalidUrl {
        url: substituted,
        source,
    })
}

/// Returns the first `{...}` placeholder remaining in `s`, if any.
fn leftover_placeholder(s: &str) -> Option<String> {
    let start = s.find('{')?;
    let rest = &s[start + 1..];
    match rest.find('}') {
        Some(end) => Some(rest[..end].to_string()),
        // An unmatched brace is still a malformed template.
        None => Some(rest.to_string()),
    }
}
