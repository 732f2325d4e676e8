//! URL resolution and origin comparison.

use crate::NavigationError;
use url::Url;

/// Resolve `destination` against `base`.
///
/// Absolute destinations are returned normalized; relative ones (`./step1`,
/// `../up`, `/root`) need an absolute `base`.
pub fn resolve(base: &str, destination: &str) -> Result<String, NavigationError> {
    let invalid = |reason: String| NavigationError::InvalidUrl {
        url: destination.to_string(),
        reason,
    };

    if let Ok(absolute) = Url::parse(destination) {
        return Ok(absolute.into());
    }
    let base = Url::parse(base).map_err(|err| invalid(format!("base '{base}': {err}")))?;
    base.join(destination)
        .map(Into::into)
        .map_err(|err| invalid(err.to_string()))
}

/// `true` if both URLs share scheme, host and port.
pub fn same_origin(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => {
            a.scheme() == b.scheme()
                && a.host_str() == b.host_str()
                && a.port_or_known_default() == b.port_or_known_default()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_against_current() {
        let base = "https://app.local/shop/cart";
        assert_eq!(
            resolve(base, "./step1").unwrap(),
            "https://app.local/shop/step1"
        );
        assert_eq!(resolve(base, "/step2").unwrap(), "https://app.local/step2");
        assert_eq!(
            resolve(base, "?page=2").unwrap(),
            "https://app.local/shop/cart?page=2"
        );
    }

    #[test]
    fn test_absolute_ignores_base() {
        assert_eq!(
            resolve("not a url", "https://other.local/x").unwrap(),
            "https://other.local/x"
        );
    }

    #[test]
    fn test_relative_without_base_fails() {
        let err = resolve("/", "./step1").unwrap_err();
        assert!(matches!(err, NavigationError::InvalidUrl { url, .. } if url == "./step1"));
    }

    #[test]
    fn test_same_origin() {
        assert!(same_origin("https://app.local/a", "https://app.local:443/b"));
        assert!(!same_origin("https://app.local/a", "http://app.local/a"));
        assert!(!same_origin("https://app.local/a", "https://cdn.app.local/a"));
        assert!(!same_origin("https://app.local:8443/a", "https://app.local/a"));
        assert!(!same_origin("relative", "https://app.local/a"));
    }
}
