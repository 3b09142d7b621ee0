//! Cache key generation.

use sha2::{Digest, Sha256};
use url::Url;

/// URL form used for keying: fragment dropped, everything else verbatim.
pub fn normalize_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// Compute the entry key for a request identity (method + normalized URL).
pub fn compute_cache_key(method: &str, url: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(normalize_url(url).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_hash_stability() {
        let a = compute_cache_key("GET", &url("http://localhost:3000/api/listings"));
        let b = compute_cache_key("get", &url("http://localhost:3000/api/listings"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fragment_ignored() {
        let a = compute_cache_key("GET", &url("http://localhost:3000/listing/1#photos"));
        let b = compute_cache_key("GET", &url("http://localhost:3000/listing/1"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_query_significant() {
        let a = compute_cache_key("GET", &url("http://localhost:3000/api/listings?page=1"));
        let b = compute_cache_key("GET", &url("http://localhost:3000/api/listings?page=2"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_method_significant() {
        let a = compute_cache_key("GET", &url("http://localhost:3000/api/listings"));
        let b = compute_cache_key("HEAD", &url("http://localhost:3000/api/listings"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_cache_key("GET", &url("http://localhost:3000/"));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
