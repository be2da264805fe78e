use crate::config::Lang;

/// Cache key for a translated chunk.
///
/// Keys are opaque MD5 hashes of `(text, source, target)`, ensuring:
/// - Same text + language pair = same key, in this run and later ones
/// - Any change to inputs produces a different key
/// - Keys are fixed-length (32 hex chars) for consistent storage
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    hash: String,
}

impl CacheKey {
    pub fn new(text: &str, source_lang: &Lang, target_lang: &Lang) -> Self {
        // Null separators keep ("a", "bc") and ("ab", "c") apart.
        let combined = format!(
            "{}\0{}\0{}",
            text,
            source_lang.as_str(),
            target_lang.as_str(),
        );

        Self {
            hash: format!("{:x}", md5::compute(combined.as_bytes())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(text: &str, src: &str, tgt: &str) -> CacheKey {
        CacheKey::new(text, &Lang::new(src), &Lang::new(tgt))
    }

    #[test]
    fn test_cache_key_is_fixed_length_hash() {
        let k = key("Hello world", "en", "fa");
        assert_eq!(k.to_string().len(), 32);
        assert!(k.to_string().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_cache_key_differs_by_content() {
        assert_ne!(key("Hello", "en", "fa"), key("World", "en", "fa"));
    }

    #[test]
    fn test_cache_key_differs_by_language() {
        assert_ne!(key("Hello", "en", "fa"), key("Hello", "en", "ar"));
        assert_ne!(key("Hello", "en", "fa"), key("Hello", "auto", "fa"));
    }

    #[test]
    fn test_cache_key_separator_prevents_collisions() {
        assert_ne!(key("a", "bc", "fa"), key("ab", "c", "fa"));
    }

    #[test]
    fn test_cache_key_same_inputs_same_key() {
        assert_eq!(key("Hello", "en", "fa"), key("Hello", "en", "fa"));
    }
}
