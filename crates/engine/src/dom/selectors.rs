// ABOUTME: Process-wide cache of compiled CSS selectors for the extractor's own fixed selectors.
// ABOUTME: Caller-supplied selectors are compiled per call and never enter the cache.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use scraper::Selector;

/// Upper bound on cached selectors. Past it, selectors are compiled but not stored.
const MAX_CACHED_SELECTORS: usize = 256;

static SELECTOR_CACHE: Lazy<RwLock<HashMap<String, Selector>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Compile `css` without touching the cache. Returns `None` if it is not a valid selector.
pub fn compile(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Gets or compiles a CSS selector, caching successful compiles.
///
/// Returns `None` if `css` is not a valid selector. A poisoned lock only
/// means another thread panicked mid-insert; the map itself is still usable.
pub fn get_or_compile(css: &str) -> Option<Selector> {
    {
        let cache = SELECTOR_CACHE.read().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = cache.get(css) {
            return Some(cached.clone());
        }
    }

    let compiled = compile(css)?;
    let mut cache = SELECTOR_CACHE.write().unwrap_or_else(|e| e.into_inner());
    if cache.len() < MAX_CACHED_SELECTORS {
        cache.insert(css.to_string(), compiled.clone());
    }
    Some(compiled)
}

#[cfg(test)]
pub(crate) fn is_cached(css: &str) -> bool {
    SELECTOR_CACHE
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .contains_key(css)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_selector_is_cached() {
        assert!(get_or_compile("h2.article-title").is_some());
        assert!(get_or_compile("h2.article-title").is_some());
        assert!(is_cached("h2.article-title"));
    }

    #[test]
    fn invalid_selector_is_not_cached() {
        assert!(get_or_compile("[[[invalid").is_none());
        assert!(get_or_compile("[[[invalid").is_none());
        assert!(!is_cached("[[[invalid"));
    }

    #[test]
    fn compile_leaves_cache_untouched() {
        for i in 0..50 {
            let css = format!("div.caller-class-{}", i);
            assert!(compile(&css).is_some());
            assert!(!is_cached(&css));
        }
        assert!(compile("p >").is_none());
    }

    #[test]
    fn cache_size_is_bounded() {
        for i in 0..(MAX_CACHED_SELECTORS + 20) {
            assert!(get_or_compile(&format!("span.fill-{}", i)).is_some());
        }
        let len = SELECTOR_CACHE.read().unwrap().len();
        assert!(len <= MAX_CACHED_SELECTORS, "cache grew to {}", len);
    }
}
