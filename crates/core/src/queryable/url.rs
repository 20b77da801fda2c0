//! Path composition and query strings

use indexmap::IndexMap;

/// Insertion-ordered query string parameters. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: IndexMap<String, String>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, keeping its original position when it already exists.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.params.shift_remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn clear(&mut self) {
        self.params.clear();
    }

    /// `k=v&k2=v2` with keys and values percent-encoded.
    pub fn to_query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Joins path parts with single slashes.
///
/// Leading and trailing slashes of each part are dropped at the joints; empty
/// parts are skipped.
pub fn combine(parts: &[&str]) -> String {
    let mut out = String::new();
    for part in parts.iter().filter(|p| !p.is_empty()) {
        if out.is_empty() {
            out.push_str(part.trim_end_matches('/'));
            if out.is_empty() {
                // a lone "/" stays a root path
                out.push('/');
            }
            continue;
        }
        let segment = part.trim_matches('/');
        if segment.is_empty() {
            continue;
        }
        if !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

/// Appends an encoded query string, respecting one already present in `url`.
pub fn append_query(url: &str, query: &QueryParams) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') {
        if url.ends_with('?') || url.ends_with('&') {
            ""
        } else {
            "&"
        }
    } else {
        "?"
    };
    format!("{url}{separator}{}", query.to_query_string())
}

/// Whether `url` carries a scheme.
pub fn is_absolute(url: &str) -> bool {
    url.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_normalizes_slashes() {
        assert_eq!(
            combine(&["https://x.example/sites/dev/", "/_api/", "web"]),
            "https://x.example/sites/dev/_api/web"
        );
        assert_eq!(combine(&["https://x.example", "", "lists"]), "https://x.example/lists");
        assert_eq!(combine(&["/", "a"]), "/a");
    }

    #[test]
    fn query_string_is_encoded_in_insertion_order() {
        let mut query = QueryParams::new();
        query.set("$select", "Title,Id").set("$filter", "Title eq 'a b'");
        assert_eq!(
            append_query("https://x.example/_api/web", &query),
            "https://x.example/_api/web?%24select=Title%2CId&%24filter=Title%20eq%20%27a%20b%27"
        );
    }

    #[test]
    fn append_query_extends_existing_query() {
        let mut query = QueryParams::new();
        query.set("b", "2");
        assert_eq!(append_query("https://x.example/a?x=1", &query), "https://x.example/a?x=1&b=2");
        assert_eq!(append_query("https://x.example/a?", &query), "https://x.example/a?b=2");
    }

    #[test]
    fn detects_absolute_urls() {
        assert!(is_absolute("https://graph.example/v1.0"));
        assert!(!is_absolute("/sites/dev"));
        assert!(!is_absolute("items('a://b')"));
    }
}
