use std::{fmt, str::FromStr};

/// HTTP header fields.
///
/// Lookups ignore the case of the name. The name is stored as it was first
/// inserted, so `Content-Type` stays `Content-Type` when the response is
/// written even if later code updates it through `content-type`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn matches(name: &str) -> impl Fn(&&(String, String)) -> bool + '_ {
        move |(k, _)| k.eq_ignore_ascii_case(name)
    }

    /// Return the first value of the header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(Self::matches(name))
            .map(|(_, v)| v.as_str())
    }

    /// Return the first value of the header parsed as `T`.
    ///
    /// Missing headers and values that fail to parse both yield `None`.
    #[must_use]
    pub fn get_as<T: FromStr>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|x| x.trim().parse().ok())
    }

    /// Return every value of the header, in insertion order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(Self::matches(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Replace every value of the header with `value`.
    ///
    /// The header keeps its position and display name if it already existed.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        if let Some(index) = self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            self.entries[index].1 = value;
            let mut index = index + 1;
            while index < self.entries.len() {
                if self.entries[index].0.eq_ignore_ascii_case(&name) {
                    self.entries.remove(index);
                } else {
                    index += 1;
                }
            }
        } else {
            self.entries.push((name, value));
        }
    }

    /// Append a value without touching existing values of the header.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Remove the header and return its values.
    pub fn remove(&mut self, name: &str) -> Vec<String> {
        let mut removed = vec![];
        self.entries.retain(|(k, v)| {
            if k.eq_ignore_ascii_case(name) {
                removed.push(v.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Iterate over `(name, value)` pairs, repeated headers included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of header lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut headers = Self::new();
        headers.extend(iter);
        headers
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Headers {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.add(k, v);
        }
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Headers {
    fn from(value: [(K, V); N]) -> Self {
        value.into_iter().collect()
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.entries {
            write!(f, "{k}: {v}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn lookup_ignores_case() {
        let headers = Headers::from([("Content-Type", "text/plain")]);
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert!(headers.contains("Content-type"));
        assert_eq!(headers.get("Accept"), None);
    }

    #[test_log::test]
    fn set_keeps_first_display_name_and_drops_duplicates() {
        let mut headers = Headers::new();
        headers.add("X-Drink", "tea");
        headers.add("Vary", "Accept");
        headers.add("x-drink", "coffee");

        headers.set("X-DRINK", "water");

        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            [("X-Drink", "water"), ("Vary", "Accept")]
        );
    }

    #[test_log::test]
    fn add_keeps_every_value() {
        let mut headers = Headers::new();
        headers.add("Set-Cookie", "a=1");
        headers.add("set-cookie", "b=2");
        assert_eq!(headers.get_all("SET-COOKIE"), ["a=1", "b=2"]);
        assert_eq!(headers.get("Set-Cookie"), Some("a=1"));
        assert_eq!(headers.len(), 2);
    }

    #[test_log::test]
    fn get_as_parses_or_returns_none() {
        let headers = Headers::from([("Content-Length", " 42"), ("X-Bad", "nope")]);
        assert_eq!(headers.get_as::<usize>("content-length"), Some(42));
        assert_eq!(headers.get_as::<usize>("x-bad"), None);
        assert_eq!(headers.get_as::<usize>("x-missing"), None);
    }

    #[test_log::test]
    fn remove_returns_values() {
        let mut headers = Headers::from([("A", "1"), ("b", "2"), ("a", "3")]);
        assert_eq!(headers.remove("a"), vec!["1".to_string(), "3".to_string()]);
        assert_eq!(headers.len(), 1);
        assert!(headers.remove("a").is_empty());
    }

    #[test_log::test]
    fn display_renders_header_lines() {
        let headers = Headers::from([("Content-Type", "text/html"), ("X-Test", "1")]);
        assert_eq!(headers.to_string(), "Content-Type: text/html\r\nX-Test: 1\r\n");
    }
}
