use std::{borrow::Borrow, str::FromStr};

/// A map that stores multiple values for each key.
///
/// Keys keep their insertion order and so do the values of a key. The
/// single-value accessors ([`MultiDict::get`], [`MultiDict::iter`]) return the
/// earliest value, the `*_all`/`*_multi` variants return every value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiDict<K, V> {
    entries: Vec<(K, Vec<V>)>,
}

impl<K, V> Default for MultiDict<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: Eq, V> MultiDict<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from keys that already carry their list of values.
    ///
    /// Keys with an empty list are skipped.
    pub fn from_lists(lists: impl IntoIterator<Item = (K, Vec<V>)>) -> Self {
        let mut dict = Self::new();
        for (key, values) in lists {
            if values.is_empty() {
                continue;
            }
            if let Some(index) = dict.position(&key) {
                dict.entries[index].1.extend(values);
            } else {
                dict.entries.push((key, values));
            }
        }
        dict
    }

    fn position<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.entries.iter().position(|(k, _)| k.borrow() == key)
    }

    /// Return the first value associated with the key.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.position(key)
            .and_then(|index| self.entries[index].1.first())
    }

    /// Return the first value for the key parsed as `T`.
    ///
    /// Missing keys and values that fail to parse both yield `None`.
    #[must_use]
    pub fn get_as<T, Q>(&self, key: &Q) -> Option<T>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        V: AsRef<str>,
        T: FromStr,
    {
        self.get(key).and_then(|x| x.as_ref().parse().ok())
    }

    /// Return every value stored for the key, oldest first.
    #[must_use]
    pub fn get_all<Q>(&self, key: &Q) -> &[V]
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        match self.position(key) {
            Some(index) => &self.entries[index].1,
            None => &[],
        }
    }

    /// Return every value for the key parsed as `T`, dropping the ones that
    /// fail to parse.
    #[must_use]
    pub fn get_all_as<T, Q>(&self, key: &Q) -> Vec<T>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        V: AsRef<str>,
        T: FromStr,
    {
        self.get_all(key)
            .iter()
            .filter_map(|x| x.as_ref().parse().ok())
            .collect()
    }

    /// Append a value for the key, preserving existing ones.
    pub fn add(&mut self, key: K, value: V) {
        if let Some(index) = self.position(&key) {
            self.entries[index].1.push(value);
        } else {
            self.entries.push((key, vec![value]));
        }
    }

    /// Replace all values of the key with a single value.
    pub fn set(&mut self, key: K, value: V) {
        if let Some(index) = self.position(&key) {
            self.entries[index].1 = vec![value];
        } else {
            self.entries.push((key, vec![value]));
        }
    }

    /// Remove the key and return the values it held.
    pub fn remove<Q>(&mut self, key: &Q) -> Vec<V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.position(key)
            .map(|index| self.entries.remove(index).1)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.position(key).is_some()
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Iterate over `(key, first value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries
            .iter()
            .filter_map(|(k, values)| values.first().map(|v| (k, v)))
    }

    /// Iterate over every stored `(key, value)` pair.
    pub fn iter_multi(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k, v)))
    }
}

impl MultiDict<String, String> {
    /// Parse an `application/x-www-form-urlencoded` string.
    ///
    /// Blank values are kept, so `a=&b` yields `a=""` and `b=""`.
    #[must_use]
    pub fn from_query_string(query: &str) -> Self {
        Self::from_urlencoded(query.as_bytes())
    }

    /// Same as [`MultiDict::from_query_string`] for raw body bytes.
    #[must_use]
    pub fn from_urlencoded(input: &[u8]) -> Self {
        url::form_urlencoded::parse(input)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }
}

impl<K: Eq, V> FromIterator<(K, V)> for MultiDict<K, V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut dict = Self::new();
        dict.extend(iter);
        dict
    }
}

impl<K: Eq, V> Extend<(K, V)> for MultiDict<K, V> {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.add(key, value);
        }
    }
}

impl<K, V> IntoIterator for MultiDict<K, V> {
    type Item = (K, Vec<V>);
    type IntoIter = std::vec::IntoIter<(K, Vec<V>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample() -> MultiDict<String, String> {
        [("a", "1"), ("b", "2"), ("a", "3")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test_log::test]
    fn get_returns_first_value() {
        let dict = sample();
        assert_eq!(dict.get("a").map(String::as_str), Some("1"));
        assert_eq!(dict.get("missing"), None);
    }

    #[test_log::test]
    fn get_all_keeps_insertion_order() {
        let dict = sample();
        assert_eq!(dict.get_all("a"), ["1".to_string(), "3".to_string()]);
        assert!(dict.get_all("missing").is_empty());
    }

    #[test_log::test]
    fn len_counts_distinct_keys() {
        let dict = sample();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.keys().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test_log::test]
    fn set_replaces_every_value() {
        let mut dict = sample();
        dict.set("a".to_string(), "9".to_string());
        assert_eq!(dict.get_all("a"), ["9".to_string()]);
    }

    #[test_log::test]
    fn remove_returns_all_values() {
        let mut dict = sample();
        assert_eq!(dict.remove("a"), vec!["1".to_string(), "3".to_string()]);
        assert!(!dict.contains_key("a"));
        assert!(dict.remove("a").is_empty());
    }

    #[test_log::test]
    fn iter_multi_yields_every_pair() {
        let dict = sample();
        let pairs = dict
            .iter_multi()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>();
        assert_eq!(pairs, ["a=1", "a=3", "b=2"]);

        let firsts = dict
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>();
        assert_eq!(firsts, ["a=1", "b=2"]);
    }

    #[test_log::test]
    fn get_all_as_drops_unparsable_values() {
        let dict = MultiDict::from_query_string("n=1&n=two&n=3");
        assert_eq!(dict.get_all_as::<u32, _>("n"), vec![1, 3]);
        assert_eq!(dict.get_as::<u32, _>("n"), Some(1));
    }

    #[test_log::test]
    fn query_string_keeps_blank_values_and_decodes() {
        let dict = MultiDict::from_query_string("name=Eren+Yeager&empty=&flag&city=K%C3%B6ln");
        assert_eq!(dict.get("name").unwrap(), "Eren Yeager");
        assert_eq!(dict.get("empty").unwrap(), "");
        assert_eq!(dict.get("flag").unwrap(), "");
        assert_eq!(dict.get("city").unwrap(), "Köln");
    }

    #[test_log::test]
    fn from_lists_skips_empty_lists() {
        let dict: MultiDict<&str, u8> = MultiDict::from_lists([("a", vec![1, 2]), ("b", vec![])]);
        assert_eq!(dict.get_all("a"), [1, 2]);
        assert!(!dict.contains_key("b"));
    }
}
