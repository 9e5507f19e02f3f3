use crate::api::CounterPath;
use crate::config::HistoryEntry;

/// Namespaces and the keys seen under each, in discovery order.
///
/// `namespaces[i]` owns `key_lists[i]`. A namespace never has an empty key
/// list: removing its last key removes the namespace too.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespaceKeyDirectory {
    namespaces: Vec<String>,
    key_lists: Vec<Vec<String>>,
}

impl NamespaceKeyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configured history. Entries are committed one key at a
    /// time, so duplicates collapse and empty key lists are dropped.
    pub fn from_history(history: &[HistoryEntry]) -> Self {
        let mut dir = Self::new();
        for entry in history {
            for key in &entry.keys {
                dir.commit_selection(&entry.namespace, key);
            }
        }
        dir
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    pub fn keys(&self, namespace: &str) -> Option<&[String]> {
        self.position(namespace).map(|i| self.key_lists[i].as_slice())
    }

    /// Number of namespaces (sections in a list view).
    pub fn section_count(&self) -> usize {
        self.namespaces.len()
    }

    /// Number of keys under the namespace at `section`.
    pub fn row_count(&self, section: usize) -> usize {
        self.key_lists.get(section).map_or(0, Vec::len)
    }

    /// Total number of (namespace, key) pairs.
    pub fn len(&self) -> usize {
        self.key_lists.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    pub fn get(&self, section: usize, row: usize) -> Option<CounterPath> {
        let namespace = self.namespaces.get(section)?;
        let key = self.key_lists.get(section)?.get(row)?;
        Some(CounterPath::new(namespace.as_str(), key.as_str()))
    }

    pub fn contains(&self, namespace: &str, key: &str) -> bool {
        self.keys(namespace)
            .is_some_and(|keys| keys.iter().any(|k| k == key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.namespaces
            .iter()
            .zip(&self.key_lists)
            .map(|(ns, keys)| (ns.as_str(), keys.as_slice()))
    }

    /// Record a used pair. Returns `false` if it was already present.
    pub fn commit_selection(&mut self, namespace: &str, key: &str) -> bool {
        match self.position(namespace) {
            Some(i) => {
                let keys = &mut self.key_lists[i];
                if keys.iter().any(|k| k == key) {
                    return false;
                }
                keys.push(key.to_string());
            }
            None => {
                self.namespaces.push(namespace.to_string());
                self.key_lists.push(vec![key.to_string()]);
            }
        }
        true
    }

    /// Forget a pair. Returns `false` if it was absent.
    pub fn remove_key(&mut self, namespace: &str, key: &str) -> bool {
        let Some(section) = self.position(namespace) else {
            return false;
        };
        let Some(row) = self.key_lists[section].iter().position(|k| k == key) else {
            return false;
        };
        self.remove_row(section, row);
        true
    }

    /// Forget the pair at a list-view index path.
    pub fn remove_at(&mut self, section: usize, row: usize) -> Option<CounterPath> {
        let removed = self.get(section, row)?;
        self.remove_row(section, row);
        Some(removed)
    }

    fn remove_row(&mut self, section: usize, row: usize) {
        self.key_lists[section].remove(row);
        if self.key_lists[section].is_empty() {
            self.key_lists.remove(section);
            self.namespaces.remove(section);
        }
    }

    fn position(&self, namespace: &str) -> Option<usize> {
        self.namespaces.iter().position(|ns| ns == namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> NamespaceKeyDirectory {
        NamespaceKeyDirectory::from_history(&[
            HistoryEntry {
                namespace: "INFO6350".into(),
                keys: vec!["dan.magnusson".into(), "dan".into()],
            },
            HistoryEntry {
                namespace: "INFO6250".into(),
                keys: vec!["daniel".into()],
            },
        ])
    }

    fn assert_parallel(dir: &NamespaceKeyDirectory) {
        assert_eq!(dir.namespaces.len(), dir.key_lists.len());
        assert!(dir.key_lists.iter().all(|keys| !keys.is_empty()));
    }

    #[test]
    fn commit_appends_in_discovery_order() {
        let mut dir = NamespaceKeyDirectory::new();
        assert!(dir.commit_selection("b", "1"));
        assert!(dir.commit_selection("a", "2"));
        assert!(dir.commit_selection("b", "3"));
        assert_eq!(dir.namespaces(), ["b", "a"]);
        assert_eq!(dir.keys("b").unwrap(), ["1", "3"]);
        assert_eq!(dir.keys("a").unwrap(), ["2"]);
        assert_eq!(dir.len(), 3);
        assert_parallel(&dir);
    }

    #[test]
    fn commit_is_idempotent() {
        let mut dir = seeded();
        assert!(dir.commit_selection("INFO6350", "newkey"));
        let before = dir.clone();
        assert!(!dir.commit_selection("INFO6350", "newkey"));
        assert_eq!(dir, before);
    }

    #[test]
    fn removing_last_key_drops_namespace() {
        let mut dir = seeded();
        assert!(dir.remove_key("INFO6350", "dan"));
        assert_eq!(dir.namespaces(), ["INFO6350", "INFO6250"]);
        assert!(dir.remove_key("INFO6350", "dan.magnusson"));
        assert_eq!(dir.namespaces(), ["INFO6250"]);
        assert_eq!(dir.keys("INFO6350"), None);
        assert_parallel(&dir);

        assert!(dir.commit_selection("INFO6350", "again"));
        assert_eq!(dir.namespaces(), ["INFO6250", "INFO6350"]);
        assert_eq!(dir.keys("INFO6350").unwrap(), ["again"]);
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut dir = seeded();
        let before = dir.clone();
        assert!(!dir.remove_key("INFO6350", "nobody"));
        assert!(!dir.remove_key("nowhere", "dan"));
        assert_eq!(dir, before);
    }

    #[test]
    fn remove_at_index_path() {
        let mut dir = seeded();
        assert_eq!(dir.remove_at(5, 0), None);
        assert_eq!(dir.remove_at(1, 3), None);
        assert_eq!(
            dir.remove_at(1, 0),
            Some(CounterPath::new("INFO6250", "daniel"))
        );
        assert_eq!(dir.section_count(), 1);
        assert_eq!(dir.row_count(0), 2);
        assert_eq!(dir.row_count(1), 0);
        assert_parallel(&dir);
    }

    #[test]
    fn history_drops_duplicates_and_empty_lists() {
        let dir = NamespaceKeyDirectory::from_history(&[
            HistoryEntry {
                namespace: "a".into(),
                keys: vec!["x".into(), "x".into()],
            },
            HistoryEntry {
                namespace: "empty".into(),
                keys: vec![],
            },
            HistoryEntry {
                namespace: "a".into(),
                keys: vec!["y".into()],
            },
        ]);
        assert_eq!(dir.namespaces(), ["a"]);
        assert_eq!(dir.keys("a").unwrap(), ["x", "y"]);
    }

    #[test]
    fn lookup_helpers() {
        let dir = seeded();
        assert!(dir.contains("INFO6350", "dan"));
        assert!(!dir.contains("INFO6250", "dan"));
        assert_eq!(dir.get(0, 1), Some(CounterPath::new("INFO6350", "dan")));
        assert_eq!(dir.get(0, 2), None);
        let flat: Vec<_> = dir.iter().map(|(ns, keys)| (ns, keys.len())).collect();
        assert_eq!(flat, vec![("INFO6350", 2), ("INFO6250", 1)]);
    }
}
