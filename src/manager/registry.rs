use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Keyed store with lazy creation and a single release hook, so "last one out tears it
/// down" lives in one place.
#[derive(Debug)]
pub struct Registry<V> {
    entries: HashMap<String, V>,
}

impl<V> Default for Registry<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V> Registry<V> {
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }

    pub fn insert(&mut self, key: String, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key)
    }

    pub fn get_or_insert_with<F>(&mut self, key: &str, create: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        self.entries.entry(key.to_string()).or_insert_with(create)
    }

    /// Like `get_or_insert_with`, but nothing is stored when `create` fails.
    pub fn try_get_or_insert_with<F, E>(&mut self, key: &str, create: F) -> Result<&mut V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(create()?)),
        }
    }

    /// Drops the entry when `should_release` says so and hands it back.
    pub fn release_if<F>(&mut self, key: &str, should_release: F) -> Option<V>
    where
        F: FnOnce(&V) -> bool,
    {
        if self.entries.get(key).is_some_and(should_release) {
            self.entries.remove(key)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_get_or_insert_is_idempotent() {
        let mut rooms: Registry<BTreeSet<String>> = Registry::default();
        rooms.get_or_insert_with("lobby", BTreeSet::new).insert("alice".to_string());
        rooms.get_or_insert_with("lobby", BTreeSet::new).insert("bob".to_string());
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms.get("lobby").map(BTreeSet::len), Some(2));
    }

    #[test]
    fn test_failed_creation_stores_nothing() {
        let mut games: Registry<u32> = Registry::default();
        let result: Result<&mut u32, &str> =
            games.try_get_or_insert_with("room", || Err("invalid"));
        assert!(result.is_err());
        assert!(!games.contains("room"));

        *games.try_get_or_insert_with::<_, &str>("room", || Ok(1)).unwrap() += 1;
        let again = games.try_get_or_insert_with::<_, &str>("room", || Err("never called"));
        assert_eq!(again.copied(), Ok(2));
    }

    #[test]
    fn test_release_if() {
        let mut rooms: Registry<Vec<&str>> = Registry::default();
        rooms.insert("den".to_string(), vec!["alice"]);
        assert!(rooms.release_if("den", |members| members.is_empty()).is_none());
        rooms.get_mut("den").unwrap().clear();
        assert!(rooms.release_if("den", |members| members.is_empty()).is_some());
        assert!(!rooms.contains("den"));
        assert!(rooms.release_if("missing", |_| true).is_none());
    }
}
