//! This module provides a local, file-backed store for incidences

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::incidence::Incidence;
use crate::traits::PersistentStore;

/// A [`PersistentStore`] that keeps its incidences in a local JSON file
#[derive(Debug, PartialEq)]
pub struct LocalStore {
    backing_file: Option<PathBuf>,
    data: StoredData,
}

#[derive(Default, Debug, PartialEq, Serialize, Deserialize)]
struct StoredData {
    incidences: BTreeMap<String, Incidence>,
}

impl LocalStore {
    /// An empty store, that will be saved to `path` on every change
    pub fn new(path: &Path) -> Self {
        Self {
            backing_file: Some(PathBuf::from(path)),
            data: StoredData::default(),
        }
    }

    /// An empty store that is never saved
    pub fn in_memory() -> Self {
        Self {
            backing_file: None,
            data: StoredData::default(),
        }
    }

    /// Initialize a store from the content of a valid backing file.
    /// Returns an error otherwise
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let file = std::fs::File::open(path)?;
        let data = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(Self {
            backing_file: Some(PathBuf::from(path)),
            data,
        })
    }

    /// Store the current contents to the backing file, if any
    fn save_to_file(&self) -> Result<(), StoreError> {
        let path = match &self.backing_file {
            None => return Ok(()),
            Some(path) => path,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("json.tmp");
        let file = std::fs::File::create(&temp_path)?;
        serde_json::to_writer(file, &self.data)?;
        std::fs::rename(&temp_path, path)?;
        log::debug!("Saved {} incidence(s) to {:?}", self.data.incidences.len(), path);
        Ok(())
    }

    pub fn incidences(&self) -> impl Iterator<Item = &Incidence> {
        self.data.incidences.values()
    }

    pub fn len(&self) -> usize {
        self.data.incidences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.incidences.is_empty()
    }
}

#[async_trait]
impl PersistentStore for LocalStore {
    async fn find_by_uid(&self, uid: &str) -> Result<Option<Incidence>, StoreError> {
        Ok(self.data.incidences.get(uid).cloned())
    }

    async fn create(&mut self, incidence: Incidence) -> Result<(), StoreError> {
        let uid = incidence.uid().to_string();
        if self.data.incidences.contains_key(&uid) {
            return Err(StoreError::AlreadyExists(uid));
        }
        self.data.incidences.insert(uid, incidence);
        self.save_to_file()
    }

    async fn update(&mut self, incidence: Incidence) -> Result<(), StoreError> {
        let uid = incidence.uid().to_string();
        let stored = match self.data.incidences.get(&uid) {
            None => return Err(StoreError::NotFound(uid)),
            Some(stored) => stored.sequence(),
        };
        if incidence.sequence() < stored {
            return Err(StoreError::StaleRevision { uid, stored, incoming: incidence.sequence() });
        }
        self.data.incidences.insert(uid, incidence);
        self.save_to_file()
    }

    async fn delete(&mut self, uid: &str) -> Result<Incidence, StoreError> {
        let removed = self.data.incidences.remove(uid).ok_or_else(|| StoreError::NotFound(uid.to_string()))?;
        self.save_to_file()?;
        Ok(removed)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::incidence::Todo;

    #[tokio::test]
    async fn serde_store() {
        let _ = env_logger::builder().is_test(true).try_init();

        let path = std::env::temp_dir().join(format!("rendezvous-store-{}", crate::utils::new_uid())).join("store.json");
        let mut store = LocalStore::new(&path);

        let todo = Incidence::Todo(Todo::new("Buy milk"));
        store.create(todo.clone()).await.unwrap();

        let retrieved = LocalStore::from_file(&path).unwrap();
        assert_eq!(store, retrieved);
        assert_eq!(retrieved.find_by_uid(todo.uid()).await.unwrap(), Some(todo));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn sequences_never_go_backwards() {
        let mut store = LocalStore::in_memory();
        let mut todo = Incidence::Todo(Todo::new("Call Mom"));
        todo.base_mut().sequence = 2;
        store.create(todo.clone()).await.unwrap();
        assert!(matches!(store.create(todo.clone()).await, Err(StoreError::AlreadyExists(_))));

        let mut older = todo.clone();
        older.base_mut().sequence = 1;
        assert!(matches!(store.update(older).await, Err(StoreError::StaleRevision { stored: 2, incoming: 1, .. })));

        let mut newer = todo.clone();
        newer.base_mut().sequence = 3;
        store.update(newer).await.unwrap();
        assert_eq!(store.find_by_uid(todo.uid()).await.unwrap().map(|i| i.sequence()), Some(3));

        assert!(store.delete(todo.uid()).await.is_ok());
        assert!(store.is_empty());
        assert!(matches!(store.delete(todo.uid()).await, Err(StoreError::NotFound(_))));
    }
}
