//! In-memory registry of the datasets uploaded to the server.

use super::dataset::{CrimeDataset, DatasetSummary};
use super::error::DatasetError;
use chrono::{DateTime, Utc};
use log::info;
use poem_openapi::Object;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

pub const DEFAULT_MAX_DATASETS: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Object)]
pub struct DatasetInfo {
    pub id: String,
    pub name: String,
    pub uploaded_at: DateTime<Utc>,
    pub summary: DatasetSummary,
}

#[derive(Debug)]
pub struct StoredDataset {
    pub info: DatasetInfo,
    pub dataset: CrimeDataset,
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    datasets: HashMap<String, Arc<StoredDataset>>,
    next_seq: u64,
}

/// Datasets are kept until removed or until `max_datasets` newer uploads push them out.
#[derive(Debug)]
pub struct DatasetStore {
    inner: RwLock<Inner>,
    max_datasets: usize,
}

impl Default for DatasetStore {
    fn default() -> Self {
        DatasetStore::new(DEFAULT_MAX_DATASETS)
    }
}

impl DatasetStore {
    pub fn new(max_datasets: usize) -> Self {
        DatasetStore {
            inner: RwLock::new(Inner::default()),
            max_datasets: max_datasets.max(1),
        }
    }

    pub fn insert(&self, name: &str, dataset: CrimeDataset) -> Result<DatasetInfo, DatasetError> {
        let mut inner = self.inner.write().map_err(|_| DatasetError::StoreUnavailable)?;

        while inner.datasets.len() >= self.max_datasets {
            let oldest = inner
                .datasets
                .values()
                .min_by_key(|d| d.seq)
                .map(|d| d.info.id.clone());
            match oldest {
                Some(id) => {
                    info!("The dataset store is full, evict the dataset {}.", id);
                    inner.datasets.remove(&id);
                }
                None => break,
            }
        }

        let info = DatasetInfo {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            uploaded_at: Utc::now(),
            summary: dataset.summary(),
        };
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.datasets.insert(
            info.id.clone(),
            Arc::new(StoredDataset {
                info: info.clone(),
                dataset,
                seq,
            }),
        );

        Ok(info)
    }

    pub fn get(&self, id: &str) -> Result<Arc<StoredDataset>, DatasetError> {
        let inner = self.inner.read().map_err(|_| DatasetError::StoreUnavailable)?;
        inner
            .datasets
            .get(id)
            .cloned()
            .ok_or_else(|| DatasetError::DatasetNotFound { id: id.to_string() })
    }

    /// All datasets, oldest upload first.
    pub fn list(&self) -> Result<Vec<DatasetInfo>, DatasetError> {
        let inner = self.inner.read().map_err(|_| DatasetError::StoreUnavailable)?;
        let mut datasets: Vec<&Arc<StoredDataset>> = inner.datasets.values().collect();
        datasets.sort_by_key(|d| d.seq);
        Ok(datasets.into_iter().map(|d| d.info.clone()).collect())
    }

    pub fn remove(&self, id: &str) -> Result<(), DatasetError> {
        let mut inner = self.inner.write().map_err(|_| DatasetError::StoreUnavailable)?;
        match inner.datasets.remove(id) {
            Some(_) => Ok(()),
            None => Err(DatasetError::DatasetNotFound { id: id.to_string() }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.datasets.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> CrimeDataset {
        CrimeDataset::from_csv_str("year,state_name,district_name,murder\n2001,Goa,Panaji,1\n")
            .unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let store = DatasetStore::default();
        let info = store.insert("goa", dataset()).unwrap();
        assert_eq!(info.name, "goa");
        assert_eq!(info.summary.rows, 1);

        let stored = store.get(&info.id).unwrap();
        assert_eq!(stored.info, info);
        assert_eq!(stored.dataset.years(), vec![2001]);
    }

    #[test]
    fn test_remove() {
        let store = DatasetStore::default();
        let info = store.insert("goa", dataset()).unwrap();
        store.remove(&info.id).unwrap();
        assert!(store.is_empty());
        assert!(store.get(&info.id).unwrap_err().is_not_found());
        assert!(store.remove(&info.id).is_err());
    }

    #[test]
    fn test_evict_oldest() {
        let store = DatasetStore::new(2);
        let first = store.insert("first", dataset()).unwrap();
        let second = store.insert("second", dataset()).unwrap();
        let third = store.insert("third", dataset()).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.get(&first.id).is_err());
        let names: Vec<String> = store.list().unwrap().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["second".to_string(), "third".to_string()]);
        assert!(store.get(&second.id).is_ok());
        assert!(store.get(&third.id).is_ok());
    }
}
