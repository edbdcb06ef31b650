use super::{
    DocumentStore, DocumentSubscription, Fields, Filter, StoredDocument, matches_filters,
};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

pub const SCHEMA_VERSION: u32 = 1;
const STORE_FILE_NAME: &str = "documents.json";
const STORE_PATH_ENV_VAR: &str = "CHECKLIST_STORE_PATH";

type Collections = HashMap<String, Vec<StoredDocument>>;

#[derive(Debug, Serialize, Deserialize)]
struct StoredCollections {
    schema_version: u32,
    #[serde(default)]
    collections: Collections,
}

struct Watcher {
    collection: String,
    filters: Vec<Filter>,
    sender: Sender<Vec<StoredDocument>>,
}

#[derive(Default)]
struct WatcherTable {
    watchers: HashMap<u64, Watcher>,
    next_id: u64,
}

pub struct JsonStore {
    path: Option<PathBuf>,
    data: Mutex<Collections>,
    watchers: Arc<Mutex<WatcherTable>>,
}

impl std::fmt::Debug for JsonStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl JsonStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(Collections::new()),
            watchers: Arc::default(),
        }
    }

    pub fn open(path: &Path) -> Result<Self, AppError> {
        let collections = if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|err| AppError::store(err.to_string()))?;
            let stored: StoredCollections = serde_json::from_str(&content)
                .map_err(|err| AppError::invalid_data(err.to_string()))?;

            if !(1..=SCHEMA_VERSION).contains(&stored.schema_version) {
                return Err(AppError::invalid_data("schema_version mismatch"));
            }

            stored.collections
        } else {
            Collections::new()
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            data: Mutex::new(collections),
            watchers: Arc::default(),
        })
    }

    pub fn default_path() -> Result<PathBuf, AppError> {
        if let Ok(path) = std::env::var(STORE_PATH_ENV_VAR)
            && !path.trim().is_empty()
        {
            return Ok(PathBuf::from(path));
        }

        if cfg!(windows) {
            let appdata = std::env::var("APPDATA")
                .map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
            Ok(PathBuf::from(appdata)
                .join("checklist")
                .join(STORE_FILE_NAME))
        } else {
            let home =
                std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
            Ok(PathBuf::from(home)
                .join(".config")
                .join("checklist")
                .join(STORE_FILE_NAME))
        }
    }

    fn lock_data(&self) -> Result<MutexGuard<'_, Collections>, AppError> {
        self.data
            .lock()
            .map_err(|_| AppError::store("document store state poisoned"))
    }

    fn persist(&self, collections: &Collections) -> Result<(), AppError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| AppError::store(err.to_string()))?;
        }

        let stored = StoredCollections {
            schema_version: SCHEMA_VERSION,
            collections: collections.clone(),
        };
        let content = serde_json::to_string_pretty(&stored)
            .map_err(|err| AppError::invalid_data(err.to_string()))?;
        std::fs::write(path, content).map_err(|err| AppError::store(err.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(path, permissions)
                .map_err(|err| AppError::store(err.to_string()))?;
        }

        Ok(())
    }

    // Watchers whose receiver is gone are pruned on the next delivery.
    fn deliver(&self, collection: &str, documents: &[StoredDocument]) {
        let Ok(mut table) = self.watchers.lock() else {
            return;
        };

        table.watchers.retain(|_, watcher| {
            if watcher.collection != collection {
                return true;
            }

            let snapshot: Vec<StoredDocument> = documents
                .iter()
                .filter(|document| matches_filters(document, &watcher.filters))
                .cloned()
                .collect();
            watcher.sender.send(snapshot).is_ok()
        });
    }
}

impl DocumentStore for JsonStore {
    fn insert(&self, collection: &str, fields: Fields) -> Result<String, AppError> {
        if collection.trim().is_empty() {
            return Err(AppError::invalid_input("collection is required"));
        }

        let document = StoredDocument {
            id: Uuid::new_v4().to_string(),
            fields,
        };
        let id = document.id.clone();

        let mut data = self.lock_data()?;
        data.entry(collection.to_string()).or_default().push(document);
        self.persist(&data)?;
        self.deliver(
            collection,
            data.get(collection).map(Vec::as_slice).unwrap_or(&[]),
        );

        Ok(id)
    }

    fn update(&self, collection: &str, document_id: &str, fields: Fields) -> Result<(), AppError> {
        let mut data = self.lock_data()?;
        let documents = data
            .get_mut(collection)
            .ok_or_else(|| AppError::store("document not found"))?;
        let document = documents
            .iter_mut()
            .find(|document| document.id == document_id)
            .ok_or_else(|| AppError::store("document not found"))?;

        for (key, value) in fields {
            document.fields.insert(key, value);
        }

        self.persist(&data)?;
        self.deliver(
            collection,
            data.get(collection).map(Vec::as_slice).unwrap_or(&[]),
        );

        Ok(())
    }

    fn remove(&self, collection: &str, document_id: &str) -> Result<(), AppError> {
        let mut data = self.lock_data()?;
        let documents = data
            .get_mut(collection)
            .ok_or_else(|| AppError::store("document not found"))?;
        let index = documents
            .iter()
            .position(|document| document.id == document_id)
            .ok_or_else(|| AppError::store("document not found"))?;
        documents.remove(index);

        self.persist(&data)?;
        self.deliver(
            collection,
            data.get(collection).map(Vec::as_slice).unwrap_or(&[]),
        );

        Ok(())
    }

    fn fetch_once(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<StoredDocument>, AppError> {
        let data = self.lock_data()?;
        Ok(data
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| matches_filters(document, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn subscribe(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<DocumentSubscription, AppError> {
        let (sender, receiver) = mpsc::channel();

        // Lock order is data before watchers, matching every mutation path.
        let data = self.lock_data()?;
        let snapshot: Vec<StoredDocument> = data
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| matches_filters(document, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        sender
            .send(snapshot)
            .map_err(|_| AppError::store("subscription channel closed"))?;

        let mut table = self
            .watchers
            .lock()
            .map_err(|_| AppError::store("document store state poisoned"))?;
        let id = table.next_id;
        table.next_id += 1;
        table.watchers.insert(
            id,
            Watcher {
                collection: collection.to_string(),
                filters: filters.to_vec(),
                sender,
            },
        );
        drop(table);
        drop(data);

        let table = Arc::clone(&self.watchers);
        Ok(DocumentSubscription::new(
            receiver,
            Box::new(move || {
                if let Ok(mut table) = table.lock() {
                    table.watchers.remove(&id);
                }
            }),
        ))
    }
}
