use crate::error::AppError;
use crate::model::{ResetTime, Task, TaskKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub mod json_store;
pub use json_store::JsonStore;

pub const TASKS_COLLECTION: &str = "tasks";

pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub fields: Fields,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub equals: Value,
}

impl Filter {
    pub fn new<F: Into<String>, V: Into<Value>>(field: F, value: V) -> Self {
        Self {
            field: field.into(),
            equals: value.into(),
        }
    }
}

fn matches_filters(document: &StoredDocument, filters: &[Filter]) -> bool {
    filters
        .iter()
        .all(|filter| document.fields.get(&filter.field) == Some(&filter.equals))
}

type CancelFn = Box<dyn FnOnce() + Send>;

pub struct DocumentSubscription {
    snapshots: Receiver<Vec<StoredDocument>>,
    cancel: Option<CancelFn>,
}

impl DocumentSubscription {
    pub fn new(snapshots: Receiver<Vec<StoredDocument>>, cancel: CancelFn) -> Self {
        Self {
            snapshots,
            cancel: Some(cancel),
        }
    }

    pub fn try_next(&self) -> Option<Vec<StoredDocument>> {
        self.snapshots.try_recv().ok()
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<Vec<StoredDocument>> {
        self.snapshots.recv_timeout(timeout).ok()
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for DocumentSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub trait DocumentStore: Send + Sync {
    fn insert(&self, collection: &str, fields: Fields) -> Result<String, AppError>;

    /// Merges `fields` into the document; absent keys keep their stored value.
    fn update(&self, collection: &str, document_id: &str, fields: Fields) -> Result<(), AppError>;

    fn remove(&self, collection: &str, document_id: &str) -> Result<(), AppError>;

    fn fetch_once(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<StoredDocument>, AppError>;

    fn subscribe(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<DocumentSubscription, AppError>;
}

#[derive(Clone)]
pub struct TaskStore {
    store: Arc<dyn DocumentStore>,
}

impl TaskStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn create(
        &self,
        text: &str,
        kind: TaskKind,
        user_id: &str,
        reset_time: ResetTime,
    ) -> Result<Task, AppError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AppError::invalid_input("task text is required"));
        }
        if user_id.trim().is_empty() {
            return Err(AppError::invalid_input("an active identity is required"));
        }

        let created_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|err| AppError::invalid_data(err.to_string()))?;
        let mut task = Task {
            id: String::new(),
            text: trimmed.to_string(),
            kind,
            completed: false,
            user_id: user_id.to_string(),
            created_at,
            reset_time: match kind {
                TaskKind::Daily => Some(reset_time.to_string()),
                TaskKind::Monthly => None,
            },
        };

        task.id = self.store.insert(TASKS_COLLECTION, document_fields(&task)?)?;
        Ok(task)
    }

    pub fn set_completed(&self, task_id: &str, completed: bool) -> Result<(), AppError> {
        let trimmed = task_id.trim();
        if trimmed.is_empty() {
            return Err(AppError::invalid_input("id is required"));
        }

        let mut fields = Fields::new();
        fields.insert("completed".to_string(), Value::Bool(completed));
        self.store.update(TASKS_COLLECTION, trimmed, fields)
    }

    pub fn delete(&self, task_id: &str) -> Result<(), AppError> {
        let trimmed = task_id.trim();
        if trimmed.is_empty() {
            return Err(AppError::invalid_input("id is required"));
        }

        self.store.remove(TASKS_COLLECTION, trimmed)
    }

    pub fn fetch(&self, user_id: &str, kind: Option<TaskKind>) -> Result<Vec<Task>, AppError> {
        let documents = self
            .store
            .fetch_once(TASKS_COLLECTION, &task_filters(user_id, kind))?;
        tasks_from_documents(&documents)
    }

    pub fn get(&self, user_id: &str, task_id: &str) -> Result<Task, AppError> {
        let trimmed = task_id.trim();
        if trimmed.is_empty() {
            return Err(AppError::invalid_input("id is required"));
        }

        self.fetch(user_id, None)?
            .into_iter()
            .find(|task| task.id == trimmed)
            .ok_or_else(|| AppError::store("task not found"))
    }

    pub fn subscribe(&self, user_id: &str, kind: TaskKind) -> Result<TaskSubscription, AppError> {
        let inner = self
            .store
            .subscribe(TASKS_COLLECTION, &task_filters(user_id, Some(kind)))?;
        Ok(TaskSubscription { inner })
    }
}

pub struct TaskSubscription {
    inner: DocumentSubscription,
}

impl TaskSubscription {
    pub fn try_next(&self) -> Result<Option<Vec<Task>>, AppError> {
        match self.inner.try_next() {
            Some(documents) => Ok(Some(tasks_from_documents(&documents)?)),
            None => Ok(None),
        }
    }

    pub fn next_timeout(&self, timeout: Duration) -> Result<Option<Vec<Task>>, AppError> {
        match self.inner.next_timeout(timeout) {
            Some(documents) => Ok(Some(tasks_from_documents(&documents)?)),
            None => Ok(None),
        }
    }

    pub fn cancel(&mut self) {
        self.inner.cancel();
    }
}

fn task_filters(user_id: &str, kind: Option<TaskKind>) -> Vec<Filter> {
    let mut filters = vec![Filter::new("user_id", user_id)];
    if let Some(kind) = kind {
        filters.push(Filter::new("kind", kind.as_str()));
    }
    filters
}

fn tasks_from_documents(documents: &[StoredDocument]) -> Result<Vec<Task>, AppError> {
    documents.iter().map(task_from_document).collect()
}

pub fn task_from_document(document: &StoredDocument) -> Result<Task, AppError> {
    let mut fields = document.fields.clone();
    fields.insert("id".to_string(), Value::String(document.id.clone()));
    serde_json::from_value(Value::Object(fields))
        .map_err(|err| AppError::invalid_data(format!("undecodable task document: {err}")))
}

fn document_fields(task: &Task) -> Result<Fields, AppError> {
    let value =
        serde_json::to_value(task).map_err(|err| AppError::invalid_data(err.to_string()))?;
    match value {
        Value::Object(mut fields) => {
            fields.remove("id");
            Ok(fields)
        }
        _ => Err(AppError::invalid_data("task did not serialize to an object")),
    }
}
