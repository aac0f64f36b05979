use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{DocumentKind, DocumentStore};
use crate::{LensError, Result};

/// In-process store, used by tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<DocumentKind, Value>>,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_documents<T>(&self, f: impl FnOnce(&mut HashMap<DocumentKind, Value>) -> T) -> Result<T> {
        let mut documents = self
            .documents
            .lock()
            .map_err(|_| LensError::Storage("Memory store lock poisoned".to_string()))?;
        Ok(f(&mut documents))
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self, kind: DocumentKind) -> Result<Option<Value>> {
        self.with_documents(|documents| documents.get(&kind).cloned())
    }

    fn save(&self, kind: DocumentKind, document: &Value) -> Result<()> {
        self.with_documents(|documents| {
            documents.insert(kind, document.clone());
        })
    }

    fn remove(&self, kind: DocumentKind) -> Result<bool> {
        self.with_documents(|documents| documents.remove(&kind).is_some())
    }

    fn stored_size(&self, kind: DocumentKind) -> Result<Option<u64>> {
        self.with_documents(|documents| {
            documents
                .get(&kind)
                .map(|document| document.to_string().len() as u64)
        })
    }
}
