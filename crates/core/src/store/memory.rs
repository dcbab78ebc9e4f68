use super::{merge_fields, sort_documents, Collection, Document, RecordStore, SortBy, ID_FIELD};
use crate::{ClinicError, ClinicResult};
use clinic_uuid::RecordId;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

type Collections = HashMap<Collection, BTreeMap<RecordId, Document>>;

/// In-process record store.
///
/// Contents are lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ClinicResult<MutexGuard<'_, Collections>> {
        self.collections
            .lock()
            .map_err(|_| ClinicError::LockPoisoned)
    }
}

impl RecordStore for MemoryStore {
    fn find_all(
        &self,
        collection: Collection,
        sort: Option<SortBy<'_>>,
    ) -> ClinicResult<Vec<Document>> {
        let guard = self.lock()?;
        let mut documents: Vec<Document> = guard
            .get(&collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default();
        drop(guard);

        if let Some(sort) = sort {
            sort_documents(&mut documents, sort);
        }
        Ok(documents)
    }

    fn find_one(&self, collection: Collection, id: &RecordId) -> ClinicResult<Option<Document>> {
        let guard = self.lock()?;
        Ok(guard
            .get(&collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    fn insert(&self, collection: Collection, mut document: Document) -> ClinicResult<RecordId> {
        let mut guard = self.lock()?;
        let records = guard.entry(collection).or_default();

        let mut id = RecordId::new();
        while records.contains_key(&id) {
            id = RecordId::new();
        }

        document.insert(ID_FIELD.into(), Value::String(id.to_string()));
        records.insert(id, document);
        Ok(id)
    }

    fn update_fields(
        &self,
        collection: Collection,
        id: &RecordId,
        partial: Document,
    ) -> ClinicResult<bool> {
        let mut guard = self.lock()?;
        match guard
            .get_mut(&collection)
            .and_then(|records| records.get_mut(id))
        {
            Some(document) => {
                merge_fields(document, partial);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, collection: Collection, id: &RecordId) -> ClinicResult<bool> {
        let mut guard = self.lock()?;
        Ok(guard
            .get_mut(&collection)
            .map(|records| records.remove(id).is_some())
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("test documents must be objects"),
        }
    }

    #[test]
    fn insert_assigns_id_and_find_one_returns_it() {
        let store = MemoryStore::new();
        let id = store
            .insert(Collection::Patients, doc(json!({"name": "Ada"})))
            .unwrap();

        let found = store
            .find_one(Collection::Patients, &id)
            .unwrap()
            .expect("document should exist");
        assert_eq!(found["name"], "Ada");
        assert_eq!(found[ID_FIELD], id.to_string());
    }

    #[test]
    fn collections_are_isolated() {
        let store = MemoryStore::new();
        let id = store
            .insert(Collection::Patients, doc(json!({"name": "Ada"})))
            .unwrap();

        assert!(store.find_one(Collection::Invoices, &id).unwrap().is_none());
        assert!(store
            .find_all(Collection::Appointments, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn update_and_delete_report_missing_records() {
        let store = MemoryStore::new();
        let missing = RecordId::new();

        assert!(!store
            .update_fields(Collection::Patients, &missing, doc(json!({"name": "x"})))
            .unwrap());
        assert!(!store.delete(Collection::Patients, &missing).unwrap());
    }

    #[test]
    fn update_replaces_only_given_fields() {
        let store = MemoryStore::new();
        let id = store
            .insert(
                Collection::Patients,
                doc(json!({"name": "Ada", "phone": "123"})),
            )
            .unwrap();

        assert!(store
            .update_fields(Collection::Patients, &id, doc(json!({"phone": "456"})))
            .unwrap());

        let found = store.find_one(Collection::Patients, &id).unwrap().unwrap();
        assert_eq!(found["name"], "Ada");
        assert_eq!(found["phone"], "456");
    }

    #[test]
    fn find_all_sorts_when_requested() {
        let store = MemoryStore::new();
        for name in ["carol", "Alice", "bob"] {
            store
                .insert(Collection::Patients, doc(json!({ "name": name })))
                .unwrap();
        }

        let docs = store
            .find_all(Collection::Patients, Some(SortBy::ascending("name")))
            .unwrap();
        let names: Vec<_> = docs.iter().map(|d| d["name"].as_str().unwrap()).collect();
        assert_eq!(names, ["Alice", "bob", "carol"]);
    }
}
