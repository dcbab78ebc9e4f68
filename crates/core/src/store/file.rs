//! File-backed record store.
//!
//! ## Storage layout
//!
//! ```text
//! <data_dir>/
//!   patients/
//!     <s1>/
//!       <s2>/
//!         <id>/
//!           record.json
//!   appointments/...
//!   invoices/...
//! ```
//!
//! where `s1` and `s2` are the first four hex characters of the record identifier.
//!
//! Writes go to a uniquely named temporary file in the record directory and are renamed into
//! place, so a reader never sees a half-written document and concurrent writers never share a
//! temporary path.

use super::{merge_fields, sort_documents, Collection, Document, RecordStore, SortBy, ID_FIELD};
use crate::constants::RECORD_FILENAME;
use crate::{ClinicError, ClinicResult};
use clinic_uuid::RecordId;
use serde_json::Value;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Clone, Debug)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `data_dir`, creating the collection directories if needed.
    pub fn new(data_dir: impl Into<PathBuf>) -> ClinicResult<Self> {
        let data_dir = data_dir.into();
        for collection in Collection::ALL {
            fs::create_dir_all(data_dir.join(collection.dir_name()))
                .map_err(ClinicError::StorageDirCreation)?;
        }
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(collection.dir_name())
    }

    fn record_path(&self, collection: Collection, id: &RecordId) -> PathBuf {
        id.sharded_dir(&self.collection_dir(collection))
            .join(RECORD_FILENAME)
    }

    fn read_document(path: &Path) -> ClinicResult<Option<Document>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ClinicError::FileRead(e)),
        };
        match serde_json::from_str::<Value>(&contents).map_err(ClinicError::Deserialization)? {
            Value::Object(map) => Ok(Some(map)),
            _ => Err(ClinicError::InvalidInput(format!(
                "record file is not a JSON object: {}",
                path.display()
            ))),
        }
    }

    fn write_document(path: &Path, document: &Document) -> ClinicResult<()> {
        let dir = path.parent().ok_or_else(|| {
            ClinicError::InvalidInput(format!("record path has no parent: {}", path.display()))
        })?;
        fs::create_dir_all(dir).map_err(ClinicError::StorageDirCreation)?;

        let raw = serde_json::to_vec_pretty(document).map_err(ClinicError::Serialization)?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(ClinicError::FileWrite)?;
        tmp.write_all(&raw).map_err(ClinicError::FileWrite)?;
        tmp.persist(path).map_err(|e| ClinicError::FileWrite(e.error))?;
        Ok(())
    }

    /// Walks `<collection>/<s1>/<s2>/<id>/record.json`, skipping anything unreadable.
    fn scan(&self, collection: Collection) -> Vec<Document> {
        let mut documents = Vec::new();

        let s1_iter = match fs::read_dir(self.collection_dir(collection)) {
            Ok(it) => it,
            Err(_) => return documents,
        };
        for s1 in s1_iter.flatten() {
            let s1_path = s1.path();
            if !s1_path.is_dir() {
                continue;
            }

            let s2_iter = match fs::read_dir(&s1_path) {
                Ok(it) => it,
                Err(_) => continue,
            };

            for s2 in s2_iter.flatten() {
                let s2_path = s2.path();
                if !s2_path.is_dir() {
                    continue;
                }

                let id_iter = match fs::read_dir(&s2_path) {
                    Ok(it) => it,
                    Err(_) => continue,
                };

                for id_ent in id_iter.flatten() {
                    let record_path = id_ent.path().join(RECORD_FILENAME);
                    if !record_path.is_file() {
                        continue;
                    }

                    match Self::read_document(&record_path) {
                        Ok(Some(document)) => documents.push(document),
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!(
                                "failed to read {}: {} - {}",
                                collection.record_name(),
                                record_path.display(),
                                e
                            );
                        }
                    }
                }
            }
        }

        documents
    }
}

impl RecordStore for FileStore {
    fn find_all(
        &self,
        collection: Collection,
        sort: Option<SortBy<'_>>,
    ) -> ClinicResult<Vec<Document>> {
        let mut documents = self.scan(collection);
        if let Some(sort) = sort {
            sort_documents(&mut documents, sort);
        }
        Ok(documents)
    }

    fn find_one(&self, collection: Collection, id: &RecordId) -> ClinicResult<Option<Document>> {
        Self::read_document(&self.record_path(collection, id))
    }

    fn insert(&self, collection: Collection, mut document: Document) -> ClinicResult<RecordId> {
        let mut id = RecordId::new();
        while self.record_path(collection, &id).exists() {
            id = RecordId::new();
        }

        document.insert(ID_FIELD.into(), Value::String(id.to_string()));
        Self::write_document(&self.record_path(collection, &id), &document)?;
        Ok(id)
    }

    fn update_fields(
        &self,
        collection: Collection,
        id: &RecordId,
        partial: Document,
    ) -> ClinicResult<bool> {
        let path = self.record_path(collection, id);
        let Some(mut document) = Self::read_document(&path)? else {
            return Ok(false);
        };

        merge_fields(&mut document, partial);
        Self::write_document(&path, &document)?;
        Ok(true)
    }

    fn delete(&self, collection: Collection, id: &RecordId) -> ClinicResult<bool> {
        let dir = id.sharded_dir(&self.collection_dir(collection));
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ClinicError::FileRemove(e)),
        }
    }
}
