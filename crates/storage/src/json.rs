use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use medrep_core::model::{
    Doctor, DoctorId, Presentation, PresentationId, Session, SessionId, Slide, SlideAnalytic,
    SlideId, SlideTiming,
};

use crate::document::StoreDocument;
use crate::repository::{
    DoctorRepository, PresentationRepository, SessionRepository, SlideAnalyticRepository,
    SlideRepository, Storage, StorageError,
};
use crate::seed;

fn io_err(e: std::io::Error) -> StorageError {
    StorageError::Io(e.to_string())
}

struct JsonStoreInner {
    path: PathBuf,
    doc: Mutex<StoreDocument>,
}

/// Single-JSON-document store: the whole document is read once at open and
/// read-modify-written wholesale on every mutation, behind one writer lock.
///
/// A missing file is seeded with the initial data set; a malformed file is
/// logged and re-seeded rather than wedging the process.
#[derive(Clone)]
pub struct JsonStore {
    inner: Arc<JsonStoreInner>,
}

impl JsonStore {
    /// Opens (or creates) the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the file or its directory cannot be
    /// read or written, and `StorageError::Serialization` if the seeded
    /// document cannot be encoded.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let doc = match Self::load(&path)? {
            Some(doc) => doc,
            None => {
                let doc = seed::initial_document(Utc::now());
                Self::persist(&path, &doc)?;
                doc
            }
        };

        Ok(Self {
            inner: Arc::new(JsonStoreInner {
                path,
                doc: Mutex::new(doc),
            }),
        })
    }

    /// The document path this store persists to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn load(path: &Path) -> Result<Option<StoreDocument>, StorageError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(e)),
        };

        match serde_json::from_str(&raw) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                // Deliberate fallback: a corrupt store re-seeds instead of
                // refusing to start. Loud, because it discards history.
                log::warn!(
                    "store document {} is malformed ({e}); re-seeding initial data",
                    path.display()
                );
                Ok(None)
            }
        }
    }

    fn persist(path: &Path, doc: &StoreDocument) -> Result<(), StorageError> {
        let encoded = serde_json::to_string_pretty(doc)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, encoded).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }

    fn read<R>(
        &self,
        f: impl FnOnce(&StoreDocument) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        let guard = self
            .inner
            .doc
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        f(&guard)
    }

    /// Runs a mutation against a copy of the document and only swaps it in
    /// once the new revision has been persisted, so a failed write leaves
    /// both file and memory on the previous revision.
    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut StoreDocument) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        let mut guard = self
            .inner
            .doc
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut next = guard.clone();
        let result = f(&mut next)?;
        Self::persist(&self.inner.path, &next)?;
        *guard = next;
        Ok(result)
    }
}

#[async_trait]
impl DoctorRepository for JsonStore {
    async fn upsert_doctor(&self, doctor: &Doctor) -> Result<(), StorageError> {
        self.mutate(|doc| {
            doc.upsert_doctor(doctor);
            Ok(())
        })
    }

    async fn get_doctor(&self, id: &DoctorId) -> Result<Option<Doctor>, StorageError> {
        self.read(|doc| doc.get_doctor(id))
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StorageError> {
        self.read(StoreDocument::list_doctors)
    }
}

#[async_trait]
impl PresentationRepository for JsonStore {
    async fn upsert_presentation(&self, presentation: &Presentation) -> Result<(), StorageError> {
        self.mutate(|doc| {
            doc.upsert_presentation(presentation);
            Ok(())
        })
    }

    async fn get_presentation(
        &self,
        id: &PresentationId,
    ) -> Result<Option<Presentation>, StorageError> {
        self.read(|doc| doc.get_presentation(id))
    }

    async fn list_presentations(&self) -> Result<Vec<Presentation>, StorageError> {
        self.read(StoreDocument::list_presentations)
    }
}

#[async_trait]
impl SlideRepository for JsonStore {
    async fn insert_slides(&self, slides: &[Slide]) -> Result<(), StorageError> {
        self.mutate(|doc| {
            doc.insert_slides(slides);
            Ok(())
        })
    }

    async fn get_slide(&self, id: &SlideId) -> Result<Option<Slide>, StorageError> {
        self.read(|doc| doc.get_slide(id))
    }

    async fn slides_for_presentation(
        &self,
        presentation_id: &PresentationId,
    ) -> Result<Vec<Slide>, StorageError> {
        self.read(|doc| doc.slides_for_presentation(presentation_id))
    }
}

#[async_trait]
impl SessionRepository for JsonStore {
    async fn insert_session(&self, session: &Session) -> Result<(), StorageError> {
        self.mutate(|doc| doc.insert_session(session))
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, StorageError> {
        self.read(|doc| doc.get_session(id))
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, StorageError> {
        self.read(StoreDocument::list_sessions)
    }

    async fn sessions_for_doctor(&self, id: &DoctorId) -> Result<Vec<Session>, StorageError> {
        self.read(|doc| doc.sessions_for_doctor(id))
    }

    async fn sessions_for_presentation(
        &self,
        id: &PresentationId,
    ) -> Result<Vec<Session>, StorageError> {
        self.read(|doc| doc.sessions_for_presentation(id))
    }

    async fn complete_session(
        &self,
        id: &SessionId,
        ended_at: DateTime<Utc>,
        timings: &[SlideTiming],
    ) -> Result<Session, StorageError> {
        self.mutate(|doc| doc.complete_session(id, ended_at, timings))
    }
}

#[async_trait]
impl SlideAnalyticRepository for JsonStore {
    async fn list_analytics(&self) -> Result<Vec<SlideAnalytic>, StorageError> {
        self.read(StoreDocument::list_analytics)
    }

    async fn analytics_for_session(
        &self,
        id: &SessionId,
    ) -> Result<Vec<SlideAnalytic>, StorageError> {
        self.read(|doc| doc.analytics_for_session(id))
    }

    async fn analytics_for_slide(&self, id: &SlideId) -> Result<Vec<SlideAnalytic>, StorageError> {
        self.read(|doc| doc.analytics_for_slide(id))
    }
}

impl Storage {
    /// Build a `Storage` backed by a single JSON document on disk.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the document cannot be opened or created.
    pub fn json_file(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let store = JsonStore::open(path)?;
        Ok(Self {
            doctors: Arc::new(store.clone()),
            presentations: Arc::new(store.clone()),
            slides: Arc::new(store.clone()),
            sessions: Arc::new(store.clone()),
            analytics: Arc::new(store),
        })
    }
}
