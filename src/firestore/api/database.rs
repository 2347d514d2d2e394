use std::sync::Arc;

use crate::app::FirebaseApp;
use crate::firestore::error::{invalid_argument, FirestoreResult};
use crate::firestore::model::{DatabaseId, ResourcePath};

use super::query::Query;
use super::reference::{CollectionReference, DocumentReference};
use super::user_data::UserDataReader;

/// Settings that change how user values are read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FirestoreSettings {
    /// Drop `Undefined` map entries instead of rejecting them.
    pub ignore_undefined_properties: bool,
}

#[derive(Clone, Debug)]
pub struct Firestore {
    inner: Arc<FirestoreInner>,
}

#[derive(Debug)]
struct FirestoreInner {
    app: FirebaseApp,
    database_id: DatabaseId,
    settings: FirestoreSettings,
}

impl Firestore {
    /// Opens the default database of the app's project.
    pub fn new(app: FirebaseApp, settings: FirestoreSettings) -> FirestoreResult<Self> {
        let database_id = DatabaseId::from_app(&app)?;
        Ok(Self::with_database_id(app, database_id, settings))
    }

    /// Opens a named database. `database` is either a bare database name or a full
    /// `projects/{project}/databases/{database}` identifier.
    pub fn with_database(
        app: FirebaseApp,
        database: &str,
        settings: FirestoreSettings,
    ) -> FirestoreResult<Self> {
        let database_id = parse_database_identifier(&app, database)?;
        Ok(Self::with_database_id(app, database_id, settings))
    }

    pub fn with_database_id(
        app: FirebaseApp,
        database_id: DatabaseId,
        settings: FirestoreSettings,
    ) -> Self {
        let inner = FirestoreInner {
            app,
            database_id,
            settings,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Returns the `FirebaseApp` this Firestore instance is scoped to.
    pub fn app(&self) -> &FirebaseApp {
        &self.inner.app
    }

    /// The fully qualified database identifier (project + database name).
    pub fn database_id(&self) -> &DatabaseId {
        &self.inner.database_id
    }

    pub fn settings(&self) -> FirestoreSettings {
        self.inner.settings
    }

    /// Creates a `CollectionReference` pointing at `path`.
    ///
    /// The path is interpreted relative to the Firestore root using forward
    /// slashes to separate segments (e.g. `"users/alovelace/repos"`).
    pub fn collection(&self, path: &str) -> FirestoreResult<CollectionReference> {
        let resource = ResourcePath::from_string(path)?;
        CollectionReference::new(self.clone(), resource)
    }

    /// Creates a `DocumentReference` pointing at `path`.
    ///
    /// The path must contain an even number of segments (collection/doc pairs).
    pub fn doc(&self, path: &str) -> FirestoreResult<DocumentReference> {
        let resource = ResourcePath::from_string(path)?;
        DocumentReference::new(self.clone(), resource)
    }

    /// Creates a query over every collection named `collection_id`, at any depth.
    pub fn collection_group(&self, collection_id: &str) -> FirestoreResult<Query> {
        if collection_id.is_empty() {
            return Err(invalid_argument(
                "Function collectionGroup() cannot be called with an empty collection id.",
            ));
        }
        if collection_id.contains('/') {
            return Err(invalid_argument(format!(
                "Invalid collection ID '{collection_id}' passed to function collectionGroup(). Collection IDs must not contain '/'."
            )));
        }
        Ok(Query::new_collection_group(self.clone(), collection_id))
    }

    pub fn project_id(&self) -> &str {
        self.inner.database_id.project_id()
    }

    /// Returns the logical database name (usually `"(default)"`).
    pub fn database(&self) -> &str {
        self.inner.database_id.database()
    }

    pub(crate) fn user_data_reader(&self) -> UserDataReader {
        UserDataReader::new(
            self.inner.database_id.clone(),
            self.inner.settings.ignore_undefined_properties,
        )
    }

    pub(crate) fn same_database(&self, other: &Firestore) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.database_id() == other.database_id()
    }
}

fn parse_database_identifier(app: &FirebaseApp, identifier: &str) -> FirestoreResult<DatabaseId> {
    if identifier.starts_with("projects/") {
        let segments: Vec<_> = identifier.split('/').collect();
        if segments.len() == 4 && segments[0] == "projects" && segments[2] == "databases" {
            return Ok(DatabaseId::new(segments[1], segments[3]));
        }
        return Err(invalid_argument(
            "Database identifier must follow projects/{project}/databases/{database}",
        ));
    }

    let default = DatabaseId::from_app(app)?;
    Ok(DatabaseId::new(default.project_id(), identifier))
}
