//! Firestore query construction, the Firestore value codec and the callable
//! Functions envelope.
//!
//! Queries are immutable values. Every constraint produces a new [`firestore::Query`]
//! after validating it against the constraints already present:
//!
//! ```ignore
//! use firebase_query_core::app::{FirebaseApp, FirebaseAppSettings, FirebaseOptions};
//! use firebase_query_core::firestore::{
//!     limit, order_by, query, where_field, Firestore, FirestoreClient, FirestoreSettings,
//!     FilterOperator, OrderDirection,
//! };
//!
//! # async fn demo() -> firebase_query_core::firestore::FirestoreResult<()> {
//! let app = FirebaseApp::new(
//!     FirebaseOptions { project_id: Some("demo-project".into()), ..Default::default() },
//!     FirebaseAppSettings::default(),
//! );
//! let firestore = Firestore::new(app, FirestoreSettings::default())?;
//! let cities = firestore.collection("cities")?.query();
//! let large = query(
//!     &cities,
//!     [
//!         where_field("population", FilterOperator::GreaterThan, 1_000_000)?.into(),
//!         order_by("population", OrderDirection::Descending)?,
//!         limit(10)?,
//!     ],
//! )?;
//! let snapshot = FirestoreClient::with_http_datastore(firestore)?.get_docs(&large).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Callable functions go through [`functions::Functions`]:
//!
//! ```ignore
//! use firebase_query_core::functions::{Functions, HttpsCallableOptions};
//!
//! # async fn demo(app: firebase_query_core::app::FirebaseApp) -> firebase_query_core::functions::FunctionsResult<()> {
//! let functions = Functions::new(app, Some("europe-west1"))?;
//! let add = functions.https_callable::<(i64, i64), i64>("add", HttpsCallableOptions::default())?;
//! let sum = add.call_async(&(2, 3)).await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod firestore;
pub mod functions;
pub mod platform;

#[cfg(test)]
pub mod test_support;
