//! Shared configuration values consumed by the Firestore and Functions clients.

mod constants;
mod types;

#[doc(inline)]
pub use constants::DEFAULT_ENTRY_NAME;

#[doc(inline)]
pub use types::{FirebaseApp, FirebaseAppSettings, FirebaseOptions};
