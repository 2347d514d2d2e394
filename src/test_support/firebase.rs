use crate::app::{FirebaseApp, FirebaseAppSettings, FirebaseOptions};

/// Build a Firebase app configured for `project_id`, for use in tests.
pub fn test_firebase_app(project_id: impl Into<String>) -> FirebaseApp {
    let options = FirebaseOptions {
        project_id: Some(project_id.into()),
        ..Default::default()
    };
    FirebaseApp::new(
        options,
        FirebaseAppSettings {
            name: Some("test".into()),
        },
    )
}
