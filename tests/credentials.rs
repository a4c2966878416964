//! Credential store integration tests.

use ocrvid::{CredentialStore, DEFAULT_KEY_ALIAS, OcrvidError, credentials::USER_PATH_ENV};

#[test]
fn user_path_overrides_home() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    // SAFETY: no other test in this binary reads the variable.
    unsafe { std::env::set_var(USER_PATH_ENV, temporary_directory.path()) };

    let store = CredentialStore::default_location().expect("Failed to locate key file");
    assert_eq!(store.path(), temporary_directory.path().join(".ocrvid.json"));

    store.set(DEFAULT_KEY_ALIAS, "test_key").unwrap();
    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(stored[DEFAULT_KEY_ALIAS], "test_key");
    assert_eq!(
        store.require(Some(DEFAULT_KEY_ALIAS), None).unwrap(),
        "test_key"
    );
}

#[test]
fn alias_wins_over_environment() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let store = CredentialStore::in_directory(temporary_directory.path());
    store.set("work", "stored").unwrap();

    let variable = "OCRVID_INTEGRATION_TEST_API_KEY";
    // SAFETY: the variable name is unique to this test.
    unsafe { std::env::set_var(variable, "from_env") };

    assert_eq!(
        store.resolve(Some("work"), Some(variable)).unwrap().as_deref(),
        Some("stored")
    );
    assert_eq!(
        store.resolve(None, Some(variable)).unwrap().as_deref(),
        Some("from_env")
    );
}

#[test]
fn missing_key_names_its_sources() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let store = CredentialStore::in_directory(temporary_directory.path());

    let error = store
        .require(Some("absent"), Some("OCRVID_INTEGRATION_TEST_UNSET"))
        .unwrap_err();
    assert!(matches!(error, OcrvidError::CredentialMissing { .. }));
    let message = error.to_string();
    assert!(message.contains("absent"), "{message}");
    assert!(message.contains("OCRVID_INTEGRATION_TEST_UNSET"), "{message}");
}
