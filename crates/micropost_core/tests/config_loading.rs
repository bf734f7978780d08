use micropost_core::db::open_db_in_memory;
use micropost_core::{
    ConfigError, CoreConfig, DeleteError, DeletePolicy, EntityKind, EntityStore, Micropost,
    SqliteBackend, User,
};
use std::io::Write;

#[test]
fn load_reads_policy_and_logging_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let log_dir = dir.path().join("logs");
    let path = dir.path().join("micropost.json");

    let document = serde_json::json!({
        "log": { "level": "Error", "dir": log_dir },
        "store": { "delete_policy": "cascade" }
    });
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(document.to_string().as_bytes()).unwrap();
    drop(file);

    let config = CoreConfig::load(&path).unwrap();
    assert_eq!(config.log.level, "error");
    assert_eq!(config.log.dir.as_deref(), Some(log_dir.as_path()));
    assert_eq!(config.store.delete_policy, DeletePolicy::Cascade);
}

#[test]
fn load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = CoreConfig::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn configured_policy_drives_user_deletion() {
    let conn = open_db_in_memory().unwrap();
    let reject = CoreConfig::from_json_str("{}").unwrap();
    let cascade =
        CoreConfig::from_json_str(r#"{ "store": { "delete_policy": "cascade" } }"#).unwrap();

    let user_id = {
        let mut store =
            EntityStore::new(SqliteBackend::try_new(&conn).unwrap(), reject.store);
        let user_id = store
            .save_user(&mut User::new("Ada", "ada@example.com"))
            .unwrap();
        store
            .save_micropost(&mut Micropost::new(user_id, "hello"))
            .unwrap();
        let err = store.delete(EntityKind::User, user_id).unwrap_err();
        assert!(matches!(err, DeleteError::HasDependents { .. }));
        user_id
    };

    let mut store = EntityStore::new(SqliteBackend::try_new(&conn).unwrap(), cascade.store);
    store.delete(EntityKind::User, user_id).unwrap();
    assert!(store.find_user(user_id).unwrap().is_none());
}
