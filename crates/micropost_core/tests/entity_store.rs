use micropost_core::{
    DeleteError, DeletePolicy, EntityId, EntityKind, EntityStore, FieldValues, MemoryBackend,
    Micropost, SaveError, StorageError, StoreConfig, User, Violation,
};
use std::collections::HashSet;
use uuid::Uuid;

fn store() -> EntityStore<MemoryBackend> {
    EntityStore::with_backend(MemoryBackend::new())
}

fn cascading_store() -> EntityStore<MemoryBackend> {
    EntityStore::new(
        MemoryBackend::new(),
        StoreConfig {
            delete_policy: DeletePolicy::Cascade,
        },
    )
}

fn user_fields(name: &str, email: &str) -> FieldValues {
    FieldValues::new().with("name", name).with("email", email)
}

fn post_fields(user_id: impl ToString, content: &str) -> FieldValues {
    FieldValues::new()
        .with("user_id", user_id.to_string())
        .with("content", content)
}

fn create_user(store: &mut EntityStore<MemoryBackend>) -> EntityId {
    store
        .save(EntityKind::User, &user_fields("Ada", "ada@example.com"), None)
        .unwrap()
}

#[test]
fn blank_user_fields_are_rejected_without_backend_writes() {
    let mut store = store();

    for (name, email, expected) in [
        ("", "a@example.com", vec![Violation::empty_field("name")]),
        ("Ada", "", vec![Violation::empty_field("email")]),
        (
            "",
            " ",
            vec![Violation::empty_field("name"), Violation::empty_field("email")],
        ),
    ] {
        let err = store
            .save(EntityKind::User, &user_fields(name, email), None)
            .unwrap_err();
        assert_eq!(err.violations(), expected.as_slice());
    }

    assert_eq!(store.backend().write_count(), 0);
    assert_eq!(store.backend().row_count(EntityKind::User), 0);
}

#[test]
fn invalid_user_does_not_touch_an_unavailable_backend() {
    let mut backend = MemoryBackend::new();
    backend.set_offline(true);
    let mut store = EntityStore::with_backend(backend);

    let err = store
        .save(EntityKind::User, &user_fields("", "ada@example.com"), None)
        .unwrap_err();
    assert!(matches!(err, SaveError::Invalid(_)));
}

#[test]
fn valid_microposts_receive_distinct_ids() {
    let mut store = store();
    let user_id = create_user(&mut store);

    let mut seen = HashSet::from([user_id]);
    for length in [1, 10, 139, 140] {
        let content = "x".repeat(length);
        let id = store
            .save(EntityKind::Micropost, &post_fields(user_id, &content), None)
            .unwrap();
        assert!(!id.is_nil());
        assert!(seen.insert(id), "id {id} was assigned twice");
    }
    assert_eq!(store.backend().row_count(EntityKind::Micropost), 4);
}

#[test]
fn invalid_micropost_does_not_touch_an_unavailable_backend() {
    let mut backend = MemoryBackend::new();
    backend.set_offline(true);
    let mut store = EntityStore::with_backend(backend);
    let content = "x".repeat(141);

    let err = store
        .save(
            EntityKind::Micropost,
            &post_fields(Uuid::new_v4(), &content),
            None,
        )
        .unwrap_err();
    assert_eq!(err.violations(), &[Violation::too_long("content", 140)]);

    let err = store
        .save(EntityKind::Micropost, &post_fields("", ""), None)
        .unwrap_err();
    assert_eq!(err.violations(), &[Violation::empty_field("content")]);
}

#[test]
fn too_long_content_is_reported_regardless_of_owner() {
    let mut store = store();
    let missing = Uuid::new_v4();
    let content = "x".repeat(141);

    let err = store
        .save(EntityKind::Micropost, &post_fields(missing, &content), None)
        .unwrap_err();
    assert_eq!(err.violations(), &[Violation::too_long("content", 140)]);
    assert_eq!(store.backend().write_count(), 0);
}

#[test]
fn dangling_owner_is_reported_for_valid_content() {
    let mut store = store();
    let missing = Uuid::new_v4();

    let err = store
        .save(EntityKind::Micropost, &post_fields(missing, "hi"), None)
        .unwrap_err();
    assert_eq!(
        err.violations(),
        &[Violation::dangling_reference(
            "user_id",
            missing.to_string()
        )]
    );
    assert_eq!(store.backend().write_count(), 0);
}

#[test]
fn malformed_or_missing_owner_is_dangling() {
    let mut store = store();

    let err = store
        .save(EntityKind::Micropost, &post_fields("not-a-uuid", "hi"), None)
        .unwrap_err();
    assert_eq!(
        err.violations(),
        &[Violation::dangling_reference("user_id", "not-a-uuid")]
    );

    let err = store
        .save(
            EntityKind::Micropost,
            &FieldValues::new().with("content", "hi"),
            None,
        )
        .unwrap_err();
    assert_eq!(
        err.violations(),
        &[Violation::dangling_reference("user_id", "")]
    );
}

#[test]
fn micropost_cannot_reference_another_micropost() {
    let mut store = store();
    let user_id = create_user(&mut store);
    let post_id = store
        .save(EntityKind::Micropost, &post_fields(user_id, "first"), None)
        .unwrap();

    let err = store
        .save(EntityKind::Micropost, &post_fields(post_id, "reply"), None)
        .unwrap_err();
    assert!(matches!(
        err.violations(),
        [Violation::DanglingReference { .. }]
    ));
}

#[test]
fn saving_same_fields_twice_is_idempotent() {
    let mut store = store();
    let user_id = create_user(&mut store);
    let fields = post_fields(user_id, "stable");
    let id = store.save(EntityKind::Micropost, &fields, None).unwrap();

    assert_eq!(store.save(EntityKind::Micropost, &fields, Some(id)).unwrap(), id);
    let after_first = store.find(EntityKind::Micropost, id).unwrap();
    assert_eq!(store.save(EntityKind::Micropost, &fields, Some(id)).unwrap(), id);
    let after_second = store.find(EntityKind::Micropost, id).unwrap();

    assert_eq!(after_first, after_second);
    assert_eq!(store.backend().row_count(EntityKind::Micropost), 1);
}

#[test]
fn update_keeps_id_and_replaces_fields() {
    let mut store = store();
    let id = create_user(&mut store);

    let updated = store
        .save(
            EntityKind::User,
            &user_fields("Ada Lovelace", "ada@example.org"),
            Some(id),
        )
        .unwrap();
    assert_eq!(updated, id);

    let user = store.find_user(id).unwrap().unwrap();
    assert_eq!(user.name, "Ada Lovelace");
    assert_eq!(user.email, "ada@example.org");
}

#[test]
fn invalid_update_leaves_persisted_state_unchanged() {
    let mut store = store();
    let id = create_user(&mut store);
    let writes_before = store.backend().write_count();

    let err = store
        .save(EntityKind::User, &user_fields("", "ada@example.com"), Some(id))
        .unwrap_err();
    assert!(matches!(err, SaveError::Invalid(_)));
    assert_eq!(store.backend().write_count(), writes_before);
    assert_eq!(store.find_user(id).unwrap().unwrap().name, "Ada");
}

#[test]
fn update_of_unknown_id_is_not_found() {
    let mut store = store();
    let missing = Uuid::new_v4();

    let err = store
        .save(
            EntityKind::User,
            &user_fields("Ada", "ada@example.com"),
            Some(missing),
        )
        .unwrap_err();
    assert!(matches!(err, SaveError::NotFound(id) if id == missing));
    assert_eq!(store.backend().write_count(), 0);
}

#[test]
fn storage_failure_is_not_reported_as_violation() {
    let mut store = store();
    let user_id = create_user(&mut store);

    let mut backend = store.into_backend();
    backend.set_offline(true);
    let mut store = EntityStore::with_backend(backend);

    let err = store
        .save(EntityKind::Micropost, &post_fields(user_id, "hi"), None)
        .unwrap_err();
    assert!(matches!(err, SaveError::Storage(StorageError::Unavailable(_))));
    assert!(err.violations().is_empty());

    let err = store.delete(EntityKind::User, user_id).unwrap_err();
    assert!(matches!(err, DeleteError::Storage(_)));
}

#[test]
fn user_with_microposts_cannot_be_deleted_by_default() {
    let mut store = store();
    let user_id = create_user(&mut store);
    store
        .save(EntityKind::Micropost, &post_fields(user_id, "one"), None)
        .unwrap();
    store
        .save(EntityKind::Micropost, &post_fields(user_id, "two"), None)
        .unwrap();

    let err = store.delete(EntityKind::User, user_id).unwrap_err();
    assert!(matches!(
        err,
        DeleteError::HasDependents { id, dependents: 2 } if id == user_id
    ));
    assert!(store.find(EntityKind::User, user_id).unwrap().is_some());
    assert_eq!(store.backend().row_count(EntityKind::Micropost), 2);
}

#[test]
fn user_without_microposts_is_deleted() {
    let mut store = store();
    let user_id = create_user(&mut store);

    store.delete(EntityKind::User, user_id).unwrap();
    assert!(store.find(EntityKind::User, user_id).unwrap().is_none());
}

#[test]
fn cascade_policy_removes_dependents_first() {
    let mut store = cascading_store();
    let user_id = create_user(&mut store);
    let other_id = create_user(&mut store);
    store
        .save(EntityKind::Micropost, &post_fields(user_id, "one"), None)
        .unwrap();
    store
        .save(EntityKind::Micropost, &post_fields(user_id, "two"), None)
        .unwrap();
    let kept = store
        .save(EntityKind::Micropost, &post_fields(other_id, "kept"), None)
        .unwrap();

    store.delete(EntityKind::User, user_id).unwrap();

    assert!(store.find(EntityKind::User, user_id).unwrap().is_none());
    assert!(store.microposts_of(user_id).unwrap().is_empty());
    assert_eq!(store.backend().row_count(EntityKind::Micropost), 1);
    assert!(store.find(EntityKind::Micropost, kept).unwrap().is_some());
}

#[test]
fn micropost_delete_is_independent_of_owner() {
    let mut store = store();
    let user_id = create_user(&mut store);
    let post_id = store
        .save(EntityKind::Micropost, &post_fields(user_id, "bye"), None)
        .unwrap();

    store.delete(EntityKind::Micropost, post_id).unwrap();
    assert!(store.find(EntityKind::Micropost, post_id).unwrap().is_none());
    assert!(store.find(EntityKind::User, user_id).unwrap().is_some());

    let err = store.delete(EntityKind::Micropost, post_id).unwrap_err();
    assert!(matches!(err, DeleteError::NotFound(id) if id == post_id));
}

#[test]
fn deleting_unknown_user_is_not_found() {
    let mut store = store();
    let missing = Uuid::new_v4();
    let err = store.delete(EntityKind::User, missing).unwrap_err();
    assert!(matches!(err, DeleteError::NotFound(id) if id == missing));
}

#[test]
fn typed_records_transition_from_transient_to_persisted() {
    let mut store = store();
    let mut user = User::new("Grace", "grace@example.com");
    assert!(!user.is_persisted());

    let user_id = store.save_user(&mut user).unwrap();
    assert_eq!(user.id, Some(user_id));

    let mut post = Micropost::new(user_id, "Hello, world");
    store.save_micropost(&mut post).unwrap();
    assert!(post.is_persisted());

    assert_eq!(store.microposts_of(user_id).unwrap(), vec![post.clone()]);
    assert_eq!(store.micropost_owner(&post).unwrap(), Some(user));
}

#[test]
fn failed_typed_save_leaves_record_transient() {
    let mut store = store();
    let mut post = Micropost::new(Uuid::new_v4(), "orphan");

    let err = store.save_micropost(&mut post).unwrap_err();
    assert!(matches!(err, SaveError::Invalid(_)));
    assert_eq!(post.id, None);
}

#[test]
fn owner_reference_is_stored_in_canonical_form() {
    let mut store = store();
    let user_id = create_user(&mut store);
    let shouted = user_id.to_string().to_uppercase();

    let post_id = store
        .save(EntityKind::Micropost, &post_fields(&shouted, "hi"), None)
        .unwrap();
    let stored = store.find(EntityKind::Micropost, post_id).unwrap().unwrap();
    assert_eq!(stored.get("user_id"), Some(user_id.to_string().as_str()));
    assert_eq!(store.microposts_of(user_id).unwrap().len(), 1);
}
