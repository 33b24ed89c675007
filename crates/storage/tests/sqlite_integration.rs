use storage::repository::{KeyValueRepository, Storage};
use storage::sqlite::SqliteRepository;
use study_core::model::{EntityKind, Page};
use study_core::{StorageKey, derive_key};

#[tokio::test]
async fn sqlite_roundtrip_set_get_remove() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let key = derive_key("practice", None, Some("alice"));
    assert_eq!(repo.get(&key).await.unwrap(), None);

    repo.set(&key, r#"{"selectedChapter":"numpy"}"#).await.unwrap();
    repo.set(&key, r#"{"selectedChapter":"pandas"}"#).await.unwrap();
    assert_eq!(
        repo.get(&key).await.unwrap().as_deref(),
        Some(r#"{"selectedChapter":"pandas"}"#)
    );

    repo.remove(&key).await.unwrap();
    assert_eq!(repo.get(&key).await.unwrap(), None);
    // Removing twice is fine.
    repo.remove(&key).await.unwrap();
}

#[tokio::test]
async fn sqlite_migrate_is_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");

    let key = StorageKey::raw("current-user");
    repo.set(&key, "{}").await.unwrap();
    assert!(repo.get(&key).await.unwrap().is_some());
}

#[tokio::test]
async fn sqlite_prefix_listing_is_case_sensitive() {
    let storage = Storage::sqlite("sqlite:file:memdb_kv_prefix?mode=memory&cache=shared")
        .await
        .expect("storage");

    let alice = EntityKind::Page(Page::Settings).storage_key(Some("alice"));
    let upper = EntityKind::Page(Page::Settings).storage_key(Some("Alice"));
    let progress = EntityKind::LearningProgress.storage_key(Some("alice"));
    for key in [&alice, &upper, &progress] {
        storage.kv.set(key, "{}").await.unwrap();
    }

    let keys = storage
        .kv
        .keys_with_prefix("app-state-settings-a")
        .await
        .unwrap();
    assert_eq!(keys, vec![alice]);

    let keys = storage.kv.keys_with_prefix("app-state-").await.unwrap();
    assert_eq!(keys.len(), 2);
}
