use std::time::Duration;

use tether_core::{LinkStore, OwnerId, ShortCode, StoreError};
use tether_storage::PgStore;
use tether_test_infra::postgres::{PostgresConfig, PostgresServer};

struct Fixture {
    postgres: PostgresServer,
    store: PgStore,
}

impl Fixture {
    async fn start() -> Self {
        let postgres = PostgresServer::new(PostgresConfig::builder().build())
            .await
            .expect("start postgres");
        let url = postgres.database_url().await.expect("postgres url");
        let store = connect_with_retry(&url).await;

        Self { postgres, store }
    }
}

/// `PgStore::connect` bootstraps the schema on first success, so retrying
/// it also covers the existence-guarded table creation.
async fn connect_with_retry(url: &str) -> PgStore {
    let mut last_error = None;

    for _ in 0..20 {
        match PgStore::connect(url).await {
            Ok(store) => return store,
            Err(err) => {
                last_error = Some(err);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    panic!("failed to connect postgres: {last_error:?}");
}

fn owner(id: &str) -> OwnerId {
    OwnerId::from(id)
}

#[tokio::test]
async fn write_then_get_round_trip() {
    let fixture = Fixture::start().await;

    let code = fixture
        .store
        .write(&owner("u1"), "https://example.com")
        .await
        .unwrap();
    assert_eq!(code.as_str(), "EAaArVRs");
    assert_eq!(
        fixture.store.get(&code).await.unwrap(),
        "https://example.com"
    );
}

#[tokio::test]
async fn schema_bootstrap_is_idempotent() {
    let fixture = Fixture::start().await;
    let url = fixture.postgres.database_url().await.unwrap();

    // A second connect must see the existing table and leave it alone.
    let second = PgStore::connect(&url).await.unwrap();
    let code = second
        .write(&owner("u1"), "https://example.com/bootstrap")
        .await
        .unwrap();
    assert!(fixture.store.get(&code).await.is_ok());
}

#[tokio::test]
async fn get_unknown_code_is_not_found() {
    let fixture = Fixture::start().await;
    let code = ShortCode::new_unchecked("nothere1");

    assert_eq!(
        fixture.store.get(&code).await.unwrap_err(),
        StoreError::NotFound(code)
    );
}

#[tokio::test]
async fn conflicting_write_returns_code_and_preserves_owner() {
    let fixture = Fixture::start().await;

    let first = fixture
        .store
        .write(&owner("alice"), "https://example.com")
        .await
        .unwrap();
    let err = fixture
        .store
        .write(&owner("bob"), "https://example.com")
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::AlreadyExists { code: first.clone() });

    let listed = fixture.store.get_by_owner(&owner("alice")).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].short_code, first);
    assert_eq!(
        fixture
            .store
            .get_by_owner(&owner("bob"))
            .await
            .unwrap_err(),
        StoreError::NoRecords
    );
}

#[tokio::test]
async fn delete_is_owner_scoped_and_idempotent() {
    let fixture = Fixture::start().await;

    let code = fixture
        .store
        .write(&owner(""), "https://github.com")
        .await
        .unwrap();
    assert_eq!(code.as_str(), "mW4fcUsI");

    fixture
        .store
        .delete(&owner("intruder"), &code)
        .await
        .unwrap();
    assert_eq!(
        fixture.store.get(&code).await.unwrap(),
        "https://github.com"
    );

    fixture.store.delete(&owner(""), &code).await.unwrap();
    assert_eq!(
        fixture.store.get(&code).await.unwrap_err(),
        StoreError::Gone(code.clone())
    );

    fixture.store.delete(&owner(""), &code).await.unwrap();
    assert_eq!(
        fixture.store.get(&code).await.unwrap_err(),
        StoreError::Gone(code)
    );
}

#[tokio::test]
async fn listing_excludes_tombstoned_records() {
    let fixture = Fixture::start().await;
    let o = owner("u1");

    let keep = fixture
        .store
        .write(&o, "https://example.com/keep")
        .await
        .unwrap();
    let dead = fixture
        .store
        .write(&o, "https://example.com/drop")
        .await
        .unwrap();
    fixture.store.delete(&o, &dead).await.unwrap();

    let listed = fixture.store.get_by_owner(&o).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].short_code, keep);
}

#[tokio::test]
async fn batch_write_returns_codes_in_input_order() {
    let fixture = Fixture::start().await;
    let urls = vec![
        "https://example.com/one".to_string(),
        "https://example.com/two".to_string(),
    ];

    let codes = fixture
        .store
        .batch_write(&owner("u1"), &urls)
        .await
        .unwrap();
    assert_eq!(codes.len(), 2);
    for (url, code) in urls.iter().zip(&codes) {
        assert_eq!(&fixture.store.get(code).await.unwrap(), url);
    }
}

#[tokio::test]
async fn failed_batch_rolls_back_entirely() {
    let fixture = Fixture::start().await;
    fixture
        .store
        .write(&owner("u1"), "https://example.com/taken")
        .await
        .unwrap();

    let urls = vec![
        "https://example.com/new".to_string(),
        "https://example.com/taken".to_string(),
    ];
    let err = fixture
        .store
        .batch_write(&owner("u1"), &urls)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists { .. }));

    // The transaction rolled back the item that had succeeded.
    let new_code = ShortCode::derive("https://example.com/new");
    assert_eq!(
        fixture.store.get(&new_code).await.unwrap_err(),
        StoreError::NotFound(new_code)
    );
}

#[tokio::test]
async fn duplicate_url_within_one_batch_rolls_back() {
    let fixture = Fixture::start().await;
    let urls = vec![
        "https://example.com/dup".to_string(),
        "https://example.com/dup".to_string(),
    ];

    let err = fixture
        .store
        .batch_write(&owner("u1"), &urls)
        .await
        .unwrap_err();
    let code = ShortCode::derive("https://example.com/dup");
    assert_eq!(err, StoreError::AlreadyExists { code: code.clone() });

    // The unique constraint fired inside the transaction, so not even the
    // first copy survived.
    assert_eq!(
        fixture.store.get(&code).await.unwrap_err(),
        StoreError::NotFound(code)
    );
}

#[tokio::test]
async fn ping_reflects_connectivity() {
    let fixture = Fixture::start().await;
    assert!(fixture.store.ping().await);
}
