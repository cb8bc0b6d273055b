use std::sync::Arc;

use todo_api::auth::{AuthError, CredentialStore, PgCredentialStore};
use todo_api::test_support::{TestDatabase, TestDatabaseError, TestFixtures, test_auth_state};

#[tokio::test]
async fn unique_constraint_decides_concurrent_registrations() {
    let test_db = match TestDatabase::new_from_env().await {
        Ok(db) => db,
        Err(TestDatabaseError::MissingUrl) => {
            eprintln!("skipping credential store test: TEST_DATABASE_URL not set");
            return;
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    };

    let pool = test_db.pool_clone();
    let state = test_auth_state(Arc::new(PgCredentialStore::new(pool.clone())));

    let mut handles = Vec::new();
    for n in 0..8 {
        let credentials = state.credentials.clone();
        handles.push(tokio::spawn(async move {
            credentials.register("alice", &format!("password-{n}")).await
        }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.expect("task joins") {
            Ok(identity) => {
                assert_eq!(identity.username, "alice");
                wins += 1;
            }
            Err(AuthError::DuplicateIdentity) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(wins, 1);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = 'alice'")
        .fetch_one(&pool)
        .await
        .expect("count users");
    assert_eq!(rows, 1);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn stores_hashes_and_authenticates() {
    let test_db = match TestDatabase::new_from_env().await {
        Ok(db) => db,
        Err(TestDatabaseError::MissingUrl) => {
            eprintln!("skipping credential store test: TEST_DATABASE_URL not set");
            return;
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    };

    let pool = test_db.pool_clone();
    let store = Arc::new(PgCredentialStore::new(pool.clone()));
    let state = test_auth_state(store.clone());

    let identity = state
        .credentials
        .register("Alice", "secret123")
        .await
        .expect("register");
    assert_eq!(identity.username, "alice");

    let stored_hash: String =
        sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
            .bind(identity.id)
            .fetch_one(&pool)
            .await
            .expect("stored hash");
    assert!(stored_hash.starts_with("$argon2id$"));
    assert!(!stored_hash.contains("secret123"));

    let found = state
        .credentials
        .authenticate("alice", "secret123")
        .await
        .expect("authenticate");
    assert_eq!(found, identity);

    assert!(matches!(
        state.credentials.authenticate("alice", "wrong").await,
        Err(AuthError::InvalidCredentials)
    ));
    assert!(matches!(
        state.credentials.authenticate("nobody", "secret123").await,
        Err(AuthError::InvalidCredentials)
    ));

    let fixtures = TestFixtures::new(&pool);
    let bob_id = fixtures
        .insert_user("bob", "$argon2id$placeholder")
        .await
        .expect("insert bob");
    fixtures.insert_todo(bob_id, "feed cat").await.expect("insert todo");

    assert!(matches!(
        store.insert("bob", "another-hash").await,
        Err(AuthError::DuplicateIdentity)
    ));

    test_db.close().await.expect("failed to drop test database");
}
