use keel_store::{Store, StoreConfig, db};

/// Fresh in-memory store with the schema applied
pub async fn store() -> Store {
    let store = db::connect(&StoreConfig::default())
        .await
        .expect("connect to in-memory sqlite");
    db::run_migrations(&store)
        .await
        .expect("apply schema");
    store
}
