use chrono::{Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use waystack_core::{BackendKind, Context, NavConfig, NavError};
use waystack_db::SqliteBlobStore;
use waystack_runtime::{
    ActionContext, BlobStore, Inbound, Keys, Link, Navigator, Registry, RenderContext,
};

fn navigator(store: Arc<SqliteBlobStore>) -> Navigator<(), (i64, Link)> {
    Navigator::builder(
        Registry::new()
            .view("main", |ctx: &RenderContext<'_>, _: &()| {
                let cnt = ctx.context().get_i64("cnt").unwrap_or(0);
                Ok((cnt, ctx.link_action("add", Context::new())?))
            })
            .action("add", |ctx: &mut ActionContext<'_>, _: &()| {
                let cnt = ctx.context().get_i64("cnt").unwrap_or(0);
                ctx.context_mut().insert("cnt", cnt + 1);
                Ok(())
            }),
    )
    .config(NavConfig {
        backend: BackendKind::Database,
        ..NavConfig::default()
    })
    .keys(Keys::new("db-test-secret"))
    .store(store)
    .entry("main", Context::new().with("cnt", 0))
    .build()
    .unwrap()
}

async fn sqlite() -> Arc<SqliteBlobStore> {
    Arc::new(
        SqliteBlobStore::connect_with("sqlite::memory:", SqlitePoolOptions::new().max_connections(1))
            .await
            .unwrap(),
    )
}

#[tokio::test]
async fn test_navigation_through_sqlite_store() {
    let store = sqlite().await;
    let nav = navigator(store.clone());

    let page = nav.handle(Inbound::fresh(), &()).await.unwrap();
    let (cnt, link) = page.output;
    assert_eq!(cnt, 0);
    assert_eq!(link.token().as_str().len(), 32);
    assert_eq!(store.count().await.unwrap(), 1);

    let page = nav
        .handle(Inbound::with_token(link.token().as_str()), &())
        .await
        .unwrap();
    assert_eq!(page.output.0, 1);

    // Stored tokens stay valid until purged.
    let again = nav
        .handle(Inbound::with_token(link.token().as_str()), &())
        .await
        .unwrap();
    assert_eq!(again.output.0, 1);
}

#[tokio::test]
async fn test_purged_state_is_not_found() {
    let store = sqlite().await;
    let nav = navigator(store.clone());

    let page = nav.handle(Inbound::fresh(), &()).await.unwrap();
    let token = page.output.1.token().as_str().to_string();

    let removed = store
        .purge_older_than(Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let result = nav.handle(Inbound::with_token(token), &()).await;
    assert!(matches!(result, Err(NavError::NotFound(_))));
}
