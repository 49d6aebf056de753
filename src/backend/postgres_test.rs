use super::*;

// =============================================================================
// whitelist
// =============================================================================

#[test]
fn check_table_accepts_rooms_only() {
    assert!(check_table("rooms").is_ok());
    assert!(matches!(check_table("users"), Err(BackendError::UnknownTable(t)) if t == "users"));
}

#[test]
fn check_column_rejects_injection() {
    assert_eq!(check_column("drawing").unwrap(), "drawing");
    assert!(matches!(
        check_column("id; DROP TABLE rooms"),
        Err(BackendError::UnknownColumn(_))
    ));
}

// =============================================================================
// push_filter
// =============================================================================

#[test]
fn push_filter_builds_where_and_order() {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT to_jsonb(r.*) FROM rooms r");
    let filter = Filter::new()
        .eq("owner", "u1")
        .eq("is_public", true)
        .order("created_at", false);
    push_filter(&mut builder, &filter).unwrap();
    assert_eq!(
        builder.sql(),
        "SELECT to_jsonb(r.*) FROM rooms r WHERE to_jsonb(r.owner) = $1 AND to_jsonb(r.is_public) = $2 ORDER BY r.created_at DESC"
    );
}

#[test]
fn push_filter_empty_is_noop() {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT 1");
    push_filter(&mut builder, &Filter::new()).unwrap();
    assert_eq!(builder.sql(), "SELECT 1");
}

#[test]
fn push_filter_rejects_unknown_order_column() {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT 1");
    let err = push_filter(&mut builder, &Filter::new().order("password", true)).unwrap_err();
    assert!(matches!(err, BackendError::UnknownColumn(c) if c == "password"));
}

#[test]
fn into_record_rejects_non_objects() {
    assert!(into_record(serde_json::json!({"id": "x"})).is_ok());
    assert!(matches!(into_record(serde_json::json!([1, 2])), Err(BackendError::InvalidRecord(_))));
}

// =============================================================================
// live database
// =============================================================================

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use serde_json::json;

    async fn live_store() -> PgRowStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required for live-db-tests");
        let pool = crate::db::init_pool(&url, 2).await.expect("init pool");
        PgRowStore::new(pool, 8)
    }

    #[tokio::test]
    async fn insert_select_update_round_trip() {
        let store = live_store().await;
        let owner = Uuid::new_v4();
        let inserted = store
            .insert(
                ROOMS_TABLE,
                json!({"name": "live", "owner": owner.to_string(), "is_public": false})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();
        let id = inserted[0]["id"].as_str().unwrap().to_owned();

        let mut patch = Record::new();
        patch.insert("drawing".into(), json!("data:image/png;base64,AA=="));
        store
            .update(ROOMS_TABLE, patch, &Filter::new().eq("id", id.clone()))
            .await
            .unwrap();

        let rows = store
            .select(ROOMS_TABLE, &Filter::new().eq("id", id))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["drawing"], "data:image/png;base64,AA==");
    }
}
