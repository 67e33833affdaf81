use dialectdb::{
    row, Column, Condition, DocumentMemoryConfig, KeyValueMemoryConfig, MemoryDocumentDialect,
    MemoryKeyValueDialect, Ordering, ParadigmKind, QueryParams, Registry, Schemas, SelectParams,
    TableSchema, Value,
};

fn schemas(name: &str) -> Schemas {
    let mut schemas = Schemas::new();
    schemas.insert(
        name.into(),
        TableSchema::new()
            .column("title", Column::text())
            .column("views", Column::integer()),
    );
    schemas
}

#[tokio::test]
async fn document_collections_are_provisioned_lazily() {
    let db = Registry::with_defaults()
        .create("memory-document", DocumentMemoryConfig::default(), schemas("posts"))
        .unwrap();
    assert_eq!(db.paradigm(), ParadigmKind::Document);
    db.initialize().await.unwrap();

    let documents = db.downcast_ref::<MemoryDocumentDialect>().unwrap();
    assert!(documents.dialect().collection_names().unwrap().is_empty());

    let posts = documents.model("posts").unwrap();
    for (title, views) in [("intro", 10), ("deep dive", 250), ("errata", 3)] {
        let created = posts
            .create(row! { "title" => title, "views" => views })
            .await
            .unwrap();
        assert!(created.insert_id.is_some());
    }

    let popular = posts
        .select(
            SelectParams::new("posts")
                .conditions(Condition::new().gte("views", 10))
                .order_by(Ordering::desc("views"))
                .fields(["title"]),
        )
        .await
        .unwrap();
    assert_eq!(
        popular,
        vec![row! { "title" => "deep dive" }, row! { "title" => "intro" }]
    );

    let bumped = posts
        .update(Condition::new().like("title", "%o"), row! { "views" => 11 })
        .await
        .unwrap();
    assert_eq!(bumped, 1);
    assert_eq!(posts.remove(Condition::new().lt("views", 5)).await.unwrap(), 1);
    assert_eq!(posts.count(Condition::new()).await.unwrap(), 2);
}

#[tokio::test]
async fn document_id_field_is_configurable() {
    let db = Registry::with_defaults()
        .create_from_json(
            "memory-document",
            serde_json::json!({"id_field": "uid"}),
            Schemas::new(),
        )
        .unwrap();
    db.connect().await.unwrap();
    let result = db
        .execute(&QueryParams::Insert {
            table_name: "events".into(),
            data: row! { "kind" => "login" },
        })
        .await
        .unwrap();
    let id = result.insert_id.unwrap();
    let found = db
        .execute(
            &SelectParams::new("events")
                .conditions(Condition::new().eq("uid", id.clone()))
                .into(),
        )
        .await
        .unwrap();
    assert_eq!(found.rows[0].get("uid"), Some(&id));
}

#[tokio::test]
async fn key_value_targets_one_key() {
    let db = Registry::with_defaults()
        .create("memory-kv", KeyValueMemoryConfig::default(), Schemas::new())
        .unwrap();
    assert_eq!(db.paradigm(), ParadigmKind::KeyValue);
    db.initialize().await.unwrap();

    let kv = db.downcast_ref::<MemoryKeyValueDialect>().unwrap();
    let sessions = kv.model("sessions").unwrap();
    sessions
        .create(row! { "key" => "s-1", "user" => "ada", "hits" => 1 })
        .await
        .unwrap();
    sessions
        .create(row! { "id" => 2, "user" => "bob" })
        .await
        .unwrap();

    let merged = sessions
        .update(Condition::new().eq("key", "s-1"), row! { "hits" => 2 })
        .await
        .unwrap();
    assert_eq!(merged, 1);

    let one = sessions
        .find_one(Condition::new().eq("key", "s-1").eq("user", "ignored"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(one.get("hits"), Some(&Value::Int(2)));
    assert_eq!(one.get("user"), Some(&Value::from("ada")));

    let by_id = sessions.find(Condition::new().eq("id", 2)).await.unwrap();
    assert_eq!(by_id.len(), 1);
    assert_eq!(kv.dialect().entry_count("sessions").unwrap(), 2);

    assert_eq!(sessions.remove(Condition::new().eq("id", 2)).await.unwrap(), 1);
    assert_eq!(sessions.remove(Condition::new().eq("id", 2)).await.unwrap(), 0);
}

#[tokio::test]
async fn key_value_schema_changes_are_no_ops() {
    let db = Registry::with_defaults()
        .create("memory-kv", KeyValueMemoryConfig::default(), Schemas::new())
        .unwrap();
    db.connect().await.unwrap();
    let result = db
        .execute(&QueryParams::CreateIndex {
            table_name: "sessions".into(),
            index_name: "by_user".into(),
            columns: vec!["user".into()],
            unique: true,
        })
        .await
        .unwrap();
    assert_eq!(result.affected_rows, 0);

    let err = db
        .execute(&QueryParams::Delete {
            table_name: "missing".into(),
            conditions: None,
        })
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    db.dispose().await.unwrap();
    assert!(!db.is_connected());
}
