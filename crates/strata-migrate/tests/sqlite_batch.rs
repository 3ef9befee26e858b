//! End-to-end batches against SQLite.

use strata_core::SqlValue;
use strata_migrate::prelude::*;

fn authors() -> Migration {
    Migration::new("authors")
        .description("blog authors")
        .field(MigrationField::new("id", "integer").primary_key().auto_increment())
        .field(MigrationField::new("name", "varchar(100)"))
}

fn articles() -> Migration {
    Migration::new("articles")
        .description("blog articles")
        .field(MigrationField::new("id", "integer").primary_key().auto_increment())
        .field(MigrationField::new("author_id", "integer"))
        .field(MigrationField::new("body", "text").nullable())
        .foreign_key(ForeignKey::new("fk_articles_authors", "author_id", "authors", "id"))
}

async fn count(db: &mut dyn Executor, sql: &str, args: &[SqlValue]) -> i64 {
    db.query_row(sql, args)
        .await
        .unwrap()
        .and_then(|row| row.get_i64(0))
        .unwrap()
}

#[tokio::test]
async fn batch_with_foreign_key_is_applied_and_logged() {
    let mut db = Backend::connect("sqlite", &ConnectionOptions::sqlite(":memory:"))
        .await
        .unwrap();
    let report = db.create_migrations(vec![authors(), articles()]).await.unwrap();
    assert_eq!(report.applied, vec!["authors", "articles"]);
    assert!(report.warnings.is_empty());

    let fks = count(
        &mut db,
        "SELECT COUNT(*) FROM pragma_foreign_key_list('articles') WHERE \"table\" = ?",
        &[SqlValue::Text("authors".into())],
    )
    .await;
    assert_eq!(fks, 1);

    let entries = MigrationLedger::new(Dialect::Sqlite).applied(&mut db).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "authors");
    assert_eq!(entries[1].description.as_deref(), Some("blog articles"));
    assert!(entries[0].id < entries[1].id);
}

#[tokio::test]
async fn running_twice_logs_each_migration_once() {
    let mut db = Backend::connect("sqlite", &ConnectionOptions::sqlite(":memory:"))
        .await
        .unwrap();
    db.create_migrations(vec![authors(), articles()]).await.unwrap();
    let second = db.create_migrations(vec![authors(), articles()]).await.unwrap();
    assert!(second.applied.is_empty());
    assert_eq!(second.skipped, vec!["authors", "articles"]);

    for name in ["authors", "articles"] {
        let rows = count(
            &mut db,
            "SELECT COUNT(*) FROM _migrations WHERE name = ?",
            &[SqlValue::Text(name.into())],
        )
        .await;
        assert_eq!(rows, 1, "{name}");
    }
}

#[tokio::test]
async fn unlogged_table_is_skipped_without_backfill() {
    let mut db = Backend::connect("sqlite", &ConnectionOptions::sqlite(":memory:"))
        .await
        .unwrap();
    db.exec("CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT)", &[])
        .await
        .unwrap();

    let report = db.create_migrations(vec![authors(), articles()]).await.unwrap();
    assert_eq!(report.skipped, vec!["authors"]);
    assert_eq!(report.applied, vec!["articles"]);

    let logged = count(
        &mut db,
        "SELECT COUNT(*) FROM _migrations WHERE name = ?",
        &[SqlValue::Text("authors".into())],
    )
    .await;
    assert_eq!(logged, 0);
}

#[tokio::test]
async fn ledger_survives_reconnect_to_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blog.db");
    let options = ConnectionOptions::sqlite(path.to_string_lossy());

    let mut first = Backend::connect("sqlite", &options).await.unwrap();
    first.create_migrations(vec![authors()]).await.unwrap();
    first.close().await.unwrap();

    let mut second = Backend::connect("sqlite3", &options).await.unwrap();
    let report = second
        .create_migrations(vec![authors(), articles()])
        .await
        .unwrap();
    assert_eq!(report.skipped, vec!["authors"]);
    assert_eq!(report.applied, vec!["articles"]);
    second.close().await.unwrap();
}

#[tokio::test]
async fn custom_ledger_table() {
    let mut db = Backend::connect("sqlite", &ConnectionOptions::sqlite(":memory:"))
        .await
        .unwrap();
    let mut runner = MigrationRunner::new().with_ledger_table("schema_history");
    runner.add_migration(authors());
    runner.run(&mut db).await.unwrap();

    let ledger = MigrationLedger::new(Dialect::Sqlite).with_table("schema_history");
    assert!(ledger.is_migration_applied(&mut db, "authors").await.unwrap());
    assert!(!ledger.table_exists(&mut db, "_migrations").await.unwrap());
}

#[tokio::test]
async fn demo_batch_file_applies() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/blog.json");
    let batch = load_batch(&path).unwrap();
    assert_eq!(batch.len(), 2);

    let mut db = Backend::connect("sqlite", &ConnectionOptions::sqlite(":memory:"))
        .await
        .unwrap();
    let report = db.create_migrations(batch).await.unwrap();
    assert_eq!(report.applied, vec!["authors", "articles"]);
}

#[tokio::test]
async fn table_differing_only_in_case_is_not_recreated() {
    let mut db = Backend::connect("sqlite", &ConnectionOptions::sqlite(":memory:"))
        .await
        .unwrap();
    let users = Migration::new("users")
        .field(MigrationField::new("id", "integer").primary_key().auto_increment());
    db.create_migrations(vec![users]).await.unwrap();

    let shouting = Migration::new("Users")
        .field(MigrationField::new("id", "integer").primary_key().auto_increment())
        .field(MigrationField::new("email", "varchar(255)"));
    let report = db.create_migrations(vec![shouting]).await.unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(report.skipped, vec!["Users"]);

    let entries = MigrationLedger::new(Dialect::Sqlite).applied(&mut db).await.unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn sql_directory_is_applied_in_file_order() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("0002_articles.sql"),
        "CREATE TABLE articles (id INTEGER PRIMARY KEY, author_id INTEGER REFERENCES authors (id));",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("0001_authors.sql"),
        "CREATE TABLE authors (id INTEGER PRIMARY KEY);\nINSERT INTO authors (id) VALUES (1);",
    )
    .unwrap();

    let mut db = Backend::connect("sqlite", &ConnectionOptions::sqlite(":memory:"))
        .await
        .unwrap();
    let scripts = load_dir(dir.path()).unwrap();
    let report = MigrationRunner::new()
        .run_scripts(&mut db, &scripts)
        .await
        .unwrap();
    assert_eq!(report.applied, vec!["0001_authors", "0002_articles"]);
    assert_eq!(count(&mut db, "SELECT COUNT(*) FROM authors", &[]).await, 1);

    let entries = MigrationLedger::new(Dialect::Sqlite).applied(&mut db).await.unwrap();
    assert_eq!(entries[0].name, "0001_authors");
    assert_eq!(entries[0].description.as_deref(), Some("0001_authors.sql"));

    let again = MigrationRunner::new()
        .run_scripts(&mut db, &scripts)
        .await
        .unwrap();
    assert_eq!(again.skipped, vec!["0001_authors", "0002_articles"]);
}
