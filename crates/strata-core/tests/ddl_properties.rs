//! Cross-dialect properties of generated DDL.

use pretty_assertions::assert_eq;
use strata_core::{Dialect, DdlWarning, ForeignKey, Migration, MigrationField};

fn blog_posts() -> Migration {
    Migration::new("posts")
        .description("blog posts")
        .field(MigrationField::new("id", "int").primary_key().auto_increment())
        .field(MigrationField::new("author_id", "int"))
        .field(MigrationField::new("title", "varchar(200)"))
        .field(MigrationField::new("body", "text").nullable())
        .foreign_key(ForeignKey::new("fk_posts_authors", "author_id", "authors", "id"))
}

fn auto_increment_token(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Mssql => "IDENTITY(1,1)",
        Dialect::MySql => "AUTO_INCREMENT",
        Dialect::Sqlite => "AUTOINCREMENT",
        Dialect::Postgres => "SERIAL",
    }
}

#[test]
fn every_dialect_emits_one_primary_key() {
    for dialect in Dialect::ALL {
        let sql = dialect.create_table(&blog_posts(), None);
        assert_eq!(
            sql.matches("PRIMARY KEY").count(),
            1,
            "{dialect} rendered:\n{sql}"
        );
    }
}

#[test]
fn every_dialect_honors_a_single_auto_increment() {
    let m = blog_posts().field(MigrationField::new("revision", "int").auto_increment());
    for dialect in Dialect::ALL {
        let sql = dialect.create_table(&m, None);
        assert_eq!(
            sql.matches(auto_increment_token(dialect)).count(),
            1,
            "{dialect} rendered:\n{sql}"
        );
        assert!(dialect.warnings(&m).contains(&DdlWarning::DuplicateAutoIncrement {
            table: "posts".into(),
            field: "revision".into(),
        }));
    }
}

#[test]
fn every_dialect_guards_table_creation() {
    for dialect in Dialect::ALL {
        let sql = dialect.create_table(&blog_posts(), None);
        assert!(
            sql.starts_with("CREATE TABLE IF NOT EXISTS") || sql.starts_with("IF NOT EXISTS"),
            "{dialect} rendered:\n{sql}"
        );
    }
}

#[test]
fn nullability_tokens_follow_fields() {
    for dialect in Dialect::ALL {
        let sql = dialect.create_table(&blog_posts(), None);
        let q = dialect.generator().quote_identifier("body");
        assert!(sql.contains(&format!("{q} TEXT NULL")), "{dialect}:\n{sql}");
        let q = dialect.generator().quote_identifier("title");
        assert!(
            sql.contains(&format!("{q} VARCHAR(200) NOT NULL")),
            "{dialect}:\n{sql}"
        );
    }
}

#[test]
fn foreign_keys_are_inlined_or_separate_never_both() {
    for dialect in Dialect::ALL {
        let create = dialect.create_table(&blog_posts(), None);
        let separate = dialect.foreign_key_queries(&blog_posts(), None);
        let inline = create.contains("FOREIGN KEY");
        assert_eq!(inline, dialect.generator().inlines_foreign_keys());
        assert_eq!(separate.len(), usize::from(!inline), "{dialect}");
    }
}

#[test]
fn migrations_deserialize_from_json_batch() {
    let json = r#"[
        {
            "table_name": "authors",
            "fields": [
                {"name": "id", "data_type": "int", "primary_key": true, "auto_increment": true},
                {"name": "name", "data_type": "varchar(100)"}
            ]
        },
        {
            "table_name": "posts",
            "description": "blog posts",
            "fields": [{"name": "author_id", "data_type": "int"}],
            "foreign_keys": [
                {"name": "fk_posts_authors", "column": "author_id",
                 "reference_table": "authors", "reference_column": "id"}
            ]
        }
    ]"#;
    let batch: Vec<Migration> = serde_json::from_str(json).unwrap();
    assert_eq!(batch.len(), 2);
    assert!(batch[0].fields[0].auto_increment);
    assert!(!batch[0].fields[1].nullable);
    assert_eq!(batch[1].description, "blog posts");
    assert!(strata_core::validate_batch(&batch).is_ok());
}

#[test]
fn auto_increment_column_is_never_nullable() {
    let m = Migration::new("events")
        .field(MigrationField::new("seq", "int").nullable().primary_key().auto_increment())
        .field(MigrationField::new("payload", "text").nullable());
    for dialect in Dialect::ALL {
        let sql = dialect.create_table(&m, None);
        let q = dialect.generator().quote_identifier("seq");
        let line = sql
            .lines()
            .find(|line| line.trim_start().starts_with(&q))
            .unwrap();
        assert!(line.contains(" NOT NULL"), "{dialect}:\n{sql}");
        assert!(!line.replace("NOT NULL", "").contains("NULL"), "{dialect}:\n{sql}");
        assert!(dialect.warnings(&m).contains(&DdlWarning::NullableAutoIncrement {
            table: "events".into(),
            field: "seq".into(),
        }));
    }
}
