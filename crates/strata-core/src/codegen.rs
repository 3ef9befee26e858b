//! Model code generation.
//!
//! Renders a Rust struct mirroring the columns of a [`Migration`], so an
//! application can read rows of the table it creates.

use crate::migration::{Migration, MigrationField};

/// Options for [`generate_model`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelOptions {
    /// Derive `serde` traits and keep column names through `rename`.
    pub serde: bool,
}

/// Generates the Rust source of a struct with one field per column.
///
/// Nullable columns become `Option`s. Column types are mapped by prefix;
/// anything unrecognized is read as `String`.
#[must_use]
pub fn generate_model(migration: &Migration, options: ModelOptions) -> String {
    let struct_name = to_struct_name(&migration.table_name);
    let mut out = format!("// Generated from the `{}` migration.\n\n", migration.table_name);

    if options.serde {
        out.push_str("use serde::{Deserialize, Serialize};\n\n");
    }
    if !migration.description.is_empty() {
        out.push_str(&format!("/// {}\n", migration.description));
    }
    if options.serde {
        out.push_str("#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\n");
    } else {
        out.push_str("#[derive(Debug, Clone, PartialEq)]\n");
    }
    out.push_str(&format!("pub struct {struct_name} {{\n"));
    for field in &migration.fields {
        out.push_str(&render_field(field, options));
    }
    out.push_str("}\n");
    out
}

fn render_field(field: &MigrationField, options: ModelOptions) -> String {
    let ident = to_field_name(&field.name);
    let rust_type = rust_type(&field.data_type);
    let rust_type = if field.nullable {
        format!("Option<{rust_type}>")
    } else {
        rust_type.to_string()
    };

    let mut out = String::new();
    if options.serde && ident.trim_start_matches("r#") != field.name {
        out.push_str(&format!("    #[serde(rename = \"{}\")]\n", field.name));
    }
    out.push_str(&format!("    pub {ident}: {rust_type},\n"));
    out
}

/// Maps a column type to the Rust type a driver decodes it into.
#[must_use]
pub fn rust_type(data_type: &str) -> &'static str {
    let t = data_type.trim().to_ascii_lowercase();
    let starts = |prefixes: &[&str]| prefixes.iter().any(|p| t.starts_with(p));

    if starts(&["interval"]) {
        "String"
    } else if starts(&["bigint", "int8", "bigserial"]) {
        "i64"
    } else if starts(&["smallint", "int2", "smallserial"]) {
        "i16"
    } else if starts(&["tinyint"]) {
        "i8"
    } else if starts(&["int", "mediumint", "serial"]) {
        "i32"
    } else if starts(&["numeric", "decimal", "real", "double", "float", "money"]) {
        "f64"
    } else if starts(&["bool", "bit"]) {
        "bool"
    } else if starts(&["timestamptz", "timestamp with time zone", "datetimeoffset"]) {
        "chrono::DateTime<chrono::Utc>"
    } else if starts(&["timestamp", "datetime", "smalldatetime"]) {
        "chrono::NaiveDateTime"
    } else if starts(&["date"]) {
        "chrono::NaiveDate"
    } else if starts(&["time"]) {
        "chrono::NaiveTime"
    } else if starts(&["bytea", "blob", "binary", "varbinary", "image"]) {
        "Vec<u8>"
    } else if starts(&["json"]) {
        "serde_json::Value"
    } else {
        "String"
    }
}

/// Converts `blog_posts` into `BlogPosts`.
fn to_struct_name(table: &str) -> String {
    let mut result = String::new();
    let mut capitalize_next = true;
    for ch in table.chars() {
        if !ch.is_ascii_alphanumeric() {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(ch.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(ch);
        }
    }
    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, 'T');
    }
    result
}

/// Converts a column name into a snake_case identifier.
fn to_field_name(column: &str) -> String {
    let mut ident = String::new();
    for (i, ch) in column.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 && !ident.ends_with('_') {
                ident.push('_');
            }
            ident.push(ch.to_ascii_lowercase());
        } else if ch.is_ascii_alphanumeric() {
            ident.push(ch);
        } else if !ident.ends_with('_') {
            ident.push('_');
        }
    }
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if is_keyword(&ident) {
        ident.insert_str(0, "r#");
    }
    ident
}

fn is_keyword(ident: &str) -> bool {
    matches!(
        ident,
        "as" | "async" | "await" | "break" | "const" | "continue" | "dyn" | "else" | "enum"
            | "extern" | "false" | "fn" | "for" | "if" | "impl" | "in" | "let" | "loop"
            | "match" | "mod" | "move" | "mut" | "pub" | "ref" | "return" | "static"
            | "struct" | "trait" | "true" | "type" | "unsafe" | "use" | "where" | "while"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn blog_posts() -> Migration {
        Migration::new("blog_posts")
            .description("Posts of the blog.")
            .field(MigrationField::new("id", "bigint").primary_key().auto_increment())
            .field(MigrationField::new("authorId", "int"))
            .field(MigrationField::new("type", "varchar(20)"))
            .field(MigrationField::new("published_at", "timestamptz").nullable())
    }

    #[test]
    fn test_struct_and_field_names() {
        assert_eq!(to_struct_name("blog_posts"), "BlogPosts");
        assert_eq!(to_struct_name("2fa_codes"), "T2faCodes");
        assert_eq!(to_field_name("authorId"), "author_id");
        assert_eq!(to_field_name("type"), "r#type");
        assert_eq!(to_field_name("Unit Price"), "unit_price");
    }

    #[test]
    fn test_type_mapping() {
        assert_eq!(rust_type("INT"), "i32");
        assert_eq!(rust_type("interval"), "String");
        assert_eq!(rust_type("bigserial"), "i64");
        assert_eq!(rust_type("SMALLINT"), "i16");
        assert_eq!(rust_type("decimal(10,2)"), "f64");
        assert_eq!(rust_type("datetime"), "chrono::NaiveDateTime");
        assert_eq!(rust_type("date"), "chrono::NaiveDate");
        assert_eq!(rust_type("bytea"), "Vec<u8>");
        assert_eq!(rust_type("jsonb"), "serde_json::Value");
        assert_eq!(rust_type("geometry"), "String");
    }

    #[test]
    fn test_generate_plain_model() {
        assert_eq!(
            generate_model(&blog_posts(), ModelOptions::default()),
            "// Generated from the `blog_posts` migration.\n\
             \n\
             /// Posts of the blog.\n\
             #[derive(Debug, Clone, PartialEq)]\n\
             pub struct BlogPosts {\n\
             \x20   pub id: i64,\n\
             \x20   pub author_id: i32,\n\
             \x20   pub r#type: String,\n\
             \x20   pub published_at: Option<chrono::DateTime<chrono::Utc>>,\n\
             }\n"
        );
    }

    #[test]
    fn test_generate_serde_model_keeps_column_names() {
        let code = generate_model(&blog_posts(), ModelOptions { serde: true });
        assert!(code.contains("use serde::{Deserialize, Serialize};"));
        assert!(code.contains("#[serde(rename = \"authorId\")]\n    pub author_id: i32,"));
        assert!(!code.contains("rename = \"type\""));
        assert!(!code.contains("rename = \"id\""));
    }
}
