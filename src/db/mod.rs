//! Live database access
//!
//! One pooled PostgreSQL handle shared for the process lifetime. It backs
//! schema extraction, the agent's SQL tools and the `SELECT 1` health probe.
//! The agent sees the database only through the [`SqlDatabase`] trait so
//! tests can script it.

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row};
use std::time::Duration;
use tracing::debug;

const USABLE_TABLES_SQL: &str = "
SELECT t.table_schema::text, t.table_name::text
FROM information_schema.tables t
WHERE t.table_schema NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
  AND t.table_schema NOT LIKE 'pg_temp_%'
  AND t.table_schema NOT LIKE 'pg_toast_temp_%'
  AND t.table_type IN ('BASE TABLE', 'VIEW')
ORDER BY t.table_schema, t.table_name
";

const TABLE_COLUMNS_SQL: &str = "
SELECT c.column_name::text, c.data_type::text, (c.is_nullable = 'YES') AS nullable
FROM information_schema.columns c
WHERE c.table_schema = $1 AND c.table_name = $2
ORDER BY c.ordinal_position
";

/// Rows of sample data shown per table by [`SqlDatabase::table_info`]
const SAMPLE_ROWS: usize = 3;

/// Database capability used by the SQL agent and health checks
#[async_trait]
pub trait SqlDatabase: Send + Sync {
    /// SQL dialect name shown to the model
    fn dialect(&self) -> &str;

    /// Cheap liveness probe (`SELECT 1`)
    async fn ping(&self) -> Result<()>;

    /// Qualified names (`schema.table`) of every non-system table and view
    async fn usable_table_names(&self) -> Result<Vec<String>>;

    /// Column listing plus a few sample rows for the given qualified names
    async fn table_info(&self, tables: &[String]) -> Result<String>;

    /// Execute one statement and render its result as text
    async fn run(&self, sql: &str) -> Result<String>;
}

/// PostgreSQL implementation backed by a sqlx pool
pub struct PgDatabase {
    pool: PgPool,
    max_rows: usize,
}

impl PgDatabase {
    /// Build the pool without opening a connection; the first query connects.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        debug!("Creating database pool for {}", config.masked_url());

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy_with(options);

        Self {
            pool,
            max_rows: config.max_result_rows,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_json_rows(&self, statement: &str, limit: usize) -> Result<Vec<String>> {
        let rows: Vec<String> = sqlx::query_scalar(&wrap_statement(statement, limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Run a utility statement (`EXPLAIN`, `SHOW`) that cannot be nested in a
    /// subquery. The simple protocol returns every column as text.
    async fn fetch_text_rows(&self, statement: &str) -> Result<Vec<String>> {
        let rows = sqlx::raw_sql(statement).fetch_all(&self.pool).await?;
        rows.iter().map(row_as_json_text).collect()
    }

    async fn describe_table(&self, schema: &str, table: &str) -> Result<String> {
        let columns: Vec<(String, String, bool)> = sqlx::query_as(TABLE_COLUMNS_SQL)
            .bind(schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let qualified = qualified_name(schema, table);
        let mut out = format!("CREATE TABLE {} (\n", qualified);
        let defs: Vec<String> = columns
            .iter()
            .map(|(name, data_type, nullable)| {
                if *nullable {
                    format!("\t{} {}", name, data_type)
                } else {
                    format!("\t{} {} NOT NULL", name, data_type)
                }
            })
            .collect();
        out.push_str(&defs.join(",\n"));
        out.push_str("\n)\n");

        let sample_sql = format!("SELECT * FROM {}", quote_qualified(schema, table));
        match self.fetch_json_rows(&sample_sql, SAMPLE_ROWS).await {
            Ok(rows) => {
                out.push_str(&format!(
                    "\n/*\n{} rows from {} table:\n{}\n*/",
                    SAMPLE_ROWS,
                    qualified,
                    rows.join("\n")
                ));
            }
            Err(e) => debug!("Skipping sample rows for {}: {}", qualified, e),
        }

        Ok(out)
    }
}

#[async_trait]
impl SqlDatabase for PgDatabase {
    fn dialect(&self) -> &str {
        "postgresql"
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn usable_table_names(&self) -> Result<Vec<String>> {
        let rows: Vec<(String, String)> = sqlx::query_as(USABLE_TABLES_SQL)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|(schema, table)| qualified_name(schema, table))
            .collect())
    }

    async fn table_info(&self, tables: &[String]) -> Result<String> {
        let usable = self.usable_table_names().await?;
        check_known_tables(tables, &usable)?;

        let mut sections = Vec::with_capacity(tables.len());
        for name in tables {
            // names were matched against the catalog above
            if let Some((schema, table)) = split_qualified(name) {
                sections.push(self.describe_table(schema, table).await?);
            }
        }
        Ok(sections.join("\n\n"))
    }

    async fn run(&self, sql: &str) -> Result<String> {
        let statement = normalize_statement(sql);
        if statement.is_empty() {
            return Err(Error::InvalidInput("empty SQL statement".to_string()));
        }

        match statement_kind(&statement) {
            StatementKind::Query => {
                // one extra row tells us the result was cut
                let rows = self.fetch_json_rows(&statement, self.max_rows + 1).await?;
                Ok(render_rows(&rows, self.max_rows))
            }
            StatementKind::Utility => {
                let rows = self.fetch_text_rows(&statement).await?;
                Ok(render_rows(&rows, self.max_rows))
            }
            StatementKind::Command => {
                let done = sqlx::query(&statement).execute(&self.pool).await?;
                Ok(format!(
                    "Statement executed; {} rows affected.",
                    done.rows_affected()
                ))
            }
        }
    }
}

/// `schema.table` rendering used throughout the catalog
pub fn qualified_name(schema: &str, object: &str) -> String {
    format!("{}.{}", schema, object)
}

fn split_qualified(name: &str) -> Option<(&str, &str)> {
    name.split_once('.')
}

/// Double-quote an identifier, escaping embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn quote_qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Fail with the names in `requested` that the catalog does not list
pub fn check_known_tables(requested: &[String], usable: &[String]) -> Result<()> {
    let missing: Vec<&String> = requested.iter().filter(|t| !usable.contains(t)).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "table_names {:?} not found in database",
            missing
        )))
    }
}

/// Replace `--` and `/* */` comments with a space, leaving quoted text alone.
///
/// Block comments nest, as they do in PostgreSQL.
pub fn strip_comments(sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            '\'' | '"' => {
                out.push(c);
                i += 1;
                while i < chars.len() {
                    out.push(chars[i]);
                    if chars[i] == c {
                        // doubled quote is an escaped quote
                        if chars.get(i + 1) == Some(&c) {
                            out.push(c);
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            }
            '-' if next == Some('-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                out.push(' ');
            }
            '/' if next == Some('*') => {
                let mut depth = 0usize;
                while i < chars.len() {
                    if chars[i] == '/' && chars.get(i + 1) == Some(&'*') {
                        depth += 1;
                        i += 2;
                    } else if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                        depth -= 1;
                        i += 2;
                        if depth == 0 {
                            break;
                        }
                    } else {
                        i += 1;
                    }
                }
                out.push(' ');
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Drop comments, surrounding whitespace and trailing semicolons so the
/// statement can be classified and nested
pub fn normalize_statement(sql: &str) -> String {
    strip_comments(sql)
        .trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .to_string()
}

/// How a statement's result reaches the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Produces a row set that can be wrapped in a subquery
    Query,
    /// Produces rows but cannot be nested (`EXPLAIN`, `SHOW`)
    Utility,
    /// Reports only a row count
    Command,
}

/// Classify a normalized statement by its leading keyword
pub fn statement_kind(statement: &str) -> StatementKind {
    let first = statement
        .split(|c: char| c.is_whitespace() || c == '(')
        .find(|w| !w.is_empty())
        .unwrap_or("")
        .to_ascii_lowercase();
    match first.as_str() {
        "select" | "with" | "values" | "table" => StatementKind::Query,
        "explain" | "show" => StatementKind::Utility,
        _ => StatementKind::Command,
    }
}

/// Nest a query so each row comes back as one JSON text value, at most `limit` rows.
///
/// The statement sits on its own lines so nothing it ends with can swallow
/// the closing parenthesis.
pub fn wrap_statement(statement: &str, limit: usize) -> String {
    format!(
        "SELECT row_to_json(q)::text FROM (\n{}\n) AS q LIMIT {}",
        statement, limit
    )
}

fn row_as_json_text(row: &PgRow) -> Result<String> {
    let mut object = serde_json::Map::new();
    for column in row.columns() {
        let value: Option<String> = row.try_get_unchecked(column.ordinal())?;
        object.insert(
            column.name().to_string(),
            value.map(Value::String).unwrap_or(Value::Null),
        );
    }
    Ok(Value::Object(object).to_string())
}

/// Render JSON rows as the observation text handed back to the model.
///
/// Callers fetch one row past `max_rows`; any surplus only marks truncation.
pub fn render_rows(rows: &[String], max_rows: usize) -> String {
    if rows.is_empty() {
        return "No rows returned.".to_string();
    }

    let shown = &rows[..rows.len().min(max_rows)];
    let mut out = format!("[{}]", shown.join(",\n "));
    if rows.len() > shown.len() {
        out.push_str(&format!(
            "\n(showing first {} of more than {} rows)",
            shown.len(),
            shown.len()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_statement() {
        assert_eq!(normalize_statement("  SELECT 1;  "), "SELECT 1");
        assert_eq!(normalize_statement("SELECT 1;;\n"), "SELECT 1");
        assert_eq!(normalize_statement(" ; "), "");
        assert_eq!(normalize_statement("-- nothing here\n"), "");
    }

    #[test]
    fn test_comments_do_not_hide_a_select() {
        let leading_line = normalize_statement(
            "-- count active contracts\nSELECT COUNT(*) FROM sales.contracts WHERE status = 'Active'",
        );
        assert_eq!(statement_kind(&leading_line), StatementKind::Query);
        assert!(leading_line.starts_with("SELECT COUNT(*)"));

        let leading_block =
            normalize_statement("/* active */ SELECT COUNT(*) FROM sales.contracts;");
        assert_eq!(statement_kind(&leading_block), StatementKind::Query);

        let nested = normalize_statement("/* outer /* inner */ still */ SELECT 1");
        assert_eq!(nested, "SELECT 1");
    }

    #[test]
    fn test_trailing_comment_cannot_break_wrapper() {
        let statement = normalize_statement("SELECT 1 -- one");
        assert_eq!(statement, "SELECT 1");

        let wrapped = wrap_statement(&statement, 101);
        assert_eq!(
            wrapped,
            "SELECT row_to_json(q)::text FROM (\nSELECT 1\n) AS q LIMIT 101"
        );
        assert_eq!(wrapped.matches('(').count(), wrapped.matches(')').count());
    }

    #[test]
    fn test_comment_markers_inside_literals_are_kept() {
        let sql = "SELECT '--not a comment', 'it''s /* here */' AS \"a--b\"";
        assert_eq!(normalize_statement(sql), sql);
    }

    #[test]
    fn test_statement_kind() {
        assert_eq!(
            statement_kind("SELECT COUNT(*) FROM sales.contracts"),
            StatementKind::Query
        );
        assert_eq!(
            statement_kind("with active as (select 1) select * from active"),
            StatementKind::Query
        );
        assert_eq!(statement_kind("(SELECT 1)"), StatementKind::Query);
        assert_eq!(statement_kind("EXPLAIN SELECT 1"), StatementKind::Utility);
        assert_eq!(statement_kind("SHOW search_path"), StatementKind::Utility);
        assert_eq!(
            statement_kind("UPDATE sales.contracts SET status = 'Active'"),
            StatementKind::Command
        );
        assert_eq!(statement_kind(""), StatementKind::Command);
    }

    #[test]
    fn test_wrapper_limits_rows_in_sql() {
        let wrapped = wrap_statement("SELECT * FROM big_table", 101);
        assert!(wrapped.ends_with(") AS q LIMIT 101"));
        assert!(wrapped.contains("\nSELECT * FROM big_table\n"));
    }

    #[test]
    fn test_render_rows_truncates() {
        let rows: Vec<String> = (0..3).map(|i| format!("{{\"id\":{}}}", i)).collect();

        let rendered = render_rows(&rows, 2);
        assert!(rendered.starts_with("[{\"id\":0},\n {\"id\":1}]"));
        assert!(rendered.contains("showing first 2 of more than 2 rows"));

        assert_eq!(render_rows(&[], 10), "No rows returned.");
        assert_eq!(render_rows(&rows[..1], 10), "[{\"id\":0}]");
        assert!(!render_rows(&rows[..2], 2).contains("showing"));
    }

    #[test]
    fn test_unknown_table_is_invalid_input() {
        let usable = vec!["sales.contracts".to_string()];
        assert!(check_known_tables(&["sales.contracts".to_string()], &usable).is_ok());

        let err = check_known_tables(&["sales.missing".to_string()], &usable).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("sales.missing"));
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("contracts"), "\"contracts\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_qualified("sales", "contracts"), "\"sales\".\"contracts\"");
    }
}
