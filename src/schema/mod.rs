//! Schema extraction
//!
//! Introspects the live database and renders one self-describing text
//! document per table and per view. These documents are what the vector
//! index embeds and what the retriever hands to the SQL agent as context.
//!
//! The table and view steps are independent: a failing statement is logged
//! and contributes no documents, while the other step still runs. Only a
//! failure to connect at all is reported as an error.

pub mod queries;

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{error, info, warn};

/// Content of the document substituted when introspection finds nothing
pub const PLACEHOLDER_CONTENT: &str = "No schema information available.";

/// Kind of database object a document describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Table,
    View,
    Placeholder,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Table => write!(f, "table"),
            SourceType::View => write!(f, "view"),
            SourceType::Placeholder => write!(f, "placeholder"),
        }
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" => Ok(SourceType::Table),
            "view" => Ok(SourceType::View),
            "placeholder" => Ok(SourceType::Placeholder),
            _ => Err(Error::Extraction(format!("Unknown source type: {}", s))),
        }
    }
}

/// Rendered description of one table or view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Human-readable rendering; never empty
    pub content: String,
    pub source_type: SourceType,
    pub schema_name: String,
    pub object_name: String,
}

impl SchemaDocument {
    /// The single document used when the database has no tables or views
    pub fn placeholder() -> Self {
        Self {
            content: PLACEHOLDER_CONTENT.to_string(),
            source_type: SourceType::Placeholder,
            schema_name: String::new(),
            object_name: String::new(),
        }
    }

    /// Stable identity of the described object, independent of its content
    pub fn identity(&self) -> String {
        match self.source_type {
            SourceType::Placeholder => SourceType::Placeholder.to_string(),
            kind => format!("{}:{}.{}", kind, self.schema_name, self.object_name),
        }
    }

    /// BLAKE3 hex digest of the rendered content
    pub fn content_hash(&self) -> String {
        blake3::hash(self.content.as_bytes()).to_hex().to_string()
    }
}

/// One row of the table/column introspection query
#[derive(Debug, Clone, FromRow)]
pub struct ColumnRow {
    pub table_schema: String,
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
    pub column_comment: String,
    pub table_comment: String,
}

/// One row of the view introspection query
#[derive(Debug, Clone, FromRow)]
pub struct ViewRow {
    pub view_schema: String,
    pub view_name: String,
    pub view_definition: String,
    pub view_comment: String,
}

struct TableEntry {
    comment: String,
    columns: Vec<(String, String, String)>,
}

/// Group column rows by `(schema, table)` into one document per table.
///
/// Columns keep the order in which they arrive, which the query fixes to
/// ordinal position.
pub fn table_documents(rows: Vec<ColumnRow>) -> Vec<SchemaDocument> {
    let mut tables: BTreeMap<(String, String), TableEntry> = BTreeMap::new();

    for row in rows {
        let entry = tables
            .entry((row.table_schema, row.table_name))
            .or_insert_with(|| TableEntry {
                comment: row.table_comment.clone(),
                columns: Vec::new(),
            });
        entry
            .columns
            .push((row.column_name, row.data_type, row.column_comment));
    }

    tables
        .into_iter()
        .map(|((schema, name), entry)| {
            let mut content = format!("Table: {} (Schema: {})\n", name, schema);
            if !entry.comment.is_empty() {
                content.push_str(&format!("Comment: {}\n", entry.comment));
            }
            content.push_str("Columns:\n");
            for (column, data_type, comment) in &entry.columns {
                content.push_str(&format!("  - {} ({})", column, data_type));
                if !comment.is_empty() {
                    content.push_str(&format!(": {}", comment));
                }
                content.push('\n');
            }

            SchemaDocument {
                content: content.trim().to_string(),
                source_type: SourceType::Table,
                schema_name: schema,
                object_name: name,
            }
        })
        .collect()
}

/// Render one view: header, optional comment, then the definition verbatim
pub fn view_document(row: &ViewRow) -> SchemaDocument {
    let mut content = format!("View: {} (Schema: {})\n", row.view_name, row.view_schema);
    if !row.view_comment.is_empty() {
        content.push_str(&format!("Comment: {}\n", row.view_comment));
    }
    content.push_str(&format!("Definition:\n{}\n", row.view_definition));

    SchemaDocument {
        content: content.trim().to_string(),
        source_type: SourceType::View,
        schema_name: row.view_schema.clone(),
        object_name: row.view_name.clone(),
    }
}

/// Substitute the placeholder document when nothing was extracted
pub fn with_placeholder(documents: Vec<SchemaDocument>) -> Vec<SchemaDocument> {
    if documents.is_empty() {
        warn!("No schema documents were extracted; substituting a placeholder document");
        vec![SchemaDocument::placeholder()]
    } else {
        documents
    }
}

/// Combine the outcomes of the table and view steps.
///
/// A failed step is logged and contributes no documents; the other step's
/// documents are kept.
pub fn collect_documents(
    tables: Result<Vec<ColumnRow>>,
    views: Result<Vec<ViewRow>>,
) -> Vec<SchemaDocument> {
    let mut documents = Vec::new();

    match tables {
        Ok(rows) => {
            let tables = table_documents(rows);
            info!("Successfully extracted metadata for {} tables", tables.len());
            documents.extend(tables);
        }
        Err(e) => error!("Error extracting table/column metadata: {}", e),
    }

    match views {
        Ok(rows) => {
            info!("Successfully extracted metadata for {} views", rows.len());
            documents.extend(rows.iter().map(view_document));
        }
        Err(e) => error!("Error extracting view metadata: {}", e),
    }

    documents
}

/// Anything that can produce the current set of schema documents
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn extract(&self) -> Result<Vec<SchemaDocument>>;
}

/// Extracts schema documents from a PostgreSQL database
pub struct SchemaExtractor {
    pool: PgPool,
}

impl SchemaExtractor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaSource for SchemaExtractor {
    async fn extract(&self) -> Result<Vec<SchemaDocument>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| Error::Connection(format!("Failed to connect to database: {}", e)))?;
        info!("Successfully connected to the database");

        info!("Extracting table and column metadata...");
        let tables = sqlx::query_as::<_, ColumnRow>(queries::TABLE_COLUMNS_SQL)
            .fetch_all(&mut *conn)
            .await
            .map_err(Error::from);

        info!("Extracting view metadata...");
        let views = sqlx::query_as::<_, ViewRow>(queries::VIEWS_SQL)
            .fetch_all(&mut *conn)
            .await
            .map_err(Error::from);

        let documents = collect_documents(tables, views);
        info!("Total documents created: {}", documents.len());
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(schema: &str, table: &str, name: &str, ty: &str, comment: &str) -> ColumnRow {
        ColumnRow {
            table_schema: schema.to_string(),
            table_name: table.to_string(),
            column_name: name.to_string(),
            data_type: ty.to_string(),
            column_comment: comment.to_string(),
            table_comment: if table == "contracts" {
                "Stores information about sales contracts.".to_string()
            } else {
                String::new()
            },
        }
    }

    #[test]
    fn test_table_documents_group_and_render() {
        let rows = vec![
            column("public", "invoices", "invoice_id", "integer", ""),
            column("public", "invoices", "amount", "numeric", "The total amount of the invoice."),
            column("sales", "contracts", "contract_id", "integer", "Unique identifier for the contract."),
            column("sales", "contracts", "status", "character varying", ""),
        ];

        let docs = table_documents(rows);
        assert_eq!(docs.len(), 2);

        let contracts = docs.iter().find(|d| d.object_name == "contracts").unwrap();
        assert_eq!(contracts.schema_name, "sales");
        assert_eq!(contracts.source_type, SourceType::Table);
        assert_eq!(
            contracts.content,
            "Table: contracts (Schema: sales)\n\
             Comment: Stores information about sales contracts.\n\
             Columns:\n  \
             - contract_id (integer): Unique identifier for the contract.\n  \
             - status (character varying)"
        );

        let invoices = docs.iter().find(|d| d.object_name == "invoices").unwrap();
        assert!(!invoices.content.contains("Comment:"));
        let id_pos = invoices.content.find("invoice_id").unwrap();
        let amount_pos = invoices.content.find("amount").unwrap();
        assert!(id_pos < amount_pos, "columns keep declared order");
    }

    #[test]
    fn test_one_document_per_object() {
        let mut rows = Vec::new();
        for table in ["a", "b", "c"] {
            for col in ["x", "y"] {
                rows.push(column("s", table, col, "text", ""));
            }
        }
        let views = [ViewRow {
            view_schema: "s".to_string(),
            view_name: "v".to_string(),
            view_definition: "SELECT x FROM s.a;".to_string(),
            view_comment: String::new(),
        }];

        let mut docs = table_documents(rows);
        docs.extend(views.iter().map(view_document));

        assert_eq!(docs.len(), 4);
        for doc in &docs {
            assert!(doc.content.contains(&doc.object_name));
            assert!(doc.content.contains(&format!("(Schema: {})", doc.schema_name)));
        }
    }

    #[test]
    fn test_view_document_keeps_definition_verbatim() {
        let row = ViewRow {
            view_schema: "sales".to_string(),
            view_name: "active_contracts_view".to_string(),
            view_definition: " SELECT contract_id\n   FROM sales.contracts\n  WHERE status = 'Active';"
                .to_string(),
            view_comment: "A view showing currently active contracts.".to_string(),
        };

        let doc = view_document(&row);
        assert_eq!(doc.source_type, SourceType::View);
        assert!(doc.content.starts_with("View: active_contracts_view (Schema: sales)\n"));
        assert!(doc.content.contains("Comment: A view showing currently active contracts.\n"));
        assert!(doc
            .content
            .ends_with("Definition:\n SELECT contract_id\n   FROM sales.contracts\n  WHERE status = 'Active';"));
    }

    fn active_view() -> ViewRow {
        ViewRow {
            view_schema: "sales".to_string(),
            view_name: "active_contracts_view".to_string(),
            view_definition: "SELECT contract_id FROM sales.contracts WHERE status = 'Active';"
                .to_string(),
            view_comment: String::new(),
        }
    }

    fn failed_step() -> Error {
        Error::Database(sqlx::Error::Protocol("permission denied".to_string()))
    }

    #[test]
    fn test_table_step_failure_keeps_views() {
        let docs = collect_documents(Err(failed_step()), Ok(vec![active_view()]));
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source_type, SourceType::View);
    }

    #[test]
    fn test_view_step_failure_keeps_tables() {
        let rows = vec![
            column("sales", "contracts", "status", "text", ""),
            column("public", "invoices", "amount", "numeric", ""),
        ];
        let docs = collect_documents(Ok(rows), Err(failed_step()));
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.source_type == SourceType::Table));
    }

    #[test]
    fn test_both_steps_failing_falls_back_to_placeholder() {
        let docs = collect_documents(Err(failed_step()), Err(failed_step()));
        assert!(docs.is_empty());

        let docs = with_placeholder(docs);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source_type, SourceType::Placeholder);
    }

    #[tokio::test]
    async fn test_unreachable_database_is_connection_error() {
        let options = sqlx::postgres::PgConnectOptions::new()
            .host("127.0.0.1")
            .port(1)
            .username("user")
            .database("ragdb");
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(500))
            .connect_lazy_with(options);

        let err = SchemaExtractor::new(pool).extract().await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert!(err.is_connection());
    }

    #[test]
    fn test_placeholder_substitution() {
        let docs = with_placeholder(Vec::new());
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source_type, SourceType::Placeholder);
        assert!(!docs[0].content.is_empty());

        let real = table_documents(vec![column("s", "t", "c", "text", "")]);
        let kept = with_placeholder(real.clone());
        assert_eq!(kept, real);
    }

    #[test]
    fn test_identity_ignores_content() {
        let mut doc = table_documents(vec![column("sales", "contracts", "status", "text", "")])
            .remove(0);
        let identity = doc.identity();
        let hash = doc.content_hash();

        doc.content.push_str("\n  - signed_date (date)");
        assert_eq!(doc.identity(), identity);
        assert_ne!(doc.content_hash(), hash);
        assert_eq!(identity, "table:sales.contracts");
        assert_eq!(SchemaDocument::placeholder().identity(), "placeholder");
    }

    #[test]
    fn test_source_type_round_trip() {
        for kind in [SourceType::Table, SourceType::View, SourceType::Placeholder] {
            assert_eq!(kind.to_string().parse::<SourceType>().unwrap(), kind);
        }
        assert!("index".parse::<SourceType>().is_err());
    }
}
