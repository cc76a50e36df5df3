//! Introspection queries for schema extraction
//!
//! Both queries cast identifier columns to `text` so they decode as `String`
//! regardless of the `information_schema` domain types.

/// Columns of every non-system base table with table- and column-level
/// comments, in declared column order.
pub const TABLE_COLUMNS_SQL: &str = "
SELECT
    c.table_schema::text AS table_schema,
    c.table_name::text AS table_name,
    c.column_name::text AS column_name,
    c.data_type::text AS data_type,
    COALESCE(col_description(format('%I.%I', c.table_schema, c.table_name)::regclass, c.ordinal_position::int), '') AS column_comment,
    COALESCE(obj_description(format('%I.%I', c.table_schema, c.table_name)::regclass, 'pg_class'), '') AS table_comment
FROM information_schema.columns c
JOIN information_schema.tables t
    ON t.table_schema = c.table_schema AND t.table_name = c.table_name
WHERE t.table_type = 'BASE TABLE'
  AND c.table_schema NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
  AND c.table_schema NOT LIKE 'pg_temp_%'
  AND c.table_schema NOT LIKE 'pg_toast_temp_%'
ORDER BY c.table_schema, c.table_name, c.ordinal_position
";

/// Definition text and comment of every non-system view.
pub const VIEWS_SQL: &str = "
SELECT
    v.table_schema::text AS view_schema,
    v.table_name::text AS view_name,
    COALESCE(v.view_definition, '')::text AS view_definition,
    COALESCE(obj_description(format('%I.%I', v.table_schema, v.table_name)::regclass, 'pg_class'), '') AS view_comment
FROM information_schema.views v
WHERE v.table_schema NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
  AND v.table_schema NOT LIKE 'pg_temp_%'
  AND v.table_schema NOT LIKE 'pg_toast_temp_%'
ORDER BY v.table_schema, v.table_name
";
