//! Prompt text for the SQL agent

/// Framing of the user question with retrieved schema context
pub fn query_prompt(context: &str, question: &str) -> String {
    format!(
        "Based on the following potentially relevant schema information:\n\
         --- SCHEMA CONTEXT START ---\n{}\n--- SCHEMA CONTEXT END ---\n\n\
         User query: {}\n\n\
         Generate a SQL query to answer the user query. Then execute it and return the result. \
         If the query asks for something not answerable by SQL or the schema, explain why.",
        context, question
    )
}

/// System message: dialect, row limit, live catalog and ground rules
pub fn system_prompt(dialect: &str, top_k: usize, tables: &[String]) -> String {
    let catalog = if tables.is_empty() {
        "(no tables found)".to_string()
    } else {
        tables.join(", ")
    };

    format!(
        "You are an agent that answers questions by querying a {dialect} database.\n\
         For each question, write a syntactically correct {dialect} query, run it, look at the \
         result and answer from it.\n\
         Unless the user asks for a specific number of rows, limit every query to at most \
         {top_k} rows. Order by a relevant column when that makes the rows more useful.\n\
         Select only the columns the question needs, never every column of a table.\n\
         Use only the tools provided and base the answer only on what they return.\n\
         Check each query with sql_db_query_checker before running it. If a query fails, \
         rewrite it and try again.\n\
         Never issue DML or DDL (INSERT, UPDATE, DELETE, DROP and the like).\n\
         If the question has nothing to do with the database, say that it cannot be answered \
         from the available schema.\n\n\
         Tables in the database: {catalog}",
        dialect = dialect,
        top_k = top_k,
        catalog = catalog
    )
}

/// Instruction for the query checker tool
pub fn query_checker_prompt(dialect: &str, query: &str) -> String {
    format!(
        "{query}\n\
         Review the {dialect} query above for common mistakes:\n\
         - NOT IN against a subquery that can yield NULL\n\
         - UNION where UNION ALL was meant\n\
         - BETWEEN used for an exclusive range\n\
         - mismatched data types in predicates\n\
         - unquoted identifiers that need quoting\n\
         - wrong number of arguments to a function\n\
         - missing or wrong casts\n\
         - joins on the wrong columns\n\n\
         If any of these apply, rewrite the query. Otherwise reproduce it unchanged.\n\
         Reply with the final SQL query only.",
        query = query,
        dialect = dialect
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_prompt_embeds_context_and_question() {
        let prompt = query_prompt("Table: contracts (Schema: sales)", "How many active contracts?");
        assert!(prompt.starts_with("Based on the following potentially relevant schema information:"));
        assert!(prompt.contains(
            "--- SCHEMA CONTEXT START ---\nTable: contracts (Schema: sales)\n--- SCHEMA CONTEXT END ---"
        ));
        assert!(prompt.contains("User query: How many active contracts?"));
        assert!(prompt.ends_with("explain why."));
    }

    #[test]
    fn test_system_prompt_lists_catalog() {
        let prompt = system_prompt(
            "postgresql",
            10,
            &["sales.contracts".to_string(), "public.invoices".to_string()],
        );
        assert!(prompt.contains("postgresql"));
        assert!(prompt.contains("at most 10 rows"));
        assert!(prompt.ends_with("Tables in the database: sales.contracts, public.invoices"));
        assert!(system_prompt("postgresql", 5, &[]).contains("(no tables found)"));
    }
}
