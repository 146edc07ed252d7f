//! Prompt templates for the three generation calls of a question.

/// Explanation context when the route needed no query.
pub const NO_QUERY_SENTINEL: &str = "No query was needed for this question.";

pub fn route_prompt(schema: &str, question: &str) -> String {
    format!(
        "You are a router for a database assistant. The database has this schema:\n\
         \n\
         {schema}\n\
         Classify the user's question into exactly one category:\n\
         - SQL_QUERY: answering it requires retrieving data from the database.\n\
         - DATA_EXPLAIN: it asks what the data, tables or columns mean, answerable from the schema alone.\n\
         - OTHER: it is unrelated to this database.\n\
         \n\
         Question: {question}\n\
         \n\
         Respond with only the category name."
    )
}

pub fn synthesis_prompt(schema: &str, dialect: &str, question: &str) -> String {
    format!(
        "You write {dialect} queries. The database has this schema:\n\
         \n\
         {schema}\n\
         Write one {dialect} query that answers the question below. Use only the \
         tables and columns listed above.\n\
         \n\
         Question: {question}\n\
         \n\
         Return only the query text: no explanation, no markdown, no code fences."
    )
}

pub fn explain_prompt(context: &str, question: &str) -> String {
    format!(
        "A user asked a question about their database.\n\
         \n\
         Question: {question}\n\
         \n\
         Result:\n\
         {context}\n\
         \n\
         Answer the question in plain language using this result. Describe what the \
         result means for the user, not how it was produced. If the result is an \
         error, explain in plain terms why the question could not be answered."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_embed_inputs() {
        let route = route_prompt("Table: users\n - id (INTEGER)\n", "How many users?");
        assert!(route.contains("Table: users"));
        assert!(route.contains("Question: How many users?"));
        assert!(route.contains("SQL_QUERY"));

        let synth = synthesis_prompt("Table: users\n", "PostgreSQL", "How many users?");
        assert!(synth.contains("PostgreSQL query"));

        let explain = explain_prompt(NO_QUERY_SENTINEL, "What is a user?");
        assert!(explain.contains(NO_QUERY_SENTINEL));
    }
}
