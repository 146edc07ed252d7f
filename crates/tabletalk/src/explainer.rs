//! Turns a query outcome into a plain-language answer.

use std::time::Duration;
use tabletalk_llm::{generate_within, LlmError, LlmProvider};

use crate::executor::QueryResult;
use crate::prompts::{self, NO_QUERY_SENTINEL};

/// What the explainer gets to look at.
#[derive(Debug, Clone, Copy)]
pub enum ExplainContext<'a> {
    /// Outcome of the synthesized query, success or failure.
    Query(&'a QueryResult),
    /// The route needed no query.
    NoQuery,
}

impl ExplainContext<'_> {
    pub fn render(&self, row_limit: usize) -> String {
        match self {
            ExplainContext::Query(result) => result.render_context(row_limit),
            ExplainContext::NoQuery => NO_QUERY_SENTINEL.to_string(),
        }
    }
}

/// One generation call; the model's text is the answer, unmodified.
pub async fn explain(
    llm: &dyn LlmProvider,
    context: &str,
    question: &str,
    limit: Option<Duration>,
) -> Result<String, LlmError> {
    let prompt = prompts::explain_prompt(context, question);
    generate_within(llm, &prompt, limit).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabletalk_llm::mock::{CannedResponse, MockProvider};

    #[test]
    fn test_no_query_context_is_sentinel() {
        assert_eq!(
            ExplainContext::NoQuery.render(10),
            "No query was needed for this question."
        );
    }

    #[tokio::test]
    async fn test_explain_returns_model_text_untouched() {
        let llm = MockProvider::with_responses(vec![CannedResponse::text(
            "  The average balance is 8421.50.\n",
        )]);

        let failure = QueryResult::failure("no such table: nosuchtable");
        let context = ExplainContext::Query(&failure).render(10);
        let text = explain(&llm, &context, "What is the average balance?", None)
            .await
            .unwrap();

        assert_eq!(text, "  The average balance is 8421.50.\n");
        assert!(llm.received_prompts()[0].contains("no such table: nosuchtable"));
    }
}
