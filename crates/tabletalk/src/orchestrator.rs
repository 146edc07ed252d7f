//! The question pipeline and the operator loop around it.
//!
//! One question flows Router -> (Synthesizer -> Executor) -> Explainer, with
//! the route alone deciding which stages run:
//!
//! ```text
//! AwaitingQuestion -> Routing -> SQL_QUERY    -> Synthesizing -> Executing -> Explaining
//!                             -> DATA_EXPLAIN -> Explaining (no-query context)
//!                             -> OTHER        -> Rejected
//!                  <- (every branch, and every error, returns here)
//! ```
//!
//! [`Orchestrator::answer`] takes `&self` and shares the catalog through an
//! `Arc`, so several questions may be answered concurrently. The catalog is
//! only replaced by [`Orchestrator::refresh_catalog`], which needs `&mut self`.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tabletalk_db::QueryStore;
use tabletalk_llm::{LlmError, LlmProvider};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, info_span, warn, Instrument, Span};

use crate::catalog::{CatalogBuilder, SchemaCatalog};
use crate::error::{CatalogError, TurnError};
use crate::executor::{self, ExecutionPolicy, QueryResult};
use crate::explainer::{self, ExplainContext};
use crate::output::render_table;
use crate::router::{self, Route};
use crate::synthesizer::{self, CandidateQuery};

/// Reply for questions that are not about the database.
pub const REJECTION_MESSAGE: &str =
    "Sorry, I can only answer questions about the data in this database.";

/// Rows shown in the `--show-sql` result table.
const DISPLAY_ROW_LIMIT: usize = 20;

/// Pipeline stage, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Routing,
    Synthesizing,
    Executing,
    Explaining,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Routing => "routing",
            Stage::Synthesizing => "synthesizing",
            Stage::Executing => "executing",
            Stage::Explaining => "explaining",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Deadline for each generation call
    pub generation_timeout: Option<Duration>,
    /// Result rows shown to the explainer
    pub context_row_limit: usize,
    pub policy: ExecutionPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            generation_timeout: None,
            context_row_limit: 50,
            policy: ExecutionPolicy::default(),
        }
    }
}

/// Everything produced for one question.
#[derive(Debug, Clone)]
pub struct Answer {
    pub route: Route,
    /// Present only on the SQL_QUERY route
    pub query: Option<CandidateQuery>,
    pub result: Option<QueryResult>,
    /// The explanation, or the rejection message
    pub text: String,
}

/// Drives questions through the pipeline.
pub struct Orchestrator {
    store: Arc<dyn QueryStore>,
    llm: Arc<dyn LlmProvider>,
    catalog: Arc<SchemaCatalog>,
    builder: CatalogBuilder,
    settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn QueryStore>,
        llm: Arc<dyn LlmProvider>,
        catalog: SchemaCatalog,
    ) -> Self {
        Self {
            store,
            llm,
            catalog: Arc::new(catalog),
            builder: CatalogBuilder::default(),
            settings: PipelineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Builder used by [`Self::refresh_catalog`].
    pub fn with_catalog_builder(mut self, builder: CatalogBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn catalog(&self) -> Arc<SchemaCatalog> {
        Arc::clone(&self.catalog)
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Rebuild the catalog from the store. On failure the current one stays.
    pub async fn refresh_catalog(&mut self) -> Result<Arc<SchemaCatalog>, CatalogError> {
        let catalog = self.builder.build(self.store.as_ref()).await?;
        self.catalog = Arc::new(catalog);
        Ok(self.catalog())
    }

    /// Answer one question.
    pub async fn answer(&self, question: &str) -> Result<Answer, TurnError> {
        let span = info_span!("question", route = tracing::field::Empty);
        self.answer_inner(question).instrument(span).await
    }

    async fn answer_inner(&self, question: &str) -> Result<Answer, TurnError> {
        let start = Instant::now();
        // Pin this question to the catalog as it is now.
        let catalog = self.catalog();
        let limit = self.settings.generation_timeout;

        let route = router::classify(self.llm.as_ref(), &catalog, question, limit)
            .await
            .map_err(|e| TurnError::new(Stage::Routing, e))?;
        Span::current().record("route", route.as_str());

        let answer = match route {
            Route::Other => Answer {
                route,
                query: None,
                result: None,
                text: REJECTION_MESSAGE.to_string(),
            },
            Route::DataExplain => {
                let text = self.explain(ExplainContext::NoQuery, question).await?;
                Answer {
                    route,
                    query: None,
                    result: None,
                    text,
                }
            }
            Route::SqlQuery => {
                let query = synthesizer::synthesize(
                    self.llm.as_ref(),
                    &catalog,
                    self.store.dialect(),
                    question,
                    limit,
                )
                .await
                .map_err(|e| TurnError::new(Stage::Synthesizing, e))?;

                let result =
                    executor::execute(self.store.as_ref(), &query.sanitized, self.settings.policy)
                        .await;
                info!(
                    stage = %Stage::Executing,
                    success = result.is_success(),
                    rows = result.row_count(),
                    "Query executed"
                );

                let text = self.explain(ExplainContext::Query(&result), question).await?;
                Answer {
                    route,
                    query: Some(query),
                    result: Some(result),
                    text,
                }
            }
        };

        info!(
            route = %answer.route,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Question answered"
        );
        Ok(answer)
    }

    async fn explain(&self, context: ExplainContext<'_>, question: &str) -> Result<String, TurnError> {
        let rendered = context.render(self.settings.context_row_limit);
        explainer::explain(
            self.llm.as_ref(),
            &rendered,
            question,
            self.settings.generation_timeout,
        )
        .await
        .map_err(|e: LlmError| TurnError::new(Stage::Explaining, e))
    }

    /// Read questions line by line until `exit`, `quit` or end of input.
    pub async fn run_session<R, W>(
        &mut self,
        input: R,
        mut output: W,
        options: SessionOptions,
    ) -> io::Result<SessionSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut summary = SessionSummary::default();

        loop {
            output.write_all(b"> ").await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };

            match OperatorInput::parse(&line) {
                OperatorInput::Blank => continue,
                OperatorInput::Exit => break,
                OperatorInput::Schema => {
                    let catalog = self.catalog();
                    if catalog.is_empty() {
                        emit(&mut output, "(no tables)").await?;
                    } else {
                        emit(&mut output, catalog.rendered_text().trim_end()).await?;
                    }
                }
                OperatorInput::Refresh => match self.refresh_catalog().await {
                    Ok(catalog) => {
                        let line = format!("Schema refreshed: {} tables", catalog.tables().len());
                        emit(&mut output, &line).await?;
                    }
                    Err(e) => {
                        warn!(error = %e, "Catalog refresh failed; keeping previous catalog");
                        summary.errors += 1;
                        emit(&mut output, &format!("Error: catalog refresh failed: {}", e)).await?;
                    }
                },
                OperatorInput::Question(question) => {
                    summary.questions += 1;
                    match self.answer(question).await {
                        Ok(answer) => {
                            if answer.route == Route::Other {
                                summary.rejected += 1;
                            } else {
                                summary.answered += 1;
                            }
                            write_answer(&mut output, &answer, options).await?;
                        }
                        Err(e) => {
                            warn!(stage = %e.stage, error = %e.source, "Question failed");
                            summary.errors += 1;
                            emit(&mut output, &format!("Error: {}", e)).await?;
                        }
                    }
                }
            }
        }

        info!(
            questions = summary.questions,
            answered = summary.answered,
            rejected = summary.rejected,
            errors = summary.errors,
            "Session ended"
        );
        Ok(summary)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// Print the sanitized query and its result table before the answer
    pub show_sql: bool,
}

/// Counters logged when a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub questions: usize,
    pub answered: usize,
    pub rejected: usize,
    pub errors: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum OperatorInput<'a> {
    Blank,
    Exit,
    Schema,
    Refresh,
    Question(&'a str),
}

impl<'a> OperatorInput<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            OperatorInput::Blank
        } else if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            OperatorInput::Exit
        } else if line == ":schema" {
            OperatorInput::Schema
        } else if line == ":refresh" {
            OperatorInput::Refresh
        } else {
            OperatorInput::Question(line)
        }
    }
}

async fn emit<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> io::Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}

async fn write_answer<W: AsyncWrite + Unpin>(
    output: &mut W,
    answer: &Answer,
    options: SessionOptions,
) -> io::Result<()> {
    emit(output, &format!("Route: {}", answer.route)).await?;

    if options.show_sql {
        if let Some(query) = &answer.query {
            emit(output, &format!("SQL: {}", query.sanitized)).await?;
        }
        if let Some(QueryResult::Success { columns, rows }) = &answer.result {
            emit(output, &render_table(columns, rows, DISPLAY_ROW_LIMIT)).await?;
        }
    }

    emit(output, answer.text.trim_end()).await
}
