//! Query command implementation

use super::PipelineContext;
use crate::embed::embed_one;
use crate::error::{Error, Result};
use crate::meta::{ChunkRow, QueryLog};
use crate::store::IndexMatch;
use crate::synth::{synthesize, ClauseContext, ClauseSource, Synthesis};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Query result for CLI and API display
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub synthesis: Synthesis,
    pub contexts: Vec<ClauseContext>,
    pub duration_ms: u64,
}

/// Summary line for `--json` CLI output
#[derive(Debug, Clone, Serialize)]
pub struct QuerySummary<'a> {
    pub query: &'a str,
    pub fallback: bool,
    pub match_count: usize,
    pub duration_ms: u64,
}

/// Answer a question from the caller's indexed clauses
pub async fn cmd_query(ctx: &PipelineContext, user_id: &str, query: &str) -> Result<QueryResult> {
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::BadRequest("Missing query".to_string()));
    }

    let start = Instant::now();
    info!(user_id, "Querying: {}", query);

    let vector = embed_one(ctx.embedder.as_ref(), query).await?;

    let matches = match ctx.index.open_index(&ctx.config.vector.index_name).await? {
        Some(handle) => {
            ctx.index
                .query(&handle, user_id, vector, ctx.config.query.top_k)
                .await?
        }
        None => {
            debug!("Vector index does not exist yet, no matches");
            Vec::new()
        }
    };
    debug!("Got {} matches from the vector index", matches.len());

    let contexts = resolve_contexts(ctx, user_id, &matches).await?;
    let synthesis = synthesize(ctx.synthesizer.as_ref(), query, &contexts).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    record_query(ctx, user_id, query, &synthesis, &contexts, duration_ms).await;

    info!(
        user_id,
        match_count = contexts.len(),
        fallback = synthesis.is_fallback(),
        duration_ms,
        "Query answered"
    );

    Ok(QueryResult {
        synthesis,
        contexts,
        duration_ms,
    })
}

/// Join matches to chunk rows by vector id, preserving match order
///
/// A match whose row is gone keeps its score with an empty snippet.
async fn resolve_contexts(
    ctx: &PipelineContext,
    user_id: &str,
    matches: &[IndexMatch],
) -> Result<Vec<ClauseContext>> {
    let ids: Vec<String> = matches.iter().map(|m| m.id.clone()).collect();
    let rows: HashMap<String, ChunkRow> = ctx
        .db
        .get_chunks_by_vector_ids(user_id, &ids)
        .await?
        .into_iter()
        .map(|row| (row.vector_id.clone(), row))
        .collect();

    let contexts = matches
        .iter()
        .map(|m| match rows.get(&m.id) {
            Some(row) => ClauseContext {
                snippet: row.content.clone(),
                score: m.score,
                source: ClauseSource {
                    document_id: Some(row.document_id.clone()),
                    filename: row.filename(),
                    chunk_index: Some(row.chunk_index),
                },
            },
            None => {
                debug!(vector_id = %m.id, "Match has no chunk row");
                ClauseContext {
                    snippet: String::new(),
                    score: m.score,
                    source: ClauseSource {
                        document_id: m.metadata.document_id().map(str::to_string),
                        filename: m.metadata.filename().map(str::to_string),
                        chunk_index: m.metadata.chunk_index().map(|i| i as i64),
                    },
                }
            }
        })
        .collect();

    Ok(contexts)
}

/// Append the audit row; failures are logged and swallowed
async fn record_query(
    ctx: &PipelineContext,
    user_id: &str,
    query: &str,
    synthesis: &Synthesis,
    contexts: &[ClauseContext],
    duration_ms: u64,
) {
    let log = match QueryLog::new(
        user_id,
        query,
        synthesis.answer(),
        &contexts,
        contexts.len(),
        duration_ms,
    ) {
        Ok(log) => log,
        Err(e) => {
            warn!(user_id, error = %e, "Failed to serialize query log");
            return;
        }
    };

    if let Err(e) = ctx.db.insert_query_log(&log).await {
        warn!(user_id, error = %e, "Failed to write query log");
    }
}

/// Print a query answer to console
pub fn print_query_result(result: &QueryResult) {
    let answer = result.synthesis.answer();

    println!("\n{}\n", answer.answer);
    println!("Covered: {}", if answer.covered { "yes" } else { "no" });

    if !answer.conditions.is_empty() {
        println!("\nConditions:");
        for condition in &answer.conditions {
            println!("  • {}", condition);
        }
    }

    if !answer.rationale.is_empty() {
        println!("\nRationale: {}", answer.rationale);
    }

    if result.synthesis.is_fallback() {
        println!("\n⚠ The model did not return a structured answer");
    }

    if !result.contexts.is_empty() {
        println!("\nSources:");
        for (i, ctx) in result.contexts.iter().enumerate() {
            println!(
                "  [{}] {} #{} (score {:.3})",
                i + 1,
                ctx.source.filename.as_deref().unwrap_or("unknown"),
                ctx.source
                    .chunk_index
                    .map(|i| i.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                ctx.score
            );
        }
    }

    println!("\n({} ms)", result.duration_ms);
}
