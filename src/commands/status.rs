//! Vector index administration and status

use super::PipelineContext;
use crate::embed::embed_one;
use crate::error::Result;
use crate::meta::GlobalStats;
use crate::store::{IndexHandle, IndexStats};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub vector_backend: String,
    pub index_name: String,
    pub embedding_model: String,
    pub index_reachable: bool,
    pub index_exists: bool,
    pub index_dimension: usize,
    pub index_points: u64,
    pub db_stats: GlobalStats,
}

/// Create the shared index, probing the model for its dimension when unset
pub async fn cmd_db_init(ctx: &PipelineContext) -> Result<IndexHandle> {
    let dimension = match ctx.config.embedding.dimension {
        Some(dimension) => dimension,
        None => {
            debug!("Probing embedding model for its dimension");
            embed_one(ctx.embedder.as_ref(), "dimension probe").await?.len()
        }
    };

    let handle = ctx
        .index
        .ensure_index(&ctx.config.vector.index_name, dimension)
        .await?;
    info!(index = %handle.name, dimension = handle.dimension, "Vector index ready");
    Ok(handle)
}

/// Get system status
pub async fn cmd_db_status(ctx: &PipelineContext) -> Result<StatusInfo> {
    info!("Getting status");

    let db_stats = ctx.db.get_global_stats().await?;

    let (index_reachable, stats) = match ctx.index.stats(&ctx.config.vector.index_name).await {
        Ok(stats) => (true, stats),
        Err(e) => {
            debug!("Vector index status error: {:?}", e);
            (false, None)
        }
    };
    let IndexStatsSummary {
        exists,
        dimension,
        points,
    } = IndexStatsSummary::from(stats);

    Ok(StatusInfo {
        config_path: ctx.config.paths.config_file.display().to_string(),
        db_path: ctx.config.paths.db_file.display().to_string(),
        vector_backend: ctx.config.vector.backend.clone(),
        index_name: ctx.config.vector.index_name.clone(),
        embedding_model: ctx.embedder.model_name().to_string(),
        index_reachable,
        index_exists: exists,
        index_dimension: dimension,
        index_points: points,
        db_stats,
    })
}

struct IndexStatsSummary {
    exists: bool,
    dimension: usize,
    points: u64,
}

impl From<Option<IndexStats>> for IndexStatsSummary {
    fn from(stats: Option<IndexStats>) -> Self {
        match stats {
            Some(s) => Self {
                exists: true,
                dimension: s.dimension,
                points: s.points_count,
            },
            None => Self {
                exists: false,
                dimension: 0,
                points: 0,
            },
        }
    }
}

/// Print status information to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 clauserag Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("\nVector index ({}):", status.vector_backend);
    println!("  Name: {}", status.index_name);

    let index_status = if status.index_reachable {
        if status.index_exists {
            "✓ Ready"
        } else {
            "⚠ Reachable (index not created - run 'clauserag db init' or ingest a document)"
        }
    } else {
        "✗ Not reachable"
    };
    println!("  Status: {}", index_status);
    println!("  Dimension: {}", status.index_dimension);
    println!("  Points: {}", status.index_points);
    println!("\nEmbedding Model: {}", status.embedding_model);
    println!("\nDatabase Stats:");
    println!("  Documents: {}", status.db_stats.document_count);
    println!("  Chunks: {}", status.db_stats.chunk_count);
    println!("  Queries logged: {}", status.db_stats.query_count);
}
