//! clauserag - clause retrieval over uploaded policy documents
//!
//! This crate provides:
//! - Ingestion of stored files into per-user namespaces of a shared vector index
//! - Reindexing and deletion that keep chunk rows and vectors in step
//! - Question answering grounded in the nearest clauses, with cited sources
//! - An authenticated HTTP API and a CLI over the same operations

pub mod api;
pub mod auth;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod embed;
pub mod embedding_backend;
pub mod error;
pub mod extract;
pub mod meta;
pub mod storage;
pub mod store;
pub mod synth;

pub use config::Config;
pub use error::{Error, Result};
