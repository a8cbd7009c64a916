//! docqa - question answering over PDF documents
//!
//! Uploaded PDFs are extracted page by page, split into chunks and embedded
//! into a flat inner-product index whose positions line up one-to-one with a
//! metadata store. Questions run a coarse dense search followed by
//! cross-encoder reranking, behind a CLI and an HTTP API.

pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod evaluation;
pub mod extract;
pub mod index;
pub mod ingestion;
pub mod retrieval;
pub mod server;
pub mod service;
pub mod storage;

pub use error::{DocQaError, Result};
