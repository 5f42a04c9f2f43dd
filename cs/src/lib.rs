//! CorpusStore - vector store for the curriculum knowledge corpus
//!
//! Stores standards, policy and curriculum documents as uniformly embedded
//! units in a single SQLite table and ranks them by cosine similarity for
//! retrieval-augmented plan generation.
//!
//! # Contract
//!
//! - `upsert(doc)` - idempotent; content and embedding always change together
//! - `search(vector, filter, k)` - ranked hits, ties by ascending id
//! - `delete_by_type(doc_type)` - explicit re-seed only
//!
//! # Example
//!
//! ```ignore
//! use corpusstore::{CorpusStore, DocFilter, DocType};
//!
//! let store = CorpusStore::open("corpus.db", 1536)?;
//! store.upsert(&doc)?;
//! let hits = store.search(&query_vec, &DocFilter::new().with_doc_type(DocType::Standard), 6)?;
//! ```

pub mod cli;
pub mod config;
mod store;

pub use store::{
    CorpusDocument, CorpusStore, DocFilter, DocType, DocumentId, Result, SCORE_EPSILON, SearchHit,
    StoreError, StoreStats, cosine_similarity, decode_embedding, encode_embedding,
};

/// Default embedding dimension (text-embedding-3-small)
pub const DEFAULT_EMBEDDING_DIM: usize = 1536;
