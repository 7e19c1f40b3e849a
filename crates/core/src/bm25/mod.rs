//! BM25 lexical retrieval: tokenizer, corpus statistics, and Okapi BM25 scoring.
//!
//! [`LexicalIndex::fit`] builds postings, document lengths, and per-term IDF over the
//! catalog's search text. [`bm25_search`] scores a query against those statistics.

/// Inverted index with per-term document frequency and IDF.
pub mod inverted_index;
/// Okapi BM25 top-k scoring.
pub mod scorer;
/// Lowercasing, punctuation-stripping whitespace tokenizer.
pub mod tokenizer;

pub use inverted_index::{Bm25Params, LexicalIndex, Posting};
pub use scorer::bm25_search;
pub use tokenizer::{tokenize, Tokens};
