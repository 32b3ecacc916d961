//! Dual-Store Writer (C4): the relational master and the search index it
//! projects onto (spec §4.4). The two stores are written by the ingest
//! pipeline in the mandatory order — relational, then search — so that a
//! search-write failure can be classified and nacked without losing the
//! already-durable relational record (spec §4.4, "Ordering guarantee").

pub mod relational;
pub mod search_index;
