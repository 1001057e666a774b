//! Store contracts and the record stores behind them.

pub mod memory_store;
pub mod sqlite_store;
pub mod sqlite_vec_loader;
pub mod vector_store;

pub use memory_store::InMemoryMemoryStore;
pub use sqlite_store::SqliteMemoryStore;
pub use sqlite_vec_loader::init_sqlite_vec_extension;
pub use vector_store::{
    MemoryRecordLookup, SpaceHit, StoreFuture, TimeHit, TimeOrder, VectorStore, cosine_similarity,
};
