//! SQLite-vec extension loader.
//!
//! Holds the only unsafe code in the crate: registering sqlite-vec so that
//! `vec_distance_cosine` is available to every connection the record store opens.

use std::sync::Once;

use rusqlite::ffi::{sqlite3, sqlite3_api_routines, sqlite3_auto_extension};
use sqlite_vec::sqlite3_vec_init;

type SqliteExtensionFn =
    unsafe extern "C" fn(*mut sqlite3, *mut *mut i8, *const sqlite3_api_routines) -> i32;

static REGISTER: Once = Once::new();

/// Register the sqlite-vec extension for all future connections.
///
/// Must run before [`SqliteMemoryStore::new`](super::SqliteMemoryStore::new).
/// Repeated calls are no-ops.
#[allow(unsafe_code)]
pub fn init_sqlite_vec_extension() {
    REGISTER.call_once(|| {
        // SAFETY: sqlite3_auto_extension is a stable SQLite API that registers an
        // entry point run for each new connection; sqlite3_vec_init has exactly
        // the extension entry-point ABI expected by SQLite.
        unsafe {
            sqlite3_auto_extension(Some(std::mem::transmute::<*const (), SqliteExtensionFn>(
                sqlite3_vec_init as *const (),
            )));
        }
    });
}
