//! Trackroom Database Layer
//!
//! Access to the `songs` table for the preview pipeline. The table is owned by the
//! wider application; this crate only writes the media columns and scans for songs
//! whose media is missing.

pub mod db;
pub mod song_store;

pub use db::pool::create_pool;
pub use db::songs::SongRepository;
pub use song_store::SongMediaStore;
