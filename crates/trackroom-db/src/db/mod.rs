pub mod pool;
pub mod songs;
