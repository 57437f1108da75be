/// Report and per-day result export.
pub mod export;
/// Reading loaders.
pub mod readings;
