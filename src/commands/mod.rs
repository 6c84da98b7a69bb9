pub mod annotate;
pub mod stats;
