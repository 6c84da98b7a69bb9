pub mod cli;
pub mod commands;
pub mod eval;
pub mod mapping;
pub mod stats;
pub mod utils;
pub mod vcf;
