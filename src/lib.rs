pub mod engine;
pub mod parsers;
