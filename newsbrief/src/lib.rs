// Library interface for newsbrief modules
// This allows tests and the binaries to import modules

pub mod cache;
pub mod company;
pub mod dates;
pub mod display;
pub mod error;
pub mod fanout;
pub mod filter;
pub mod ingestion;
pub mod llm;
pub mod model;
pub mod pipeline;
pub mod redirect;
pub mod sanitize;
pub mod scraping;
