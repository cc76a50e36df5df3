//! sqlrag: natural-language querying over PostgreSQL
//!
//! Schema documents are extracted from the live database and embedded into a
//! vector store. Each question retrieves the closest schema documents and
//! hands them, framed as context, to a tool-using SQL agent that writes and
//! runs the query and explains the result.

pub mod agent;
pub mod api_client;
pub mod app;
pub mod config;
pub mod db;
pub mod embed;
pub mod error;
pub mod index;
pub mod llm;
pub mod pipeline;
pub mod retrieve;
pub mod schema;
pub mod server;
pub mod startup;
pub mod store;

pub use app::AppContext;
pub use config::Config;
pub use error::{Error, Result};
