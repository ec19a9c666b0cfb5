//! MCP presentation layer: tool handlers and the stdio server.
pub mod server;
pub mod tools;
