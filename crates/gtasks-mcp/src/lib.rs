//! gtasks MCP server library.
//!
//! Provides the [`GTasksMcpServer`](server::GTasksMcpServer) handler, tool parameter types
//! and the `--auth` verification report. Used by the `gtasks-mcp` binary and available
//! for integration testing.

pub mod server;
pub mod tools;
pub mod verify;
