//! # gtasks-core
//!
//! Workspace root. Hosts the end-to-end tests that drive the MCP server
//! over an in-memory transport against the mock backend, with credentials
//! persisted on disk.
//!
//! The functional crates are:
//! - `gtasks-client`: credential lifecycle, error taxonomy, task operations
//! - `gtasks-mcp`: the MCP server binary and library
//! - `gtasks-mock-backend`: in-memory backend used by tests
