//! MCP tool inputs for the gateway.
//!
//! This module contains the input types of the MCP tools that expose
//! GLPI operations.

mod inputs;

pub use inputs::*;
