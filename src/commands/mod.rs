//! Command Handlers Module
//!
//! This module contains handlers for all CLI subcommands.

pub mod catalog;
pub mod simulate;
