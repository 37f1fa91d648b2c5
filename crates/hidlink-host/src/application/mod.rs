//! Application layer for the host driver.
//!
//! - **`script`** – Parses the line-based script language into commands.
//!   The CLI subcommands reuse its argument parsers.

pub mod script;
