//! Command-line front end for vistream sessions.
//!
//! `vistream validate` checks a session config file offline and previews the
//! registration payload; `vistream run` drives a relay-source session and
//! prints each inference result as it arrives.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod output;
