//! Command line front-end for prelude injection.

pub mod commands;
