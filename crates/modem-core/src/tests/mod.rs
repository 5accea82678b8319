//! Cross-module test suites for the call engine.

pub mod support;
