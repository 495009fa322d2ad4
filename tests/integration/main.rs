//! Integration test suite entry point.

mod catalog_tests;
mod rebuild_tests;
mod selection_tests;
