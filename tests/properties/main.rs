//! Property-based test suite entry point.

mod ranking_props;
mod strategy_props;
mod taily_props;
