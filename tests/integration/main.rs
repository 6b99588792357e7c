//! Integration tests for rx-harvest
//!
//! These tests use wiremock to stand in for the catalog sites and drive the
//! full scrape cycle and the control API end-to-end.

mod api_tests;
mod common;
mod scrape_tests;
