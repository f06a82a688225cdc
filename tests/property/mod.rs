//! Property-based tests for the physical-layer monitor.
//!
//! Run with: cargo test --test property_tests
//!
//! These tests use proptest to drive the monitor with random sequences of
//! requests and transport completions and verify that its invariants hold.
