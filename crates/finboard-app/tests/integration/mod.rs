//! Integration tests for finboard.
//!
//! These tests run components against a local WebSocket server:
//! - Stream client lifecycle and reconnect policy
//! - Stream-mode widget subscriptions

pub mod common;
