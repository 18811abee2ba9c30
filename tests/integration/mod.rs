//! Shared fixtures for tests that talk to a mock upstream.

pub mod mock_server;
