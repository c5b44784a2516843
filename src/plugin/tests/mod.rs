//! Plugin System Tests
//!
//! Cross-module tests for discovery, the registry and boot, with spy plugins.


mod boot_tests;
