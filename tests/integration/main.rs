//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host with no device
//! attached.

mod care_service_tests;
mod json_store_tests;
mod mock_hw;
