//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises one subsystem against
//! the recording mocks in `mock_hw`. All tests run on the host with no
//! bus controller, receiver or cloud link required.

mod app_service_tests;
mod dispatcher_tests;
mod mock_hw;
