//! Kernel Unit Tests Module
//!
//! Scenario tests that drive a whole process table through the mock
//! platform.


mod scheduler_tests;
