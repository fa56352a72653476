//! Integration tests for the skillopt-rs library
//!
//! This module organizes all integration tests that test the library as a whole,
//! rather than individual components.

// Estimation on simulated data
pub mod estimation;

// Specifications and constraints read from files
pub mod files;
