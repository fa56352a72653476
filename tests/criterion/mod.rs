//! Criterion function tests

mod consistency_tests;
mod gradient_tests;
