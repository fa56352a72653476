//! Constraint tests

mod normalization_tests;
mod query_tests;
