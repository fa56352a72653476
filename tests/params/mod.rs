//! Parameter table tests

mod table_tests;
mod template_tests;
