mod helpers;

mod basic_tests;
mod builtin_tests;
mod component_tests;
