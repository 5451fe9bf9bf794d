mod common;
mod end_to_end_tests;
mod error_tests;
mod lua_tests;
mod split_tests;
