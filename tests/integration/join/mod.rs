//! Join-sequence scenario tests

mod concurrency_test;
mod failure_paths_test;
mod full_join_test;
mod revert_test;
