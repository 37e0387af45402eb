//! Host-side harness and integration tests for the Simon Says controller

pub mod host;




#[cfg(test)]
mod pin_tests;

#[cfg(test)]
mod host_tests;
