//! Generates a benign file that carries the string and byte signatures a
//! BRICKSTORM detection script keys on, for exercising that script.

pub mod error;
pub mod fixture;
pub mod layout;

pub use error::FixtureError;
pub use fixture::{build_fixture, Fixture, FixtureOptions, DEFAULT_FILENAME};
