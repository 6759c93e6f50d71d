pub mod benchmark;
pub mod results;
