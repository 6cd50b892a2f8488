pub mod timer;
pub mod benchmark;
