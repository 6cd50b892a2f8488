pub mod states;
pub mod params;
pub mod engine;
pub mod forces;
pub mod integrator;
pub mod periodic;
pub mod initial_condition;
