pub mod actions;
pub mod journey;
pub mod session;
pub mod state;
