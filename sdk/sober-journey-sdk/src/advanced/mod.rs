pub mod history;
pub mod mutation;
