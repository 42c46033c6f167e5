pub mod scenarios;
pub mod solve;
pub mod validate;
