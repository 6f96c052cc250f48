pub mod deploy;
pub mod plans;
