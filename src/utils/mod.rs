pub mod naming;
pub mod wait;
