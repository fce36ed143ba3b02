pub mod execute;
pub mod log;
pub mod policy;
