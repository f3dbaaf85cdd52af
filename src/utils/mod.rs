pub mod helper;
pub mod shutdown;
