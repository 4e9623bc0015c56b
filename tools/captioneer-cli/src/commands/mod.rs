pub mod check;
pub mod init;
pub mod probe;
pub mod render;
pub mod segment;
pub mod validate;
