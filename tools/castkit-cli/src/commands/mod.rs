pub mod asset;
pub mod check;
pub mod context;
pub mod init;
pub mod probe;
pub mod render;
pub mod segment;
pub mod transcript;
