pub mod catalog;
pub mod config;
pub mod decode;
pub mod load;
pub mod pipeline;
pub mod resolve;
pub mod seed;
pub mod store;
pub mod verify;
