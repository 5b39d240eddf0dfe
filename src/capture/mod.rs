pub mod classifier;
pub mod manager;
pub mod parser;
pub mod sink;
pub mod source;
