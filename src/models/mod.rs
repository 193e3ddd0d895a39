pub mod chunk;
pub mod output;
pub mod status;
