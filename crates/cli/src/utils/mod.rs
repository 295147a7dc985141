pub mod display;
pub mod reader;
