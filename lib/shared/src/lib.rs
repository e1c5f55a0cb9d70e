pub mod catalog;
pub mod discovery;
pub mod duplicates;
pub mod merge;
pub mod system;
