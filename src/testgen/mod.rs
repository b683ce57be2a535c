pub mod assemble;
pub mod candidate;
pub mod improve;
pub mod report;
pub mod review;
pub mod runner;
pub mod suggest;
pub mod write;
