pub mod budget;
pub mod diff;
pub mod models;
pub mod prompts;
pub mod report;
pub mod reviewer;
