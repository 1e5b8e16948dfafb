pub mod ai;
pub mod extraction;
pub mod prompts;
pub mod selection;
