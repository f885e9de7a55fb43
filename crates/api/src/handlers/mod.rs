pub mod jobs;
pub mod results;
