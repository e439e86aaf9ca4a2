pub mod cascade;
pub mod results;
pub mod resultfiles;
pub mod pipeline_results;
