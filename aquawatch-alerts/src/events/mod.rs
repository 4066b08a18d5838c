pub mod pipeline;
pub mod publisher;
pub mod subscriber;

pub use pipeline::AlertPipeline;
