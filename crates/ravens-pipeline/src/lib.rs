pub mod compose;
pub mod error;
pub mod fanout;
pub mod jacobian;
pub mod pipeline;
pub mod projection;
pub mod resample;

pub use compose::ComposedTransform;
pub use error::{PipelineError, Result};
pub use fanout::FanoutOptions;
pub use pipeline::{PipelineConfig, PipelineReport, RavensPipeline};
pub use projection::{build_projection_chain, map_to_subject, project_map};
