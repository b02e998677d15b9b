pub mod ray_query;
pub mod rtx_pipeline;

pub use ray_query::RayQuery;
pub use rtx_pipeline::RtxPipeline;
