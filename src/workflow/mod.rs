pub mod job_ctx;
pub mod summarize_flow;
pub mod topic_flow;

pub use job_ctx::JobCtx;
pub use summarize_flow::{build_category_summary, SummarizeFlow};
pub use topic_flow::summarize_topics;
