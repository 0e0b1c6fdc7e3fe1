pub mod category;
pub mod document;
pub mod job;
pub mod summary;

pub use category::Category;
pub use document::{AnalysisPayload, CitationGraph, ConnectedDocument, Document, TopicDescription};
pub use job::{
    JobRecord, SearchHandle, SearchMode, Stage, StageEntry, StageProgress, StageResults, StageStatus,
};
pub use summary::{CategorySummary, Entity, ExtractedEntity, SummaryResult, TopicSummary};
