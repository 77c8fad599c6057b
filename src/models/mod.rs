//! Data model for the opensift filtering funnel.
//!
//! All types here are request-scoped values with no persistence. They travel
//! through the pipeline in this order:
//!
//! user query -> [`criteria::CriteriaResult`] -> [`result::ResultItem`]
//! -> [`assessment::ValidationResult`] -> [`assessment::ScoredResult`]
//! -> [`response::SearchResponse`] / [`response::StreamEvent`]

pub mod assessment;
pub mod criteria;
pub mod document;
pub mod paper;
pub mod query;
pub mod response;
pub mod result;

pub use assessment::{
    AssessmentType, CriterionAssessment, Evidence, ResultClassification, ScoredResult,
    ValidationResult,
};
pub use criteria::{CriteriaResult, Criterion};
pub use document::{DocumentMetadata, StandardDocument};
pub use paper::PaperInfo;
pub use query::{BatchSearchRequest, SearchContext, SearchOptions, SearchRequest};
pub use response::{
    BatchSearchResponse, PlanResponse, RawVerifiedResult, SearchResponse, StreamEvent,
};
pub use result::ResultItem;
