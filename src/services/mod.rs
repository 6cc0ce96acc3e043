pub mod review;
pub mod scoring_service;

pub use review::{AnyAuthenticatedReviewer, ReviewPolicy, ReviewService, ReviewerAllowList};
pub use scoring_service::{ScoringService, Submission, SubmissionEnvelope, SubmissionRequest};
