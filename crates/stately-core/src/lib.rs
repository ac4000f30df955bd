pub mod context;
pub mod errors;
pub mod ids;
pub mod match_result;
pub mod params;
pub mod pattern;
pub mod template;

pub use context::{Context, MATCH_DEDUP_WINDOW};
pub use errors::{ConfigurationError, PatternError, TemplateError};
pub use ids::RequestId;
pub use match_result::MatchResult;
pub use pattern::{BasicPatternEvaluator, PatternEvaluator};
pub use template::{serve_model, PlaceholderRenderer, TemplateRenderer};
