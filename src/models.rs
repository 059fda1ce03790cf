mod case_style;
mod model_descriptor;
mod tag;

pub use case_style::CaseStyle;
pub use model_descriptor::{
    CostEstimate, ESTIMATED_OUTPUT_TOKENS, ModelDescriptor, ModelFeature, builtin_models,
    find_model,
};
pub use tag::{Tag, TagError};
