pub mod context;
pub mod decision_engine;
pub mod policy;
pub mod registry;
pub mod transform_engine;

pub use context::RequestContext;
pub use decision_engine::DecisionEngine;
pub use policy::{Capabilities, PolicyModule};
pub use registry::Registry;
pub use transform_engine::{ResponseOutcome, TransformEngine};
