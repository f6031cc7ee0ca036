pub mod engine;
pub mod transitions;

pub use engine::WorkflowEngine;
pub use transitions::{allowed_roles, plan_transition, TransitionPlan, WorkflowAction};
