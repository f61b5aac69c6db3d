// --- Module Structure ---

// Core authorization components.
pub mod config;
pub mod evaluator;
pub mod gate;
pub mod guard;
pub mod subject;

// --- Public Re-exports ---

// Makes the core types easily accessible to host applications.
pub use config::{Grants, RoleConfig};
pub use evaluator::RoleEvaluator;
pub use gate::{AccessGate, AccessGateBuilder, FailureHandler, GateLayer, GateService};
pub use guard::{Guard, GuardService};
pub use subject::{CurrentSubject, FixedSubjectResolver, ResolverState, Subject, SubjectResolver};
