//! Services generated from the schema's `paths`.
//!
//! Operations are grouped by their first tag. Each operation's kind is
//! classified once from its operationId when the [`ServiceSpec`] is
//! described; bound [`Service`]s dispatch on that kind.

mod bound;
mod doc;
mod factory;
mod kind;

pub use bound::{
    EntityId, Invocation, Payload, Service, ServiceRegistry, action_body, build_services,
    prune_entity,
};
pub use doc::{OperationDoc, ParamDoc, ReturnDoc, describe_operation};
pub use factory::{
    OperationGroup, OperationSpec, ServiceSpec, describe_service, describe_services,
    operation_groups,
};
pub use kind::OperationKind;
