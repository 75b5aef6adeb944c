//! Operation kinds recognised in operationIds.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// What a generated service method does.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    PutFile,
    GetAdHocSchema,
    InvokeAction,
    PutEntity,
    GetById,
    GetList,
    Delete,
}

/// operationId markers in priority order; the first match wins.
const MARKERS: [(&str, OperationKind); 9] = [
    ("PutFile", OperationKind::PutFile),
    ("GetAdHocSchema", OperationKind::GetAdHocSchema),
    ("InvokeAction", OperationKind::InvokeAction),
    ("PutEntity", OperationKind::PutEntity),
    ("GetById", OperationKind::GetById),
    ("GetByKeys", OperationKind::GetById),
    ("GetList", OperationKind::GetList),
    ("DeleteById", OperationKind::Delete),
    ("DeleteByKeys", OperationKind::Delete),
];

impl OperationKind {
    /// Classifies an operationId, or `None` for unsupported operations.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use acumatica_client::service::OperationKind;
    ///
    /// assert_eq!(OperationKind::classify("Contact_GetById"), Some(OperationKind::GetById));
    /// assert_eq!(OperationKind::classify("Contact_Frobnicate"), None);
    /// ```
    pub fn classify(operation_id: &str) -> Option<Self> {
        MARKERS
            .iter()
            .find(|(marker, _)| operation_id.contains(marker))
            .map(|(_, kind)| *kind)
    }

    /// Kinds that accept OData query options.
    pub fn takes_options(self) -> bool {
        matches!(self, Self::GetList | Self::GetById | Self::PutEntity)
    }

    /// Short description of the arguments this kind expects.
    pub fn expected_arguments(self) -> &'static str {
        match self {
            Self::PutFile => "an entity id, file name and file bytes",
            Self::GetAdHocSchema => "no arguments",
            Self::InvokeAction => "an action invocation",
            Self::PutEntity => "an entity payload",
            Self::GetById => "an entity id",
            Self::GetList => "optional query options",
            Self::Delete => "an entity id",
        }
    }
}
