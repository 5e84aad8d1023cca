use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Identity of an experiment definition.
    ExperimentId
);
uuid_id!(
    /// Identity of a single persisted run record.
    RunId
);
uuid_id!(TaskTemplateId);
uuid_id!(SystemPromptId);
uuid_id!(
    /// Identity of an uploaded document whose chunks back RAG runs.
    DocumentId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(ExperimentId::new(), ExperimentId::new());
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn test_id_serializes_transparently() {
        let uuid = Uuid::new_v4();
        let id = DocumentId::from(uuid);

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));

        let back: DocumentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert_eq!(Uuid::from(back), uuid);
    }

    #[test]
    fn test_id_display_matches_uuid() {
        let id = ExperimentId::new();
        assert_eq!(id.to_string(), id.as_uuid().to_string());
    }
}
