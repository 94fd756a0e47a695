use thiserror::Error;

use crate::types::EntityRef;

/// Errors that can occur while registering data types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The type was already registered; each type registers exactly once
    #[error("Data type '{type_name}' has already been registered")]
    AlreadyRegistered {
        type_name: &'static str,
    },

    /// The registry is full; id 0xFF stays reserved for the span sentinel
    #[error("Cannot register '{type_name}', the maximum of {max} data types has been reached")]
    RegistryFull {
        type_name: &'static str,
        max: usize,
    },

    /// A span length override of zero would make every span write fail
    #[error("Data type '{type_name}' was registered with a zero max span length")]
    InvalidSpanLength {
        type_name: &'static str,
    },
}

/// Errors that can occur while writing or reading entity data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    /// The data type was never registered
    #[error("Data type '{type_name}' is not registered")]
    NotRegistered {
        type_name: &'static str,
    },

    /// A span write exceeded the type's maximum element count
    #[error("Span of {len} '{type_name}' elements exceeds the maximum of {max}")]
    SpanTooLong {
        type_name: &'static str,
        len: usize,
        max: usize,
    },

    /// An entity accumulated more distinct records than the wire count field
    /// can carry; data loss must be loud, never a silent truncation
    #[error("Too many data records written ({count}), the limit is {limit}")]
    TooManyRecords {
        count: usize,
        limit: usize,
    },

    /// The referenced entity is null or no longer alive in the entity store
    #[error("Entity {entity} was not found or is no longer alive")]
    EntityNotFound {
        entity: EntityRef,
    },
}
