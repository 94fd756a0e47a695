use std::any::TypeId;
use std::collections::HashMap;

use tether_cursor::Pod;

use crate::constants::MAX_DATA_TYPES;
use crate::data::data_type::DataTypeInfo;
use crate::data::error::RegistryError;

/// Builder for a [`DataRegistry`].
///
/// Registration order determines byte ids, so every peer must register the
/// same types in the same order. All validation happens here; the built
/// registry is immutable.
#[derive(Debug, Default)]
pub struct DataRegistryBuilder {
    infos: Vec<DataTypeInfo>,
    ids: HashMap<TypeId, u8>,
}

impl DataRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fixed-layout type with the default span cap.
    ///
    /// The `Pod` bound is the layout validation: any type that satisfies it
    /// has a stable byte representation with no padding surprises. A type
    /// with `size_of() == 0` registers as a payload-free marker.
    pub fn register<T: Pod + 'static>(&mut self) -> Result<&mut Self, RegistryError> {
        self.register_inner::<T>(None)
    }

    /// Registers a fixed-layout type with a per-type span length override.
    /// The override is still capped so an encoded span fits the wire format.
    pub fn register_with_span<T: Pod + 'static>(
        &mut self,
        max_span_len: usize,
    ) -> Result<&mut Self, RegistryError> {
        if max_span_len == 0 {
            return Err(RegistryError::InvalidSpanLength {
                type_name: std::any::type_name::<T>(),
            });
        }
        self.register_inner::<T>(Some(max_span_len))
    }

    fn register_inner<T: Pod + 'static>(
        &mut self,
        max_span_len: Option<usize>,
    ) -> Result<&mut Self, RegistryError> {
        let type_name = std::any::type_name::<T>();
        let type_id = TypeId::of::<T>();

        if self.ids.contains_key(&type_id) {
            return Err(RegistryError::AlreadyRegistered { type_name });
        }
        if self.infos.len() >= MAX_DATA_TYPES {
            return Err(RegistryError::RegistryFull {
                type_name,
                max: MAX_DATA_TYPES,
            });
        }

        let id = self.infos.len() as u8;
        let size = std::mem::size_of::<T>();
        self.infos.push(DataTypeInfo {
            id,
            size,
            max_span_len: DataTypeInfo::compute_max_span_len(size, max_span_len),
            type_name,
            type_id,
        });
        self.ids.insert(type_id, id);
        Ok(self)
    }

    pub fn build(self) -> DataRegistry {
        DataRegistry {
            infos: self.infos,
            ids: self.ids,
        }
    }
}

/// The immutable table of registered data types.
///
/// Byte-id lookups index straight into the info table; typed lookups go
/// through a `TypeId` map. This is the dispatch table the decode path uses
/// instead of any runtime type inspection.
pub struct DataRegistry {
    infos: Vec<DataTypeInfo>,
    ids: HashMap<TypeId, u8>,
}

impl DataRegistry {
    pub fn builder() -> DataRegistryBuilder {
        DataRegistryBuilder::new()
    }

    /// Looks up a type's metadata by its wire id.
    pub fn get(&self, id: u8) -> Option<&DataTypeInfo> {
        self.infos.get(id as usize)
    }

    /// Looks up a registered type's metadata by its Rust type.
    pub fn get_of<T: Pod + 'static>(&self) -> Option<&DataTypeInfo> {
        let id = *self.ids.get(&TypeId::of::<T>())?;
        self.infos.get(id as usize)
    }

    pub fn id_of<T: Pod + 'static>(&self) -> Option<u8> {
        self.ids.get(&TypeId::of::<T>()).copied()
    }

    /// Payload size for a wire id; used by record scans.
    pub fn size_of_id(&self, id: u8) -> Option<usize> {
        self.infos.get(id as usize).map(|info| info.size)
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[derive(Clone, Copy, Pod, Zeroable)]
    #[repr(C)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Clone, Copy, Pod, Zeroable)]
    #[repr(C)]
    struct Health(u32);

    #[test]
    fn assigns_ids_in_registration_order() {
        let mut builder = DataRegistry::builder();
        builder.register::<Position>().unwrap();
        builder.register::<Health>().unwrap();
        let registry = builder.build();

        assert_eq!(registry.id_of::<Position>(), Some(0));
        assert_eq!(registry.id_of::<Health>(), Some(1));
        assert_eq!(registry.get(0).unwrap().size(), 8);
        assert_eq!(registry.get(1).unwrap().size(), 4);
        assert_eq!(registry.get(2).map(|info| info.id()), None);
    }

    #[test]
    fn rejects_duplicate_registration() {
        let mut builder = DataRegistry::builder();
        builder.register::<Health>().unwrap();
        let err = builder.register::<Health>().unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered { .. }));
    }

    #[test]
    fn rejects_zero_span_override() {
        let mut builder = DataRegistry::builder();
        let err = builder.register_with_span::<Health>(0).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSpanLength { .. }));
    }
}
