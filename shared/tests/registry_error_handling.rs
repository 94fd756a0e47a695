use bytemuck::{Pod, Zeroable};

use tether_shared::{DataRegistry, RegistryError};

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct Health(u32);

// Each expansion site defines its own block-scoped struct, so every call
// registers a type with a fresh TypeId.
macro_rules! register_unique {
    ($builder:expr) => {{
        #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
        #[repr(C)]
        struct Slot(u8);
        $builder.register::<Slot>()
    }};
}

macro_rules! register_unique_batch {
    ($builder:expr; $($_marker:tt)*) => {
        $(
            let _ = stringify!($_marker);
            register_unique!($builder).unwrap();
        )*
    };
}

#[test]
fn registry_holds_at_most_254_types() {
    let mut builder = DataRegistry::builder();
    // 254 registrations, 127 tokens per batch
    register_unique_batch!(builder;
        a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a
        a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a
        a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a
        a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a
    );
    register_unique_batch!(builder;
        a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a
        a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a
        a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a
        a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a a
    );

    let err = register_unique!(builder).unwrap_err();
    assert!(matches!(err, RegistryError::RegistryFull { max: 254, .. }));

    let registry = builder.build();
    assert_eq!(registry.len(), 254);
    assert_eq!(registry.get(253).unwrap().id(), 253);
    assert!(registry.get(254).is_none());
}

#[test]
fn identical_registration_order_yields_identical_ids() {
    let build = || {
        let mut builder = DataRegistry::builder();
        builder.register::<Position>().unwrap();
        builder.register_with_span::<Health>(16).unwrap();
        builder.build()
    };
    let first = build();
    let second = build();

    assert_eq!(first.id_of::<Position>(), second.id_of::<Position>());
    assert_eq!(first.id_of::<Health>(), Some(1));
    assert_eq!(second.id_of::<Health>(), Some(1));
}

#[test]
fn span_cap_never_exceeds_the_wire_length_field() {
    let mut builder = DataRegistry::builder();
    builder.register_with_span::<Position>(1_000_000).unwrap();
    builder.register::<Health>().unwrap();
    let registry = builder.build();

    let position = registry.get_of::<Position>().unwrap();
    assert_eq!(position.max_span_len(), 65535 / 12);
    assert!(position.span_record_size(position.max_span_len()) <= 4 + 65535);

    let health = registry.get_of::<Health>().unwrap();
    assert_eq!(health.max_span_len(), 65535 / 4);
}

#[test]
fn duplicate_type_is_rejected_with_its_name() {
    let mut builder = DataRegistry::builder();
    builder.register::<Health>().unwrap();
    let err = builder.register_with_span::<Health>(4).unwrap_err();
    match err {
        RegistryError::AlreadyRegistered { type_name } => {
            assert!(type_name.contains("Health"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unregistered_type_resolves_to_none() {
    let mut builder = DataRegistry::builder();
    builder.register::<Position>().unwrap();
    let registry = builder.build();

    assert_eq!(registry.id_of::<Health>(), None);
    assert!(registry.get_of::<Health>().is_none());
    assert_eq!(registry.size_of_id(200), None);
}
