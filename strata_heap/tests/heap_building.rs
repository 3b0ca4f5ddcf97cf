//! Traversal, canonicalization, and partitioning tests.
//!
//! Coverage:
//! - The empty graph: only the placeholder arrays and their hubs
//! - String canonicalization and the intern table
//! - Partition selection (monitor classes, immutable registration)
//! - Identity-hash reconciliation between hubs and class mirrors
//! - Idempotent adds and the post-freeze invariants

use strata_core::{ImageConfig, ImageError, Kind, ObjectLayout};
use strata_heap::{NativeImageHeap, PartitionKind, Reason};
use strata_meta::{FieldFlags, FieldSpec, HostValue, TypeOptions, Universe};

fn root_flags() -> FieldFlags {
    FieldFlags::ACCESSED | FieldFlags::WRITTEN
}

fn freeze(heap: &mut NativeImageHeap) {
    heap.add_initial_objects().unwrap();
    heap.add_trailing_objects().unwrap();
}

// =============================================================================
// Empty Graph
// =============================================================================

#[test]
fn test_empty_graph_partition_contents() {
    let universe = Universe::new(ObjectLayout::default());
    let mut heap = NativeImageHeap::new(universe, ImageConfig::default()).unwrap();
    freeze(&mut heap);

    // The read-only primitive partition holds only the heap-base pad.
    let ro_primitive = heap.partition(PartitionKind::ReadOnlyPrimitive);
    assert_eq!(ro_primitive.size(), 8);
    assert_eq!(ro_primitive.count(), 0);

    // The writable primitive partition holds exactly the empty byte[]
    // placeholder prefix, the writable reference partition exactly the
    // Object[] placeholder with its eight boundary slots.
    let wp = heap.partition(PartitionKind::WritablePrimitive);
    assert_eq!(wp.size(), 16);
    assert_eq!(wp.count(), 1);
    let wr = heap.partition(PartitionKind::WritableReference);
    assert_eq!(wr.size(), 16 + 8 * 8);
    assert_eq!(wr.count(), 1);

    // Hubs (byte[], Object[], and DynamicHub itself) are canonicalizable,
    // hence read-only reference.
    let ror = heap.partition(PartitionKind::ReadOnlyReference);
    assert_eq!(ror.count(), 3);
    assert_eq!(ror.size(), 3 * 40);

    // No interning without the support feature.
    assert!(heap.interned_string_contents().is_empty());
}

#[test]
fn test_empty_graph_without_heap_base_has_no_pad() {
    let universe = Universe::new(ObjectLayout::default());
    let mut heap = NativeImageHeap::new(universe, ImageConfig::relocation_only()).unwrap();
    freeze(&mut heap);
    assert_eq!(heap.partition(PartitionKind::ReadOnlyPrimitive).size(), 0);
}

// =============================================================================
// String Canonicalization
// =============================================================================

#[test]
fn test_duplicate_strings_collapse_to_one_image_object() {
    let mut universe = Universe::new(ObjectLayout::default());
    universe.enable_string_interning();
    let interned = universe.intern_string("abc");
    let duplicate = universe.new_string("abc");
    assert_ne!(interned, duplicate);

    let root_a = universe.define_static_field("rootA", Kind::Object, root_flags());
    let root_b = universe.define_static_field("rootB", Kind::Object, root_flags());
    universe.set_static_value(root_a, HostValue::Ref(interned));
    universe.set_static_value(root_b, HostValue::Ref(duplicate));

    let string_type = universe.string_type();
    let mut heap = NativeImageHeap::new(universe, ImageConfig::default()).unwrap();
    heap.register_canonicalizable_type(string_type);
    freeze(&mut heap);

    let info_a = heap.object_info(interned).unwrap();
    let info_b = heap.object_info(duplicate).unwrap();
    assert!(std::ptr::eq(info_a, info_b));

    // One entry in the intern table, and a hashed string is immutable,
    // hence read-only.
    assert_eq!(heap.interned_string_contents(), vec!["abc".to_owned()]);
    assert_eq!(info_a.partition, PartitionKind::ReadOnlyReference);
    assert_ne!(info_a.identity_hash(), 0);

    // The sorted table was handed to the intern support and is itself an
    // immutable image object.
    let table = heap
        .universe()
        .intern_support()
        .unwrap()
        .image_array
        .unwrap();
    let table_info = heap.object_info(table).unwrap();
    assert_eq!(table_info.partition, PartitionKind::ReadOnlyReference);
}

#[test]
fn test_unhashed_string_stays_writable() {
    // The empty string's hash is zero, so the hash field is written
    // lazily at run time.
    let mut universe = Universe::new(ObjectLayout::default());
    let empty = universe.new_string("");
    let root = universe.define_static_field("root", Kind::Object, root_flags());
    universe.set_static_value(root, HostValue::Ref(empty));

    let mut heap = NativeImageHeap::new(universe, ImageConfig::default()).unwrap();
    freeze(&mut heap);
    let info = heap.object_info(empty).unwrap();
    assert_eq!(info.partition, PartitionKind::WritableReference);
}

#[test]
fn test_string_backing_array_is_immutable() {
    let mut universe = Universe::new(ObjectLayout::default());
    universe.enable_string_interning();
    let s = universe.intern_string("xyz");
    let root = universe.define_static_field("root", Kind::Object, root_flags());
    universe.set_static_value(root, HostValue::Ref(s));

    let mut heap = NativeImageHeap::new(universe, ImageConfig::default()).unwrap();
    freeze(&mut heap);

    // The char[] behind a canonical string inherits immutability, and a
    // primitive array without written status lands read-only primitive.
    let value_field = heap.universe().instance_fields(heap.universe().string_type())[0];
    let chars = match heap.universe().read_field(value_field, s) {
        HostValue::Ref(r) => r,
        other => panic!("string value is {:?}", other),
    };
    let chars_info = heap.object_info(chars).unwrap();
    assert_eq!(chars_info.partition, PartitionKind::ReadOnlyPrimitive);
}

// =============================================================================
// Partition Selection
// =============================================================================

#[test]
fn test_monitor_class_is_writable_reference() {
    // A monitor slot is a written reference slot, even when no field is
    // written.
    let mut universe = Universe::new(ObjectLayout::default());
    let monitored = universe.define_instance_type(
        "Monitored",
        None,
        vec![FieldSpec::new("x", Kind::Int)],
        TypeOptions {
            needs_monitor: true,
            ..Default::default()
        },
    );
    let object = universe.new_instance(monitored, vec![HostValue::int(7)]);
    let root = universe.define_static_field("root", Kind::Object, root_flags());
    universe.set_static_value(root, HostValue::Ref(object));

    let mut heap = NativeImageHeap::new(universe, ImageConfig::default()).unwrap();
    freeze(&mut heap);
    let info = heap.object_info(object).unwrap();
    assert_eq!(info.partition, PartitionKind::WritableReference);
}

#[test]
fn test_registered_immutable_object_lands_read_only() {
    let mut universe = Universe::new(ObjectLayout::default());
    let counter = universe.define_instance_type(
        "Counter",
        None,
        vec![FieldSpec::new("value", Kind::Int).written()],
        TypeOptions::default(),
    );
    let object = universe.new_instance(counter, vec![HostValue::int(1)]);
    let other = universe.new_instance(counter, vec![HostValue::int(2)]);
    let root_a = universe.define_static_field("rootA", Kind::Object, root_flags());
    let root_b = universe.define_static_field("rootB", Kind::Object, root_flags());
    universe.set_static_value(root_a, HostValue::Ref(object));
    universe.set_static_value(root_b, HostValue::Ref(other));

    let mut heap = NativeImageHeap::new(universe, ImageConfig::default()).unwrap();
    heap.register_as_immutable(object).unwrap();
    freeze(&mut heap);

    // Registered: immutable overrides the written field. Not registered:
    // the written int field makes it writable primitive.
    assert_eq!(
        heap.object_info(object).unwrap().partition,
        PartitionKind::ReadOnlyPrimitive
    );
    assert_eq!(
        heap.object_info(other).unwrap().partition,
        PartitionKind::WritablePrimitive
    );
}

#[test]
fn test_writable_only_emergency_flag() {
    let mut universe = Universe::new(ObjectLayout::default());
    universe.enable_string_interning();
    let s = universe.intern_string("abc");
    let root = universe.define_static_field("root", Kind::Object, root_flags());
    universe.set_static_value(root, HostValue::Ref(s));

    let config = ImageConfig {
        use_only_writable_heap: true,
        ..Default::default()
    };
    let mut heap = NativeImageHeap::new(universe, config).unwrap();
    freeze(&mut heap);

    // Every object is forced into the writable reference partition.
    for info in heap.infos() {
        assert_eq!(info.partition, PartitionKind::WritableReference);
    }
}

// =============================================================================
// Identity Hash Reconciliation
// =============================================================================

#[test]
fn test_mirror_hash_upgrades_hub_hash() {
    let mut universe = Universe::new(ObjectLayout::default());
    let foo = universe.define_instance_type("Foo", None, vec![], TypeOptions::default());
    let mirror = universe.mirror_of(foo);
    let hub = universe.hub_of(foo);
    let mirror_hash = universe.host().identity_hash(mirror);
    let hub_hash = universe.host().identity_hash(hub);
    assert_ne!(mirror_hash, hub_hash);

    let mut heap = NativeImageHeap::new(universe, ImageConfig::default()).unwrap();
    heap.add_initial_objects().unwrap();
    // The hub is reached through its own reflection path first, then the
    // same image object is reached through the host class mirror.
    heap.add_object(HostValue::Ref(hub), false, false, Reason::Root("hub path"))
        .unwrap();
    heap.add_object(
        HostValue::Ref(mirror),
        false,
        false,
        Reason::Root("mirror path"),
    )
    .unwrap();
    heap.add_trailing_objects().unwrap();

    let info = heap.object_info(hub).unwrap();
    assert_eq!(info.identity_hash(), mirror_hash);
    // Both hosts alias the one image record.
    assert!(std::ptr::eq(info, heap.object_info(mirror).unwrap()));
}

#[test]
fn test_mirror_reached_first_keeps_mirror_hash() {
    let mut universe = Universe::new(ObjectLayout::default());
    let foo = universe.define_instance_type("Foo", None, vec![], TypeOptions::default());
    let mirror = universe.mirror_of(foo);
    let hub = universe.hub_of(foo);
    let mirror_hash = universe.host().identity_hash(mirror);

    let mut heap = NativeImageHeap::new(universe, ImageConfig::default()).unwrap();
    heap.add_initial_objects().unwrap();
    heap.add_object(
        HostValue::Ref(mirror),
        false,
        false,
        Reason::Root("mirror path"),
    )
    .unwrap();
    heap.add_object(HostValue::Ref(hub), false, false, Reason::Root("hub path"))
        .unwrap();
    heap.add_trailing_objects().unwrap();

    assert_eq!(heap.object_info(hub).unwrap().identity_hash(), mirror_hash);
}

// =============================================================================
// Idempotence and Errors
// =============================================================================

#[test]
fn test_second_add_is_a_no_op() {
    let mut universe = Universe::new(ObjectLayout::default());
    universe.enable_string_interning();
    let s = universe.intern_string("abc");
    let root = universe.define_static_field("root", Kind::Object, root_flags());
    universe.set_static_value(root, HostValue::Ref(s));

    let mut heap = NativeImageHeap::new(universe, ImageConfig::default()).unwrap();
    heap.add_initial_objects().unwrap();
    heap.add_object(HostValue::Ref(s), false, false, Reason::Root("again"))
        .unwrap();

    let infos_before = heap.infos().len();
    let sizes_before: Vec<u64> = PartitionKind::ALL
        .iter()
        .map(|&k| heap.partition(k).size())
        .collect();
    heap.add_object(HostValue::Ref(s), false, false, Reason::Root("again"))
        .unwrap();
    assert_eq!(heap.infos().len(), infos_before);
    let sizes_after: Vec<u64> = PartitionKind::ALL
        .iter()
        .map(|&k| heap.partition(k).size())
        .collect();
    assert_eq!(sizes_before, sizes_after);

    heap.add_trailing_objects().unwrap();
}

#[test]
fn test_uninstantiated_class_fails_with_provenance() {
    let mut universe = Universe::new(ObjectLayout::default());
    let ghost = universe.define_instance_type(
        "Ghost",
        None,
        vec![],
        TypeOptions {
            not_instantiated: true,
            ..Default::default()
        },
    );
    let object = universe.new_instance(ghost, vec![]);
    let root = universe.define_static_field("lazyCache", Kind::Object, root_flags());
    universe.set_static_value(root, HostValue::Ref(object));

    let mut heap = NativeImageHeap::new(universe, ImageConfig::default()).unwrap();
    let err = heap.add_initial_objects().unwrap_err();
    let text = err.to_string();
    assert!(matches!(err, ImageError::UnreachableType { .. }));
    assert!(text.contains("Ghost"));
    assert!(text.contains("static field lazyCache"));
}

#[test]
fn test_add_after_freeze_is_a_phase_violation() {
    let universe = Universe::new(ObjectLayout::default());
    let mut heap = NativeImageHeap::new(universe, ImageConfig::default()).unwrap();
    freeze(&mut heap);
    let err = heap
        .add_object(HostValue::Null, false, false, Reason::Root("late"))
        .unwrap_err();
    assert!(matches!(err, ImageError::PhaseViolation { .. }));
}

// =============================================================================
// Post-Freeze Invariants
// =============================================================================

#[test]
fn test_partition_accounting_invariants() {
    let mut universe = Universe::new(ObjectLayout::default());
    universe.enable_string_interning();
    let a = universe.intern_string("alpha");
    let b = universe.intern_string("beta");
    let plain = universe.new_string("gamma");
    let object_array = universe.object_array_type();
    let array = universe.new_ref_array(
        object_array,
        vec![HostValue::Ref(a), HostValue::Ref(b), HostValue::Ref(plain)],
    );
    let root = universe.define_static_field("root", Kind::Object, root_flags());
    universe.set_static_value(root, HostValue::Ref(array));

    // No heap base: partition sizes are exactly the object sums.
    let mut heap = NativeImageHeap::new(universe, ImageConfig::relocation_only()).unwrap();
    freeze(&mut heap);

    let layout = ObjectLayout::default();
    for kind in PartitionKind::ALL {
        let partition = heap.partition(kind);
        let members: Vec<_> = heap.infos().iter().filter(|i| i.partition == kind).collect();
        let sum: u64 = members.iter().map(|i| i.size).sum();
        assert_eq!(partition.size(), sum, "size sum of {}", kind);
        assert_eq!(partition.count(), members.len() as u64, "count of {}", kind);
        for info in members {
            assert!(info.offset_in_partition + info.size <= partition.size());
            assert!(layout.is_aligned(info.offset_in_partition));
            assert!(layout.is_aligned(info.size));
        }
    }

    // Every identity-map value is canonical: the record's own object maps
    // back to the same record.
    for (_, info) in heap.identity_entries() {
        let canonical = heap.object_info(info.object).unwrap();
        assert!(std::ptr::eq(info, canonical));
    }

    // Interned strings are read-only reference with a non-zero hash.
    for content in heap.interned_string_contents() {
        assert!(!content.is_empty());
    }
    assert_eq!(
        heap.interned_string_contents(),
        vec!["alpha".to_owned(), "beta".to_owned()]
    );
}
