//! Traversal throughput benchmarks.
//!
//! Measures the add/canonicalize/partition pipeline over root graphs of
//! interned strings and reference arrays, the shapes that dominate real
//! image heaps.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use strata_core::{ImageConfig, Kind, ObjectLayout};
use strata_heap::NativeImageHeap;
use strata_meta::{FieldFlags, HostValue, Universe};

/// A builder whose root is an `Object[]` of `n` interned strings.
fn heap_with_strings(n: usize) -> NativeImageHeap {
    let mut universe = Universe::new(ObjectLayout::default());
    universe.enable_string_interning();
    let values: Vec<HostValue> = (0..n)
        .map(|i| HostValue::Ref(universe.intern_string(&format!("string-{}", i))))
        .collect();
    let object_array = universe.object_array_type();
    let array = universe.new_ref_array(object_array, values);
    let root = universe.define_static_field(
        "root",
        Kind::Object,
        FieldFlags::ACCESSED | FieldFlags::WRITTEN,
    );
    universe.set_static_value(root, HostValue::Ref(array));
    NativeImageHeap::new(universe, ImageConfig::default()).unwrap()
}

fn bench_add_objects(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_objects");
    for &n in &[64usize, 512, 4096] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("interned_strings/{}", n), |b| {
            b.iter_batched(
                || heap_with_strings(n),
                |mut heap| {
                    heap.add_initial_objects().unwrap();
                    heap.add_trailing_objects().unwrap();
                    heap
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_add_objects);
criterion_main!(benches);
