//! Heap diagnostics.
//!
//! Per-partition histograms of image objects grouped by class, plus the
//! plain partition-size lines. Printed to stderr behind the corresponding
//! config flags after the heap is written.

use crate::builder::NativeImageHeap;
use crate::partition::PartitionKind;
use rustc_hash::FxHashMap;

/// One histogram row: a class and the objects it contributes to a
/// partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramEntry {
    /// Class name.
    pub class_name: String,
    /// Number of image objects of that class.
    pub count: u64,
    /// Their combined byte size.
    pub bytes: u64,
}

impl NativeImageHeap {
    /// Histogram of one partition, largest classes first.
    pub fn partition_histogram(&self, kind: PartitionKind) -> Vec<HistogramEntry> {
        let mut groups: FxHashMap<&str, (u64, u64)> = FxHashMap::default();
        for info in self.infos() {
            if info.partition != kind {
                continue;
            }
            let name = self.universe().image_type(info.class).name.as_str();
            let entry = groups.entry(name).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += info.size;
        }
        let mut entries: Vec<HistogramEntry> = groups
            .into_iter()
            .map(|(class_name, (count, bytes))| HistogramEntry {
                class_name: class_name.to_owned(),
                count,
                bytes,
            })
            .collect();
        entries.sort_by(|a, b| b.bytes.cmp(&a.bytes).then(a.class_name.cmp(&b.class_name)));
        entries
    }

    /// Print the four partition histograms to stderr.
    pub fn print_histograms(&self) {
        for kind in PartitionKind::ALL {
            self.print_partition_histogram(kind);
        }
    }

    fn print_partition_histogram(&self, kind: PartitionKind) {
        let partition = self.partition(kind);

        // Unique records versus host duplicates that canonicalized onto
        // them; the partition counters must agree with the unique side.
        let mut unique_count = 0u64;
        let mut unique_size = 0u64;
        let mut alias_count = 0u64;
        let mut alias_size = 0u64;
        let mut seen: rustc_hash::FxHashSet<crate::object_info::InfoId> =
            rustc_hash::FxHashSet::default();
        for (&_host, &id) in &self.objects {
            let info = &self.infos[id.index()];
            if info.partition != kind {
                continue;
            }
            if seen.insert(id) {
                unique_count += 1;
                unique_size += info.size;
            } else {
                alias_count += 1;
                alias_size += info.size;
            }
        }
        assert_eq!(partition.count(), unique_count, "incorrect counting");

        let total_count = unique_count + alias_count;
        let total_size = unique_size + alias_size;
        let count_percent = percent(unique_count, total_count);
        let size_percent = percent(unique_size, total_size);
        eprintln!(
            "=== Partition: {}   count: {} / {} = {:.1}%  size: {} / {} = {:.1}% ===",
            kind, unique_count, total_count, count_percent, unique_size, total_size, size_percent
        );
        for entry in self.partition_histogram(kind) {
            eprintln!(
                "  {:<40} {:>8} objects  {:>12}",
                entry.class_name,
                entry.count,
                format_bytes(entry.bytes)
            );
        }
    }

    /// Print the final size of each partition to stderr.
    pub fn print_partition_sizes(&self) {
        for kind in PartitionKind::ALL {
            eprintln!(
                "PrintImageHeapPartitionSizes:  partition: {}  size: {}",
                kind,
                self.partition(kind).size()
            );
        }
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        100.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}

/// Format bytes in human-readable form.
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
