//! Serialization of the frozen heap model.
//!
//! Writes every image record into the read-only or writable buffer,
//! emitting encoded compressed references (heap-base mode) or relocation
//! records for every outgoing pointer, then overwrites the static slots
//! with their live values and patches the partition boundary markers the
//! runtime scans by.
//!
//! The model is read, never mutated, from here on.

use crate::builder::NativeImageHeap;
use crate::object_info::ObjectInfo;
use crate::partition::PartitionKind;
use crate::reloc::{RelocTarget, RelocatableBuffer};
use strata_core::{ImageError, Kind};
use strata_meta::host::bitset_set_bits;
use strata_meta::{FieldId, HostObject, HostRef, HostValue, MethodId, TypeKind};

impl NativeImageHeap {
    /// Write the heap model into the two section buffers.
    ///
    /// Both buffers must already be sized by the link layer and both
    /// partition pairs placed via `set_read_only_section` /
    /// `set_writable_section`.
    pub fn write_heap(
        &self,
        ro_buffer: &mut RelocatableBuffer,
        rw_buffer: &mut RelocatableBuffer,
    ) -> Result<(), ImageError> {
        assert!(
            !self.add_objects_phase.is_allowed() && !self.add_objects_phase.is_before(),
            "the heap is written only after addTrailingObjects"
        );
        assert!(ro_buffer.len() >= self.read_only_section_size());
        assert!(rw_buffer.len() >= self.writable_section_size());

        for info in self.infos() {
            assert!(
                !self.is_blacklisted(info.object),
                "blacklisted object reached the image heap"
            );
            self.write_object(info, ro_buffer, rw_buffer)?;
        }
        // Only writable static fields reach the image heap; read-only ones
        // were inlined into code.
        self.write_static_fields(rw_buffer)?;
        self.patch_partition_boundaries(ro_buffer, rw_buffer)?;

        if self.config.print_heap_histogram {
            self.print_histograms();
        }
        if self.config.print_partition_sizes {
            self.print_partition_sizes();
        }
        Ok(())
    }

    fn write_object(
        &self,
        info: &ObjectInfo,
        ro_buffer: &mut RelocatableBuffer,
        rw_buffer: &mut RelocatableBuffer,
    ) -> Result<(), ImageError> {
        let partition = self.partition(info.partition);
        let buffer = if partition.is_writable() {
            rw_buffer
        } else {
            ro_buffer
        };

        if !self.layout.is_aligned(info.offset_in_partition) {
            return Err(ImageError::misaligned(
                format!("start of {}", self.universe.describe(info.object)),
                info.offset_in_partition,
            ));
        }
        let hub_index = info.index_in_section(partition, self.layout.hub_offset);
        if !self.layout.is_aligned(hub_index) {
            return Err(ImageError::misaligned("hub index".to_owned(), hub_index));
        }

        // The hub reference carries the header bits the runtime assigns to
        // image objects.
        let hub = self.universe.hub_of(info.class);
        self.write_dynamic_hub(buffer, hub_index, hub, self.config.object_header_bits, info)?;

        match &self.universe.image_type(info.class).kind {
            TypeKind::Instance(instance) => {
                let hybrid_layout = self.hybrid_layouts.get(&info.class);
                let mut hybrid_array = None;

                if let Some(hl) = hybrid_layout {
                    if let Some(bitset_field) = hl.bitset_field() {
                        if let HostValue::Ref(bitset) =
                            self.universe.read_field(bitset_field, info.object)
                        {
                            if let HostObject::BitSet { words } = self.universe.host().get(bitset)
                            {
                                // The bits sit between the array length and
                                // the instance fields, OR'd in byte-wise.
                                for bit in bitset_set_bits(words) {
                                    let index =
                                        info.index_in_section(partition, hl.bit_field_offset())
                                            + u64::from(bit / 8);
                                    buffer.or_u8(index, 1 << (bit % 8));
                                }
                            }
                        }
                    }
                    if let HostValue::Ref(array) =
                        self.universe.read_field(hl.array_field(), info.object)
                    {
                        hybrid_array = Some(array);
                    }
                }

                // The regular instance fields, skipping the embedded ones.
                for &field in instance.fields.iter() {
                    let embedded = match hybrid_layout {
                        Some(hl) => {
                            field == hl.array_field() || Some(field) == hl.bitset_field()
                        }
                        None => false,
                    };
                    if embedded || !self.universe.field(field).is_accessed() {
                        continue;
                    }
                    self.write_field(buffer, info, field, Some(info.object))?;
                }

                if instance.hash_code_offset != 0 {
                    buffer.put_i32(
                        info.index_in_section(partition, instance.hash_code_offset),
                        info.identity_hash(),
                    );
                }

                if let (Some(hl), Some(array)) = (hybrid_layout, hybrid_array) {
                    let data = match self.universe.host().get(array) {
                        HostObject::Array { data, .. } => data,
                        other => {
                            return Err(ImageError::unrecognized(format!(
                                "hybrid array is {:?}",
                                other
                            )))
                        }
                    };
                    let length = data.len();
                    buffer.put_i32(
                        info.index_in_section(partition, self.layout.array_length_offset),
                        length as i32,
                    );
                    for i in 0..length {
                        let element_index =
                            info.index_in_section(partition, hl.array_element_offset(i));
                        self.write_constant(
                            buffer,
                            element_index,
                            hl.array_element_kind(),
                            data.element(i as usize),
                            info,
                        )?;
                    }
                }
            }

            TypeKind::Array { component_kind, .. } => {
                let data = match self.universe.host().get(info.object) {
                    HostObject::Array { data, .. } => data,
                    other => {
                        return Err(ImageError::unrecognized(format!(
                            "array-classed object is {:?}",
                            other
                        )))
                    }
                };
                let length = data.len();
                buffer.put_i32(
                    info.index_in_section(partition, self.layout.array_length_offset),
                    length as i32,
                );
                buffer.put_i32(
                    info.index_in_section(partition, self.layout.array_hash_code_offset),
                    info.identity_hash(),
                );
                for i in 0..length {
                    let element_index = info.index_in_section(
                        partition,
                        self.layout.array_element_offset(*component_kind, i),
                    );
                    self.write_constant(
                        buffer,
                        element_index,
                        *component_kind,
                        data.element(i as usize),
                        info,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Write one field of `holder` at its assigned location. With no
    /// receiver the field is static and read from the universe's slot.
    fn write_field(
        &self,
        buffer: &mut RelocatableBuffer,
        holder: &ObjectInfo,
        field: FieldId,
        receiver: Option<HostRef>,
    ) -> Result<(), ImageError> {
        let meta = self.universe.field(field);
        let location = match meta.location {
            Some(location) => location,
            None => return Ok(()),
        };
        let kind = meta.kind;
        let partition = self.partition(holder.partition);
        let index = holder.index_in_section(partition, location);
        let value = match receiver {
            Some(r) => self.universe.read_field(field, r),
            None => self.universe.read_static(field),
        };
        match value {
            HostValue::MethodPtr(method) => self.add_non_data_relocation(buffer, index, method),
            other => self.write_value(buffer, index, kind, other, holder),
        }
    }

    /// Write an array or hybrid element of the given kind.
    fn write_constant(
        &self,
        buffer: &mut RelocatableBuffer,
        index: u64,
        kind: Kind,
        value: HostValue,
        reason: &ObjectInfo,
    ) -> Result<(), ImageError> {
        match value {
            HostValue::MethodPtr(method) => self.add_non_data_relocation(buffer, index, method),
            other => self.write_value(buffer, index, kind, other, reason),
        }
    }

    fn write_value(
        &self,
        buffer: &mut RelocatableBuffer,
        index: u64,
        kind: Kind,
        value: HostValue,
        reason: &ObjectInfo,
    ) -> Result<(), ImageError> {
        match value {
            HostValue::Ref(target) => self.write_reference(buffer, index, target, reason),
            // Words are data the size of a machine word, never references.
            HostValue::Word(w) => {
                buffer.put_u64(index, w);
                Ok(())
            }
            // The buffer is zero-filled; null stays zero.
            HostValue::Null => {
                debug_assert!(kind.is_object(), "primitive value must not be null");
                Ok(())
            }
            HostValue::Prim(value_kind, bits) => {
                write_primitive(buffer, index, value_kind, bits);
                Ok(())
            }
            HostValue::MethodPtr(method) => self.add_non_data_relocation(buffer, index, method),
        }
    }

    /// Emit a reference to an image object at `index`.
    pub(crate) fn write_reference(
        &self,
        buffer: &mut RelocatableBuffer,
        index: u64,
        target: HostRef,
        reason: &ObjectInfo,
    ) -> Result<(), ImageError> {
        if !self.layout.is_aligned(index) {
            return Err(ImageError::misaligned("reference index".to_owned(), index));
        }
        // Mirrors resolve to their hub at write time too.
        let target = self.universe.replace_object_ref(target);
        let target_info = match self.object_info(target) {
            Some(info) => info,
            None => {
                return Err(ImageError::target_changed(
                    self.universe.describe(target),
                    self.provenance_of(reason),
                ))
            }
        };
        if self.config.use_heap_base {
            let shift = self.config.compression_shift;
            let offset = target_info.offset_in_section(self.partition(target_info.partition));
            buffer.put_u64(index, offset >> shift);
        } else {
            buffer.add_direct_relocation_without_addend(
                index,
                self.layout.reference_size as u8,
                RelocTarget::Object(target),
            );
        }
        Ok(())
    }

    /// Emit the hub reference of an image object, OR-ing the object header
    /// bits into the immediate (heap-base mode) or the addend.
    fn write_dynamic_hub(
        &self,
        buffer: &mut RelocatableBuffer,
        index: u64,
        hub: HostRef,
        header_bits: u64,
        holder: &ObjectInfo,
    ) -> Result<(), ImageError> {
        if !self.layout.is_aligned(index) {
            return Err(ImageError::misaligned("hub index".to_owned(), index));
        }
        let hub_info = match self.object_info(hub) {
            Some(info) => info,
            None => {
                return Err(ImageError::target_changed(
                    self.universe.describe(hub),
                    self.provenance_of(holder),
                ))
            }
        };
        if self.config.use_heap_base {
            let offset = hub_info.offset_in_section(self.partition(hub_info.partition));
            buffer.put_u64(index, offset | header_bits);
        } else {
            // The hub's address is filled in by the link editor; hubs are
            // the size of object references.
            buffer.add_direct_relocation_with_addend(
                index,
                self.layout.reference_size as u8,
                header_bits,
                RelocTarget::Object(hub),
            );
        }
        Ok(())
    }

    /// Record a relocation for a code pointer. Only compiled methods
    /// inserted in vtables require one; nothing is written otherwise.
    fn add_non_data_relocation(
        &self,
        buffer: &mut RelocatableBuffer,
        index: u64,
        method: MethodId,
    ) -> Result<(), ImageError> {
        if !self.layout.is_aligned(index) {
            return Err(ImageError::misaligned(
                "method pointer index".to_owned(),
                index,
            ));
        }
        let meta = match self.universe.method(method) {
            Some(meta) => meta,
            None => {
                return Err(ImageError::unknown_relocation(format!(
                    "method pointer {:?}",
                    method
                )))
            }
        };
        if meta.code_offset.is_some() {
            buffer.add_direct_relocation_without_addend(
                index,
                self.layout.reference_size as u8,
                RelocTarget::Method(method),
            );
        }
        Ok(())
    }

    /// Overwrite the placeholder bytes with the live static values; they
    /// may have changed late in the build (the intern table does).
    fn write_static_fields(&self, rw_buffer: &mut RelocatableBuffer) -> Result<(), ImageError> {
        let statics = self.statics();
        let primitive_holder = self.expect_info(statics.primitive_fields);
        let reference_holder = self.expect_info(statics.reference_fields);
        for &field in self.universe.static_field_ids() {
            let meta = self.universe.field(field);
            if meta.is_written() && meta.is_accessed() {
                let holder = if meta.kind.is_object() {
                    reference_holder
                } else {
                    primitive_holder
                };
                self.write_field(rw_buffer, holder, field, None)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Boundary patching
    // =========================================================================

    /// Patch the runtime-info slots with the first and last object of each
    /// partition so the runtime can scan its heap.
    fn patch_partition_boundaries(
        &self,
        ro_buffer: &mut RelocatableBuffer,
        rw_buffer: &mut RelocatableBuffer,
    ) -> Result<(), ImageError> {
        let boundary = *self.universe.boundary_fields();
        let slots = [
            (
                PartitionKind::ReadOnlyPrimitive,
                boundary.first_read_only_primitive,
                boundary.last_read_only_primitive,
            ),
            (
                PartitionKind::ReadOnlyReference,
                boundary.first_read_only_reference,
                boundary.last_read_only_reference,
            ),
            (
                PartitionKind::WritablePrimitive,
                boundary.first_writable_primitive,
                boundary.last_writable_primitive,
            ),
            (
                PartitionKind::WritableReference,
                boundary.first_writable_reference,
                boundary.last_writable_reference,
            ),
        ];
        for (kind, first_field, last_field) in slots {
            if let Some(first) = self.find_boundary_object(kind, false) {
                self.patch_runtime_info_field(first_field, first, ro_buffer, rw_buffer)?;
            }
            if let Some(last) = self.find_boundary_object(kind, true) {
                self.patch_runtime_info_field(last_field, last, ro_buffer, rw_buffer)?;
            }
        }
        Ok(())
    }

    /// Scan the records of one partition for the lowest or highest offset.
    fn find_boundary_object(&self, kind: PartitionKind, last: bool) -> Option<&ObjectInfo> {
        let mut best: Option<&ObjectInfo> = None;
        for info in self.infos() {
            if info.partition != kind {
                continue;
            }
            best = match best {
                None => Some(info),
                Some(b) => {
                    let better = if last {
                        info.offset_in_partition > b.offset_in_partition
                    } else {
                        info.offset_in_partition < b.offset_in_partition
                    };
                    if better {
                        Some(info)
                    } else {
                        Some(b)
                    }
                }
            };
        }
        best
    }

    /// Overwrite one previously-null runtime-info slot with the location of
    /// a boundary object.
    fn patch_runtime_info_field(
        &self,
        field: FieldId,
        target: &ObjectInfo,
        ro_buffer: &mut RelocatableBuffer,
        rw_buffer: &mut RelocatableBuffer,
    ) -> Result<(), ImageError> {
        let statics = self.statics();
        let holder = self.expect_info(statics.reference_fields);
        let location = match self.universe.field(field).location {
            Some(location) => location,
            None => unreachable!("static fields always have a location"),
        };
        let partition = self.partition(holder.partition);
        let index = holder.index_in_section(partition, location);
        let buffer = if partition.is_writable() {
            rw_buffer
        } else {
            ro_buffer
        };
        self.write_reference(buffer, index, target.object, holder)
    }

    fn expect_info(&self, object: HostRef) -> &ObjectInfo {
        match self.object_info(object) {
            Some(info) => info,
            None => panic!("static-field placeholder was never added to the heap"),
        }
    }
}

/// Fixed-width little-endian primitive write, dispatched by kind.
fn write_primitive(buffer: &mut RelocatableBuffer, index: u64, kind: Kind, bits: u64) {
    match kind {
        Kind::Boolean | Kind::Byte => buffer.put_u8(index, bits as u8),
        Kind::Char | Kind::Short => buffer.put_u16(index, bits as u16),
        Kind::Int | Kind::Float => buffer.put_u32(index, bits as u32),
        Kind::Long | Kind::Double => buffer.put_u64(index, bits),
        Kind::Object => unreachable!("references are not primitives"),
    }
}
