//! The image-heap builder.
//!
//! Owns the four partitions, the identity map from host object to image
//! record, the canonicalization and intern tables, the blacklist, and the
//! hybrid-layout cache, and orchestrates traversal and partitioning. The
//! serialization half lives in `writer`.
//!
//! # Identity discipline
//!
//! Canonicalization decides identity; identity determines immutability;
//! immutability selects a partition; the partition determines the offset;
//! the offset determines the encoded reference every other object emits.
//! The identity map is populated before a parent's children are pushed, so
//! cycles terminate at the already-inserted entry without any other
//! cycle-breaker.

use crate::canonical::CanonicalKey;
use crate::object_info::{InfoId, ObjectInfo, Reason};
use crate::partition::{HeapPartition, PartitionKind};
use crate::phase::Phase;
use crate::worklist::{AddObjectWorklist, AddTask};
use rustc_hash::{FxHashMap, FxHashSet};
use strata_core::{ConfigError, ImageConfig, ImageError, ObjectLayout};
use strata_meta::host::java_string_hash;
use strata_meta::{
    ArrayData, FieldId, HostObject, HostRef, HostValue, HybridLayout, StaticFieldsSupport, TypeId,
    TypeKind, Universe,
};

/// The model of the native image heap under construction.
pub struct NativeImageHeap {
    pub(crate) universe: Universe,
    pub(crate) layout: ObjectLayout,
    pub(crate) config: ImageConfig,

    /// Host object to image record. More than one host object may map to a
    /// single image record (canonicalized duplicates, the class mirror).
    pub(crate) objects: FxHashMap<HostRef, InfoId>,
    pub(crate) infos: Vec<ObjectInfo>,
    /// Objects that must only appear embedded inside a hybrid parent.
    pub(crate) blacklist: FxHashSet<HostRef>,
    /// Memoized hybrid layouts per instance class.
    pub(crate) hybrid_layouts: FxHashMap<TypeId, HybridLayout>,
    /// The image intern table under construction, content to first host
    /// string seen.
    pub(crate) interned_strings: FxHashMap<String, HostRef>,
    /// Content key to the canonical host object that won.
    pub(crate) canonicalization: FxHashMap<CanonicalKey, HostRef>,
    pub(crate) known_canonicalizable: Vec<TypeId>,
    pub(crate) known_non_canonicalizable: Vec<TypeId>,
    pub(crate) known_immutable: FxHashSet<HostRef>,

    pub(crate) add_objects_phase: Phase,
    pub(crate) intern_strings_phase: Phase,
    pub(crate) worklist: AddObjectWorklist,
    pub(crate) partitions: [HeapPartition; 4],
    pub(crate) statics: Option<StaticFieldsSupport>,
}

impl NativeImageHeap {
    /// Create a builder over a universe.
    pub fn new(universe: Universe, config: ImageConfig) -> Result<Self, ConfigError> {
        let layout = universe.layout();
        config.validate(&layout)?;

        let mut partitions = [
            HeapPartition::new(PartitionKind::ReadOnlyPrimitive),
            HeapPartition::new(PartitionKind::ReadOnlyReference),
            HeapPartition::new(PartitionKind::WritablePrimitive),
            HeapPartition::new(PartitionKind::WritableReference),
        ];
        if config.use_heap_base {
            // Zero designates null, so pad the heap base to keep every
            // object offset strictly positive.
            partitions[PartitionKind::ReadOnlyPrimitive.index()].pad(layout.alignment);
        }

        // Hubs are value-like: every path to a type's hub must collapse to
        // the one image hub.
        let known_canonicalizable = vec![universe.dynamic_hub_type()];

        Ok(Self {
            universe,
            layout,
            config,
            objects: FxHashMap::default(),
            infos: Vec::new(),
            blacklist: FxHashSet::default(),
            hybrid_layouts: FxHashMap::default(),
            interned_strings: FxHashMap::default(),
            canonicalization: FxHashMap::default(),
            known_canonicalizable,
            known_non_canonicalizable: Vec::new(),
            known_immutable: FxHashSet::default(),
            add_objects_phase: Phase::new("addObjects"),
            intern_strings_phase: Phase::new("internStrings"),
            worklist: AddObjectWorklist::new(),
            partitions,
            statics: None,
        })
    }

    // =========================================================================
    // Setup
    // =========================================================================

    /// Register a class whose instances never canonicalize.
    ///
    /// The non-canonicalizable list wins over the canonicalizable one.
    pub fn register_non_canonicalizable_type(&mut self, class: TypeId) {
        self.known_non_canonicalizable.push(class);
    }

    /// Register a class whose instances always canonicalize.
    pub fn register_canonicalizable_type(&mut self, class: TypeId) {
        self.known_canonicalizable.push(class);
    }

    /// Declare an object immutable in the image regardless of written
    /// fields. Only allowed before any object is added.
    pub fn register_as_immutable(&mut self, object: HostRef) -> Result<(), ImageError> {
        if !self.add_objects_phase.is_before() {
            return Err(ImageError::phase(
                "registering an immutable object",
                self.add_objects_phase.state_name(),
            ));
        }
        self.known_immutable.insert(object);
        Ok(())
    }

    // =========================================================================
    // Public build steps
    // =========================================================================

    /// Open the add and intern windows and enqueue the root set: the two
    /// static-field placeholder arrays plus every written and accessed
    /// static object field's value.
    pub fn add_initial_objects(&mut self) -> Result<(), ImageError> {
        self.add_objects_phase.allow();
        self.intern_strings_phase.allow();

        let statics = self.universe.static_fields_support();
        self.statics = Some(statics);
        self.add_object(
            HostValue::Ref(statics.primitive_fields),
            false,
            false,
            Reason::Root("primitive static fields"),
        )?;
        self.add_static_fields()
    }

    fn add_static_fields(&mut self) -> Result<(), ImageError> {
        let statics = self.statics();
        self.add_object(
            HostValue::Ref(statics.reference_fields),
            false,
            false,
            Reason::Root("staticObjectFields"),
        )?;
        self.add_object(
            HostValue::Ref(statics.primitive_fields),
            false,
            false,
            Reason::Root("staticPrimitiveFields"),
        )?;

        // The holder arrays are empty placeholders, so the statically-held
        // objects are added one by one.
        let static_fields: Vec<FieldId> = self.universe.static_field_ids().to_vec();
        for field in static_fields {
            let (written, accessed, is_object) = {
                let meta = self.universe.field(field);
                (meta.is_written(), meta.is_accessed(), meta.kind.is_object())
            };
            if written && accessed && is_object {
                let value = self.universe.read_static(field);
                self.add_object(value, false, false, Reason::Field(field))?;
            }
        }
        Ok(())
    }

    /// Drain the worklist, freeze interning and emit the sorted intern
    /// array if the intern table is in use, then close the add window.
    pub fn add_trailing_objects(&mut self) -> Result<(), ImageError> {
        // Remaining worklist entries may still intern strings.
        self.process_add_object_worklist()?;

        let uses_interned_strings = match self.universe.intern_support() {
            Some(support) => self.universe.field(support.field).is_accessed(),
            None => false,
        };

        if uses_interned_strings {
            // Make sure the hub of the String[] table itself is written.
            let table_hub = self.universe.hub_of(self.universe.string_array_type());
            self.add_object(
                HostValue::Ref(table_hub),
                false,
                false,
                Reason::Root("internedStrings table"),
            )?;

            // No new interned strings from here on: the table is about to
            // be written.
            self.intern_strings_phase.disallow();

            let mut contents: Vec<String> = self.interned_strings.keys().cloned().collect();
            contents.sort();
            let values: Vec<HostValue> = contents
                .iter()
                .map(|c| HostValue::Ref(self.interned_strings[c]))
                .collect();
            let string_array_type = self.universe.string_array_type();
            let table = self.universe.new_ref_array(string_array_type, values);
            self.universe.set_image_interned_strings(table);
            self.add_object(
                HostValue::Ref(table),
                true,
                true,
                Reason::Root("internedStrings table"),
            )?;

            // Anything the table transitively added.
            self.process_add_object_worklist()?;
        } else {
            self.intern_strings_phase.disallow();
        }

        self.add_objects_phase.disallow();
        assert!(self.worklist.is_empty());
        Ok(())
    }

    // =========================================================================
    // The add algorithm
    // =========================================================================

    /// If necessary, add an object to the model of the image heap.
    ///
    /// Not every host object is added: nulls, words, and method pointers
    /// are data, not objects; duplicates collapse through canonicalization;
    /// class mirrors are represented by their hub.
    pub fn add_object(
        &mut self,
        value: HostValue,
        parent_canonicalizable: bool,
        immutable_from_parent: bool,
        reason: Reason,
    ) -> Result<(), ImageError> {
        if !self.add_objects_phase.is_allowed() {
            return Err(ImageError::phase(
                "adding objects",
                self.add_objects_phase.state_name(),
            ));
        }
        let original = match value {
            HostValue::Null
            | HostValue::Word(_)
            | HostValue::Prim(..)
            | HostValue::MethodPtr(_) => return Ok(()),
            HostValue::Ref(r) => r,
        };

        let identity_hash = self.universe.host().identity_hash(original);

        // The mirror's runtime representative is the hub; substitute it
        // here and keep the mirror's identity hash in play.
        let is_mirror = matches!(
            self.universe.host().get(original),
            HostObject::Mirror { .. }
        );
        let subject = if is_mirror {
            self.universe.replace_object_ref(original)
        } else {
            original
        };

        let canonicalizable = self.determine_canonicalizability(subject, parent_canonicalizable)?;
        let canonical = if canonicalizable {
            self.canonicalize(subject)
        } else {
            subject
        };

        if let Some(&existing) = self.objects.get(&canonical) {
            if canonical != original {
                self.infos[existing.index()].update(is_mirror, identity_hash);
                self.objects.entry(original).or_insert(existing);
            }
            return Ok(());
        }
        self.add_object_to_image_heap(
            original,
            canonical,
            canonicalizable,
            immutable_from_parent,
            identity_hash,
            reason,
        )
    }

    /// Can one instance be replaced by another? Strings get extra work:
    /// host-interned strings enter the image intern table and always
    /// canonicalize.
    fn determine_canonicalizability(
        &mut self,
        object: HostRef,
        parent_canonicalizable: bool,
    ) -> Result<bool, ImageError> {
        let content = self
            .universe
            .host()
            .string_content(object)
            .map(str::to_owned);
        if let Some(content) = content {
            if self.universe.host().is_host_interned(object) {
                if !self.interned_strings.contains_key(&content)
                    && !self.intern_strings_phase.is_allowed()
                {
                    return Err(ImageError::phase(
                        "interning strings",
                        self.intern_strings_phase.state_name(),
                    ));
                }
                self.interned_strings.entry(content).or_insert(object);
                return Ok(true);
            }
        }
        Ok(self.is_canonicalizable(object, parent_canonicalizable))
    }

    fn is_canonicalizable(&self, object: HostRef, parent_canonicalizable: bool) -> bool {
        let mut result = parent_canonicalizable;
        if self.matches_any(&self.known_non_canonicalizable, object) {
            result = false;
        } else if self.matches_any(&self.known_canonicalizable, object) {
            result = true;
        }
        result
    }

    fn matches_any(&self, classes: &[TypeId], object: HostRef) -> bool {
        match self.universe.lookup_type(object) {
            Some(t) => classes.iter().any(|&c| self.universe.is_instance_of(t, c)),
            None => false,
        }
    }

    /// First host object of a given content wins; later equals are replaced
    /// by the winner.
    fn canonicalize(&mut self, object: HostRef) -> HostRef {
        let key = CanonicalKey::for_object(&self.universe, object);
        *self.canonicalization.entry(key).or_insert(object)
    }

    /// The mechanics of adding one object: resolve its image type, size it,
    /// place it in a partition, and push its hub, fields, and elements.
    fn add_object_to_image_heap(
        &mut self,
        original: HostRef,
        canonical: HostRef,
        canonicalizable: bool,
        immutable_from_parent: bool,
        identity_hash: i32,
        reason: Reason,
    ) -> Result<(), ImageError> {
        let type_id = match self.universe.lookup_type(canonical) {
            Some(t) if self.universe.image_type(t).instantiated => t,
            _ => {
                return Err(ImageError::unreachable_type(
                    self.universe.describe(original),
                    self.fill_reason_chain(reason),
                ))
            }
        };

        if self.universe.image_type(type_id).is_instance_class() {
            let hybrid_info = self
                .universe
                .image_type(type_id)
                .instance()
                .and_then(|i| i.hybrid.clone());

            let (size, hybrid_array) = match &hybrid_info {
                Some(info) => {
                    if !self.hybrid_layouts.contains_key(&type_id) {
                        let hl = HybridLayout::new(&self.universe, type_id, info);
                        self.hybrid_layouts.insert(type_id, hl);
                    }

                    // The embedded array and bit set are written within the
                    // hybrid object, never as separate image objects.
                    if let Some(bitset_field) = info.bitset_field {
                        if let HostValue::Ref(bitset) =
                            self.universe.read_field(bitset_field, canonical)
                        {
                            self.blacklist.insert(bitset);
                        }
                    }
                    let array = match self.universe.read_field(info.array_field, canonical) {
                        HostValue::Ref(r) => r,
                        other => {
                            return Err(ImageError::unrecognized(format!(
                                "hybrid array of {} is {:?}",
                                self.universe.describe(canonical),
                                other
                            )))
                        }
                    };
                    self.blacklist.insert(array);

                    let length = match self.universe.host().get(array) {
                        HostObject::Array { data, .. } => data.len(),
                        other => {
                            return Err(ImageError::unrecognized(format!(
                                "hybrid array of {} is {:?}",
                                self.universe.describe(canonical),
                                other
                            )))
                        }
                    };
                    (self.hybrid_layouts[&type_id].total_size(length), Some(array))
                }
                None => (self.universe.instance_size_of(type_id), None),
            };

            let info_id = self.add_to_heap_partition(
                original,
                canonical,
                type_id,
                size,
                identity_hash,
                canonicalizable,
                immutable_from_parent,
                reason,
            )?;
            let hub = self.universe.hub_of(type_id);
            self.push(
                HostValue::Ref(hub),
                canonicalizable,
                false,
                Reason::Object(info_id),
            );

            // Even if the parent is not canonicalizable, the fields may be.
            // A canonical string pins its fields immutable.
            let fields_are_immutable =
                self.universe.host().string_content(canonical).is_some();
            let fields: Vec<FieldId> = self.universe.instance_fields(type_id).to_vec();
            for field in fields {
                let is_embedded = match &hybrid_info {
                    Some(info) => field == info.array_field || Some(field) == info.bitset_field,
                    None => false,
                };
                let (is_object, is_accessed) = {
                    let meta = self.universe.field(field);
                    (meta.kind.is_object(), meta.is_accessed())
                };
                if is_object && is_accessed && !is_embedded {
                    let value = self.universe.read_field(field, canonical);
                    self.push(
                        value,
                        canonicalizable,
                        fields_are_immutable,
                        Reason::Object(info_id),
                    );
                }
            }

            if let Some(array) = hybrid_array {
                if let HostObject::Array {
                    data: ArrayData::Ref(elements),
                    ..
                } = self.universe.host().get(array)
                {
                    let elements = elements.clone();
                    for value in elements {
                        self.push(value, canonicalizable, false, Reason::Object(info_id));
                    }
                }
            }
            Ok(())
        } else {
            let (component_kind, length) = match self.universe.host().get(canonical) {
                HostObject::Array { data, .. } => (data.element_kind(), data.len()),
                other => {
                    return Err(ImageError::unrecognized(format!(
                        "array-classed object is {:?}",
                        other
                    )))
                }
            };
            let size = self.layout.array_size(component_kind, length);
            let info_id = self.add_to_heap_partition(
                original,
                canonical,
                type_id,
                size,
                identity_hash,
                canonicalizable,
                immutable_from_parent,
                reason,
            )?;
            let hub = self.universe.hub_of(type_id);
            self.push(
                HostValue::Ref(hub),
                canonicalizable,
                false,
                Reason::Object(info_id),
            );

            if component_kind.is_object() {
                let elements = match self.universe.host().get(canonical) {
                    HostObject::Array {
                        data: ArrayData::Ref(elements),
                        ..
                    } => elements.clone(),
                    _ => Vec::new(),
                };
                for value in elements {
                    self.push(value, canonicalizable, false, Reason::Object(info_id));
                }
            }
            Ok(())
        }
    }

    /// Choose a partition, record the info at the partition's current end,
    /// and alias the original host object to it.
    #[allow(clippy::too_many_arguments)]
    fn add_to_heap_partition(
        &mut self,
        original: HostRef,
        canonical: HostRef,
        class: TypeId,
        size: u64,
        identity_hash: i32,
        canonicalizable: bool,
        immutable_from_parent: bool,
        reason: Reason,
    ) -> Result<InfoId, ImageError> {
        let immutable = self.is_immutable(canonical, canonicalizable, immutable_from_parent);
        let partition_kind = self.choose_partition(class, immutable);
        let offset = self.partitions[partition_kind.index()].size();
        if !self.layout.is_aligned(offset) {
            return Err(ImageError::misaligned(
                format!("start of {}", self.universe.describe(canonical)),
                offset,
            ));
        }
        if !self.layout.is_aligned(size) {
            return Err(ImageError::misaligned(
                format!("size of {}", self.universe.describe(canonical)),
                size,
            ));
        }

        let info_id = InfoId::from_index(self.infos.len());
        self.infos.push(ObjectInfo::new(
            canonical,
            class,
            partition_kind,
            offset,
            size,
            identity_hash,
            reason,
        ));
        self.partitions[partition_kind.index()].append(size);

        debug_assert!(!self.objects.contains_key(&canonical));
        self.objects.insert(canonical, info_id);
        if canonical != original {
            self.objects.entry(original).or_insert(info_id);
        }
        Ok(info_id)
    }

    /// Will this host object be immutable in the image heap?
    fn is_immutable(
        &self,
        object: HostRef,
        canonicalizable: bool,
        immutable_from_parent: bool,
    ) -> bool {
        if immutable_from_parent {
            return true;
        }
        if let Some(content) = self.universe.host().string_content(object) {
            // A zero hash is recomputed (and stored) at run time, so the
            // string is not immutable.
            return java_string_hash(content) != 0;
        }
        if self.known_immutable.contains(&object) {
            return true;
        }
        canonicalizable
    }

    /// Choose a partition by aggregating written-ness and reference content
    /// over the class.
    fn choose_partition(&self, class: TypeId, immutable_arg: bool) -> PartitionKind {
        let ty = self.universe.image_type(class);
        let mut written = false;
        let mut references = false;
        let mut immutable = immutable_arg;

        match &ty.kind {
            TypeKind::Instance(instance) => {
                if let Some(hybrid) = &instance.hybrid {
                    written |= self.universe.field(hybrid.array_field).is_written();
                    references |= hybrid.array_kind.is_object();
                }
                for &field in &instance.fields {
                    let meta = self.universe.field(field);
                    // A final field is only written during image
                    // construction, not in the running image.
                    written |= meta.is_written() && !meta.is_final();
                    references |= meta.kind.is_object();
                }
                // A monitor slot is a written reference slot.
                if instance.monitor_field_offset != 0 {
                    written = true;
                    references = true;
                    immutable = false;
                }
            }
            TypeKind::Array { component_kind, .. } => {
                written = true;
                references = component_kind.is_object();
            }
        }

        if self.config.use_only_writable_heap {
            // Emergency use only.
            debug_assert!(!self.config.spawn_isolates);
            return PartitionKind::WritableReference;
        }

        if !written || immutable {
            if references {
                PartitionKind::ReadOnlyReference
            } else {
                PartitionKind::ReadOnlyPrimitive
            }
        } else if references {
            PartitionKind::WritableReference
        } else {
            PartitionKind::WritablePrimitive
        }
    }

    // =========================================================================
    // Worklist
    // =========================================================================

    /// Break recursion with the worklist: deep object graphs must not
    /// overflow the call stack.
    fn push(
        &mut self,
        value: HostValue,
        parent_canonicalizable: bool,
        immutable_from_parent: bool,
        reason: Reason,
    ) {
        self.worklist.push(AddTask {
            value,
            parent_canonicalizable,
            immutable_from_parent,
            reason,
        });
    }

    fn process_add_object_worklist(&mut self) -> Result<(), ImageError> {
        while let Some(task) = self.worklist.pop() {
            self.add_object(
                task.value,
                task.parent_canonicalizable,
                task.immutable_from_parent,
                task.reason,
            )?;
        }
        Ok(())
    }

    // =========================================================================
    // Sections
    // =========================================================================
    //
    // Partitions map onto sections with no padding between them; make no
    // assumption about partitions being adjacent in memory.

    /// Combined size of the two read-only partitions.
    pub fn read_only_section_size(&self) -> u64 {
        self.partition(PartitionKind::ReadOnlyPrimitive).size()
            + self.partition(PartitionKind::ReadOnlyReference).size()
    }

    /// Combined size of the two writable partitions.
    pub fn writable_section_size(&self) -> u64 {
        self.partition(PartitionKind::WritablePrimitive).size()
            + self.partition(PartitionKind::WritableReference).size()
    }

    /// Place the read-only partitions: the reference partition starts right
    /// after the primitive one.
    pub fn set_read_only_section(&mut self, name: &str, offset: u64) {
        assert!(self.layout.is_aligned(offset));
        self.partitions[PartitionKind::ReadOnlyPrimitive.index()].set_section(name, offset);
        let after = self.partition(PartitionKind::ReadOnlyPrimitive).offset_in_section_of(
            self.partition(PartitionKind::ReadOnlyPrimitive).size(),
        );
        self.partitions[PartitionKind::ReadOnlyReference.index()].set_section(name, after);
    }

    /// Place the writable partitions, same scheme as the read-only ones.
    pub fn set_writable_section(&mut self, name: &str, offset: u64) {
        assert!(self.layout.is_aligned(offset));
        self.partitions[PartitionKind::WritablePrimitive.index()].set_section(name, offset);
        let after = self.partition(PartitionKind::WritablePrimitive).offset_in_section_of(
            self.partition(PartitionKind::WritablePrimitive).size(),
        );
        self.partitions[PartitionKind::WritableReference.index()].set_section(name, after);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The universe this builder consumes.
    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Mutable universe access, for features that change static field
    /// values late in the build. Targets that change identity after
    /// analysis are caught at write time.
    pub fn universe_mut(&mut self) -> &mut Universe {
        &mut self.universe
    }

    /// The build configuration.
    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// One of the four partitions.
    #[inline]
    pub fn partition(&self, kind: PartitionKind) -> &HeapPartition {
        &self.partitions[kind.index()]
    }

    /// The image record a host object maps to, if it was added.
    pub fn object_info(&self, object: HostRef) -> Option<&ObjectInfo> {
        self.objects.get(&object).map(|id| &self.infos[id.index()])
    }

    /// All image records, in insertion order.
    pub fn infos(&self) -> &[ObjectInfo] {
        &self.infos
    }

    /// Iterate the identity map: every aliased host object with its record.
    pub fn identity_entries(&self) -> impl Iterator<Item = (HostRef, &ObjectInfo)> {
        self.objects
            .iter()
            .map(move |(&r, id)| (r, &self.infos[id.index()]))
    }

    /// Is a host object blacklisted (embedded in a hybrid)?
    pub fn is_blacklisted(&self, object: HostRef) -> bool {
        self.blacklist.contains(&object)
    }

    /// The sorted contents of the intern table built so far.
    pub fn interned_string_contents(&self) -> Vec<String> {
        let mut contents: Vec<String> = self.interned_strings.keys().cloned().collect();
        contents.sort();
        contents
    }

    pub(crate) fn statics(&self) -> StaticFieldsSupport {
        match self.statics {
            Some(s) => s,
            None => panic!("static fields are unavailable before addInitialObjects"),
        }
    }

    // =========================================================================
    // Provenance
    // =========================================================================

    /// Render the chain of objects that made `reason` reachable, ending at
    /// a root tag.
    pub(crate) fn fill_reason_chain(&self, reason: Reason) -> String {
        let mut message = String::new();
        let mut current = reason;
        loop {
            match current {
                Reason::Object(id) => {
                    let info = &self.infos[id.index()];
                    message.push_str(&format!(
                        "    object: {}  of class: {}\n",
                        self.universe.describe(info.object),
                        self.universe.image_type(info.class).name
                    ));
                    current = info.reason;
                }
                Reason::Field(field) => {
                    message.push_str(&format!(
                        "    root: static field {}\n",
                        self.universe.field(field).name
                    ));
                    break;
                }
                Reason::Root(tag) => {
                    message.push_str(&format!("    root: {}\n", tag));
                    break;
                }
            }
        }
        message
    }

    /// Provenance starting from an already-placed object.
    pub(crate) fn provenance_of(&self, info: &ObjectInfo) -> String {
        format!(
            "    object: {}  of class: {}\n{}",
            self.universe.describe(info.object),
            self.universe.image_type(info.class).name,
            self.fill_reason_chain(info.reason)
        )
    }
}
