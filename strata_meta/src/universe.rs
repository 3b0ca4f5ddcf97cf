//! The type universe.
//!
//! Image types, fields, and methods as the static analyzer left them, plus
//! the hub host object for every type. The builder consumes this through
//! typed accessors only: `read_field`, `read_static`, `replace_object`,
//! size decoding through the hub's layout encoding.
//!
//! # Bootstrap
//!
//! The hub class is itself an image type, so the universe starts by
//! defining `DynamicHub` whose hub is an instance of itself, then the
//! string machinery and the well-known array types.

use crate::host::{java_string_hash, ArrayData, HostHeap, HostObject, HostRef, HostValue};
use crate::statics::{BoundaryFields, StaticFieldsSupport, StringInternSupport};
use bitflags::bitflags;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use strata_core::{Kind, ObjectLayout};

// =============================================================================
// Ids
// =============================================================================

/// Identity of an image type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    fn from_index(index: usize) -> Self {
        TypeId(index as u32)
    }

    /// Index into the universe's type table.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(u32);

impl FieldId {
    fn from_index(index: usize) -> Self {
        FieldId(index as u32)
    }

    /// Index into the universe's field table.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(u32);

impl MethodId {
    fn from_index(index: usize) -> Self {
        MethodId(index as u32)
    }

    /// Index into the universe's method table.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// =============================================================================
// Field metadata
// =============================================================================

bitflags! {
    /// Analysis results for a field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldFlags: u32 {
        /// The analyzer saw a read of this field.
        const ACCESSED = 1 << 0;
        /// The analyzer saw a write outside initialization.
        const WRITTEN = 1 << 1;
        /// Final: written only during image construction.
        const FINAL = 1 << 2;
        /// Static field living in a placeholder array.
        const STATIC = 1 << 3;
    }
}

/// A field as the analyzer and layout assignment left it.
#[derive(Debug, Clone)]
pub struct FieldMeta {
    /// Field name, for messages only.
    pub name: String,
    /// The class that declared it.
    pub declaring_type: TypeId,
    /// Storage kind.
    pub kind: Kind,
    /// Byte offset from the owner's start (instance fields) or from the
    /// placeholder array's start (static fields). Hybrid-embedded fields
    /// have no location of their own.
    pub location: Option<u64>,
    /// Analysis flags.
    pub flags: FieldFlags,
}

impl FieldMeta {
    /// Was the field read anywhere?
    #[inline]
    pub fn is_accessed(&self) -> bool {
        self.flags.contains(FieldFlags::ACCESSED)
    }

    /// Was the field written outside initialization?
    #[inline]
    pub fn is_written(&self) -> bool {
        self.flags.contains(FieldFlags::WRITTEN)
    }

    /// Is the field final?
    #[inline]
    pub fn is_final(&self) -> bool {
        self.flags.contains(FieldFlags::FINAL)
    }

    /// Is the field static?
    #[inline]
    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldFlags::STATIC)
    }
}

/// Declaration of one field when defining a type.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Storage kind.
    pub kind: Kind,
    /// Analysis flags.
    pub flags: FieldFlags,
}

impl FieldSpec {
    /// An accessed, non-final field.
    pub fn new(name: &str, kind: Kind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            flags: FieldFlags::ACCESSED,
        }
    }

    /// Mark the field written.
    pub fn written(mut self) -> Self {
        self.flags |= FieldFlags::WRITTEN;
        self
    }

    /// Mark the field final.
    pub fn constant(mut self) -> Self {
        self.flags |= FieldFlags::FINAL;
        self
    }

    /// Drop the accessed flag.
    pub fn unaccessed(mut self) -> Self {
        self.flags.remove(FieldFlags::ACCESSED);
        self
    }
}

// =============================================================================
// Methods
// =============================================================================

/// A compiled (or not) method the image may point at.
#[derive(Debug, Clone)]
pub struct MethodMeta {
    /// Method name, for messages only.
    pub name: String,
    /// Offset of the compiled code, present only for methods the compiler
    /// actually emitted and that are vtable-reachable.
    pub code_offset: Option<u64>,
}

// =============================================================================
// Types
// =============================================================================

/// Hybrid declaration: the class embeds a trailing array and optionally a
/// bit set in its own allocation.
#[derive(Debug, Clone)]
pub struct HybridSpec {
    /// Name of the field holding the embedded array.
    pub array_field: String,
    /// Name of the field holding the embedded bit set, if any.
    pub bitset_field: Option<String>,
    /// Element kind of the embedded array.
    pub array_kind: Kind,
    /// Number of bits reserved for the bit field.
    pub reserved_bits: u32,
}

/// Resolved hybrid metadata on an instance type.
#[derive(Debug, Clone)]
pub struct HybridInfo {
    /// The field holding the embedded array.
    pub array_field: FieldId,
    /// The field holding the embedded bit set, if any.
    pub bitset_field: Option<FieldId>,
    /// Element kind of the embedded array.
    pub array_kind: Kind,
    /// Number of bits reserved for the bit field.
    pub reserved_bits: u32,
}

/// Instance-class metadata.
#[derive(Debug, Clone)]
pub struct InstanceType {
    /// Superclass, if any.
    pub superclass: Option<TypeId>,
    /// All instance fields in layout order, inherited first.
    pub fields: SmallVec<[FieldId; 8]>,
    /// Byte offset one past the last field.
    pub fields_end: u64,
    /// Offset of the 4-byte identity hash field.
    pub hash_code_offset: u64,
    /// Offset of the monitor slot, 0 when the class has none.
    pub monitor_field_offset: u64,
    /// Aligned instance size.
    pub instance_size: u64,
    /// Hybrid metadata, if the class opts in.
    pub hybrid: Option<HybridInfo>,
}

/// Shape of an image type.
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// An instance class.
    Instance(InstanceType),
    /// An array class.
    Array {
        /// Component kind.
        component_kind: Kind,
        /// Component type for reference arrays that have one.
        component_type: Option<TypeId>,
    },
}

/// An image type.
#[derive(Debug, Clone)]
pub struct ImageType {
    /// Type name, for messages and histograms.
    pub name: String,
    /// The hub host object representing this type at run time.
    pub hub: HostRef,
    /// Did the analyzer see an instance of this type?
    pub instantiated: bool,
    /// Instance or array shape.
    pub kind: TypeKind,
}

impl ImageType {
    /// Is this an instance class?
    #[inline]
    pub fn is_instance_class(&self) -> bool {
        matches!(self.kind, TypeKind::Instance(_))
    }

    /// Is this an array class?
    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { .. })
    }

    /// Instance metadata, if an instance class.
    pub fn instance(&self) -> Option<&InstanceType> {
        match &self.kind {
            TypeKind::Instance(i) => Some(i),
            TypeKind::Array { .. } => None,
        }
    }

    /// Component kind, if an array class.
    pub fn component_kind(&self) -> Option<Kind> {
        match self.kind {
            TypeKind::Array { component_kind, .. } => Some(component_kind),
            TypeKind::Instance(_) => None,
        }
    }
}

/// Options when defining a type.
#[derive(Debug, Clone, Default)]
pub struct TypeOptions {
    /// Allocate a monitor slot in the instance layout.
    pub needs_monitor: bool,
    /// Hybrid declaration.
    pub hybrid: Option<HybridSpec>,
    /// Pretend the analyzer never saw an instance (for negative tests the
    /// analyzer normally sets this).
    pub not_instantiated: bool,
}

// =============================================================================
// Layout encoding
// =============================================================================

/// Encode an instance size as the hub's layout encoding.
pub fn encode_instance_layout(size: u64) -> i32 {
    size as i32
}

/// Decode an instance size from a hub layout encoding.
pub fn decode_instance_size(encoding: i32) -> u64 {
    debug_assert!(encoding > 0, "not an instance layout encoding");
    encoding as u64
}

/// Encode an array component kind as the hub's layout encoding.
pub fn encode_array_layout(kind: Kind) -> i32 {
    -(kind as i32 + 1)
}

// =============================================================================
// Universe
// =============================================================================

/// The metadata view the builder consumes.
pub struct Universe {
    layout: ObjectLayout,
    host: HostHeap,
    types: Vec<ImageType>,
    fields: Vec<FieldMeta>,
    methods: Vec<MethodMeta>,
    static_fields: Vec<FieldId>,
    static_values: FxHashMap<FieldId, HostValue>,
    statics: Option<StaticFieldsSupport>,
    boundary: BoundaryFields,
    intern_support: Option<StringInternSupport>,
    mirrors: FxHashMap<TypeId, HostRef>,

    dynamic_hub_type: TypeId,
    string_type: TypeId,
    char_array_type: TypeId,
    byte_array_type: TypeId,
    object_array_type: TypeId,
    string_array_type: TypeId,

    string_value_field: FieldId,
    string_hash_field: FieldId,
    hub_vtable_position: usize,
    hub_name_position: usize,

    static_prim_cursor: u64,
    static_ref_slots: u32,
}

impl Universe {
    /// Create a universe with the well-known types bootstrapped.
    pub fn new(layout: ObjectLayout) -> Self {
        let placeholder_field = FieldId(0);
        let mut universe = Universe {
            layout,
            host: HostHeap::new(),
            types: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            static_fields: Vec::new(),
            static_values: FxHashMap::default(),
            statics: None,
            boundary: BoundaryFields {
                first_read_only_primitive: placeholder_field,
                last_read_only_primitive: placeholder_field,
                first_read_only_reference: placeholder_field,
                last_read_only_reference: placeholder_field,
                first_writable_primitive: placeholder_field,
                last_writable_primitive: placeholder_field,
                first_writable_reference: placeholder_field,
                last_writable_reference: placeholder_field,
            },
            intern_support: None,
            mirrors: FxHashMap::default(),
            dynamic_hub_type: TypeId(0),
            string_type: TypeId(0),
            char_array_type: TypeId(0),
            byte_array_type: TypeId(0),
            object_array_type: TypeId(0),
            string_array_type: TypeId(0),
            string_value_field: placeholder_field,
            string_hash_field: placeholder_field,
            hub_vtable_position: 3,
            hub_name_position: 0,
            static_prim_cursor: 0,
            static_ref_slots: 0,
        };

        // The hub class first: its own hub is an instance of itself.
        universe.dynamic_hub_type = universe.define_instance_type(
            "DynamicHub",
            None,
            vec![
                FieldSpec::new("name", Kind::Object).constant(),
                FieldSpec::new("layoutEncoding", Kind::Int).constant(),
                FieldSpec::new("hashCodeOffset", Kind::Int).constant(),
                FieldSpec::new("vtable", Kind::Object).constant(),
            ],
            TypeOptions::default(),
        );

        universe.string_type = universe.define_instance_type(
            "java.lang.String",
            None,
            vec![
                FieldSpec::new("value", Kind::Object).constant(),
                FieldSpec::new("hash", Kind::Int).written(),
            ],
            TypeOptions::default(),
        );
        let string_fields = match &universe.types[universe.string_type.index()].kind {
            TypeKind::Instance(i) => (i.fields[0], i.fields[1]),
            TypeKind::Array { .. } => unreachable!(),
        };
        universe.string_value_field = string_fields.0;
        universe.string_hash_field = string_fields.1;

        universe.char_array_type = universe.define_array_type("char[]", Kind::Char, None);
        universe.byte_array_type = universe.define_array_type("byte[]", Kind::Byte, None);
        universe.object_array_type =
            universe.define_array_type("java.lang.Object[]", Kind::Object, None);
        let string_type = universe.string_type;
        universe.string_array_type =
            universe.define_array_type("java.lang.String[]", Kind::Object, Some(string_type));

        // The runtime-info boundary slots: eight static references patched
        // after the heap is written.
        universe.boundary = BoundaryFields {
            first_read_only_primitive: universe.define_boundary_field("firstReadOnlyPrimitiveObject"),
            last_read_only_primitive: universe.define_boundary_field("lastReadOnlyPrimitiveObject"),
            first_read_only_reference: universe.define_boundary_field("firstReadOnlyReferenceObject"),
            last_read_only_reference: universe.define_boundary_field("lastReadOnlyReferenceObject"),
            first_writable_primitive: universe.define_boundary_field("firstWritablePrimitiveObject"),
            last_writable_primitive: universe.define_boundary_field("lastWritablePrimitiveObject"),
            first_writable_reference: universe.define_boundary_field("firstWritableReferenceObject"),
            last_writable_reference: universe.define_boundary_field("lastWritableReferenceObject"),
        };

        universe
    }

    fn define_boundary_field(&mut self, name: &str) -> FieldId {
        self.define_static_field(
            name,
            Kind::Object,
            FieldFlags::ACCESSED | FieldFlags::WRITTEN,
        )
    }

    // =========================================================================
    // Type definition
    // =========================================================================

    /// Define an instance class: assign field locations, compute the
    /// instance layout, and allocate the hub host object.
    pub fn define_instance_type(
        &mut self,
        name: &str,
        superclass: Option<TypeId>,
        specs: Vec<FieldSpec>,
        options: TypeOptions,
    ) -> TypeId {
        let tid = TypeId::from_index(self.types.len());
        let reference_size = self.layout.reference_size;

        let mut fields: SmallVec<[FieldId; 8]> = SmallVec::new();
        let mut cursor = match superclass {
            Some(s) => {
                assert!(options.hybrid.is_none(), "hybrid classes have no superclass");
                let sup = match &self.types[s.index()].kind {
                    TypeKind::Instance(i) => i,
                    TypeKind::Array { .. } => panic!("superclass {} is an array", s.index()),
                };
                fields.extend(sup.fields.iter().copied());
                sup.fields_end
            }
            None => match &options.hybrid {
                // The bit field sits between the array length and the
                // instance fields; fields pack after it.
                Some(h) => {
                    self.layout.array_length_offset + 4 + (u64::from(h.reserved_bits) + 7) / 8
                }
                None => self.layout.first_field_offset,
            },
        };

        let is_embedded = |field_name: &str| match &options.hybrid {
            Some(h) => {
                field_name == h.array_field
                    || h.bitset_field.as_deref() == Some(field_name)
            }
            None => false,
        };

        for spec in specs {
            let fid = FieldId::from_index(self.fields.len());
            let location = if is_embedded(&spec.name) {
                assert!(spec.kind.is_object(), "embedded hybrid fields are references");
                None
            } else {
                let size = spec.kind.size_in_bytes(reference_size);
                cursor = align_to(cursor, size);
                let loc = cursor;
                cursor += size;
                Some(loc)
            };
            self.fields.push(FieldMeta {
                name: spec.name,
                declaring_type: tid,
                kind: spec.kind,
                location,
                flags: spec.flags,
            });
            fields.push(fid);
        }

        let fields_end = cursor;
        let hash_code_offset = align_to(fields_end, 4);
        let mut after = hash_code_offset + 4;
        let monitor_field_offset = if options.needs_monitor {
            let offset = align_to(after, reference_size);
            after = offset + reference_size;
            offset
        } else {
            0
        };
        let instance_size = self.layout.align_up(after);

        let hybrid = options.hybrid.map(|h| HybridInfo {
            array_field: self.resolve_own_field(&fields, &h.array_field),
            bitset_field: h
                .bitset_field
                .as_deref()
                .map(|n| self.resolve_own_field(&fields, n)),
            array_kind: h.array_kind,
            reserved_bits: h.reserved_bits,
        });

        let hub = self.alloc_hub(encode_instance_layout(instance_size), hash_code_offset as i32);
        self.types.push(ImageType {
            name: name.to_owned(),
            hub,
            instantiated: !options.not_instantiated,
            kind: TypeKind::Instance(InstanceType {
                superclass,
                fields,
                fields_end,
                hash_code_offset,
                monitor_field_offset,
                instance_size,
                hybrid,
            }),
        });
        tid
    }

    /// Define an array class and allocate its hub.
    pub fn define_array_type(
        &mut self,
        name: &str,
        component_kind: Kind,
        component_type: Option<TypeId>,
    ) -> TypeId {
        let tid = TypeId::from_index(self.types.len());
        let hub = self.alloc_hub(
            encode_array_layout(component_kind),
            self.layout.array_hash_code_offset as i32,
        );
        self.types.push(ImageType {
            name: name.to_owned(),
            hub,
            instantiated: true,
            kind: TypeKind::Array {
                component_kind,
                component_type,
            },
        });
        tid
    }

    fn alloc_hub(&mut self, layout_encoding: i32, hash_code_offset: i32) -> HostRef {
        self.host.alloc(HostObject::Instance {
            class: self.dynamic_hub_type,
            fields: vec![
                HostValue::Null,
                HostValue::int(layout_encoding),
                HostValue::int(hash_code_offset),
                HostValue::Null,
            ],
        })
    }

    fn resolve_own_field(&self, fields: &[FieldId], name: &str) -> FieldId {
        fields
            .iter()
            .copied()
            .find(|f| self.fields[f.index()].name == name)
            .unwrap_or_else(|| panic!("hybrid names unknown field {}", name))
    }

    /// Mark a type as seen instantiated by the analyzer.
    pub fn mark_instantiated(&mut self, tid: TypeId) {
        self.types[tid.index()].instantiated = true;
    }

    /// Register a method.
    pub fn define_method(&mut self, name: &str, code_offset: Option<u64>) -> MethodId {
        let mid = MethodId::from_index(self.methods.len());
        self.methods.push(MethodMeta {
            name: name.to_owned(),
            code_offset,
        });
        mid
    }

    // =========================================================================
    // Static fields
    // =========================================================================

    /// Register a static field and assign its placeholder location.
    pub fn define_static_field(&mut self, name: &str, kind: Kind, flags: FieldFlags) -> FieldId {
        assert!(
            self.statics.is_none(),
            "static layout is frozen once the placeholder arrays exist"
        );
        let fid = FieldId::from_index(self.fields.len());
        let location = if kind.is_object() {
            let slot = u64::from(self.static_ref_slots);
            self.static_ref_slots += 1;
            self.layout.array_element_offset(Kind::Object, slot)
        } else {
            let size = kind.size_in_bytes(self.layout.reference_size);
            self.static_prim_cursor = align_to(self.static_prim_cursor, size);
            let offset = self.layout.array_base_offset + self.static_prim_cursor;
            self.static_prim_cursor += size;
            offset
        };
        self.fields.push(FieldMeta {
            name: name.to_owned(),
            declaring_type: self.dynamic_hub_type,
            kind,
            location: Some(location),
            flags: flags | FieldFlags::STATIC,
        });
        self.static_fields.push(fid);
        fid
    }

    /// The two placeholder arrays holding static slots, creating them on
    /// first use (which freezes static layout).
    pub fn static_fields_support(&mut self) -> StaticFieldsSupport {
        if self.statics.is_none() {
            let primitive_len = self.static_prim_cursor as usize;
            let byte_array_type = self.byte_array_type;
            let object_array_type = self.object_array_type;
            let primitive_fields = self.host.alloc(HostObject::Array {
                class: byte_array_type,
                data: ArrayData::Byte(vec![0; primitive_len]),
            });
            let reference_fields = self.host.alloc(HostObject::Array {
                class: object_array_type,
                data: ArrayData::Ref(vec![HostValue::Null; self.static_ref_slots as usize]),
            });
            self.statics = Some(StaticFieldsSupport {
                primitive_fields,
                reference_fields,
            });
        }
        match self.statics {
            Some(s) => s,
            None => unreachable!(),
        }
    }

    /// All registered static fields.
    pub fn static_field_ids(&self) -> &[FieldId] {
        &self.static_fields
    }

    /// Current value of a static field.
    pub fn read_static(&self, field: FieldId) -> HostValue {
        let meta = &self.fields[field.index()];
        debug_assert!(meta.is_static());
        self.static_values
            .get(&field)
            .copied()
            .unwrap_or_else(|| HostValue::zero_of(meta.kind))
    }

    /// Store a static field value (the driver's side of root installation).
    pub fn set_static_value(&mut self, field: FieldId, value: HostValue) {
        debug_assert!(self.fields[field.index()].is_static());
        self.static_values.insert(field, value);
    }

    /// The runtime-info boundary slots.
    pub fn boundary_fields(&self) -> &BoundaryFields {
        &self.boundary
    }

    // =========================================================================
    // String interning
    // =========================================================================

    /// Register the static `String[]` slot that receives the sorted intern
    /// table, enabling intern support.
    pub fn enable_string_interning(&mut self) -> FieldId {
        let field = self.define_static_field(
            "imageInternedStrings",
            Kind::Object,
            FieldFlags::ACCESSED | FieldFlags::WRITTEN,
        );
        self.intern_support = Some(StringInternSupport {
            field,
            image_array: None,
        });
        field
    }

    /// Intern support, if enabled.
    pub fn intern_support(&self) -> Option<&StringInternSupport> {
        self.intern_support.as_ref()
    }

    /// Install the builder-produced sorted intern array.
    pub fn set_image_interned_strings(&mut self, array: HostRef) {
        let field = match &mut self.intern_support {
            Some(support) => {
                support.image_array = Some(array);
                support.field
            }
            None => panic!("string interning is not enabled"),
        };
        self.set_static_value(field, HostValue::Ref(array));
    }

    // =========================================================================
    // Host object construction
    // =========================================================================

    /// Allocate an instance with one value per instance field.
    pub fn new_instance(&mut self, class: TypeId, values: Vec<HostValue>) -> HostRef {
        let expected = match &self.types[class.index()].kind {
            TypeKind::Instance(i) => i.fields.len(),
            TypeKind::Array { .. } => panic!("{} is not an instance class", class.index()),
        };
        assert_eq!(values.len(), expected, "field value count mismatch");
        self.host.alloc(HostObject::Instance {
            class,
            fields: values,
        })
    }

    /// Allocate an array with the given element storage.
    pub fn new_array(&mut self, class: TypeId, data: ArrayData) -> HostRef {
        match self.types[class.index()].kind {
            TypeKind::Array { component_kind, .. } => {
                assert_eq!(component_kind, data.element_kind(), "component kind mismatch")
            }
            TypeKind::Instance(_) => panic!("{} is not an array class", class.index()),
        }
        self.host.alloc(HostObject::Array { class, data })
    }

    /// Allocate a reference array.
    pub fn new_ref_array(&mut self, class: TypeId, values: Vec<HostValue>) -> HostRef {
        self.new_array(class, ArrayData::Ref(values))
    }

    /// Allocate a string and its backing char array.
    pub fn new_string(&mut self, content: &str) -> HostRef {
        let char_array_type = self.char_array_type;
        let string_type = self.string_type;
        let chars = self.host.alloc(HostObject::Array {
            class: char_array_type,
            data: ArrayData::Char(content.encode_utf16().collect()),
        });
        self.host.alloc(HostObject::Str {
            class: string_type,
            value: content.to_owned(),
            chars,
        })
    }

    /// Intern a string in the host intern table, reusing the first object
    /// of that content.
    pub fn intern_string(&mut self, content: &str) -> HostRef {
        if let Some(existing) = self.host.lookup_interned(content) {
            return existing;
        }
        let r = self.new_string(content);
        self.host.record_interned(content.to_owned(), r);
        r
    }

    /// Allocate a bit set with the given bits set.
    pub fn new_bitset(&mut self, bits: &[u32]) -> HostRef {
        let words_len = bits.iter().map(|&b| b as usize / 64 + 1).max().unwrap_or(0);
        let mut words = vec![0u64; words_len];
        for &bit in bits {
            words[bit as usize / 64] |= 1u64 << (bit % 64);
        }
        self.host.alloc(HostObject::BitSet { words })
    }

    /// The class mirror for a type, allocated once.
    pub fn mirror_of(&mut self, tid: TypeId) -> HostRef {
        if let Some(&m) = self.mirrors.get(&tid) {
            return m;
        }
        let m = self.host.alloc(HostObject::Mirror { type_id: tid });
        self.mirrors.insert(tid, m);
        m
    }

    /// Install a vtable (an `Object[]` of method pointers) on a type's hub.
    pub fn set_hub_vtable(&mut self, tid: TypeId, methods: &[MethodId]) {
        let object_array_type = self.object_array_type;
        let values = methods.iter().map(|&m| HostValue::MethodPtr(m)).collect();
        let array = self.new_ref_array(object_array_type, values);
        let hub = self.types[tid.index()].hub;
        let position = self.hub_vtable_position;
        self.host
            .set_instance_field_value(hub, position, HostValue::Ref(array));
    }

    /// Install the name string on a type's hub.
    pub fn set_hub_name(&mut self, tid: TypeId) {
        let name = self.types[tid.index()].name.clone();
        let s = self.intern_string(&name);
        let hub = self.types[tid.index()].hub;
        let position = self.hub_name_position;
        self.host
            .set_instance_field_value(hub, position, HostValue::Ref(s));
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The object layout in force.
    pub fn layout(&self) -> ObjectLayout {
        self.layout
    }

    /// The host heap.
    pub fn host(&self) -> &HostHeap {
        &self.host
    }

    /// Mutable host heap (hash providers, test setup).
    pub fn host_mut(&mut self) -> &mut HostHeap {
        &mut self.host
    }

    /// The image type of a host object, when it has one. Mirrors and bit
    /// sets have no image type of their own.
    pub fn lookup_type(&self, r: HostRef) -> Option<TypeId> {
        match self.host.get(r) {
            HostObject::Instance { class, .. }
            | HostObject::Array { class, .. }
            | HostObject::Str { class, .. } => Some(*class),
            HostObject::BitSet { .. } | HostObject::Mirror { .. } => None,
        }
    }

    /// Type metadata.
    #[inline]
    pub fn image_type(&self, tid: TypeId) -> &ImageType {
        &self.types[tid.index()]
    }

    /// Number of defined types.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Field metadata.
    #[inline]
    pub fn field(&self, fid: FieldId) -> &FieldMeta {
        &self.fields[fid.index()]
    }

    /// Method metadata, if the id is known.
    pub fn method(&self, mid: MethodId) -> Option<&MethodMeta> {
        self.methods.get(mid.index())
    }

    /// The hub host object of a type.
    #[inline]
    pub fn hub_of(&self, tid: TypeId) -> HostRef {
        self.types[tid.index()].hub
    }

    /// All instance fields of a class, inherited first.
    pub fn instance_fields(&self, tid: TypeId) -> &[FieldId] {
        match &self.types[tid.index()].kind {
            TypeKind::Instance(i) => &i.fields,
            TypeKind::Array { .. } => &[],
        }
    }

    /// Instance size, decoded from the hub's layout encoding.
    pub fn instance_size_of(&self, tid: TypeId) -> u64 {
        let hub = self.types[tid.index()].hub;
        match self.host.get(hub) {
            HostObject::Instance { fields, .. } => match fields[1] {
                HostValue::Prim(Kind::Int, bits) => decode_instance_size(bits as u32 as i32),
                _ => unreachable!("hub layout encoding must be an int"),
            },
            _ => unreachable!("hub must be an instance"),
        }
    }

    /// Does `tid` equal `ancestor` or inherit from it?
    pub fn is_instance_of(&self, tid: TypeId, ancestor: TypeId) -> bool {
        let mut current = Some(tid);
        while let Some(t) = current {
            if t == ancestor {
                return true;
            }
            current = match &self.types[t.index()].kind {
                TypeKind::Instance(i) => i.superclass,
                TypeKind::Array { .. } => None,
            };
        }
        false
    }

    /// Substitute a host value the runtime represents differently: class
    /// mirrors become their type's hub. Everything else passes through.
    pub fn replace_object(&self, value: HostValue) -> HostValue {
        match value {
            HostValue::Ref(r) => HostValue::Ref(self.replace_object_ref(r)),
            other => other,
        }
    }

    /// Ref-level form of [`Universe::replace_object`].
    pub fn replace_object_ref(&self, r: HostRef) -> HostRef {
        match self.host.get(r) {
            HostObject::Mirror { type_id } => self.types[type_id.index()].hub,
            _ => r,
        }
    }

    /// Read an instance field off a receiver.
    pub fn read_field(&self, field: FieldId, receiver: HostRef) -> HostValue {
        debug_assert!(!self.fields[field.index()].is_static());
        match self.host.get(receiver) {
            HostObject::Instance { class, fields } => {
                let position = self.field_position(*class, field);
                fields[position]
            }
            HostObject::Str { value, chars, .. } => {
                if field == self.string_value_field {
                    HostValue::Ref(*chars)
                } else if field == self.string_hash_field {
                    HostValue::int(java_string_hash(value))
                } else {
                    unreachable!("field {} is not a string field", field.index())
                }
            }
            other => unreachable!("cannot read field off {:?}", other),
        }
    }

    fn field_position(&self, class: TypeId, field: FieldId) -> usize {
        match &self.types[class.index()].kind {
            TypeKind::Instance(i) => i
                .fields
                .iter()
                .position(|&f| f == field)
                .unwrap_or_else(|| {
                    panic!(
                        "field {} not declared on {}",
                        self.fields[field.index()].name,
                        self.types[class.index()].name
                    )
                }),
            TypeKind::Array { .. } => panic!("arrays have no fields"),
        }
    }

    // Well-known types.

    /// The hub class.
    pub fn dynamic_hub_type(&self) -> TypeId {
        self.dynamic_hub_type
    }

    /// java.lang.String.
    pub fn string_type(&self) -> TypeId {
        self.string_type
    }

    /// char[].
    pub fn char_array_type(&self) -> TypeId {
        self.char_array_type
    }

    /// byte[].
    pub fn byte_array_type(&self) -> TypeId {
        self.byte_array_type
    }

    /// java.lang.Object[].
    pub fn object_array_type(&self) -> TypeId {
        self.object_array_type
    }

    /// java.lang.String[].
    pub fn string_array_type(&self) -> TypeId {
        self.string_array_type
    }

    /// One-line description of a host object for error messages.
    pub fn describe(&self, r: HostRef) -> String {
        match self.host.get(r) {
            HostObject::Str { value, .. } => format!("String \"{}\"", value),
            HostObject::Instance { class, .. } => {
                format!("instance of {}", self.types[class.index()].name)
            }
            HostObject::Array { class, data } => {
                format!("{} of length {}", self.types[class.index()].name, data.len())
            }
            HostObject::BitSet { .. } => "bit set".to_owned(),
            HostObject::Mirror { type_id } => {
                format!("class mirror of {}", self.types[type_id.index()].name)
            }
        }
    }
}

/// Round `n` up to a power-of-two alignment.
fn align_to(n: u64, alignment: u64) -> u64 {
    (n + alignment - 1) & !(alignment - 1)
}
