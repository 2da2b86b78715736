//! Raw-type registry
//!
//! The registry is the host model the descriptor engine resolves against:
//! raw types (classes, interfaces, tag types) with their declared type
//! parameters, generic supertype bindings, fields, and methods. The
//! embedding environment populates it once through the `register_*` methods
//! and then treats it as immutable; every query takes `&self`.
//!
//! A root `Object` type is pre-registered. Classes registered without an
//! explicit superclass extend it implicitly.

use rustc_hash::FxHashMap;

use crate::expr::TypeExpr;

/// Unique identifier for a raw type in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawTypeId(pub(crate) u32);

impl RawTypeId {
    /// Create a new RawTypeId (for internal use)
    pub(crate) const fn new(id: u32) -> Self {
        RawTypeId(id)
    }

    /// Get the raw ID value
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

/// Unique identifier for a registered field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub(crate) u32);

impl FieldId {
    /// Get the raw ID value
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

/// Unique identifier for a registered method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(pub(crate) u32);

impl MethodId {
    /// Get the raw ID value
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

/// The kind of a raw type declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawTypeKind {
    /// A concrete or abstract class
    Class,
    /// An interface
    Interface,
    /// A metadata tag type (behaves like an interface for type queries)
    Tag,
}

/// A declared type parameter: a name plus optional upper bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParamDef {
    /// The declared name, e.g. `E`
    pub name: String,
    /// Upper-bound expressions; empty means bounded only by the root type
    pub bounds: Vec<TypeExpr>,
}

/// A declared field: owner, name, and declared type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// The raw type declaring this field
    pub owner: RawTypeId,
    /// Field name
    pub name: String,
    /// Declared type expression
    pub ty: TypeExpr,
}

/// A declared method: owner, name, parameter and return type expressions.
///
/// `bridge_of` links a synthetic bridge method to the declaration it
/// bridges; hierarchy searches follow the link to the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    /// The raw type declaring this method
    pub owner: RawTypeId,
    /// Method name
    pub name: String,
    /// Declared parameter type expressions
    pub params: Vec<TypeExpr>,
    /// Declared return type expression
    pub return_type: TypeExpr,
    /// The bridged declaration, when this method is a bridge
    pub bridge_of: Option<MethodId>,
}

/// A raw type declaration. Built with the `RawTypeDef::class` /
/// `interface` / `tag` constructors and the chaining `with_*` methods, then
/// handed to [`RawTypeRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTypeDef {
    /// Type name, unique within the registry
    pub name: String,
    /// Declaration kind
    pub kind: RawTypeKind,
    /// Declared type parameters, in order
    pub type_params: Vec<TypeParamDef>,
    /// Generic superclass binding, e.g. `AbstractList<E>`. `None` means the
    /// implicit root for classes, nothing for interfaces and tags.
    pub superclass: Option<TypeExpr>,
    /// Generic interface bindings, in declaration order
    pub interfaces: Vec<TypeExpr>,
}

impl RawTypeDef {
    /// Start a class declaration.
    pub fn class(name: impl Into<String>) -> Self {
        RawTypeDef {
            name: name.into(),
            kind: RawTypeKind::Class,
            type_params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
        }
    }

    /// Start an interface declaration.
    pub fn interface(name: impl Into<String>) -> Self {
        RawTypeDef {
            kind: RawTypeKind::Interface,
            ..RawTypeDef::class(name)
        }
    }

    /// Start a tag type declaration.
    pub fn tag(name: impl Into<String>) -> Self {
        RawTypeDef {
            kind: RawTypeKind::Tag,
            ..RawTypeDef::class(name)
        }
    }

    /// Add an unbounded type parameter.
    pub fn with_param(mut self, name: impl Into<String>) -> Self {
        self.type_params.push(TypeParamDef {
            name: name.into(),
            bounds: Vec::new(),
        });
        self
    }

    /// Add a type parameter with upper bounds.
    pub fn with_bounded_param(mut self, name: impl Into<String>, bounds: Vec<TypeExpr>) -> Self {
        self.type_params.push(TypeParamDef {
            name: name.into(),
            bounds,
        });
        self
    }

    /// Set the generic superclass binding.
    pub fn extending(mut self, superclass: TypeExpr) -> Self {
        self.superclass = Some(superclass);
        self
    }

    /// Add a generic interface binding.
    pub fn implementing(mut self, interface: TypeExpr) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Find a declared type parameter by name.
    pub fn param(&self, name: &str) -> Option<&TypeParamDef> {
        self.type_params.iter().find(|p| p.name == name)
    }
}

/// A reference to a declared member slot whose type can be resolved:
/// a field, one method parameter, or a method return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberRef {
    /// A field's declared type
    Field(FieldId),
    /// A method parameter's declared type, by zero-based index
    Param(MethodId, usize),
    /// A method's declared return type
    Return(MethodId),
}

/// The registry of raw types and their declared members.
#[derive(Debug)]
pub struct RawTypeRegistry {
    types: Vec<RawTypeDef>,
    by_name: FxHashMap<String, RawTypeId>,
    fields: Vec<FieldDef>,
    methods: Vec<MethodDef>,
    fields_by_owner: FxHashMap<RawTypeId, Vec<FieldId>>,
    methods_by_owner: FxHashMap<RawTypeId, Vec<MethodId>>,
    object: RawTypeId,
}

impl RawTypeRegistry {
    /// Create a registry with the root `Object` type pre-registered.
    pub fn new() -> Self {
        let mut registry = RawTypeRegistry {
            types: Vec::new(),
            by_name: FxHashMap::default(),
            fields: Vec::new(),
            methods: Vec::new(),
            fields_by_owner: FxHashMap::default(),
            methods_by_owner: FxHashMap::default(),
            object: RawTypeId::new(0),
        };
        let object = registry.register(RawTypeDef::class("Object"));
        registry.object = object;
        registry
    }

    /// The pre-registered root type.
    pub fn object(&self) -> RawTypeId {
        self.object
    }

    /// Register a raw type declaration and return its id.
    ///
    /// # Panics
    ///
    /// Panics if a type with the same name is already registered.
    pub fn register(&mut self, def: RawTypeDef) -> RawTypeId {
        let id = RawTypeId::new(self.types.len() as u32);
        let previous = self.by_name.insert(def.name.clone(), id);
        assert!(
            previous.is_none(),
            "raw type '{}' is already registered",
            def.name
        );
        self.types.push(def);
        id
    }

    /// Register a field on `owner` and return its id.
    pub fn register_field(&mut self, owner: RawTypeId, name: impl Into<String>, ty: TypeExpr) -> FieldId {
        let id = FieldId(self.fields.len() as u32);
        self.fields.push(FieldDef {
            owner,
            name: name.into(),
            ty,
        });
        self.fields_by_owner.entry(owner).or_default().push(id);
        id
    }

    /// Register a method on `owner` and return its id.
    pub fn register_method(
        &mut self,
        owner: RawTypeId,
        name: impl Into<String>,
        params: Vec<TypeExpr>,
        return_type: TypeExpr,
    ) -> MethodId {
        self.register_method_def(MethodDef {
            owner,
            name: name.into(),
            params,
            return_type,
            bridge_of: None,
        })
    }

    /// Register a bridge method that stands in for `bridged`.
    pub fn register_bridge_method(
        &mut self,
        owner: RawTypeId,
        name: impl Into<String>,
        params: Vec<TypeExpr>,
        return_type: TypeExpr,
        bridged: MethodId,
    ) -> MethodId {
        self.register_method_def(MethodDef {
            owner,
            name: name.into(),
            params,
            return_type,
            bridge_of: Some(bridged),
        })
    }

    fn register_method_def(&mut self, def: MethodDef) -> MethodId {
        let id = MethodId(self.methods.len() as u32);
        self.methods_by_owner.entry(def.owner).or_default().push(id);
        self.methods.push(def);
        id
    }

    /// Set the generic superclass binding of an already registered type.
    ///
    /// Supertype bindings usually mention the subtype's own variables
    /// (`ArrayList<E> extends AbstractList<E>`), whose declarer id only
    /// exists after registration, so bindings can be supplied here instead
    /// of on the [`RawTypeDef`].
    ///
    /// # Panics
    ///
    /// Panics if the id was not issued by this registry.
    pub fn set_superclass(&mut self, id: RawTypeId, superclass: TypeExpr) {
        self.types[id.0 as usize].superclass = Some(superclass);
    }

    /// Add a generic interface binding to an already registered type.
    ///
    /// # Panics
    ///
    /// Panics if the id was not issued by this registry.
    pub fn add_interface(&mut self, id: RawTypeId, interface: TypeExpr) {
        self.types[id.0 as usize].interfaces.push(interface);
    }

    /// Replace the bounds of a declared type parameter on an already
    /// registered type. Self-referential bounds (`E extends Enum<E>`)
    /// mention the declarer's own id, so they can only be supplied here.
    ///
    /// # Panics
    ///
    /// Panics if the id was not issued by this registry or the parameter
    /// is not declared.
    pub fn set_param_bounds(&mut self, id: RawTypeId, param: &str, bounds: Vec<TypeExpr>) {
        let def = &mut self.types[id.0 as usize];
        let param_def = def
            .type_params
            .iter_mut()
            .find(|p| p.name == param)
            .unwrap_or_else(|| panic!("type '{}' declares no parameter '{}'", def.name, param));
        param_def.bounds = bounds;
    }

    /// Get a type declaration by id.
    ///
    /// # Panics
    ///
    /// Panics if the id was not issued by this registry.
    pub fn get(&self, id: RawTypeId) -> &RawTypeDef {
        &self.types[id.0 as usize]
    }

    /// Look up a type id by name.
    pub fn lookup(&self, name: &str) -> Option<RawTypeId> {
        self.by_name.get(name).copied()
    }

    /// Get a field declaration by id.
    ///
    /// # Panics
    ///
    /// Panics if the id was not issued by this registry.
    pub fn field(&self, id: FieldId) -> &FieldDef {
        &self.fields[id.0 as usize]
    }

    /// Get a method declaration by id.
    ///
    /// # Panics
    ///
    /// Panics if the id was not issued by this registry.
    pub fn method(&self, id: MethodId) -> &MethodDef {
        &self.methods[id.0 as usize]
    }

    /// Fields declared directly on `owner`, in registration order.
    pub fn fields_of(&self, owner: RawTypeId) -> &[FieldId] {
        self.fields_by_owner.get(&owner).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Methods declared directly on `owner`, in registration order.
    pub fn methods_of(&self, owner: RawTypeId) -> &[MethodId] {
        self.methods_by_owner.get(&owner).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The effective superclass id of a type: the declared binding's raw
    /// type, the implicit root for classes, `None` for interfaces, tags,
    /// and the root itself.
    pub fn superclass_id(&self, id: RawTypeId) -> Option<RawTypeId> {
        if id == self.object {
            return None;
        }
        let def = self.get(id);
        match &def.superclass {
            Some(expr) => expr.raw_id(),
            None if def.kind == RawTypeKind::Class => Some(self.object),
            None => None,
        }
    }

    /// The declared interface ids of a type, skipping malformed bindings.
    pub fn interface_ids(&self, id: RawTypeId) -> Vec<RawTypeId> {
        self.get(id)
            .interfaces
            .iter()
            .filter_map(TypeExpr::raw_id)
            .collect()
    }

    /// Walk the supertype graph (superclass chain plus interfaces) to
    /// decide whether `sub` is the same as or a subtype of `sup`.
    ///
    /// Everything is a subtype of the root. A visited set guards against
    /// malformed cyclic declarations.
    pub fn is_subtype_of(&self, sub: RawTypeId, sup: RawTypeId) -> bool {
        if sup == self.object {
            return true;
        }
        let mut stack = vec![sub];
        let mut visited = rustc_hash::FxHashSet::default();
        while let Some(current) = stack.pop() {
            if current == sup {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(superclass) = self.superclass_id(current) {
                stack.push(superclass);
            }
            stack.extend(self.interface_ids(current));
        }
        false
    }

    /// Number of registered types, including the root.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the registry holds only the root type.
    pub fn is_empty(&self) -> bool {
        self.types.len() <= 1
    }
}

impl Default for RawTypeRegistry {
    fn default() -> Self {
        RawTypeRegistry::new()
    }
}
