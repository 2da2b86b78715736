use std::sync::Arc;

use trellis_types::{
    AssignabilityContext, RawTypeDef, RawTypeId, RawTypeRegistry, TypeContext, TypeDescriptor,
    TypeExpr,
};

struct World {
    ctx: TypeContext,
    char_sequence: RawTypeId,
    string: RawTypeId,
    number: RawTypeId,
    integer: RawTypeId,
    collection: RawTypeId,
    list: RawTypeId,
    array_list: RawTypeId,
    map: RawTypeId,
    hash_map: RawTypeId,
    enum_base: RawTypeId,
    status: RawTypeId,
}

fn world() -> World {
    let mut registry = RawTypeRegistry::new();
    let char_sequence = registry.register(RawTypeDef::interface("CharSequence"));
    let string =
        registry.register(RawTypeDef::class("String").implementing(TypeExpr::Raw(char_sequence)));
    let number = registry.register(RawTypeDef::class("Number"));
    let integer = registry.register(RawTypeDef::class("Integer").extending(TypeExpr::Raw(number)));

    let collection = registry.register(RawTypeDef::interface("Collection").with_param("E"));
    let list = registry.register(RawTypeDef::interface("List").with_param("E"));
    registry.add_interface(
        list,
        TypeExpr::parameterized(collection, vec![TypeExpr::variable(list, "E")]),
    );
    let array_list = registry.register(RawTypeDef::class("ArrayList").with_param("E"));
    registry.add_interface(
        array_list,
        TypeExpr::parameterized(list, vec![TypeExpr::variable(array_list, "E")]),
    );
    let map = registry.register(RawTypeDef::interface("Map").with_param("K").with_param("V"));
    let hash_map = registry.register(RawTypeDef::class("HashMap").with_param("K").with_param("V"));
    registry.add_interface(
        hash_map,
        TypeExpr::parameterized(
            map,
            vec![
                TypeExpr::variable(hash_map, "K"),
                TypeExpr::variable(hash_map, "V"),
            ],
        ),
    );

    // Enum-style self-referential hierarchy: Status extends EnumBase<Status>.
    let enum_base = registry.register(RawTypeDef::class("EnumBase").with_param("E"));
    registry.set_param_bounds(
        enum_base,
        "E",
        vec![TypeExpr::parameterized(
            enum_base,
            vec![TypeExpr::variable(enum_base, "E")],
        )],
    );
    let status = registry.register(RawTypeDef::class("Status"));
    registry.set_superclass(
        status,
        TypeExpr::parameterized(enum_base, vec![TypeExpr::Raw(status)]),
    );

    World {
        ctx: TypeContext::new(registry),
        char_sequence,
        string,
        number,
        integer,
        collection,
        list,
        array_list,
        map,
        hash_map,
        enum_base,
        status,
    }
}

fn parameterized(w: &World, raw: RawTypeId, args: Vec<TypeExpr>) -> Arc<TypeDescriptor> {
    w.ctx.for_expr(TypeExpr::parameterized(raw, args), None)
}

// ============================================================================
// Hierarchy projection
// ============================================================================

#[test]
fn test_interface_supertype_accepts_subtype() {
    let w = world();
    let list_of_string = parameterized(&w, w.list, vec![TypeExpr::Raw(w.string)]);
    let collection_of_string = parameterized(&w, w.collection, vec![TypeExpr::Raw(w.string)]);
    let array_list_of_string = parameterized(&w, w.array_list, vec![TypeExpr::Raw(w.string)]);

    assert!(w.ctx.is_assignable(&list_of_string, &array_list_of_string));
    assert!(w.ctx.is_assignable(&collection_of_string, &array_list_of_string));
    assert!(w.ctx.is_assignable(&collection_of_string, &list_of_string));
    assert!(!w.ctx.is_assignable(&array_list_of_string, &list_of_string));
}

#[test]
fn test_map_projection_keeps_both_arguments() {
    let w = world();
    let map_string_integer = parameterized(
        &w,
        w.map,
        vec![TypeExpr::Raw(w.string), TypeExpr::Raw(w.integer)],
    );
    let hash_map_string_integer = parameterized(
        &w,
        w.hash_map,
        vec![TypeExpr::Raw(w.string), TypeExpr::Raw(w.integer)],
    );
    let hash_map_string_number = parameterized(
        &w,
        w.hash_map,
        vec![TypeExpr::Raw(w.string), TypeExpr::Raw(w.number)],
    );

    assert!(w.ctx.is_assignable(&map_string_integer, &hash_map_string_integer));
    assert!(
        !w.ctx.is_assignable(&map_string_integer, &hash_map_string_number),
        "value argument must match exactly"
    );
}

#[test]
fn test_nested_generic_arguments_are_invariant() {
    let w = world();
    // Map<String, List<Integer>> from HashMap<String, ArrayList<Integer>>
    // must fail: the nested argument needs an exact match.
    let target = parameterized(
        &w,
        w.map,
        vec![
            TypeExpr::Raw(w.string),
            TypeExpr::parameterized(w.list, vec![TypeExpr::Raw(w.integer)]),
        ],
    );
    let exact = parameterized(
        &w,
        w.hash_map,
        vec![
            TypeExpr::Raw(w.string),
            TypeExpr::parameterized(w.list, vec![TypeExpr::Raw(w.integer)]),
        ],
    );
    let subtyped_value = parameterized(
        &w,
        w.hash_map,
        vec![
            TypeExpr::Raw(w.string),
            TypeExpr::parameterized(w.array_list, vec![TypeExpr::Raw(w.integer)]),
        ],
    );

    assert!(w.ctx.is_assignable(&target, &exact));
    assert!(!w.ctx.is_assignable(&target, &subtyped_value));
}

#[test]
fn test_wildcard_relaxes_nested_invariance() {
    let w = world();
    // Map<String, ? extends List<Integer>> accepts the ArrayList value.
    let target = parameterized(
        &w,
        w.map,
        vec![
            TypeExpr::Raw(w.string),
            TypeExpr::wildcard_extending(TypeExpr::parameterized(
                w.list,
                vec![TypeExpr::Raw(w.integer)],
            )),
        ],
    );
    let candidate = parameterized(
        &w,
        w.hash_map,
        vec![
            TypeExpr::Raw(w.string),
            TypeExpr::parameterized(w.array_list, vec![TypeExpr::Raw(w.integer)]),
        ],
    );

    assert!(w.ctx.is_assignable(&target, &candidate));
}

// ============================================================================
// Wildcards
// ============================================================================

#[test]
fn test_wildcard_matrix() {
    let w = world();
    let extends_number = parameterized(
        &w,
        w.list,
        vec![TypeExpr::wildcard_extending(TypeExpr::Raw(w.number))],
    );
    let super_integer = parameterized(
        &w,
        w.list,
        vec![TypeExpr::wildcard_super(TypeExpr::Raw(w.integer))],
    );
    let unbounded = parameterized(&w, w.list, vec![TypeExpr::wildcard()]);

    let of_integer = parameterized(&w, w.list, vec![TypeExpr::Raw(w.integer)]);
    let of_number = parameterized(&w, w.list, vec![TypeExpr::Raw(w.number)]);
    let of_string = parameterized(&w, w.list, vec![TypeExpr::Raw(w.string)]);

    assert!(w.ctx.is_assignable(&extends_number, &of_integer));
    assert!(w.ctx.is_assignable(&extends_number, &of_number));
    assert!(!w.ctx.is_assignable(&extends_number, &of_string));

    assert!(w.ctx.is_assignable(&super_integer, &of_number));
    assert!(w.ctx.is_assignable(&super_integer, &of_integer));
    assert!(!w.ctx.is_assignable(&super_integer, &of_string));

    assert!(w.ctx.is_assignable(&unbounded, &of_string));
    assert!(w.ctx.is_assignable(&unbounded, &of_integer));
}

#[test]
fn test_wildcard_candidate_requires_bounded_target() {
    let w = world();
    let extends_number = parameterized(
        &w,
        w.list,
        vec![TypeExpr::wildcard_extending(TypeExpr::Raw(w.number))],
    );
    let extends_integer = parameterized(
        &w,
        w.list,
        vec![TypeExpr::wildcard_extending(TypeExpr::Raw(w.integer))],
    );
    let of_number = parameterized(&w, w.list, vec![TypeExpr::Raw(w.number)]);

    assert!(!w.ctx.is_assignable(&of_number, &extends_number));
    assert!(
        w.ctx.is_assignable(&extends_number, &extends_integer),
        "? extends Number accepts ? extends Integer"
    );
    assert!(!w.ctx.is_assignable(&extends_integer, &extends_number));
}

#[test]
fn test_unbounded_candidate_carries_implicit_root_bound() {
    let w = world();
    let extends_number = parameterized(
        &w,
        w.list,
        vec![TypeExpr::wildcard_extending(TypeExpr::Raw(w.number))],
    );
    let super_integer = parameterized(
        &w,
        w.list,
        vec![TypeExpr::wildcard_super(TypeExpr::Raw(w.integer))],
    );
    let extends_root = parameterized(
        &w,
        w.list,
        vec![TypeExpr::wildcard_extending(TypeExpr::Raw(
            w.ctx.registry().object(),
        ))],
    );
    let unbounded = parameterized(&w, w.list, vec![TypeExpr::wildcard()]);

    // An unbounded argument behaves as ? extends the root type, so only a
    // root-compatible bound can take it.
    assert!(
        !w.ctx.is_assignable(&extends_number, &unbounded),
        "? extends Number cannot take the root-bounded argument"
    );
    assert!(!w.ctx.is_assignable(&super_integer, &unbounded));
    assert!(w.ctx.is_assignable(&unbounded, &unbounded));
    assert!(w.ctx.is_assignable(&extends_root, &unbounded));
}

// ============================================================================
// Arrays
// ============================================================================

#[test]
fn test_array_assignability() {
    let w = world();
    let string_array = w.ctx.array_of(&w.ctx.for_raw(w.string));
    let char_sequence_array = w.ctx.array_of(&w.ctx.for_raw(w.char_sequence));
    let integer_array = w.ctx.array_of(&w.ctx.for_raw(w.integer));
    let root = w.ctx.for_raw(w.ctx.registry().object());
    let root_array = w.ctx.array_of(&root);

    assert!(w.ctx.is_assignable(&char_sequence_array, &string_array));
    assert!(!w.ctx.is_assignable(&string_array, &char_sequence_array));
    assert!(!w.ctx.is_assignable(&string_array, &integer_array));
    assert!(w.ctx.is_assignable(&root_array, &string_array));
    assert!(w.ctx.is_assignable(&root, &string_array));

    let deep = w.ctx.array_of(&string_array);
    assert!(
        w.ctx.is_assignable(&root_array, &deep),
        "a two-dimensional array is itself an array of the root type"
    );
    assert!(!w.ctx.is_assignable(&deep, &string_array));
}

#[test]
fn test_generic_component_arrays() {
    let w = world();
    let list_string = parameterized(&w, w.list, vec![TypeExpr::Raw(w.string)]);
    let array_list_string = parameterized(&w, w.array_list, vec![TypeExpr::Raw(w.string)]);
    let target = w.ctx.array_of(&list_string);
    let candidate = w.ctx.array_of(&array_list_string);

    assert!(
        w.ctx.is_assignable(&target, &candidate),
        "array components use the full generic-aware check"
    );
}

// ============================================================================
// Variables
// ============================================================================

#[test]
fn test_unresolved_variable_matches_loosely() {
    let w = world();
    let t = w.ctx.for_expr(TypeExpr::variable(w.list, "E"), None);
    let string = w.ctx.for_raw(w.string);

    assert!(w.ctx.is_assignable(&t, &string));
    assert!(w.ctx.is_assignable(&string, &t));
}

#[test]
fn test_bound_variable_is_checked_exactly() {
    let w = world();
    let string = w.ctx.for_raw(w.string);
    let list_of_t_bound_string = w.ctx.with_generics(w.list, &[string]).unwrap();
    let list_of_string = parameterized(&w, w.list, vec![TypeExpr::Raw(w.string)]);
    let list_of_integer = parameterized(&w, w.list, vec![TypeExpr::Raw(w.integer)]);

    assert!(w.ctx.is_assignable(&list_of_t_bound_string, &list_of_string));
    assert!(!w.ctx.is_assignable(&list_of_t_bound_string, &list_of_integer));
}

#[test]
fn test_enum_pattern_assignability() {
    let w = world();
    let enum_of_status = parameterized(&w, w.enum_base, vec![TypeExpr::Raw(w.status)]);
    let status = w.ctx.for_raw(w.status);

    assert!(
        w.ctx.is_assignable(&enum_of_status, &status),
        "Status extends EnumBase<Status> must satisfy EnumBase<Status>"
    );

    let e = w.ctx.for_expr(TypeExpr::variable(w.enum_base, "E"), None);
    assert!(
        w.ctx.is_assignable(&e, &e),
        "self-referential variable bound must converge"
    );
}

// ============================================================================
// Context entry point
// ============================================================================

#[test]
fn test_standalone_context_matches_convenience_method() {
    let w = world();
    let list_of_string = parameterized(&w, w.list, vec![TypeExpr::Raw(w.string)]);
    let array_list_of_string = parameterized(&w, w.array_list, vec![TypeExpr::Raw(w.string)]);

    let standalone = AssignabilityContext::new(&w.ctx);
    assert!(standalone.is_assignable(&list_of_string, &array_list_of_string));
    assert_eq!(
        standalone.is_assignable(&array_list_of_string, &list_of_string),
        w.ctx.is_assignable(&array_list_of_string, &list_of_string)
    );
}
