use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trellis_types::{RawTypeDef, RawTypeId, RawTypeRegistry, TypeContext, TypeExpr};

/// Interface chain `Level0<E> .. Level{depth}<E>`, each level extending the
/// previous with its own variable, plus a `String` leaf argument.
fn build_context(depth: usize) -> (TypeContext, RawTypeId, RawTypeId, RawTypeId) {
    let mut registry = RawTypeRegistry::new();
    let string = registry.register(RawTypeDef::class("String"));
    let base = registry.register(RawTypeDef::interface("Level0").with_param("E"));
    let mut previous = base;
    for level in 1..=depth {
        let current =
            registry.register(RawTypeDef::interface(format!("Level{level}")).with_param("E"));
        registry.add_interface(
            current,
            TypeExpr::parameterized(previous, vec![TypeExpr::variable(current, "E")]),
        );
        previous = current;
    }
    (TypeContext::new(registry), string, base, previous)
}

fn bench_raw_subtype_walk(c: &mut Criterion) {
    let (ctx, _, base, leaf) = build_context(32);
    let target = ctx.for_raw(base);
    let candidate = ctx.for_raw(leaf);

    c.bench_function("raw_subtype_walk", |b| {
        b.iter(|| ctx.is_assignable(black_box(&target), black_box(&candidate)));
    });
}

fn bench_generic_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("generic_projection");

    for depth in [4usize, 16, 64] {
        let (ctx, string, base, leaf) = build_context(depth);
        let target = ctx.for_expr(
            TypeExpr::parameterized(base, vec![TypeExpr::Raw(string)]),
            None,
        );
        let candidate = ctx.for_expr(
            TypeExpr::parameterized(leaf, vec![TypeExpr::Raw(string)]),
            None,
        );

        group.bench_with_input(
            BenchmarkId::new("depth", depth),
            &(ctx, target, candidate),
            |b, (ctx, target, candidate)| {
                b.iter(|| ctx.is_assignable(black_box(target), black_box(candidate)));
            },
        );
    }

    group.finish();
}

fn bench_wildcard_check(c: &mut Criterion) {
    let (ctx, string, base, leaf) = build_context(8);
    let target = ctx.for_expr(
        TypeExpr::parameterized(
            base,
            vec![TypeExpr::wildcard_extending(TypeExpr::Raw(string))],
        ),
        None,
    );
    let candidate = ctx.for_expr(
        TypeExpr::parameterized(leaf, vec![TypeExpr::Raw(string)]),
        None,
    );

    c.bench_function("wildcard_upper_bound", |b| {
        b.iter(|| ctx.is_assignable(black_box(&target), black_box(&candidate)));
    });
}

fn bench_descriptor_interning(c: &mut Criterion) {
    let (ctx, string, base, _) = build_context(4);
    let exprs: Vec<TypeExpr> = (0..64)
        .map(|i| {
            let mut expr = TypeExpr::parameterized(base, vec![TypeExpr::Raw(string)]);
            for _ in 0..(i % 4) {
                expr = TypeExpr::array(expr);
            }
            expr
        })
        .collect();

    c.bench_function("descriptor_interning", |b| {
        b.iter(|| {
            for expr in &exprs {
                black_box(ctx.for_expr(expr.clone(), None));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_raw_subtype_walk,
    bench_generic_projection,
    bench_wildcard_check,
    bench_descriptor_interning
);

criterion_main!(benches);
