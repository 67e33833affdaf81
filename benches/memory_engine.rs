use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use dialectdb::{
    row, BuildQueryResult, Column, Condition, Dialect, MemoryConfig, MemoryDialect, Ordering, Paradigm,
    QueryParams, Relational, SelectParams, Statement, TableSchema, Value,
};

const ROWS: i64 = 2_048;

fn seeded_dialect() -> MemoryDialect {
    let dialect = MemoryDialect::new(MemoryConfig::default());
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    runtime.block_on(dialect.connect()).unwrap();

    let create = Relational::build_query(&QueryParams::Create {
        table_name: "metrics".into(),
        schema: TableSchema::new()
            .column("id", Column::integer().primary().auto_increment())
            .column("host", Column::text())
            .column("cpu", Column::float()),
    })
    .unwrap();
    dialect.execute(&create.query, &create.params).unwrap();

    // 2048 rows spread over 16 hosts with cpu from 0.0 to 99.95.
    for i in 0..ROWS {
        let insert = Relational::build_query(&QueryParams::Insert {
            table_name: "metrics".into(),
            data: row! { "host" => format!("host-{}", i % 16), "cpu" => (i % 2000) as f64 / 20.0 },
        })
        .unwrap();
        dialect.execute(&insert.query, &insert.params).unwrap();
    }
    dialect
}

fn compile_select(params: SelectParams) -> BuildQueryResult<Statement> {
    Relational::build_query(&params.into()).unwrap()
}

fn bench_select(c: &mut Criterion) {
    let dialect = seeded_dialect();
    let mut group = c.benchmark_group("memory_select");
    group.throughput(Throughput::Elements(ROWS as u64));

    let filtered = compile_select(
        SelectParams::new("metrics")
            .conditions(Condition::new().eq("host", "host-3").gt("cpu", 50.0))
            .order_by(Ordering::desc("cpu"))
            .limit(10),
    );
    group.bench_function("filter_sort_limit", |b| {
        b.iter(|| {
            let result = dialect
                .execute(black_box(&filtered.query), black_box(&filtered.params))
                .unwrap();
            black_box(result.rows.len())
        });
    });

    let in_list = compile_select(SelectParams::new("metrics").conditions(
        Condition::new().is_in("host", (0..8).map(|h| format!("host-{h}")).collect()),
    ));
    group.bench_function("in_list", |b| {
        b.iter(|| dialect.execute(black_box(&in_list.query), black_box(&in_list.params)).unwrap());
    });

    let like = compile_select(SelectParams::new("metrics").conditions(Condition::new().like("host", "HOST-1%")));
    group.bench_function("like", |b| {
        b.iter(|| dialect.execute(black_box(&like.query), black_box(&like.params)).unwrap());
    });

    group.bench_function("sql_text", |b| {
        b.iter(|| {
            dialect
                .execute_sql(
                    black_box("SELECT \"host\", \"cpu\" FROM \"metrics\" WHERE \"cpu\" BETWEEN ? AND 60 ORDER BY \"cpu\" LIMIT 5"),
                    &[Value::Float(40.0)],
                )
                .unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_select);
criterion_main!(benches);
