use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use fogo::{Buffer, CommandTable, Db, ExecCtx};

fn bench_exec_set_get(c: &mut Criterion) {
    let table = CommandTable::new();
    let mut group = c.benchmark_group("exec");
    group.bench_function("set_get_1k", |b| {
        b.iter_batched(
            Db::new,
            |mut db| {
                let mut out = Buffer::new();
                for i in 0..1000u32 {
                    let set = vec![
                        b"SET".to_vec(),
                        format!("k{}", i).into_bytes(),
                        format!("v{}", i).into_bytes(),
                    ];
                    let get = vec![b"GET".to_vec(), format!("k{}", i).into_bytes()];

                    let mut ctx = ExecCtx {
                        db: &mut db,
                        aof: None,
                    };
                    table.dispatch(&mut ctx, &mut out, &set);
                    let mut ctx = ExecCtx {
                        db: &mut db,
                        aof: None,
                    };
                    table.dispatch(&mut ctx, &mut out, &get);

                    let produced = out.readable_len();
                    out.consume(produced);
                }
                black_box(db)
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_exec_set_get);
criterion_main!(benches);
