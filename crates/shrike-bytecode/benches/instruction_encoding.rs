use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use shrike_bytecode::{decode_all, encode_all, Format22b, Instruction, Opcode};

fn sample_body(len: usize) -> Vec<Instruction> {
    (0..len)
        .map(|i| {
            let operands =
                Format22b::new((i % 256) as i32, ((i * 7) % 256) as i32, (i % 256) as i32 - 128)
                    .unwrap();
            Instruction::new(Opcode::AddIntLit8, operands).unwrap()
        })
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let body = sample_body(4096);
    let mut group = c.benchmark_group("22b");
    group.throughput(Throughput::Elements(body.len() as u64));

    group.bench_function("encode", |b| b.iter(|| encode_all(black_box(&body))));

    let units = encode_all(&body);
    group.bench_function("decode", |b| {
        b.iter(|| decode_all(black_box(&units)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_encode);
criterion_main!(benches);
