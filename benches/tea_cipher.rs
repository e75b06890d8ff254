use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use tea_recover::mask::{derive_mask, xor_bytes, MaskParams};
use tea_recover::tea::{Block, BlockCipher, Cascade, Tea};

/// 2段TEAの暗号化・復号
fn bench_cascade(c: &mut Criterion) {
    let cipher = Cascade::double(Tea::new([0x9A3F_1C22, 0x5E6D_7788, 0x1234_ABCD, 0xF00D_BEEF]));
    let block = Block::new(0x41424344, 0x45464748);

    let mut group = c.benchmark_group("tea_cascade");
    group.bench_function("encrypt", |b| b.iter(|| cipher.encrypt(black_box(block))));
    group.bench_function("decrypt", |b| b.iter(|| cipher.decrypt(black_box(block))));
    group.finish();
}

fn bench_mask(c: &mut Criterion) {
    let params = MaskParams::default();
    c.bench_function("derive_mask", |b| b.iter(|| derive_mask(black_box(&params))));
    c.bench_function("xor_bytes", |b| {
        b.iter(|| xor_bytes(black_box(0x1122334455667788), black_box(0x15)))
    });
}

criterion_group!(benches, bench_cascade, bench_mask);
criterion_main!(benches);
