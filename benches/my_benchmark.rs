use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};

use mtrie_store::{Capacities, Ipv4Tree, Store};

#[derive(Clone, Copy, Default, zerocopy::IntoBytes, zerocopy::Immutable)]
#[repr(C)]
struct NextHop(u32);

const INSERTS_NUM: u64 = 256 * 256;

fn ip(a: u8, b: u8, c: u8, d: u8) -> u32 {
    u32::from_be_bytes([a, b, c, d]).to_be()
}

/// Synthetic /24s spanning `10.0.0.0/8` through `10.255.255.0/24`, standing
/// in for a real DFZ snapshot, which isn't something a benchmark should
/// depend on fetching at run time.
fn synthetic_prefixes() -> Vec<(u32, u8, NextHop)> {
    let mut out = Vec::with_capacity(INSERTS_NUM as usize);
    for b in 0..=255u8 {
        for c in 0..=255u8 {
            out.push((ip(10, b, c, 0), 24, NextHop((b as u32) << 8 | c as u32)));
        }
    }
    out
}

fn build_tree(pfxs: &[(u32, u8, NextHop)]) -> (Store<NextHop>, Ipv4Tree) {
    let mut store = Store::<NextHop>::new(Capacities {
        ipv4_small: 1 << 16,
        ipv4_large: 4,
        ipv4_rules: 1 << 18,
        ipv6_nodes: 1,
    });
    let tree = store.tree_init().expect("tree_init");
    for (addr, masklen, data) in pfxs {
        store.insert(&tree, *addr, *masklen, *data).expect("insert");
    }
    (store, tree)
}

fn search_every_address(store: &Store<NextHop>, tree: &Ipv4Tree) -> u64 {
    let mut found = 0u64;
    for b in 0..=255u8 {
        for c in 0..=255u8 {
            if store.search(tree, ip(10, b, c, 128)).is_some() {
                found += 1;
            }
        }
    }
    found
}

fn bench(c: &mut Criterion) {
    let pfxs = synthetic_prefixes();

    let mut group = c.benchmark_group("ipv4 trie insert");
    group.sampling_mode(SamplingMode::Auto);
    group.throughput(Throughput::Elements(INSERTS_NUM));
    group.bench_with_input(
        BenchmarkId::from_parameter("10.0.0.0/8 as /24s"),
        &pfxs,
        |b, pfxs| b.iter(|| build_tree(pfxs)),
    );
    group.finish();

    let (store, tree) = build_tree(&pfxs);
    let mut group = c.benchmark_group("ipv4 trie search");
    group.sampling_mode(SamplingMode::Auto);
    group.throughput(Throughput::Elements(INSERTS_NUM));
    group.bench_with_input(
        BenchmarkId::from_parameter("every /24 host address"),
        &(&store, &tree),
        |b, (store, tree)| b.iter(|| search_every_address(store, tree)),
    );
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = bench
}
criterion_main!(benches);
