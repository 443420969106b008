// LibPolyCall
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Hot-path benchmarks: pool allocation and route lookup

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use polycall_core::bridge::RoutingTable;
use polycall_core::memory::{AllocFlags, MemoryPool};

fn bench_pool_alloc_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_pool");
    group.throughput(Throughput::Elements(1));

    for size in [16usize, 256, 4096] {
        group.bench_with_input(BenchmarkId::new("alloc_free", size), &size, |b, &size| {
            let mut pool = MemoryPool::new(1024 * 1024).unwrap();
            b.iter(|| {
                let ptr = pool.alloc(black_box(size), AllocFlags::empty()).unwrap();
                pool.free(ptr).unwrap();
            })
        });
    }

    // Fragmented pool: every other block live
    group.bench_function("alloc_fragmented", |b| {
        let mut pool = MemoryPool::new(1024 * 1024).unwrap();
        let blocks: Vec<_> = (0..512).map(|_| pool.alloc(64, AllocFlags::empty()).unwrap()).collect();
        for ptr in blocks.iter().step_by(2) {
            pool.free(*ptr).unwrap();
        }
        b.iter(|| {
            let ptr = pool.alloc(black_box(128), AllocFlags::empty()).unwrap();
            pool.free(ptr).unwrap();
        })
    });

    group.finish();
}

fn bench_route_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing");

    for rules in [8usize, 64, 256] {
        let table = RoutingTable::new(256, 256);
        for i in 0..rules {
            table.add_rule(&format!("/service/{}/*", i), &format!("endpoint_{}", i), (i % 16) as i32).unwrap();
        }
        table.add_rule("*", "fallback", -1).unwrap();

        group.bench_with_input(BenchmarkId::new("route", rules), &table, |b, table| {
            b.iter(|| table.route(black_box("/service/unrouted/call")))
        });
    }

    group.finish();
}

criterion_group!(core_benches, bench_pool_alloc_free, bench_route_lookup);
criterion_main!(core_benches);
