//! Microbenchmarks for the tiered allocator: per-tier alloc/free latency
//! and a mixed workload, reported as ns/op against the host allocator.

use std::hint::black_box;
use std::time::Instant;
use tieralloc::MemoryAllocator;

/// Measure alloc/free latency for one size, N iterations.
fn bench_alloc_free(a: &mut MemoryAllocator, size: usize, iterations: usize) -> f64 {
    // Warmup
    for _ in 0..1000 {
        unsafe {
            let ptr = a.alloc(black_box(size));
            std::ptr::write_bytes(ptr, 0xAB, std::cmp::min(size, 64));
            a.free(black_box(ptr));
        }
    }
    let start = Instant::now();
    for _ in 0..iterations {
        unsafe {
            let ptr = a.alloc(black_box(size));
            std::ptr::write_bytes(ptr, 0xAB, std::cmp::min(size, 64));
            a.free(black_box(ptr));
        }
    }
    let elapsed = start.elapsed();
    elapsed.as_nanos() as f64 / iterations as f64
}

/// Same loop against the host allocator for a baseline.
fn bench_host(size: usize, iterations: usize) -> f64 {
    let start = Instant::now();
    for _ in 0..iterations {
        unsafe {
            let ptr = libc::malloc(black_box(size)) as *mut u8;
            std::ptr::write_bytes(ptr, 0xAB, std::cmp::min(size, 64));
            libc::free(black_box(ptr) as *mut libc::c_void);
        }
    }
    let elapsed = start.elapsed();
    elapsed.as_nanos() as f64 / iterations as f64
}

/// A churning mixed workload: a ring of live blocks with rotating sizes.
fn bench_mixed(a: &mut MemoryAllocator, iterations: usize) -> f64 {
    const RING: usize = 256;
    let sizes = [16usize, 96, 512, 600, 4096, 9000, 70_000];
    let mut ring: [*mut u8; RING] = [std::ptr::null_mut(); RING];

    let start = Instant::now();
    for i in 0..iterations {
        let slot = i % RING;
        unsafe {
            if !ring[slot].is_null() {
                a.free(ring[slot]);
            }
            let size = sizes[i % sizes.len()];
            ring[slot] = a.alloc(black_box(size));
        }
    }
    let elapsed = start.elapsed();

    for ptr in ring {
        if !ptr.is_null() {
            unsafe { a.free(ptr) };
        }
    }
    elapsed.as_nanos() as f64 / iterations as f64
}

fn main() {
    let mut a = MemoryAllocator::new();
    if let Err(err) = a.init() {
        eprintln!("allocator init failed: {}", err);
        std::process::exit(1);
    }

    let iterations = 1_000_000;
    println!("size        tieralloc      host");
    for &size in &[16usize, 64, 512, 600, 4096, 9000, 70_000, 2_000_000] {
        let ours = bench_alloc_free(&mut a, size, iterations.min(200_000));
        let host = bench_host(size, iterations.min(200_000));
        println!("{:<10} {:>8.1} ns/op {:>8.1} ns/op", size, ours, host);
    }

    let mixed = bench_mixed(&mut a, iterations);
    println!("mixed ring {:>8.1} ns/op", mixed);

    a.dump_stat();
    a.destroy();
}
