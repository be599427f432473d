//! Fork/join coverage: every index is visited exactly once per run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU32, Ordering};
use waves_core::{partition, Cell, Grid, GridShape, WorkerPool};

fn count_cells(pool: &mut WorkerPool, extent: usize) -> Vec<u32> {
    let counters: Vec<AtomicU32> = (0..extent).map(|_| AtomicU32::new(0)).collect();
    pool.run(|index, count| {
        for i in partition(extent, index, count) {
            counters[i].fetch_add(1, Ordering::Relaxed);
        }
    });
    counters.into_iter().map(AtomicU32::into_inner).collect()
}

#[test]
fn test_pool_counts_each_cell_once() {
    for workers in [1, 4, 16] {
        let mut pool = WorkerPool::new(workers).unwrap();
        for extent in [10_000, 10_007] {
            let counts = count_cells(&mut pool, extent);
            assert!(
                counts.iter().all(|&c| c == 1),
                "{workers} workers left a cell uncounted or double counted over {extent}"
            );
            assert_eq!(counts.iter().map(|&c| c as usize).sum::<usize>(), extent);
        }
    }
}

#[test]
fn test_pool_writes_disjoint_slabs() {
    let shape = GridShape::new(32, 32, 16);
    let mut pool = WorkerPool::new(5).unwrap();
    let mut grid = Grid::new(shape, Cell::default()).unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    let source: Vec<f32> = (0..shape.cell_count()).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let slabs: Vec<_> = grid
        .split_outer_mut(pool.size())
        .into_iter()
        .map(parking_lot::Mutex::new)
        .collect();
    let width = shape.width;
    let plane = shape.width * shape.height;
    pool.run(|index, _| {
        let mut slab = slabs[index].lock();
        for row in slab.layout().rows(slab.outer()) {
            let start = row.z * plane + row.y * width;
            for (x, cell) in slab.row_mut(row).iter_mut().enumerate() {
                cell.location = source[start + x];
            }
        }
    });
    drop(slabs);

    for z in 0..16 {
        for y in 0..32 {
            for x in 0..32 {
                let expected = source[z * plane + y * width + x];
                assert_eq!(
                    grid.at(x as isize, y as isize, z as isize).location,
                    expected
                );
            }
        }
    }
}
