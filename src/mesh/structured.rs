//! Structured orthogonal meshes, partitioned by a cell-owner function.
//!
//! These generators produce the local view of one rank; calling them once per
//! rank with the same owner function yields a consistent partition. Cell and
//! vertex ids are global, cells are numbered x-fastest.

use crate::mesh::cell::{Cell, Face};
use crate::mesh::grid::LocalGrid;
use crate::mesh::vector::Vec3;
use crate::sweep_error::SweepError;
use std::collections::HashMap;

/// Boundary id of the `x = 0` side.
pub const XMIN: u64 = 0;
/// Boundary id of the `x = Lx` side.
pub const XMAX: u64 = 1;
/// Boundary id of the `y = 0` side.
pub const YMIN: u64 = 2;
/// Boundary id of the `y = Ly` side.
pub const YMAX: u64 = 3;

fn invalid(message: impl Into<String>) -> SweepError {
    SweepError::InvalidConfig(message.into())
}

/// 1D slab of `n` cells on `[0, length]` along x.
pub fn slab_1d<F>(n: usize, length: f64, rank: usize, owner: F) -> Result<LocalGrid, SweepError>
where
    F: Fn(u64) -> usize,
{
    if n == 0 || length <= 0.0 {
        return Err(invalid("slab needs at least one cell and a positive length"));
    }
    let dx = length / n as f64;
    let x = Vec3::new(1.0, 0.0, 0.0);
    let point = |i: u64| Vec3::new(i as f64 * dx, 0.0, 0.0);

    let mut cells = Vec::new();
    let mut vertices = HashMap::new();
    let mut ghosts = HashMap::new();
    for i in 0..n as u64 {
        if owner(i) != rank {
            continue;
        }
        let left = if i == 0 {
            Face::boundary(vec![i], -x, point(i), XMIN)
        } else {
            Face::interior(vec![i], -x, point(i), i - 1)
        };
        let right = if i + 1 == n as u64 {
            Face::boundary(vec![i + 1], x, point(i + 1), XMAX)
        } else {
            Face::interior(vec![i + 1], x, point(i + 1), i + 1)
        };
        for nb in [left.clone(), right.clone()] {
            if nb.has_neighbor && owner(nb.neighbor_id) != rank {
                ghosts.insert(nb.neighbor_id, owner(nb.neighbor_id));
            }
        }
        vertices.insert(i, point(i));
        vertices.insert(i + 1, point(i + 1));
        cells.push(Cell {
            local_id: cells.len(),
            global_id: i,
            material_id: 0,
            vertex_ids: vec![i, i + 1],
            centroid: Vec3::new((i as f64 + 0.5) * dx, 0.0, 0.0),
            faces: vec![left, right],
        });
    }
    LocalGrid::new(rank, cells, vertices, ghosts)
}

/// 2D grid of `nx * ny` quadrilaterals on `[0, lx] x [0, ly]`.
///
/// Faces are ordered left, right, bottom, top.
pub fn quad_grid_2d<F>(
    nx: usize,
    ny: usize,
    lx: f64,
    ly: f64,
    rank: usize,
    owner: F,
) -> Result<LocalGrid, SweepError>
where
    F: Fn(u64) -> usize,
{
    if nx == 0 || ny == 0 || lx <= 0.0 || ly <= 0.0 {
        return Err(invalid("quad grid needs positive cell counts and extents"));
    }
    let (dx, dy) = (lx / nx as f64, ly / ny as f64);
    let ex = Vec3::new(1.0, 0.0, 0.0);
    let ey = Vec3::new(0.0, 1.0, 0.0);
    let vid = |i: usize, j: usize| (j * (nx + 1) + i) as u64;
    let cid = |i: usize, j: usize| (j * nx + i) as u64;
    let point = |i: usize, j: usize| Vec3::new(i as f64 * dx, j as f64 * dy, 0.0);
    let mid = |a: Vec3, b: Vec3| (a + b) * 0.5;

    let mut cells = Vec::new();
    let mut vertices = HashMap::new();
    let mut ghosts = HashMap::new();
    for j in 0..ny {
        for i in 0..nx {
            let gid = cid(i, j);
            if owner(gid) != rank {
                continue;
            }
            let (v00, v10, v11, v01) = (vid(i, j), vid(i + 1, j), vid(i + 1, j + 1), vid(i, j + 1));
            let (p00, p10, p11, p01) = (point(i, j), point(i + 1, j), point(i + 1, j + 1), point(i, j + 1));

            let side = |verts: Vec<u64>, normal: Vec3, centroid: Vec3, nb: Option<u64>, bid: u64| match nb {
                Some(n) => Face::interior(verts, normal, centroid, n),
                None => Face::boundary(verts, normal, centroid, bid),
            };
            let faces = vec![
                side(vec![v01, v00], -ex, mid(p01, p00), (i > 0).then(|| cid(i - 1, j)), XMIN),
                side(vec![v10, v11], ex, mid(p10, p11), (i + 1 < nx).then(|| cid(i + 1, j)), XMAX),
                side(vec![v00, v10], -ey, mid(p00, p10), (j > 0).then(|| cid(i, j - 1)), YMIN),
                side(vec![v11, v01], ey, mid(p11, p01), (j + 1 < ny).then(|| cid(i, j + 1)), YMAX),
            ];
            for face in &faces {
                if face.has_neighbor && owner(face.neighbor_id) != rank {
                    ghosts.insert(face.neighbor_id, owner(face.neighbor_id));
                }
            }
            for (v, p) in [(v00, p00), (v10, p10), (v11, p11), (v01, p01)] {
                vertices.insert(v, p);
            }
            cells.push(Cell {
                local_id: cells.len(),
                global_id: gid,
                material_id: 0,
                vertex_ids: vec![v00, v10, v11, v01],
                centroid: Vec3::new((i as f64 + 0.5) * dx, (j as f64 + 0.5) * dy, 0.0),
                faces,
            });
        }
    }
    LocalGrid::new(rank, cells, vertices, ghosts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::grid::Locality;

    #[test]
    fn slab_split_over_two_ranks() {
        let owner = |g: u64| if g < 2 { 0 } else { 1 };
        let g0 = slab_1d(4, 4.0, 0, owner).unwrap();
        let g1 = slab_1d(4, 4.0, 1, owner).unwrap();
        assert_eq!(g0.num_local_cells(), 2);
        assert_eq!(g1.num_local_cells(), 2);
        assert_eq!(g0.neighbor_ranks(), vec![1]);
        let last = g0.cell(1);
        assert_eq!(
            g0.locality(&last.faces[1]),
            Locality::Remote { rank: 1, global_id: 2 }
        );
        assert_eq!(g1.locality(&g1.cell(1).faces[1]), Locality::Boundary(XMAX));
    }

    #[test]
    fn quad_grid_faces_are_consistent() {
        let g = quad_grid_2d(3, 2, 3.0, 2.0, 0, |_| 0).unwrap();
        assert_eq!(g.num_local_cells(), 6);
        for cell in g.cells() {
            for face in &cell.faces {
                if let Some(nb) = g.local_id_of(face.neighbor_id).filter(|_| face.has_neighbor) {
                    let back = g.cell(nb).faces.iter().find(|f| f.neighbor_id == cell.global_id);
                    let back = back.expect("missing back face");
                    assert!((back.normal + face.normal).norm() < 1e-14);
                    let mut a = back.vertex_ids.clone();
                    let mut b = face.vertex_ids.clone();
                    a.sort_unstable();
                    b.sort_unstable();
                    assert_eq!(a, b);
                }
            }
        }
    }
}
