//! Grouping quadrature directions and energy groups into angle sets.
//!
//! Directions are first split into direction groups (one SPDS each), every
//! direction group is then crossed with the group subsets. Ids are assigned
//! direction-group major, group-subset minor, so every rank derives the same
//! ids from the same configuration.

use crate::config::{AngleAggregation, SweepConfig};
use crate::mesh::grid::LocalGrid;
use crate::mesh::vector::Vec3;
use crate::quadrature::AngularQuadrature;
use crate::sweep::orientation::FaceOrientation;
use crate::sweep_error::SweepError;
use std::ops::Range;

/// Layout of one angle set before it is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AngleSetLayout {
    pub id: usize,
    pub direction_group: usize,
    pub angles: Vec<usize>,
    pub groups: Range<usize>,
}

/// Octant of a direction as a 3-bit sign pattern; zero counts as positive.
#[inline]
pub fn octant(omega: Vec3) -> u8 {
    (u8::from(omega.x < 0.0)) | (u8::from(omega.y < 0.0) << 1) | (u8::from(omega.z < 0.0) << 2)
}

/// Split the quadrature into direction groups, in quadrature order.
pub fn direction_groups(quadrature: &AngularQuadrature, config: &SweepConfig) -> Vec<Vec<usize>> {
    let groups: Vec<Vec<usize>> = match config.angle_aggregation {
        AngleAggregation::Single => (0..quadrature.num_angles()).map(|n| vec![n]).collect(),
        AngleAggregation::Octant => {
            let mut order: Vec<u8> = Vec::new();
            let mut by_octant: Vec<Vec<usize>> = Vec::new();
            for (n, &w) in quadrature.omegas().iter().enumerate() {
                let o = octant(w);
                match order.iter().position(|&x| x == o) {
                    Some(i) => by_octant[i].push(n),
                    None => {
                        order.push(o);
                        by_octant.push(vec![n]);
                    }
                }
            }
            by_octant
        }
    };
    if config.max_angles_per_set == 0 {
        return groups;
    }
    groups
        .into_iter()
        .flat_map(|g| {
            g.chunks(config.max_angles_per_set)
                .map(<[usize]>::to_vec)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Split `0..num_groups` into `num_subsets` contiguous, nearly equal ranges.
pub fn group_subsets(num_groups: usize, num_subsets: usize) -> Result<Vec<Range<usize>>, SweepError> {
    if num_subsets == 0 || num_subsets > num_groups {
        return Err(SweepError::InvalidConfig(format!(
            "cannot split {num_groups} groups into {num_subsets} subsets"
        )));
    }
    let base = num_groups / num_subsets;
    let extra = num_groups % num_subsets;
    let mut start = 0;
    Ok((0..num_subsets)
        .map(|s| {
            let len = base + usize::from(s < extra);
            let r = start..start + len;
            start += len;
            r
        })
        .collect())
}

/// Cross direction groups with group subsets.
pub fn layouts(
    direction_groups: &[Vec<usize>],
    group_subsets: &[Range<usize>],
) -> Vec<AngleSetLayout> {
    let mut out = Vec::with_capacity(direction_groups.len() * group_subsets.len());
    for (dg, angles) in direction_groups.iter().enumerate() {
        for groups in group_subsets {
            out.push(AngleSetLayout {
                id: out.len(),
                direction_group: dg,
                angles: angles.clone(),
                groups: groups.clone(),
            });
        }
    }
    out
}

/// Every direction of `angles` must orient every local face like `angles[0]`.
pub fn check_consistency(
    grid: &LocalGrid,
    quadrature: &AngularQuadrature,
    angles: &[usize],
) -> Result<(), SweepError> {
    let Some((&rep, rest)) = angles.split_first() else {
        return Ok(());
    };
    let w0 = quadrature.omega(rep);
    for cell in grid.cells() {
        for (f, face) in cell.faces.iter().enumerate() {
            let expected = FaceOrientation::classify(w0, face.normal);
            if let Some(&bad) = rest
                .iter()
                .find(|&&n| FaceOrientation::classify(quadrature.omega(n), face.normal) != expected)
            {
                return Err(SweepError::InconsistentAngleSet {
                    rank: grid.rank(),
                    angle: bad,
                    representative: rep,
                    cell: cell.global_id,
                    face: f,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::structured::quad_grid_2d;

    #[test]
    fn octant_grouping_of_s2() {
        let q = AngularQuadrature::s2_octants();
        let groups = direction_groups(&q, &SweepConfig::default());
        assert_eq!(groups.len(), 8);
        let single = SweepConfig {
            angle_aggregation: AngleAggregation::Single,
            ..Default::default()
        };
        assert_eq!(direction_groups(&q, &single).len(), 8);
    }

    #[test]
    fn octants_collect_same_sign_directions() {
        let q = AngularQuadrature::from_directions(
            vec![
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
                Vec3::new(1.0, 2.0, 0.0),
                Vec3::new(2.0, 1.0, 0.0),
            ],
            vec![1.0; 4],
        )
        .unwrap();
        let groups = direction_groups(&q, &SweepConfig::default());
        assert_eq!(groups, vec![vec![0, 2, 3], vec![1]]);
        let capped = SweepConfig {
            max_angles_per_set: 2,
            ..Default::default()
        };
        assert_eq!(direction_groups(&q, &capped), vec![vec![0, 2], vec![3], vec![1]]);
    }

    #[test]
    fn group_subsets_cover_contiguously() {
        assert_eq!(group_subsets(5, 2).unwrap(), vec![0..3, 3..5]);
        assert_eq!(group_subsets(3, 3).unwrap(), vec![0..1, 1..2, 2..3]);
        assert!(group_subsets(2, 3).is_err());
    }

    #[test]
    fn ids_are_direction_group_major() {
        let l = layouts(&[vec![0], vec![1, 2]], &[0..1, 1..2]);
        let ids: Vec<_> = l.iter().map(|s| (s.id, s.direction_group, s.groups.start)).collect();
        assert_eq!(ids, vec![(0, 0, 0), (1, 0, 1), (2, 1, 0), (3, 1, 1)]);
    }

    #[test]
    fn mixed_orientations_rejected() {
        let grid = quad_grid_2d(2, 2, 1.0, 1.0, 0, |_| 0).unwrap();
        let q = AngularQuadrature::from_directions(
            vec![Vec3::new(1.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0)],
            vec![1.0; 2],
        )
        .unwrap();
        assert!(check_consistency(&grid, &q, &[0]).is_ok());
        assert!(matches!(
            check_consistency(&grid, &q, &[0, 1]),
            Err(SweepError::InconsistentAngleSet { angle: 1, representative: 0, .. })
        ));
    }
}
