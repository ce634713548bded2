use crate::domain::{Mfd, Source, SourceKind, geo::Spacing};

/// Splits a source into finer sources with the same total productivity.
///
/// - Area sources become one point source per node of a mesh with the given
///   spacing, each with the MFD of the area scaled down by the number
///   of nodes.
/// - Fault sources become one source per magnitude bin with a non-zero rate.
/// - Every other source is returned unchanged.
///
/// Split sources are named after the original with a `-{i}` suffix.
#[must_use]
pub fn split_source(source: &Source, area_source_discretization: Spacing) -> Vec<Source> {
    match &source.kind {
        SourceKind::Area {
            polygon,
            mfd,
            rupture,
            ..
        } => {
            let mesh = polygon.discretize(area_source_discretization);
            let mfd = divide_mfd(mfd, mesh.len());
            mesh.into_iter()
                .enumerate()
                .map(|(i, location)| {
                    split_from(
                        source,
                        i,
                        SourceKind::Point {
                            location,
                            mfd: mfd.clone(),
                            rupture: rupture.clone(),
                        },
                    )
                })
                .collect()
        }
        SourceKind::SimpleFault { mfd, .. } | SourceKind::ComplexFault { mfd, .. } => {
            let bin_width = mfd.bin_width();
            mfd.annual_occurrence_rates()
                .into_iter()
                .filter(|(_, rate)| *rate > 0.0)
                .enumerate()
                .map(|(i, (mag, rate))| {
                    let single_bin = Mfd::EvenlyDiscretized {
                        min_mag: mag,
                        bin_width,
                        occurrence_rates: vec![rate],
                    };
                    split_from(source, i, with_mfd(&source.kind, single_bin))
                })
                .collect()
        }
        SourceKind::Point { .. }
        | SourceKind::Characteristic { .. }
        | SourceKind::NonParametric { .. } => vec![source.clone()],
    }
}

/// Scales an MFD so that `n` copies of it have the productivity of the
/// original.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn divide_mfd(mfd: &Mfd, n: usize) -> Mfd {
    let n = n.max(1) as f64;
    match mfd {
        Mfd::TruncatedGr {
            a_val,
            b_val,
            min_mag,
            max_mag,
            bin_width,
        } => Mfd::TruncatedGr {
            a_val: a_val - n.log10(),
            b_val: *b_val,
            min_mag: *min_mag,
            max_mag: *max_mag,
            bin_width: *bin_width,
        },
        Mfd::EvenlyDiscretized {
            min_mag,
            bin_width,
            occurrence_rates,
        } => Mfd::EvenlyDiscretized {
            min_mag: *min_mag,
            bin_width: *bin_width,
            occurrence_rates: occurrence_rates.iter().map(|rate| rate / n).collect(),
        },
    }
}

fn with_mfd(kind: &SourceKind, new_mfd: Mfd) -> SourceKind {
    let mut kind = kind.clone();
    if let SourceKind::SimpleFault { mfd, .. } | SourceKind::ComplexFault { mfd, .. } = &mut kind {
        *mfd = new_mfd;
    }
    kind
}

fn split_from(source: &Source, i: usize, kind: SourceKind) -> Source {
    Source::new(
        format!("{}-{i}", source.id),
        format!("{}-{i}", source.name),
        source.trt.clone(),
        kind,
    )
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::domain::{
        geo::{Line, Point},
        source::tests::{area_source, evenly, km, point_source, simple_fault},
    };

    const ASC: &str = "Active Shallow Crust";

    fn gr(a_val: f64) -> Mfd {
        Mfd::TruncatedGr {
            a_val,
            b_val: 1.0,
            min_mag: 5.0,
            max_mag: 7.0,
            bin_width: 0.1,
        }
    }

    #[test]
    fn gr_productivity_is_shared_between_points() {
        let Mfd::TruncatedGr { a_val, b_val, .. } = divide_mfd(&gr(5.0), 100) else {
            panic!("expected a truncated GR distribution");
        };
        assert!((a_val - 3.0).abs() < 1e-12);
        assert!((b_val - 1.0).abs() < 1e-12);

        let total = gr(5.0).total_rate();
        let shared = 100.0 * divide_mfd(&gr(5.0), 100).total_rate();
        assert!((total - shared).abs() < 1e-9 * total);
    }

    #[test]
    fn evenly_discretized_rates_are_divided() {
        let divided = divide_mfd(&evenly(5.0, vec![0.4, 0.2]), 4);
        assert_eq!(divided, evenly(5.0, vec![0.1, 0.05]));
    }

    #[test]
    fn area_becomes_points_preserving_total_rate() {
        let area = area_source("a", ASC, gr(4.0));
        let points = split_source(&area, km(50.0));

        assert_eq!(points.len(), 4);
        assert!(points.iter().all(Source::is_point));
        let ids: Vec<_> = points.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a-0", "a-1", "a-2", "a-3"]);
        assert_eq!(points[2].name, "area a-2");

        let split_total: f64 = points
            .iter()
            .filter_map(Source::mfd)
            .map(Mfd::total_rate)
            .sum();
        let total = gr(4.0).total_rate();
        assert!((split_total - total).abs() < 1e-9 * total);
    }

    #[test_case(vec![0.1, 0.2, 0.3], 3; "all bins")]
    #[test_case(vec![0.1, 0.0, 0.3], 2; "one empty bin")]
    #[test_case(vec![0.0, 0.0], 0; "no rate")]
    fn fault_splits_per_non_zero_bin(rates: Vec<f64>, expected: usize) {
        let fault = simple_fault("f", ASC, rates);
        let splits = split_source(&fault, km(10.0));
        assert_eq!(splits.len(), expected);
        for (i, split) in splits.iter().enumerate() {
            assert_eq!(split.id, format!("f-{i}"));
            assert_eq!(split.mfd().map(Mfd::num_bins), Some(1));
        }
    }

    #[test]
    fn fault_split_keeps_magnitude_and_rate() {
        let fault = simple_fault("f", ASC, vec![0.1, 0.0, 0.3]);
        let splits = split_source(&fault, km(10.0));
        let bins: Vec<_> = splits
            .iter()
            .filter_map(Source::mfd)
            .flat_map(Mfd::annual_occurrence_rates)
            .collect();
        assert_eq!(bins.len(), 2);
        assert!((bins[0].0 - 6.0).abs() < 1e-9);
        assert!((bins[1].0 - 6.2).abs() < 1e-9);
        assert!((bins[1].1 - 0.3).abs() < 1e-12);
    }

    #[test]
    fn complex_fault_is_split_too() {
        let fault = Source::new(
            "c",
            "c",
            crate::domain::Trt::new(ASC).unwrap(),
            SourceKind::ComplexFault {
                edges: vec![
                    Line::new(vec![Point::new(0.0, 0.0), Point::new(0.0, 1.0)]),
                    Line::new(vec![
                        Point::with_depth(0.1, 0.0, 20.0),
                        Point::with_depth(0.1, 1.0, 20.0),
                    ]),
                ],
                mfd: evenly(6.5, vec![0.01, 0.02]),
                rake: 90.0,
                rupture_mesh_spacing: 5.0,
                rupture_aspect_ratio: 1.5,
            },
        );
        assert_eq!(split_source(&fault, km(10.0)).len(), 2);
    }

    #[test]
    fn point_sources_pass_through() {
        let point = point_source("p", ASC, 1.0, 1.0);
        assert_eq!(split_source(&point, km(10.0)), vec![point]);
    }
}
