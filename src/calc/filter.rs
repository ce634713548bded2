use crate::{
    calc::apply_reduce,
    domain::{Source, geo::SiteCollection},
};

/// Above this number of (source, site) pairs the filtering runs in parallel.
pub const LOTS_OF_SOURCES_SITES: usize = 100_000;

/// Error raised while filtering sources.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FilterError {
    /// The distance between a source and a site is not a number.
    #[error("Cannot compute the distance to source {0}")]
    InvalidDistance(String),
}

/// Keeps the sources with at least one site within `max_distance` km.
///
/// The result is ordered by source id. When the number of (source, site)
/// pairs exceeds `threshold` the work is split across the rayon pool.
///
/// # Errors
///
/// Returns [`FilterError::InvalidDistance`] if a distance is `NaN`, e.g.
/// because a site or a source has invalid coordinates.
pub fn filter_sources(
    sources: Vec<Source>,
    sites: &SiteCollection,
    max_distance: f64,
    threshold: usize,
) -> Result<Vec<Source>, FilterError> {
    let pairs = sources.len().saturating_mul(sites.len());
    let mut kept = if pairs > threshold {
        tracing::debug!(
            "Filtering {} source(s) against {} site(s) in parallel",
            sources.len(),
            sites.len()
        );
        apply_reduce(
            &sources,
            |chunk| {
                let mut kept = Vec::new();
                for source in chunk {
                    if is_close(source, sites, max_distance)? {
                        kept.push(source.clone());
                    }
                }
                Ok(kept)
            },
            |mut acc, part| {
                acc.extend(part);
                acc
            },
            Vec::new(),
        )?
    } else {
        tracing::debug!(
            "Filtering {} source(s) against {} site(s)",
            sources.len(),
            sites.len()
        );
        let mut kept = Vec::with_capacity(sources.len());
        for source in sources {
            if is_close(&source, sites, max_distance)? {
                kept.push(source);
            }
        }
        kept
    };
    kept.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(kept)
}

fn is_close(
    source: &Source,
    sites: &SiteCollection,
    max_distance: f64,
) -> Result<bool, FilterError> {
    for site in sites {
        if source.is_within(&site.location, max_distance)? {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::domain::{
        Mfd,
        geo::Site,
        source::tests::{area_source, point_source, simple_fault},
    };

    const ASC: &str = "Active Shallow Crust";

    fn sources() -> Vec<Source> {
        let mut sources: Vec<_> = (0..40)
            .map(|i| point_source(&format!("p{i:02}"), ASC, f64::from(i) * 0.5, 0.0))
            .collect();
        sources.push(simple_fault("fault", ASC, vec![0.1]));
        sources.push(area_source(
            "area",
            ASC,
            Mfd::EvenlyDiscretized {
                min_mag: 5.0,
                bin_width: 0.1,
                occurrence_rates: vec![0.1],
            },
        ));
        sources.reverse();
        sources
    }

    fn sites() -> SiteCollection {
        SiteCollection::new(vec![Site::new(0.5, 0.5), Site::new(5.0, 0.2)])
    }

    #[test]
    fn keeps_close_sources_sorted_by_id() {
        let kept = filter_sources(sources(), &sites(), 100.0, LOTS_OF_SOURCES_SITES).unwrap();
        let ids: Vec<_> = kept.iter().map(|s| s.id.as_str()).collect();
        assert!(ids.contains(&"area"));
        assert!(ids.contains(&"fault"));
        assert!(ids.contains(&"p00"));
        assert!(!ids.contains(&"p39"));
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn site_inside_area_is_at_zero_distance() {
        let kept = filter_sources(sources(), &sites(), 0.0, LOTS_OF_SOURCES_SITES).unwrap();
        let ids: Vec<_> = kept.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["area"]);
    }

    #[test_case(0; "forced parallel")]
    #[test_case(LOTS_OF_SOURCES_SITES; "sequential")]
    fn parallel_and_sequential_agree(threshold: usize) {
        let expected = filter_sources(sources(), &sites(), 150.0, usize::MAX).unwrap();
        let actual = filter_sources(sources(), &sites(), 150.0, threshold).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn no_sites_means_no_sources() {
        let kept = filter_sources(sources(), &SiteCollection::default(), 1e9, 0).unwrap();
        assert!(kept.is_empty());
    }

    #[test]
    fn invalid_coordinates_are_reported() {
        let sites = SiteCollection::new(vec![Site::new(f64::NAN, 0.0)]);
        let error = filter_sources(vec![point_source("p", ASC, 0.0, 0.0)], &sites, 10.0, 0)
            .unwrap_err();
        assert_eq!(error, FilterError::InvalidDistance("p".to_string()));
    }
}
