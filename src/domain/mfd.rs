use serde::{Deserialize, Serialize};

/// A magnitude-frequency distribution (MFD).
///
/// Describes the expected annual rate of ruptures per magnitude bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mfd {
    /// Doubly truncated Gutenberg-Richter distribution.
    ///
    /// `log10(N(M >= m)) = a_val - b_val * m`, truncated to
    /// `[min_mag, max_mag]` and discretized in bins of `bin_width`.
    TruncatedGr {
        /// Log-scale activity rate.
        a_val: f64,
        /// Gutenberg-Richter b-value.
        b_val: f64,
        /// Lower magnitude bound.
        min_mag: f64,
        /// Upper magnitude bound.
        max_mag: f64,
        /// Width of each magnitude bin.
        bin_width: f64,
    },
    /// Explicit occurrence rates for evenly spaced magnitude bins.
    EvenlyDiscretized {
        /// Magnitude at the centre of the first bin.
        min_mag: f64,
        /// Width of each magnitude bin.
        bin_width: f64,
        /// Annual occurrence rate of each bin.
        occurrence_rates: Vec<f64>,
    },
}

impl Mfd {
    /// The width of each magnitude bin.
    #[must_use]
    pub const fn bin_width(&self) -> f64 {
        match self {
            Self::TruncatedGr { bin_width, .. } | Self::EvenlyDiscretized { bin_width, .. } => {
                *bin_width
            }
        }
    }

    /// Magnitudes of the first and last bin centres.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn min_max_mag(&self) -> (f64, f64) {
        let (first, num_bins) = self.first_bin_and_count();
        let last = (num_bins.saturating_sub(1) as f64).mul_add(self.bin_width(), first);
        (first, last)
    }

    /// Number of magnitude bins.
    #[must_use]
    pub fn num_bins(&self) -> usize {
        self.first_bin_and_count().1
    }

    /// The `(magnitude, annual rate)` pair of every bin, in increasing
    /// magnitude order.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn annual_occurrence_rates(&self) -> Vec<(f64, f64)> {
        match self {
            Self::TruncatedGr {
                a_val,
                b_val,
                bin_width,
                ..
            } => {
                let (first, num_bins) = self.first_bin_and_count();
                (0..num_bins)
                    .map(|i| {
                        let mag = (i as f64).mul_add(*bin_width, first);
                        let lower = 10f64.powf(b_val.mul_add(-(mag - bin_width / 2.0), *a_val));
                        let upper = 10f64.powf(b_val.mul_add(-(mag + bin_width / 2.0), *a_val));
                        (mag, lower - upper)
                    })
                    .collect()
            }
            Self::EvenlyDiscretized {
                min_mag,
                bin_width,
                occurrence_rates,
            } => occurrence_rates
                .iter()
                .enumerate()
                .map(|(i, rate)| ((i as f64).mul_add(*bin_width, *min_mag), *rate))
                .collect(),
        }
    }

    /// Sum of the annual rates over all bins.
    #[must_use]
    pub fn total_rate(&self) -> f64 {
        self.annual_occurrence_rates()
            .into_iter()
            .map(|(_, rate)| rate)
            .sum()
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::float_cmp
    )]
    fn first_bin_and_count(&self) -> (f64, usize) {
        match self {
            Self::TruncatedGr {
                min_mag,
                max_mag,
                bin_width,
                ..
            } => {
                // bounds are snapped to the bin grid before taking bin centres
                let mut low = (min_mag / bin_width).round() * bin_width;
                let mut high = (max_mag / bin_width).round() * bin_width;
                if low != high {
                    low += bin_width / 2.0;
                    high -= bin_width / 2.0;
                }
                let num_bins = ((high - low) / bin_width).round().max(0.0) as usize + 1;
                (low, num_bins)
            }
            Self::EvenlyDiscretized {
                min_mag,
                occurrence_rates,
                ..
            } => (*min_mag, occurrence_rates.len()),
        }
    }
}
