//! Certitude bands - how much a hypothesis is believed after evidence

use serde::{Deserialize, Serialize};

/// Band a certitude value falls into
///
/// The band decides how the drafter treats a hypothesis:
/// - Falsified: excluded from the report
/// - Uncertain: omitted, listed as needing more research
/// - Likely: included with hedging language
/// - WellSupported: stated as a confident, cited claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertitudeBand {
    /// Below the falsification threshold
    Falsified,
    /// Not enough signal either way
    Uncertain,
    /// Probably true; hedge when stating it
    Likely,
    /// Confidently supported
    WellSupported,
}

impl CertitudeBand {
    /// Get the band name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            CertitudeBand::Falsified => "falsified",
            CertitudeBand::Uncertain => "uncertain",
            CertitudeBand::Likely => "likely",
            CertitudeBand::WellSupported => "well_supported",
        }
    }

    /// Whether hypotheses in this band make it into a draft
    pub fn is_included(&self) -> bool {
        matches!(self, CertitudeBand::Likely | CertitudeBand::WellSupported)
    }
}

/// Band boundaries, each an inclusive lower bound of the next band up
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CertitudeThresholds {
    /// Certitude below this is falsified (default 0.3)
    pub falsified_below: f64,
    /// Certitude below this (and not falsified) is uncertain (default 0.6)
    pub uncertain_below: f64,
    /// Certitude at or above this is well supported (default 0.8)
    pub well_supported_at: f64,
}

impl Default for CertitudeThresholds {
    fn default() -> Self {
        Self {
            falsified_below: 0.3,
            uncertain_below: 0.6,
            well_supported_at: 0.8,
        }
    }
}

impl CertitudeThresholds {
    /// Map a certitude value to its band
    pub fn band(&self, certitude: f64) -> CertitudeBand {
        if certitude < self.falsified_below {
            CertitudeBand::Falsified
        } else if certitude < self.uncertain_below {
            CertitudeBand::Uncertain
        } else if certitude < self.well_supported_at {
            CertitudeBand::Likely
        } else {
            CertitudeBand::WellSupported
        }
    }

    /// Validate that the thresholds are ordered inside [0, 1]
    pub fn validate(&self) -> Result<(), String> {
        let ordered = 0.0 < self.falsified_below
            && self.falsified_below <= self.uncertain_below
            && self.uncertain_below <= self.well_supported_at
            && self.well_supported_at <= 1.0;
        if !ordered {
            return Err(format!(
                "certitude thresholds must satisfy 0 < {} <= {} <= {} <= 1",
                self.falsified_below, self.uncertain_below, self.well_supported_at
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        let t = CertitudeThresholds::default();
        assert_eq!(t.band(0.0), CertitudeBand::Falsified);
        assert_eq!(t.band(0.29), CertitudeBand::Falsified);
        assert_eq!(t.band(0.3), CertitudeBand::Uncertain);
        assert_eq!(t.band(0.59), CertitudeBand::Uncertain);
        assert_eq!(t.band(0.6), CertitudeBand::Likely);
        assert_eq!(t.band(0.79), CertitudeBand::Likely);
        assert_eq!(t.band(0.8), CertitudeBand::WellSupported);
        assert_eq!(t.band(1.0), CertitudeBand::WellSupported);
    }

    #[test]
    fn test_inclusion() {
        assert!(!CertitudeBand::Falsified.is_included());
        assert!(!CertitudeBand::Uncertain.is_included());
        assert!(CertitudeBand::Likely.is_included());
        assert!(CertitudeBand::WellSupported.is_included());
    }

    #[test]
    fn test_threshold_validation() {
        assert!(CertitudeThresholds::default().validate().is_ok());

        let inverted = CertitudeThresholds {
            falsified_below: 0.7,
            uncertain_below: 0.5,
            well_supported_at: 0.8,
        };
        assert!(inverted.validate().is_err());
    }
}
