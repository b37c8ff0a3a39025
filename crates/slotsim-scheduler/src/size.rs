//! Job size model: generation, display formatting and the unit-aware
//! approximations the slot simulator and priority scorer rely on.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

const KB: f64 = 1e3;
const MB: f64 = 1e6;
const GB: f64 = 1e9;

/// A byte count. Display units are a derived view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Size(pub u64);

/// Display unit, chosen with decimal thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeUnit {
    Kb,
    Mb,
    Gb,
}

impl SizeUnit {
    pub fn suffix(self) -> &'static str {
        match self {
            SizeUnit::Kb => "KB",
            SizeUnit::Mb => "MB",
            SizeUnit::Gb => "GB",
        }
    }

    fn divisor(self) -> f64 {
        match self {
            SizeUnit::Kb => KB,
            SizeUnit::Mb => MB,
            SizeUnit::Gb => GB,
        }
    }
}

impl Size {
    pub fn bytes(self) -> u64 {
        self.0
    }

    /// Largest unit the size reaches at least one of. Anything below 1 MB,
    /// including sub-kilobyte sizes, is shown in KB.
    pub fn unit(self) -> SizeUnit {
        let b = self.0 as f64;
        if b < MB {
            SizeUnit::Kb
        } else if b < GB {
            SizeUnit::Mb
        } else {
            SizeUnit::Gb
        }
    }

    /// The number shown to users, rounded to two decimals, and its unit.
    pub fn display_magnitude(self) -> (f64, SizeUnit) {
        let unit = self.unit();
        let value = self.0 as f64 / unit.divisor();
        ((value * 100.0).round() / 100.0, unit)
    }

    /// Approximate size in GB as the transfer-time model sees it: GB taken
    /// as shown, MB divided by 1024, KB divided by 1024².
    pub fn approx_gb(self) -> f64 {
        let (value, unit) = self.display_magnitude();
        match unit {
            SizeUnit::Gb => value,
            SizeUnit::Mb => value / 1024.0,
            SizeUnit::Kb => value / (1024.0 * 1024.0),
        }
    }

    /// Render with two decimals in the largest fitting unit, e.g. `"12.34 MB"`.
    pub fn format(self) -> String {
        let (value, unit) = self.display_magnitude();
        format!("{:.2} {}", value, unit.suffix())
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// Uniformly distributed size in `[min_bytes, max_bytes]`.
pub fn generate_size<R: Rng + ?Sized>(rng: &mut R, min_bytes: u64, max_bytes: u64) -> Size {
    if max_bytes > min_bytes {
        Size(rng.gen_range(min_bytes..=max_bytes))
    } else {
        Size(min_bytes)
    }
}

/// Leading numeric component of a rendered size, ignoring any unit suffix.
///
/// `"500 GB"` and `"500 MB"` both yield `500.0`; use [`parse_unit`] to tell
/// them apart. Returns `None` when the string has no leading number.
pub fn parse_magnitude(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().ok()
}

/// Unit suffix of a rendered size, if it names one of KB, MB or GB.
pub fn parse_unit(s: &str) -> Option<SizeUnit> {
    let upper = s.to_ascii_uppercase();
    if upper.contains("GB") {
        Some(SizeUnit::Gb)
    } else if upper.contains("MB") {
        Some(SizeUnit::Mb)
    } else if upper.contains("KB") {
        Some(SizeUnit::Kb)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn format_picks_largest_unit() {
        assert_eq!(Size(1_000).format(), "1.00 KB");
        assert_eq!(Size(999_999).format(), "1000.00 KB");
        assert_eq!(Size(1_000_000).format(), "1.00 MB");
        assert_eq!(Size(12_345_678).format(), "12.35 MB");
        assert_eq!(Size(10_000_000_000).format(), "10.00 GB");
        assert_eq!(Size(1_000_000_000_000).format(), "1000.00 GB");
    }

    #[test]
    fn sub_kilobyte_sizes_still_render_in_kb() {
        assert_eq!(Size(500).format(), "0.50 KB");
        assert_eq!(Size(500).unit(), SizeUnit::Kb);
    }

    #[test]
    fn parse_magnitude_ignores_unit() {
        assert_eq!(parse_magnitude("500 GB"), Some(500.0));
        assert_eq!(parse_magnitude("500 MB"), Some(500.0));
        assert_eq!(parse_magnitude("  12.35MB"), Some(12.35));
        assert_eq!(parse_magnitude("GB"), None);
        assert_eq!(parse_magnitude(""), None);
    }

    #[test]
    fn parse_magnitude_reads_back_formatted_value() {
        let size = Size(734_210_000);
        let (value, unit) = size.display_magnitude();
        assert_eq!(parse_magnitude(&size.format()), Some(value));
        assert_eq!(parse_unit(&size.format()), Some(unit));
    }

    #[test]
    fn parse_unit_detects_suffix() {
        assert_eq!(parse_unit("1.00 KB"), Some(SizeUnit::Kb));
        assert_eq!(parse_unit("3 mb"), Some(SizeUnit::Mb));
        assert_eq!(parse_unit("7.5 GB"), Some(SizeUnit::Gb));
        assert_eq!(parse_unit("42"), None);
    }

    #[test]
    fn approx_gb_uses_binary_divisors_on_displayed_value() {
        assert_eq!(Size(100_000_000_000).approx_gb(), 100.0);
        assert!((Size(512_000_000).approx_gb() - 0.5).abs() < 1e-12);
        // 1.05 GB after two-decimal rounding
        assert!((Size(1_048_576_000).approx_gb() - 1.05).abs() < 1e-12);
        assert!((Size(1_048_576).approx_gb() - 1.05 / 1024.0).abs() < 1e-12);
        assert!((Size(2_000).approx_gb() - 2.0 / 1_048_576.0).abs() < 1e-15);
    }

    #[test]
    fn generated_sizes_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let s = generate_size(&mut rng, 1_000, 1_000_000_000_000);
            assert!((1_000..=1_000_000_000_000).contains(&s.bytes()));
        }
    }

    #[test]
    fn degenerate_range_returns_minimum() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(generate_size(&mut rng, 5_000, 5_000), Size(5_000));
    }
}
