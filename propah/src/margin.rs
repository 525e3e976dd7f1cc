use serde::Serialize;
use terrain::hgt::C;

/// Display bucket for a link margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginClass {
    /// No terrain under the sample, or no finite margin.
    NoData,
    /// Below 0 dB.
    Blocked,
    /// 0 to 3 dB.
    Marginal,
    /// 3 to 12 dB.
    Good,
    /// 12 dB and up.
    Strong,
}

impl MarginClass {
    pub fn from_margin(margin_db: C) -> Self {
        match margin_db {
            m if !m.is_finite() => Self::NoData,
            m if m < 0.0 => Self::Blocked,
            m if m < 3.0 => Self::Marginal,
            m if m < 12.0 => Self::Good,
            _ => Self::Strong,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MarginClass;

    #[test]
    fn test_thresholds() {
        assert_eq!(MarginClass::from_margin(f64::NAN), MarginClass::NoData);
        assert_eq!(MarginClass::from_margin(f64::NEG_INFINITY), MarginClass::NoData);
        assert_eq!(MarginClass::from_margin(-0.1), MarginClass::Blocked);
        assert_eq!(MarginClass::from_margin(0.0), MarginClass::Marginal);
        assert_eq!(MarginClass::from_margin(3.0), MarginClass::Good);
        assert_eq!(MarginClass::from_margin(11.9), MarginClass::Good);
        assert_eq!(MarginClass::from_margin(12.0), MarginClass::Strong);
    }
}
