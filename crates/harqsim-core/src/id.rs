//! Strongly-typed identifiers for UEs, subframes and channel-quality reports.

use std::fmt;

/// Identifies a simulated user equipment.
///
/// UEs are created at simulation start and assigned sequential IDs.
/// `UeId(n)` is the n-th UE and indexes the simulator's per-UE state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UeId(pub usize);

impl fmt::Display for UeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for UeId {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

/// Monotonically increasing subframe counter.
///
/// Incremented each time the simulation transmits one subframe (1 ms).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubframeIndex(pub u64);

impl SubframeIndex {
    /// The subframe after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SubframeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SubframeIndex {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Channel-quality index reported for a UE.
///
/// `Cqi(0)` means the link is out of range and nothing can be scheduled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cqi(pub u8);

impl Cqi {
    /// The out-of-range sentinel.
    pub const OUT_OF_RANGE: Cqi = Cqi(0);

    /// Whether this report is the out-of-range sentinel.
    pub fn is_out_of_range(self) -> bool {
        self.0 == 0
    }

    /// The CQI as a table index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Cqi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for Cqi {
    fn from(v: u8) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subframe_next_increments() {
        assert_eq!(SubframeIndex(7).next(), SubframeIndex(8));
    }

    #[test]
    fn cqi_zero_is_out_of_range() {
        assert!(Cqi::OUT_OF_RANGE.is_out_of_range());
        assert!(!Cqi(3).is_out_of_range());
        assert_eq!(Cqi(3).index(), 3);
    }

    #[test]
    fn ids_display_inner_value() {
        assert_eq!(UeId(4).to_string(), "4");
        assert_eq!(SubframeIndex(12).to_string(), "12");
        assert_eq!(Cqi(15).to_string(), "15");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn display_parses_back(ue in any::<usize>(), sf in any::<u64>(), cqi in any::<u8>()) {
                prop_assert_eq!(UeId(ue).to_string().parse::<usize>().unwrap(), ue);
                prop_assert_eq!(SubframeIndex(sf).to_string().parse::<u64>().unwrap(), sf);
                prop_assert_eq!(Cqi(cqi).to_string().parse::<u8>().unwrap(), cqi);
            }

            #[test]
            fn next_orders_after(sf in 0..u64::MAX) {
                let next = SubframeIndex(sf).next();
                prop_assert_eq!(next.0, sf + 1);
                prop_assert!(next > SubframeIndex(sf));
            }

            #[test]
            fn only_zero_is_out_of_range(cqi in any::<u8>()) {
                prop_assert_eq!(Cqi(cqi).is_out_of_range(), cqi == 0);
                prop_assert_eq!(Cqi::from(cqi).index(), usize::from(cqi));
            }
        }
    }
}
