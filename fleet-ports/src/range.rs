use std::fmt;

use fleet_core::{FleetError, Result};
use serde::{Deserialize, Serialize};

/// An inclusive range of ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Result<Self> {
        if start > end {
            return Err(FleetError::Validation(format!(
                "Invalid range: start ({}) must not exceed end ({})",
                start, end
            )));
        }
        Ok(PortRange { start, end })
    }

    /// Parse a `START-END` range string.
    pub fn parse(range_str: &str) -> Result<Self> {
        let (start_str, end_str) = range_str.split_once('-').ok_or_else(|| {
            FleetError::Validation(format!(
                "Invalid port range format: {} (expected START-END)",
                range_str
            ))
        })?;

        let start: u16 = start_str
            .parse()
            .map_err(|_| FleetError::Validation(format!("Invalid start port: {}", start_str)))?;
        let end: u16 = end_str
            .parse()
            .map_err(|_| FleetError::Validation(format!("Invalid end port: {}", end_str)))?;

        Self::new(start, end)
    }

    pub fn overlaps_with(&self, other: &PortRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn size(&self) -> u16 {
        self.end - self.start + 1
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_range() {
        let range = PortRange::parse("20000-20009").unwrap();
        assert_eq!(range.start, 20000);
        assert_eq!(range.end, 20009);
        assert_eq!(range.size(), 10);
    }

    #[test]
    fn test_single_port_range() {
        let range = PortRange::new(20000, 20000).unwrap();
        assert_eq!(range.size(), 1);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(PortRange::parse("20000").is_err());
        assert!(PortRange::parse("a-b").is_err());
        assert!(PortRange::parse("20009-20000").is_err());
    }

    #[test]
    fn test_overlap_detection() {
        let a = PortRange::new(20000, 20009).unwrap();
        let b = PortRange::new(20005, 20015).unwrap();
        let c = PortRange::new(20010, 20019).unwrap();

        assert!(a.overlaps_with(&b));
        assert!(b.overlaps_with(&a));
        assert!(!a.overlaps_with(&c));
        assert!(!c.overlaps_with(&a));
    }
}
