//! Port naming and port references.
//!
//! Port values live in plain `f64` slices owned by each component, the same
//! way a block keeps its I/O. This module covers everything about how ports
//! are *named*: fixed name lists, indexed families such as `in0..inN`, and the
//! `component.port` reference syntax used by patches.

use std::fmt;

pub use philbrick_types::PortDirection;

use crate::error::WiringError;

/// Names of a component's ports in one direction.
///
/// Kept as a small description rather than a list of strings so that
/// components with N inputs never allocate N names up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortNames {
    /// A fixed list, e.g. `["x", "y"]`
    Fixed(&'static [&'static str]),
    /// `prefix0 .. prefix{count-1}`
    Indexed { prefix: &'static str, count: usize },
    /// `a0 .. a{count-1}` followed by `b0 .. b{count-1}`
    Paired {
        first: &'static str,
        second: &'static str,
        count: usize,
    },
}

impl PortNames {
    /// No ports
    pub const NONE: PortNames = PortNames::Fixed(&[]);
    /// A single port named `in`
    pub const IN: PortNames = PortNames::Fixed(&["in"]);
    /// A single port named `out`
    pub const OUT: PortNames = PortNames::Fixed(&["out"]);

    pub fn len(&self) -> usize {
        match *self {
            PortNames::Fixed(names) => names.len(),
            PortNames::Indexed { count, .. } => count,
            PortNames::Paired { count, .. } => 2 * count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the port at `index`, if in range
    pub fn name(&self, index: usize) -> Option<String> {
        match *self {
            PortNames::Fixed(names) => names.get(index).map(|s| s.to_string()),
            PortNames::Indexed { prefix, count } => {
                (index < count).then(|| format!("{}{}", prefix, index))
            }
            PortNames::Paired {
                first,
                second,
                count,
            } => {
                if index < count {
                    Some(format!("{}{}", first, index))
                } else if index < 2 * count {
                    Some(format!("{}{}", second, index - count))
                } else {
                    None
                }
            }
        }
    }

    /// Position of the port called `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        match *self {
            PortNames::Fixed(names) => names.iter().position(|n| *n == name),
            PortNames::Indexed { prefix, count } => {
                parse_indexed(name, prefix).filter(|&i| i < count)
            }
            PortNames::Paired {
                first,
                second,
                count,
            } => {
                if let Some(i) = parse_indexed(name, first).filter(|&i| i < count) {
                    Some(i)
                } else {
                    parse_indexed(name, second)
                        .filter(|&i| i < count)
                        .map(|i| count + i)
                }
            }
        }
    }

    /// All names in port order
    pub fn to_vec(&self) -> Vec<String> {
        (0..self.len()).filter_map(|i| self.name(i)).collect()
    }
}

/// Parses `prefix<digits>` into the index; rejects leading zeros like `in01`.
fn parse_indexed(name: &str, prefix: &str) -> Option<usize> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || (digits.len() > 1 && digits.starts_with('0')) {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// A textual `component.port` reference.
///
/// The split happens at the last dot, so subcircuit members such as
/// `S1.EXP0.out` resolve to component `S1.EXP0`, port `out`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRef {
    pub component: String,
    pub port: String,
}

impl PortRef {
    pub fn new(component: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            port: port.into(),
        }
    }

    /// Parse `component.port`
    pub fn parse(text: &str) -> Result<Self, WiringError> {
        match text.rsplit_once('.') {
            Some((component, port)) if !component.is_empty() && !port.is_empty() => {
                Ok(Self::new(component, port))
            }
            _ => Err(WiringError::MalformedRef(text.to_string())),
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component, self.port)
    }
}

impl std::str::FromStr for PortRef {
    type Err = WiringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_at_last_dot() {
        let r = PortRef::parse("S1.EXP0.out").unwrap();
        assert_eq!(r.component, "S1.EXP0");
        assert_eq!(r.port, "out");
        assert_eq!(r.to_string(), "S1.EXP0.out");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["INT", ".out", "INT.", ""] {
            assert!(matches!(
                PortRef::parse(bad),
                Err(WiringError::MalformedRef(_))
            ));
        }
    }

    #[test]
    fn test_indexed_names() {
        let names = PortNames::Indexed {
            prefix: "in",
            count: 3,
        };
        assert_eq!(names.to_vec(), vec!["in0", "in1", "in2"]);
        assert_eq!(names.index_of("in2"), Some(2));
        assert_eq!(names.index_of("in3"), None);
        assert_eq!(names.index_of("in01"), None);
        assert_eq!(names.index_of("in"), None);
    }

    #[test]
    fn test_paired_names() {
        let names = PortNames::Paired {
            first: "a",
            second: "b",
            count: 2,
        };
        assert_eq!(names.len(), 4);
        assert_eq!(names.to_vec(), vec!["a0", "a1", "b0", "b1"]);
        assert_eq!(names.index_of("b1"), Some(3));
        assert_eq!(names.index_of("b2"), None);
    }

    #[test]
    fn test_fixed_names() {
        let names = PortNames::Fixed(&["num", "den"]);
        assert_eq!(names.index_of("den"), Some(1));
        assert_eq!(names.name(2), None);
        assert!(PortNames::NONE.is_empty());
    }
}
