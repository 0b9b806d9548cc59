//! Port direction and patch types.

use serde::{Deserialize, Serialize};

/// Direction of a port (input or output)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortDirection::Input => "input",
            PortDirection::Output => "output",
        }
    }

    pub fn opposite(&self) -> PortDirection {
        match self {
            PortDirection::Input => PortDirection::Output,
            PortDirection::Output => PortDirection::Input,
        }
    }
}

impl std::fmt::Display for PortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A patch cord from an output port to an input port.
///
/// Both ends use the `component.port` reference syntax. On disk a patch is a
/// two-element array `["SRC.out", "DST.in"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[String; 2]", into = "[String; 2]")]
pub struct PatchDef {
    /// Source output reference
    pub source: String,

    /// Destination input reference
    pub dest: String,
}

impl PatchDef {
    pub fn new(source: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
        }
    }
}

impl From<[String; 2]> for PatchDef {
    fn from([source, dest]: [String; 2]) -> Self {
        Self { source, dest }
    }
}

impl From<PatchDef> for [String; 2] {
    fn from(patch: PatchDef) -> Self {
        [patch.source, patch.dest]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_serializes_as_pair() {
        let patch = PatchDef::new("INT1.out", "COEF.in");
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, r#"["INT1.out","COEF.in"]"#);

        let back: PatchDef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, patch);
    }

    #[test]
    fn test_direction_lowercase() {
        let json = serde_json::to_string(&PortDirection::Output).unwrap();
        assert_eq!(json, "\"output\"");
        assert_eq!(PortDirection::Input.as_str(), "input");
    }
}
