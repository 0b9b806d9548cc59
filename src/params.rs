//! Typed access to component parameters.
//!
//! Parameters arrive as JSON values keyed by name. Each component kind lists
//! the keys it accepts; anything else is rejected instead of silently ignored.

use serde_json::Value;

pub use philbrick_types::Params;

use crate::error::ConfigurationError;

/// A component that can be built from, and exported to, a parameter map.
///
/// `params()` returns the complete set of accepted keys, so that feeding it
/// back into `from_params()` reproduces an identical component.
pub trait Configurable: Sized {
    /// Kind name used in circuit definitions
    const KIND: &'static str;

    /// Every parameter key this kind accepts
    const PARAMS: &'static [&'static str];

    fn from_params(params: &Params) -> Result<Self, ConfigurationError>;

    fn params(&self) -> Params;
}

/// Upper bound on the port count of a variable-width component
pub const MAX_PORTS: usize = 4096;

/// Build a [`Params`] map from `"key" => value` pairs.
macro_rules! params {
    ($($key:literal => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::params::Params::new();
        $( map.insert($key.to_string(), serde_json::json!($value)); )*
        map
    }};
}
pub(crate) use params;

/// Validating reader over a parameter map
pub struct ParamReader<'a> {
    kind: &'static str,
    params: &'a Params,
}

impl<'a> ParamReader<'a> {
    /// Create a reader, rejecting any key not in `accepted`
    pub fn new(
        kind: &'static str,
        params: &'a Params,
        accepted: &[&str],
    ) -> Result<Self, ConfigurationError> {
        if let Some(key) = params.keys().find(|k| !accepted.contains(&k.as_str())) {
            return Err(ConfigurationError::UnknownParam {
                kind: kind.to_string(),
                param: key.clone(),
            });
        }
        Ok(Self { kind, params })
    }

    /// A finite number
    pub fn f64(&self, key: &str, default: f64) -> Result<f64, ConfigurationError> {
        match self.params.get(key) {
            None => Ok(default),
            Some(value) => self.number(key, value),
        }
    }

    /// A finite, non-negative number
    pub fn non_negative(&self, key: &str, default: f64) -> Result<f64, ConfigurationError> {
        let value = self.f64(key, default)?;
        if value < 0.0 {
            return Err(self.invalid(key, format!("must be >= 0, got {}", value)));
        }
        Ok(value)
    }

    /// A finite, strictly positive number
    pub fn positive(&self, key: &str, default: f64) -> Result<f64, ConfigurationError> {
        let value = self.f64(key, default)?;
        if value <= 0.0 {
            return Err(self.invalid(key, format!("must be > 0, got {}", value)));
        }
        Ok(value)
    }

    /// A whole number between `min` and [`MAX_PORTS`]
    pub fn count(&self, key: &str, default: usize, min: usize) -> Result<usize, ConfigurationError> {
        let count = match self.params.get(key) {
            None => default as u64,
            Some(value) => match value.as_u64() {
                Some(n) => n,
                None => match value.as_f64() {
                    Some(x) if x >= 0.0 && x.fract() == 0.0 && x.is_finite() => {
                        x.min(u64::MAX as f64) as u64
                    }
                    _ => return Err(self.wrong_type(key, "a non-negative integer")),
                },
            },
        };
        if count < min as u64 {
            return Err(self.invalid(key, format!("must be at least {}, got {}", min, count)));
        }
        if count > MAX_PORTS as u64 {
            return Err(self.invalid(
                key,
                format!("must be at most {}, got {}", MAX_PORTS, count),
            ));
        }
        Ok(count as usize)
    }

    /// A list of finite numbers
    pub fn f64_list(&self, key: &str, default: &[f64]) -> Result<Vec<f64>, ConfigurationError> {
        match self.params.get(key) {
            None => Ok(default.to_vec()),
            Some(Value::Array(items)) => items.iter().map(|v| self.number(key, v)).collect(),
            Some(_) => Err(self.wrong_type(key, "a list of numbers")),
        }
    }

    /// A list of `[x, y]` pairs
    pub fn points(
        &self,
        key: &str,
        default: &[(f64, f64)],
    ) -> Result<Vec<(f64, f64)>, ConfigurationError> {
        let items = match self.params.get(key) {
            None => return Ok(default.to_vec()),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(self.wrong_type(key, "a list of [x, y] pairs")),
        };
        items
            .iter()
            .map(|item| match item {
                Value::Array(pair) if pair.len() == 2 => {
                    Ok((self.number(key, &pair[0])?, self.number(key, &pair[1])?))
                }
                _ => Err(self.wrong_type(key, "a list of [x, y] pairs")),
            })
            .collect()
    }

    /// Build an out-of-range error for `key`
    pub fn invalid(&self, key: &str, reason: impl Into<String>) -> ConfigurationError {
        ConfigurationError::InvalidValue {
            kind: self.kind.to_string(),
            param: key.to_string(),
            reason: reason.into(),
        }
    }

    fn number(&self, key: &str, value: &Value) -> Result<f64, ConfigurationError> {
        match value.as_f64() {
            Some(x) if x.is_finite() => Ok(x),
            Some(x) => Err(self.invalid(key, format!("must be finite, got {}", x))),
            None => Err(self.wrong_type(key, "a number")),
        }
    }

    fn wrong_type(&self, key: &str, expected: &'static str) -> ConfigurationError {
        ConfigurationError::WrongType {
            kind: self.kind.to_string(),
            param: key.to_string(),
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Params {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_unknown_key_rejected() {
        let p = map(json!({"gain": 2.0, "gian": 1.0}));
        let err = ParamReader::new("Integrator", &p, &["gain", "initial"])
            .err()
            .unwrap();
        assert_eq!(
            err,
            ConfigurationError::UnknownParam {
                kind: "Integrator".to_string(),
                param: "gian".to_string()
            }
        );
    }

    #[test]
    fn test_defaults_and_integers() {
        let p = map(json!({"k": 3}));
        let r = ParamReader::new("Coefficient", &p, &["k", "other"]).unwrap();
        assert_eq!(r.f64("k", 1.0).unwrap(), 3.0);
        assert_eq!(r.f64("other", 0.5).unwrap(), 0.5);
    }

    #[test]
    fn test_wrong_type() {
        let p = map(json!({"k": "three"}));
        let r = ParamReader::new("Coefficient", &p, &["k"]).unwrap();
        assert!(matches!(
            r.f64("k", 1.0),
            Err(ConfigurationError::WrongType { .. })
        ));
    }

    #[test]
    fn test_count_bounds() {
        let p = map(json!({"size": 0}));
        let r = ParamReader::new("Max", &p, &["size"]).unwrap();
        assert!(matches!(
            r.count("size", 2, 1),
            Err(ConfigurationError::InvalidValue { .. })
        ));

        let p = map(json!({"size": 3.0}));
        let r = ParamReader::new("Max", &p, &["size"]).unwrap();
        assert_eq!(r.count("size", 2, 1).unwrap(), 3);

        let p = map(json!({"size": MAX_PORTS}));
        let r = ParamReader::new("Max", &p, &["size"]).unwrap();
        assert_eq!(r.count("size", 2, 1).unwrap(), MAX_PORTS);

        for huge in [json!(MAX_PORTS + 1), json!(1e15), json!(u64::MAX)] {
            let p = map(json!({ "size": huge }));
            let r = ParamReader::new("Max", &p, &["size"]).unwrap();
            assert!(matches!(
                r.count("size", 2, 1),
                Err(ConfigurationError::InvalidValue { .. })
            ));
        }
    }

    #[test]
    fn test_points() {
        let p = map(json!({"breakpoints": [[0, 0], [1, 2.5]]}));
        let r = ParamReader::new("PiecewiseLinear", &p, &["breakpoints"]).unwrap();
        assert_eq!(
            r.points("breakpoints", &[]).unwrap(),
            vec![(0.0, 0.0), (1.0, 2.5)]
        );

        let p = map(json!({"breakpoints": [[0, 0, 1]]}));
        let r = ParamReader::new("PiecewiseLinear", &p, &["breakpoints"]).unwrap();
        assert!(r.points("breakpoints", &[]).is_err());
    }

    #[test]
    fn test_params_macro() {
        let p = params! { "k" => 2.0, "weights" => vec![1.0, -1.0] };
        assert_eq!(p["k"], json!(2.0));
        assert_eq!(p["weights"], json!([1.0, -1.0]));
    }
}
