//! Model-parameter configuration, mutation ranges, and candidate identity.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::{config_error, CtResult, MetricsError};

/// A concrete tuned parameter value.
///
/// The numeric kind is decided at mutation time: integral range bounds
/// produce an `Int`, anything else a `Float` rounded to 3 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
}

impl ParamValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Int(v) => *v as f64,
            Self::Float(v) => *v,
        }
    }

    /// Parse a candidate-key literal: int when there is no decimal point,
    /// float otherwise.
    pub fn parse_literal(literal: &str) -> CtResult<Self> {
        let parsed = if literal.contains('.') {
            literal.parse::<f64>().ok().map(Self::Float)
        } else {
            literal.parse::<i64>().ok().map(Self::Int)
        };
        parsed.ok_or_else(|| {
            MetricsError::BadCandidateKey {
                key: literal.to_string(),
            }
            .into()
        })
    }

    fn to_json(self) -> CtResult<Value> {
        match self {
            Self::Int(v) => Ok(Value::Number(Number::from(v))),
            Self::Float(v) => Number::from_f64(v)
                .map(Value::Number)
                .ok_or_else(|| config_error!("non-finite parameter value {v}")),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            // A float always keeps its decimal point so an encoded key
            // decodes back to a float ("2.0", never "2").
            Self::Float(v) if v.fract() == 0.0 => write!(f, "{v:.1}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Flat, ordered parameter-name → number mapping, persisted as JSON.
///
/// One instance exists per iteration (the current best configuration) plus
/// one transient copy per candidate mutation within an iteration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterConfig(Map<String, Value>);

impl ParameterConfig {
    pub fn load(path: &Path) -> CtResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| config_error!("cannot read parameter config {}: {e}", path.display()))?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> CtResult<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)
            .map_err(|e| config_error!("cannot write parameter config {}: {e}", path.display()))?;
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(Value::as_f64)
    }

    /// Overwrite one existing key. Setting a key the configuration does not
    /// already carry is a configuration authoring error.
    pub fn set(&mut self, name: &str, value: ParamValue) -> CtResult<()> {
        if !self.contains(name) {
            return Err(config_error!(
                "parameter {name} does not exist in configuration"
            ));
        }
        self.0.insert(name.to_string(), value.to_json()?);
        Ok(())
    }

    /// Copy of this configuration with a single key replaced.
    pub fn with_value(&self, name: &str, value: ParamValue) -> CtResult<Self> {
        let mut derived = self.clone();
        derived.set(name, value)?;
        Ok(derived)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Closed numeric range [min, max] for one tunable parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
}

impl ParamRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Both bounds are exactly representable as integers.
    pub fn is_integral(&self) -> bool {
        self.min.fract() == 0.0 && self.max.fract() == 0.0
    }
}

/// Parameter-name → [min, max] mutation ranges, read once at startup.
///
/// Entries keep the authored JSON order; candidate submission order within
/// an iteration follows it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MutationSpec {
    entries: Vec<(String, ParamRange)>,
}

impl MutationSpec {
    pub fn load(path: &Path) -> CtResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| config_error!("cannot read mutation spec {}: {e}", path.display()))?;
        Self::from_value(serde_json::from_str(&text)?)
    }

    pub fn from_value(value: Value) -> CtResult<Self> {
        let Value::Object(map) = value else {
            return Err(config_error!("mutation spec must be a JSON object"));
        };
        let mut entries = Vec::with_capacity(map.len());
        for (name, bounds) in map {
            let pair = bounds
                .as_array()
                .filter(|a| a.len() == 2)
                .ok_or_else(|| config_error!("range for {name} must be a [min, max] pair"))?;
            let min = pair[0]
                .as_f64()
                .ok_or_else(|| config_error!("non-numeric min bound for {name}"))?;
            let max = pair[1]
                .as_f64()
                .ok_or_else(|| config_error!("non-numeric max bound for {name}"))?;
            if min > max {
                return Err(config_error!("range for {name} has min > max"));
            }
            entries.push((name, ParamRange::new(min, max)));
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[(String, ParamRange)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Typed candidate identity.
///
/// Encodes as `name_value` in aggregate files; decoding splits on the
/// *last* underscore so parameter names may themselves contain underscores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateKey {
    pub name: String,
    pub value: ParamValue,
}

impl CandidateKey {
    pub fn new(name: impl Into<String>, value: ParamValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn decode(encoded: &str) -> CtResult<Self> {
        let (name, literal) = encoded.rsplit_once('_').ok_or_else(|| {
            crate::CtError::from(MetricsError::BadCandidateKey {
                key: encoded.to_string(),
            })
        })?;
        if name.is_empty() {
            return Err(MetricsError::BadCandidateKey {
                key: encoded.to_string(),
            }
            .into());
        }
        Ok(Self::new(name, ParamValue::parse_literal(literal)?))
    }
}

impl fmt::Display for CandidateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.name, self.value)
    }
}

/// One trial parameter value plus the derived configuration carrying it.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub key: CandidateKey,
    pub config: ParameterConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_config() -> ParameterConfig {
        serde_json::from_value(json!({"D": 1.5, "C": 0.5, "M": 2000})).unwrap()
    }

    #[test]
    fn param_value_display_keeps_decimal_point() {
        assert_eq!(ParamValue::Int(2).to_string(), "2");
        assert_eq!(ParamValue::Float(2.0).to_string(), "2.0");
        assert_eq!(ParamValue::Float(1.534).to_string(), "1.534");
    }

    #[test]
    fn param_value_literal_typing() {
        assert_eq!(ParamValue::parse_literal("2").unwrap(), ParamValue::Int(2));
        assert_eq!(
            ParamValue::parse_literal("2.0").unwrap(),
            ParamValue::Float(2.0)
        );
        assert!(ParamValue::parse_literal("abc").is_err());
    }

    #[test]
    fn candidate_key_round_trip() {
        for encoded in ["D_1.5", "M_2000", "read_depth_0.75"] {
            let key = CandidateKey::decode(encoded).unwrap();
            assert_eq!(key.to_string(), encoded);
        }
        let key = CandidateKey::decode("read_depth_0.75").unwrap();
        assert_eq!(key.name, "read_depth");
        assert_eq!(key.value, ParamValue::Float(0.75));
    }

    #[test]
    fn candidate_key_rejects_garbage() {
        assert!(CandidateKey::decode("noseparator").is_err());
        assert!(CandidateKey::decode("_1.5").is_err());
        assert!(CandidateKey::decode("D_one").is_err());
    }

    #[test]
    fn with_value_leaves_base_untouched() {
        let base = sample_config();
        let derived = base.with_value("D", ParamValue::Float(1.75)).unwrap();
        assert_eq!(base.get("D"), Some(1.5));
        assert_eq!(derived.get("D"), Some(1.75));
        assert_eq!(derived.get("C"), Some(0.5));
    }

    #[test]
    fn set_unknown_parameter_is_fatal() {
        let mut config = sample_config();
        let err = config.set("Q", ParamValue::Int(1)).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert_eq!(config, sample_config());
    }

    #[test]
    fn config_preserves_key_order() {
        let config = sample_config();
        let text = serde_json::to_string(&config).unwrap();
        let d = text.find("\"D\"").unwrap();
        let c = text.find("\"C\"").unwrap();
        let m = text.find("\"M\"").unwrap();
        assert!(d < c && c < m);
    }

    #[test]
    fn mutation_spec_keeps_authored_order() {
        let spec =
            MutationSpec::from_value(json!({"D": [1.0, 2.0], "C": [0.25, 2.0], "M": [500, 50000]}))
                .unwrap();
        let names: Vec<&str> = spec.entries().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["D", "C", "M"]);
        // [1.0, 2.0] counts as integral: both bounds have zero fraction.
        assert!(spec.entries()[0].1.is_integral());
        assert!(!spec.entries()[1].1.is_integral());
        assert!(spec.entries()[2].1.is_integral());
    }

    #[test]
    fn mutation_spec_rejects_bad_ranges() {
        assert!(MutationSpec::from_value(json!({"D": [2.0]})).is_err());
        assert!(MutationSpec::from_value(json!({"D": [2.0, 1.0]})).is_err());
        assert!(MutationSpec::from_value(json!(["D"])).is_err());
    }
}
