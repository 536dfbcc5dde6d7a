//! Single-parameter random perturbation of a model configuration.

use rand::Rng;
use tracing::debug;

use ct_types::{
    config_error, Candidate, CandidateKey, CtResult, ParamRange, ParamValue, ParameterConfig,
};

/// Draw one candidate value for `name` uniformly from `range` and return it
/// together with a derived copy of `base`. The base configuration is never
/// modified.
///
/// Both bounds integral ⇒ the draw is rounded to the nearest integer;
/// otherwise it is rounded to 3 decimal places. A `name` absent from the
/// configuration is a configuration authoring error, not a runtime
/// condition to recover from.
pub fn mutate(base: &ParameterConfig, name: &str, range: ParamRange) -> CtResult<Candidate> {
    if !base.contains(name) {
        return Err(config_error!(
            "parameter {name} does not exist in configuration"
        ));
    }

    let draw: f64 = rand::thread_rng().gen_range(range.min..=range.max);
    let value = if range.is_integral() {
        ParamValue::Int(draw.round() as i64)
    } else {
        ParamValue::Float((draw * 1000.0).round() / 1000.0)
    };

    let config = base.with_value(name, value)?;
    debug!(parameter = name, value = %value, "mutated candidate");
    Ok(Candidate {
        key: CandidateKey::new(name, value),
        config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> ParameterConfig {
        serde_json::from_value(json!({"D": 1.5, "M": 2000})).unwrap()
    }

    #[test]
    fn integral_bounds_draw_integers_in_range() {
        let config = base();
        for _ in 0..200 {
            let candidate = mutate(&config, "M", ParamRange::new(500.0, 50000.0)).unwrap();
            match candidate.key.value {
                ParamValue::Int(v) => assert!((500..=50000).contains(&v), "out of range: {v}"),
                other => panic!("expected Int, got: {other:?}"),
            }
        }
    }

    #[test]
    fn float_bounds_draw_three_decimal_floats_in_range() {
        let config = base();
        for _ in 0..200 {
            let candidate = mutate(&config, "D", ParamRange::new(1.0, 2.5)).unwrap();
            match candidate.key.value {
                ParamValue::Float(v) => {
                    assert!((1.0..=2.5).contains(&v), "out of range: {v}");
                    let scaled = v * 1000.0;
                    assert!((scaled - scaled.round()).abs() < 1e-9, "not 3dp: {v}");
                }
                other => panic!("expected Float, got: {other:?}"),
            }
        }
    }

    #[test]
    fn one_integral_bound_still_draws_floats() {
        let config = base();
        let candidate = mutate(&config, "D", ParamRange::new(1.0, 2.25)).unwrap();
        assert!(matches!(candidate.key.value, ParamValue::Float(_)));
    }

    #[test]
    fn unknown_parameter_is_fatal_and_mutates_nothing() {
        let config = base();
        let err = mutate(&config, "Q", ParamRange::new(0.0, 1.0)).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert_eq!(config, base());
    }

    #[test]
    fn derived_config_differs_only_in_the_tuned_key() {
        let config = base();
        let candidate = mutate(&config, "D", ParamRange::new(3.0, 4.5)).unwrap();
        assert_eq!(config.get("D"), Some(1.5));
        assert_eq!(candidate.config.get("M"), Some(2000.0));
        assert_eq!(
            candidate.config.get("D"),
            Some(candidate.key.value.as_f64())
        );
    }

    #[test]
    fn degenerate_range_returns_the_bound() {
        let config = base();
        let candidate = mutate(&config, "M", ParamRange::new(700.0, 700.0)).unwrap();
        assert_eq!(candidate.key.value, ParamValue::Int(700));
    }
}
