//! Per-invocation parameter value synthesis.
//!
//! Each declared query parameter carries a generator parsed once from a
//! compact `random:kind[:args]` grammar. Anything that does not start with
//! `random:` is treated as a literal and returned verbatim on every draw.
//!
//! Supported generator kinds:
//!
//! - `random:uuid` — a fresh v4 UUID string
//! - `random:int:min:max` — integer, inclusive on both bounds
//! - `random:long:min:max` — 64-bit integer, inclusive on both bounds
//! - `random:double:min:max` — double, uniform over `[min, max)`
//! - `random:string:len` — fixed-length alphanumeric string
//! - `random:boolean` — fair coin

use std::collections::BTreeMap;

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single generated parameter value, as handed to the session layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// Parameter name → generated value, for one query invocation.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// A parsed, validated value generator. Immutable after parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorSpec {
    Uuid,
    IntRange(i64, i64),
    LongRange(i64, i64),
    DoubleRange(f64, f64),
    FixedString(usize),
    Boolean,
    Literal(String),
}

impl GeneratorSpec {
    /// Parse a generator from its compact grammar. Strings that do not start
    /// with `random:` are literals and always parse successfully.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let Some(rest) = spec.strip_prefix("random:") else {
            return Ok(GeneratorSpec::Literal(spec.to_owned()));
        };

        let parts: Vec<&str> = rest.split(':').collect();
        match parts[0] {
            "uuid" => expect_arity(spec, &parts, 1).map(|_| GeneratorSpec::Uuid),
            "boolean" => expect_arity(spec, &parts, 1).map(|_| GeneratorSpec::Boolean),
            "string" => {
                expect_arity(spec, &parts, 2)?;
                let len = parts[1]
                    .parse::<usize>()
                    .map_err(|_| format!("invalid string length `{}` in `{spec}`", parts[1]))?;
                Ok(GeneratorSpec::FixedString(len))
            }
            "int" => {
                expect_arity(spec, &parts, 3)?;
                let (min, max) = parse_bounds::<i64>(spec, parts[1], parts[2])?;
                Ok(GeneratorSpec::IntRange(min, max))
            }
            "long" => {
                expect_arity(spec, &parts, 3)?;
                let (min, max) = parse_bounds::<i64>(spec, parts[1], parts[2])?;
                Ok(GeneratorSpec::LongRange(min, max))
            }
            "double" => {
                expect_arity(spec, &parts, 3)?;
                let (min, max) = parse_bounds::<f64>(spec, parts[1], parts[2])?;
                Ok(GeneratorSpec::DoubleRange(min, max))
            }
            other => Err(format!("unknown generator kind `{other}` in `{spec}`")),
        }
    }

    /// Synthesize one value. Literals come back unchanged on every call.
    pub fn generate(&self, rng: &mut impl Rng) -> ParamValue {
        match self {
            GeneratorSpec::Uuid => ParamValue::Str(Uuid::new_v4().to_string()),
            GeneratorSpec::IntRange(min, max) | GeneratorSpec::LongRange(min, max) => {
                ParamValue::Int(rng.gen_range(*min..=*max))
            }
            // Uniform over [min, max); degenerates to `min` when min == max.
            GeneratorSpec::DoubleRange(min, max) => {
                ParamValue::Float(min + rng.r#gen::<f64>() * (max - min))
            }
            GeneratorSpec::FixedString(len) => {
                let s: String = (0..*len)
                    .map(|_| char::from(rng.sample(Alphanumeric)))
                    .collect();
                ParamValue::Str(s)
            }
            GeneratorSpec::Boolean => ParamValue::Bool(rng.gen_bool(0.5)),
            GeneratorSpec::Literal(value) => ParamValue::Str(value.clone()),
        }
    }
}

fn expect_arity(spec: &str, parts: &[&str], want: usize) -> Result<(), String> {
    if parts.len() == want {
        Ok(())
    } else {
        Err(format!(
            "`{spec}` has wrong arity: expected {want} segment(s) after `random:`, got {}",
            parts.len()
        ))
    }
}

fn parse_bounds<T>(spec: &str, lo: &str, hi: &str) -> Result<(T, T), String>
where
    T: std::str::FromStr + PartialOrd + Copy,
{
    let min = lo
        .parse::<T>()
        .map_err(|_| format!("invalid lower bound `{lo}` in `{spec}`"))?;
    let max = hi
        .parse::<T>()
        .map_err(|_| format!("invalid upper bound `{hi}` in `{spec}`"))?;
    if min > max {
        return Err(format!("lower bound exceeds upper bound in `{spec}`"));
    }
    Ok((min, max))
}
