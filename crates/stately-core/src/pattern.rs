use regex::Regex;
use serde_json::Value;

use crate::errors::PatternError;
use crate::match_result::MatchResult;

/// External string-pattern capability. The matching engine hands over the
/// stored value and the (already rendered) predicate configuration; how the
/// predicate language looks is the host's business.
pub trait PatternEvaluator: Send + Sync {
    fn eval(&self, pattern: &Value, candidate: Option<&str>) -> Result<MatchResult, PatternError>;
}

/// Reference evaluator covering the common predicate operators. An absent
/// candidate never matches a positive predicate; `absent` tests for it
/// explicitly.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicPatternEvaluator;

impl PatternEvaluator for BasicPatternEvaluator {
    fn eval(&self, pattern: &Value, candidate: Option<&str>) -> Result<MatchResult, PatternError> {
        let map = pattern
            .as_object()
            .ok_or_else(|| PatternError(format!("pattern must be a mapping, got: {pattern}")))?;

        let (operator, operand) = map
            .iter()
            .next()
            .ok_or_else(|| PatternError("empty pattern configuration".into()))?;
        match operator.as_str() {
            "equalTo" => Ok(MatchResult::of(candidate == Some(expect_str(operand)?))),
            "contains" => {
                let needle = expect_str(operand)?;
                Ok(MatchResult::of(candidate.is_some_and(|c| c.contains(needle))))
            }
            "matches" => {
                let regex = full_match_regex(expect_str(operand)?)?;
                Ok(MatchResult::of(candidate.is_some_and(|c| regex.is_match(c))))
            }
            "absent" => Ok(MatchResult::of(candidate.is_none() == truthy(operand))),
            "and" => {
                let parts = expect_seq(operand)?;
                let results = parts
                    .iter()
                    .map(|p| self.eval(p, candidate))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(MatchResult::aggregate(results))
            }
            "or" => {
                let parts = expect_seq(operand)?;
                for part in parts {
                    if self.eval(part, candidate)?.is_exact_match() {
                        return Ok(MatchResult::ExactMatch);
                    }
                }
                Ok(MatchResult::NoMatch)
            }
            other => Err(PatternError(format!("unknown pattern operator '{other}'"))),
        }
    }
}

fn expect_str(value: &Value) -> Result<&str, PatternError> {
    value
        .as_str()
        .ok_or_else(|| PatternError(format!("pattern operand must be a string, got: {value}")))
}

fn expect_seq(value: &Value) -> Result<&Vec<Value>, PatternError> {
    value
        .as_array()
        .ok_or_else(|| PatternError(format!("pattern operand must be a sequence, got: {value}")))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

fn full_match_regex(pattern: &str) -> Result<Regex, PatternError> {
    Regex::new(&format!(r"\A(?:{pattern})\z"))
        .map_err(|e| PatternError(format!("invalid regex '{pattern}': {e}")))
}
