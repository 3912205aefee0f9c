//! Predicate operators.
//!
//! Each function builds a [`Predicate`] that tests a candidate value
//! against an operand. Operators hand the candidate back on success.
//! `lt`, `lte` and `between` answer [`Outcome::Stop`] once the candidate
//! has passed the operand, which lets an ascending index scan end early.
//!
//! ```rust
//! use kvdoc_core::{ops, Outcome, Value};
//!
//! let young = ops::lt(30);
//! assert!(young.test(&Value::from(21)).is_match());
//! assert_eq!(young.test(&Value::from(30)), Outcome::Stop);
//! ```

use std::cmp::Ordering;

use kvdoc_codec::{format_number, RegexLiteral, Value};
use kvdoc_storage::BigInt;

use crate::pattern::{Outcome, Predicate};

/// Orders two values of compatible types.
///
/// Numbers, big integers and dates compare numerically with each other;
/// strings and booleans compare with their own kind. Anything else is
/// unordered.
#[must_use]
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::BigInt(x), Value::BigInt(y)) => Some(x.cmp(y)),
        (Value::BigInt(x), Value::Number(y)) => integral(*y).map(|y| x.cmp(&y)),
        (Value::Number(x), Value::BigInt(y)) => integral(*x).map(|x| x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Number(y)) => (*x as f64).partial_cmp(y),
        (Value::Number(x), Value::Date(y)) => x.partial_cmp(&(*y as f64)),
        _ => None,
    }
}

fn integral(n: f64) -> Option<BigInt> {
    (n.is_finite() && n.fract() == 0.0).then(|| BigInt::from(n as i128))
}

/// Loose equality: numbers, numeric strings, booleans and big integers
/// compare by numeric value, and `null` equals `undefined`.
#[must_use]
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Number(_) | Value::BigInt(_), Value::Number(_) | Value::BigInt(_)) => {
            compare(a, b) == Some(Ordering::Equal)
        }
        (Value::Number(_), Value::Text(_) | Value::Bool(_)) => to_number(b) == a.as_number(),
        (Value::Text(_) | Value::Bool(_), Value::Number(_)) => to_number(a) == b.as_number(),
        (Value::Bool(_), Value::Text(_)) | (Value::Text(_), Value::Bool(_)) => {
            matches!((to_number(a), to_number(b)), (Some(x), Some(y)) if x == y)
        }
        _ => a == b && !matches!(a, Value::Number(n) if n.is_nan()),
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Text(s) if s.trim().is_empty() => Some(0.0),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(s.clone()),
        Value::Number(n) => Some(format_number(*n)),
        _ => None,
    }
}

fn when(name: &str, test: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Predicate {
    Predicate::new(name, move |value| {
        if test(value) {
            Outcome::matched(value.clone())
        } else {
            Outcome::NoMatch
        }
    })
}

/// Matches values below `bound`; stops at the first value at or above it.
pub fn lt(bound: impl Into<Value>) -> Predicate {
    let bound = bound.into();
    Predicate::new("$lt", move |value| match compare(value, &bound) {
        Some(Ordering::Less) => Outcome::matched(value.clone()),
        Some(_) => Outcome::Stop,
        None => Outcome::NoMatch,
    })
}

/// Matches values at or below `bound`; stops past it.
pub fn lte(bound: impl Into<Value>) -> Predicate {
    let bound = bound.into();
    Predicate::new("$lte", move |value| match compare(value, &bound) {
        Some(Ordering::Greater) => Outcome::Stop,
        Some(_) => Outcome::matched(value.clone()),
        None => Outcome::NoMatch,
    })
}

/// Matches values above `bound`.
pub fn gt(bound: impl Into<Value>) -> Predicate {
    let bound = bound.into();
    when("$gt", move |value| compare(value, &bound) == Some(Ordering::Greater))
}

/// Matches values at or above `bound`.
pub fn gte(bound: impl Into<Value>) -> Predicate {
    let bound = bound.into();
    when("$gte", move |value| {
        matches!(compare(value, &bound), Some(Ordering::Greater | Ordering::Equal))
    })
}

/// Loose equality.
pub fn eq(operand: impl Into<Value>) -> Predicate {
    let operand = operand.into();
    when("$eq", move |value| loose_eq(value, &operand))
}

/// Strict equality.
pub fn eeq(operand: impl Into<Value>) -> Predicate {
    let operand = operand.into();
    when("$eeq", move |value| *value == operand && !matches!(value, Value::Number(n) if n.is_nan()))
}

/// Loose inequality.
pub fn neq(operand: impl Into<Value>) -> Predicate {
    let operand = operand.into();
    when("$neq", move |value| !loose_eq(value, &operand))
}

/// Matches values in `low..=high`; stops past `high`.
pub fn between(low: impl Into<Value>, high: impl Into<Value>) -> Predicate {
    let (low, high) = (low.into(), high.into());
    Predicate::new("$between", move |value| {
        match (compare(value, &low), compare(value, &high)) {
            (_, Some(Ordering::Greater)) => Outcome::Stop,
            (Some(Ordering::Greater | Ordering::Equal), Some(_)) => Outcome::matched(value.clone()),
            _ => Outcome::NoMatch,
        }
    })
}

/// Matches values below `low` or above `high`.
pub fn outside(low: impl Into<Value>, high: impl Into<Value>) -> Predicate {
    let (low, high) = (low.into(), high.into());
    when("$outside", move |value| {
        compare(value, &low) == Some(Ordering::Less) || compare(value, &high) == Some(Ordering::Greater)
    })
}

/// Matches values equal to one of `options`.
pub fn in_(options: Vec<Value>) -> Predicate {
    when("$in", move |value| options.contains(value))
}

/// Matches values equal to none of `options`.
pub fn nin(options: Vec<Value>) -> Predicate {
    when("$nin", move |value| !options.contains(value))
}

fn contained_in(container: &Value, value: &Value) -> bool {
    match container {
        Value::Array(items) => items.contains(value),
        Value::Text(text) => text_of(value).is_some_and(|needle| text.contains(&needle)),
        _ => false,
    }
}

/// Matches values contained in `container` (an array or a string).
pub fn includes(container: impl Into<Value>) -> Predicate {
    let container = container.into();
    when("$includes", move |value| contained_in(&container, value))
}

/// Matches values not contained in `container`.
pub fn excludes(container: impl Into<Value>) -> Predicate {
    let container = container.into();
    when("$excludes", move |value| !contained_in(&container, value))
}

fn array_test(
    name: &str,
    operand: Vec<Value>,
    test: impl Fn(&[Value], &[Value]) -> bool + Send + Sync + 'static,
) -> Predicate {
    when(name, move |value| value.as_array().is_some_and(|items| test(items, &operand)))
}

/// Matches arrays sharing at least one element with `operand`.
pub fn intersects(operand: Vec<Value>) -> Predicate {
    array_test("$intersects", operand, |items, operand| {
        items.iter().any(|item| operand.contains(item))
    })
}

/// Matches arrays sharing no element with `operand`.
pub fn disjoint(operand: Vec<Value>) -> Predicate {
    array_test("$disjoint", operand, |items, operand| {
        !items.iter().any(|item| operand.contains(item))
    })
}

/// Matches arrays whose elements all appear in `operand`.
pub fn subset(operand: Vec<Value>) -> Predicate {
    array_test("$subset", operand, |items, operand| {
        items.iter().all(|item| operand.contains(item))
    })
}

/// Matches arrays containing every element of `operand`.
pub fn superset(operand: Vec<Value>) -> Predicate {
    array_test("$superset", operand, |items, operand| {
        operand.iter().all(|item| items.contains(item))
    })
}

/// Matches arrays holding the same elements as `operand` in any order.
pub fn symmetric(operand: Vec<Value>) -> Predicate {
    array_test("$symmetric", operand, |items, operand| {
        items.len() == operand.len() && items.iter().all(|item| operand.contains(item))
    })
}

/// Matches strings starting with `prefix`.
pub fn starts_with(prefix: impl Into<Value>) -> Predicate {
    let prefix = text_of(&prefix.into());
    when("$startsWith", move |value| match (value, &prefix) {
        (Value::Text(s), Some(p)) => s.starts_with(p.as_str()),
        _ => false,
    })
}

/// Matches strings ending with `suffix`.
pub fn ends_with(suffix: impl Into<Value>) -> Predicate {
    let suffix = text_of(&suffix.into());
    when("$endsWith", move |value| match (value, &suffix) {
        (Value::Text(s), Some(p)) => s.ends_with(p.as_str()),
        _ => false,
    })
}

/// Matches strings and arrays of length `len`.
pub fn length(len: usize) -> Predicate {
    when("$length", move |value| match value {
        Value::Text(s) => s.chars().count() == len,
        Value::Array(items) => items.len() == len,
        _ => false,
    })
}

/// Matches strings (and numbers, by their decimal form) that `re` accepts.
pub fn matches(re: RegexLiteral) -> Predicate {
    when("$matches", move |value| text_of(value).is_some_and(|text| re.is_match(&text)))
}

/// Alias of [`matches`].
pub fn similar(re: RegexLiteral) -> Predicate {
    let inner = matches(re);
    Predicate::new("$similar", move |value| inner.test(value))
}

/// Matches strings with the same Soundex code as `word`.
pub fn echoes(word: impl Into<Value>) -> Predicate {
    let code = text_of(&word.into()).map(|w| soundex(&w));
    when("$echoes", move |value| match (text_of(value), &code) {
        (Some(text), Some(code)) => soundex(&text) == *code,
        _ => false,
    })
}

/// Alias of [`echoes`].
pub fn sounds_like(word: impl Into<Value>) -> Predicate {
    let inner = echoes(word);
    Predicate::new("$soundsLike", move |value| inner.test(value))
}

/// Matches values of the named type.
///
/// Accepts the value's own type name (`"date"`, `"array"`, ...) as well as
/// `"object"` for any non-null structured value.
pub fn type_of(name: &str) -> Predicate {
    let name = name.to_string();
    when("$type", move |value| {
        value.type_name() == name
            || (name == "object"
                && matches!(
                    value,
                    Value::Array(_) | Value::Object(_) | Value::Date(_) | Value::RegExp(_) | Value::Bytes(_)
                ))
    })
}

fn arithmetic(
    name: &str,
    operand: f64,
    expected: f64,
    op: impl Fn(f64, f64) -> f64 + Send + Sync + 'static,
) -> Predicate {
    when(name, move |value| {
        value.as_number().is_some_and(|n| op(n, operand) == expected)
    })
}

/// Matches numbers where `value + operand == expected`.
pub fn add(operand: f64, expected: f64) -> Predicate {
    arithmetic("$add", operand, expected, |a, b| a + b)
}

/// Matches numbers where `value - operand == expected`.
pub fn subtract(operand: f64, expected: f64) -> Predicate {
    arithmetic("$subtract", operand, expected, |a, b| a - b)
}

/// Matches numbers where `value * operand == expected`.
pub fn multiply(operand: f64, expected: f64) -> Predicate {
    arithmetic("$multiply", operand, expected, |a, b| a * b)
}

/// Matches numbers where `value / operand == expected`.
pub fn divide(operand: f64, expected: f64) -> Predicate {
    arithmetic("$divide", operand, expected, |a, b| a / b)
}

/// Matches numbers where `value % operand == expected`.
pub fn modulo(operand: f64, expected: f64) -> Predicate {
    arithmetic("$mod", operand, expected, |a, b| a % b)
}

/// Matches numbers where `value ^ operand == expected`.
pub fn pow(operand: f64, expected: f64) -> Predicate {
    arithmetic("$pow", operand, expected, f64::powf)
}

/// Matches when every test matches. A `Stop` from any test is returned
/// as is; the score is the product of the sub-scores.
pub fn and(tests: Vec<Predicate>) -> Predicate {
    Predicate::new("$and", move |value| {
        let mut score = 1.0;
        for test in &tests {
            match test.test(value) {
                Outcome::Match { score: s, .. } => score *= s,
                other => return other,
            }
        }
        Outcome::scored(value.clone(), score)
    })
}

/// Matches when any test matches, with that test's score.
pub fn or(tests: Vec<Predicate>) -> Predicate {
    Predicate::new("$or", move |value| {
        tests
            .iter()
            .find_map(|test| test.test(value).score())
            .map_or(Outcome::NoMatch, |score| Outcome::scored(value.clone(), score))
    })
}

/// Matches when no test matches.
pub fn not(tests: Vec<Predicate>) -> Predicate {
    when("$not", move |value| !tests.iter().any(|test| test.test(value).is_match()))
}

/// Fuzzy disjunction: the score is the summed sub-scores divided by the
/// number of tests, and the value matches when that exceeds `min_score`.
pub fn ior(min_score: f64, tests: Vec<Predicate>) -> Predicate {
    Predicate::new("$ior", move |value| {
        if tests.is_empty() {
            return Outcome::NoMatch;
        }
        let total: f64 = tests.iter().filter_map(|test| test.test(value).score()).sum();
        let score = total / tests.len() as f64;
        if score > min_score {
            Outcome::scored(value.clone(), score)
        } else {
            Outcome::NoMatch
        }
    })
}

fn soundex_code(c: char) -> Option<&'static str> {
    match c {
        'a' | 'e' | 'i' | 'o' | 'u' => Some(""),
        'b' | 'f' | 'p' | 'v' => Some("1"),
        'c' | 'g' | 'j' | 'k' | 'q' | 's' | 'x' | 'z' => Some("2"),
        'd' | 't' => Some("3"),
        'l' => Some("4"),
        'm' | 'n' => Some("5"),
        'r' => Some("6"),
        _ => None,
    }
}

/// American Soundex code of `word`.
///
/// The first letter is kept, adjacent letters with the same code collapse,
/// vowels separate runs, and the result is padded with zeros to four
/// characters.
#[must_use]
pub fn soundex(word: &str) -> String {
    let lower: Vec<char> = word.to_lowercase().chars().collect();
    let Some((&first, rest)) = lower.split_first() else {
        return String::new();
    };
    let codes: Vec<Option<&str>> = rest.iter().map(|&c| soundex_code(c)).collect();
    let mut out = first.to_string();
    for (i, code) in codes.iter().enumerate() {
        let previous = if i == 0 { soundex_code(first) } else { codes[i - 1] };
        if *code != previous {
            out.push_str(code.unwrap_or(""));
        }
    }
    out.push_str("000");
    out.chars().take(4).collect::<String>().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(n: i32) -> Value {
        Value::from(n)
    }

    #[test]
    fn comparisons() {
        assert!(lt(2).test(&v(1)).is_match());
        assert_eq!(lt(2).test(&v(2)), Outcome::Stop);
        assert!(lte(2).test(&v(2)).is_match());
        assert_eq!(lte(2).test(&v(3)), Outcome::Stop);
        assert_eq!(lt(2).test(&Value::from("a")), Outcome::NoMatch);
        assert!(gt(2).test(&v(3)).is_match());
        assert!(!gt(2).test(&v(2)).is_match());
        assert!(gte(2).test(&v(2)).is_match());
    }

    #[test]
    fn equality() {
        assert!(eq(2).test(&Value::from("2")).is_match());
        assert!(!eeq(2).test(&Value::from("2")).is_match());
        assert!(eeq(2).test(&v(2)).is_match());
        assert!(neq(2).test(&v(1)).is_match());
        assert!(!eq(f64::NAN).test(&Value::Number(f64::NAN)).is_match());
        assert!(eq(Value::Null).test(&Value::Undefined).is_match());
    }

    #[test]
    fn ranges() {
        assert!(between(2, 3).test(&v(2)).is_match());
        assert!(between(2, 3).test(&v(3)).is_match());
        assert_eq!(between(2, 3).test(&v(1)), Outcome::NoMatch);
        assert_eq!(between(2, 3).test(&v(4)), Outcome::Stop);
        assert!(outside(2, 3).test(&v(1)).is_match());
        assert!(!outside(2, 3).test(&v(2)).is_match());
    }

    #[test]
    fn big_integers_compare_with_numbers() {
        let big = Value::BigInt(BigInt::from(5));
        assert!(lt(6).test(&big).is_match());
        assert!(eq(5).test(&big).is_match());
    }

    #[test]
    fn sets() {
        let two_three = vec![v(2), v(3)];
        assert!(in_(two_three.clone()).test(&v(2)).is_match());
        assert!(nin(two_three.clone()).test(&v(1)).is_match());
        assert!(includes(Value::from(two_three.clone())).test(&v(3)).is_match());
        assert!(!includes(Value::from(two_three.clone())).test(&v(1)).is_match());
        assert!(excludes(Value::from(two_three.clone())).test(&v(1)).is_match());
        assert!(intersects(two_three.clone()).test(&Value::from(vec![v(2)])).is_match());
        assert!(disjoint(two_three.clone()).test(&Value::from(vec![v(1)])).is_match());
        assert!(subset(two_three.clone()).test(&Value::from(vec![v(2)])).is_match());
        assert!(superset(vec![v(2)]).test(&Value::from(two_three.clone())).is_match());
        assert!(symmetric(two_three.clone()).test(&Value::from(vec![v(3), v(2)])).is_match());
        assert!(!symmetric(two_three).test(&Value::from(vec![v(2)])).is_match());
    }

    #[test]
    fn strings() {
        assert!(starts_with(2).test(&Value::from("2")).is_match());
        assert!(!starts_with("2").test(&Value::from("1")).is_match());
        assert!(ends_with("ing").test(&Value::from("Reinventing")).is_match());
        assert!(length(3).test(&Value::from("123")).is_match());
        assert!(length(3).test(&Value::from(vec![v(1), v(2), v(3)])).is_match());
        let re = RegexLiteral::new("2", "").unwrap();
        assert!(matches(re.clone()).test(&v(2)).is_match());
        assert!(!similar(re).test(&v(1)).is_match());
    }

    #[test]
    fn soundex_codes() {
        assert_eq!(soundex("Robert"), "R163");
        assert_eq!(soundex("Rupert"), "R163");
        assert_eq!(soundex("Tymczak"), "T522");
        assert_eq!(soundex("Pfister"), "P236");
        assert_eq!(soundex("Lalox"), soundex("Laloux"));
        assert_eq!(soundex("lyme"), soundex("lime"));
        assert_ne!(soundex("lemon"), soundex("apple"));
        assert!(echoes("Lalox").test(&Value::from("Laloux")).is_match());
        assert!(sounds_like("Smith").test(&Value::from("Smyth")).is_match());
    }

    #[test]
    fn types_and_arithmetic() {
        assert!(type_of("string").test(&Value::from("hello")).is_match());
        assert!(!type_of("number").test(&Value::from("hello")).is_match());
        assert!(type_of("object").test(&Value::Date(0)).is_match());
        assert!(add(1.0, 3.0).test(&v(2)).is_match());
        assert!(subtract(1.0, 1.0).test(&v(2)).is_match());
        assert!(multiply(2.0, 4.0).test(&v(2)).is_match());
        assert!(divide(2.0, 1.0).test(&v(2)).is_match());
        assert!(modulo(2.0, 1.0).test(&v(3)).is_match());
        assert!(pow(2.0, 9.0).test(&v(3)).is_match());
    }

    #[test]
    fn combinators() {
        let teen = and(vec![gte(13), lt(20)]);
        assert!(teen.test(&v(15)).is_match());
        assert_eq!(teen.test(&v(25)), Outcome::Stop);
        assert_eq!(teen.test(&v(10)), Outcome::NoMatch);

        let edge = or(vec![lt(2), gt(8)]);
        assert!(edge.test(&v(9)).is_match());
        assert_eq!(edge.test(&v(5)), Outcome::NoMatch);

        assert!(not(vec![eq(1)]).test(&v(2)).is_match());
        assert!(!not(vec![eq(1)]).test(&v(1)).is_match());
        assert!(not(vec![lt(1)]).test(&v(3)).is_match());

        let fuzzy = ior(0.5, vec![gt(1), gt(2), gt(3)]);
        let hit = fuzzy.test(&v(3));
        assert!(hit.is_match());
        assert!((hit.score().unwrap() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(fuzzy.test(&v(2)), Outcome::NoMatch);
    }
}
