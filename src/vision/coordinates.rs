//! Relative-to-absolute coordinate resolution.
//!
//! Vision models answer "where is X" with percentages such as `[50%, 30%]`.
//! These helpers turn that text into device pixels.

use serde_json::Value;
use thiserror::Error;

use crate::device::Resolution;

/// Coordinate parsing errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinateError {
    #[error("Expected exactly two numbers, found {found} in {input:?}")]
    WrongArity { input: String, found: usize },
    #[error("Not a number: {0:?}")]
    NotANumber(String),
}

/// A point expressed as percentages of the screen, nominally in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeCoordinate {
    pub x_percent: f64,
    pub y_percent: f64,
}

/// A point in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsoluteCoordinate {
    pub x: i32,
    pub y: i32,
}

impl RelativeCoordinate {
    pub fn new(x_percent: f64, y_percent: f64) -> Self {
        Self {
            x_percent,
            y_percent,
        }
    }
}

/// Parse a reply like `[50, 30]`, `(12.5%, 80%)` or `50,30`.
///
/// Brackets, parentheses and percent signs are ignored. Anything that does
/// not leave exactly two comma-separated finite numbers is rejected.
pub fn parse_relative(text: &str) -> Result<RelativeCoordinate, CoordinateError> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '(' | ')' | '%'))
        .collect();

    let parts: Vec<&str> = cleaned.split(',').map(str::trim).collect();
    if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
        let found = parts.iter().filter(|p| !p.is_empty()).count();
        return Err(CoordinateError::WrongArity {
            input: text.to_string(),
            found,
        });
    }

    let x = parse_number(parts[0])?;
    let y = parse_number(parts[1])?;
    Ok(RelativeCoordinate::new(x, y))
}

/// Parse a relative coordinate given as JSON: a string or a two-number array.
pub fn parse_relative_value(value: &Value) -> Result<RelativeCoordinate, CoordinateError> {
    match value {
        Value::String(s) => parse_relative(s),
        Value::Array(items) => {
            if items.len() != 2 {
                return Err(CoordinateError::WrongArity {
                    input: value.to_string(),
                    found: items.len(),
                });
            }
            let x = value_number(&items[0])?;
            let y = value_number(&items[1])?;
            Ok(RelativeCoordinate::new(x, y))
        }
        other => Err(CoordinateError::NotANumber(other.to_string())),
    }
}

/// Scale a relative coordinate to pixels: `round(percent / 100 * dimension)`.
///
/// Values outside `[0, 100]` are not clamped; the result may lie off screen.
pub fn resolve(relative: RelativeCoordinate, resolution: Resolution) -> AbsoluteCoordinate {
    AbsoluteCoordinate {
        x: scale(relative.x_percent, resolution.width),
        y: scale(relative.y_percent, resolution.height),
    }
}

fn scale(percent: f64, dimension: u32) -> i32 {
    (percent / 100.0 * dimension as f64).round() as i32
}

fn parse_number(s: &str) -> Result<f64, CoordinateError> {
    match s.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(CoordinateError::NotANumber(s.to_string())),
    }
}

fn value_number(value: &Value) -> Result<f64, CoordinateError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| CoordinateError::NotANumber(n.to_string())),
        Value::String(s) => parse_number(s.trim().trim_end_matches('%').trim()),
        other => Err(CoordinateError::NotANumber(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PHONE: Resolution = Resolution {
        width: 1080,
        height: 2400,
    };

    #[test]
    fn test_parse_plain_list() {
        assert_eq!(
            parse_relative("[50, 30]").unwrap(),
            RelativeCoordinate::new(50.0, 30.0)
        );
    }

    #[test]
    fn test_parse_percent_annotations() {
        assert_eq!(
            parse_relative(" [12.5%, 80%] ").unwrap(),
            RelativeCoordinate::new(12.5, 80.0)
        );
        assert_eq!(
            parse_relative("(25%,75%)").unwrap(),
            RelativeCoordinate::new(25.0, 75.0)
        );
        assert_eq!(
            parse_relative("50,50").unwrap(),
            RelativeCoordinate::new(50.0, 50.0)
        );
    }

    #[test]
    fn test_parse_rejects_wrong_arity() {
        assert!(matches!(
            parse_relative("[50]"),
            Err(CoordinateError::WrongArity { found: 1, .. })
        ));
        assert!(matches!(
            parse_relative("[1, 2, 3]"),
            Err(CoordinateError::WrongArity { found: 3, .. })
        ));
        assert!(matches!(
            parse_relative(""),
            Err(CoordinateError::WrongArity { found: 0, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert_eq!(
            parse_relative("[left, 30]"),
            Err(CoordinateError::NotANumber("left".to_string()))
        );
        assert!(parse_relative("The button is at [50, 50]").is_err());
        assert!(parse_relative("[NaN, 10]").is_err());
        assert!(parse_relative("[inf, 10]").is_err());
    }

    #[test]
    fn test_parse_json_values() {
        assert_eq!(
            parse_relative_value(&json!([50, 25.5])).unwrap(),
            RelativeCoordinate::new(50.0, 25.5)
        );
        assert_eq!(
            parse_relative_value(&json!("[10%, 90%]")).unwrap(),
            RelativeCoordinate::new(10.0, 90.0)
        );
        assert_eq!(
            parse_relative_value(&json!(["10%", "20"])).unwrap(),
            RelativeCoordinate::new(10.0, 20.0)
        );
        assert!(parse_relative_value(&json!([1])).is_err());
        assert!(parse_relative_value(&json!({"x": 1, "y": 2})).is_err());
        assert!(parse_relative_value(&json!([true, 2])).is_err());
    }

    #[test]
    fn test_resolve_center() {
        let abs = resolve(RelativeCoordinate::new(50.0, 50.0), PHONE);
        assert_eq!(abs, AbsoluteCoordinate { x: 540, y: 1200 });
    }

    #[test]
    fn test_resolve_corners() {
        assert_eq!(
            resolve(RelativeCoordinate::new(0.0, 0.0), PHONE),
            AbsoluteCoordinate { x: 0, y: 0 }
        );
        assert_eq!(
            resolve(RelativeCoordinate::new(100.0, 100.0), PHONE),
            AbsoluteCoordinate { x: 1080, y: 2400 }
        );
    }

    #[test]
    fn test_resolve_rounds_to_nearest_pixel() {
        // 33.3% of 1080 = 359.64, 66.7% of 2400 = 1600.8
        let abs = resolve(RelativeCoordinate::new(33.3, 66.7), PHONE);
        assert_eq!(abs, AbsoluteCoordinate { x: 360, y: 1601 });
    }

    #[test]
    fn test_resolve_out_of_range_passes_through() {
        // Intentional: the resolver trusts the policy's numeric range and does
        // not clamp, so off-screen answers stay visible to the caller.
        assert_eq!(
            resolve(RelativeCoordinate::new(150.0, -10.0), PHONE),
            AbsoluteCoordinate { x: 1620, y: -240 }
        );
    }
}
