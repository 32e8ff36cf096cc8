//! String-to-scalar coercion for property values.
//!
//! Every property is stored as a string; [`FromProperty`] turns it back
//! into one of the supported scalar kinds. Integer conversions are
//! range-checked against the target width, so `"300"` into a `u8` is an
//! error rather than a wrapped value.

use std::any::type_name;

/// A scalar type a property string can be coerced into.
///
/// Implemented for every integer width, `f32`, `f64`, `bool` and
/// `String`. The error is a human-readable reason; callers attach the
/// key and target type.
///
/// # Examples
/// ```
/// use tarkib_container::property::FromProperty;
///
/// assert_eq!(u16::from_property("0x1F").unwrap(), 31);
/// assert_eq!(i32::from_property("-10.00").unwrap(), -10);
/// assert!(u8::from_property("256").is_err());
/// assert!(bool::from_property("T").unwrap());
/// ```
pub trait FromProperty: Sized + Send + Sync + 'static {
    fn from_property(raw: &str) -> Result<Self, String>;

    /// Type name shown in conversion errors.
    fn target_name() -> &'static str {
        type_name::<Self>()
    }
}

/// Drops an all-zero fractional part: `"10.00"` → `"10"`, `"10."` stays.
fn trim_zero_decimal(s: &str) -> &str {
    let mut found_zero = false;
    for (i, b) in s.bytes().enumerate().rev() {
        match b {
            b'.' if found_zero => return &s[..i],
            b'0' => found_zero = true,
            _ => return s,
        }
    }
    s
}

/// Parses an integer literal into (is_negative, magnitude).
///
/// Accepts an optional sign, `0x`/`0o`/`0b` prefixes, `_` separators
/// between digits and a zero fractional part.
fn parse_integer(raw: &str) -> Result<(bool, u128), String> {
    let trimmed = raw.trim();
    let (negative, body) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let body = trim_zero_decimal(body);

    let (radix, digits) = if let Some(rest) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        (16, rest)
    } else if let Some(rest) = body.strip_prefix("0o").or_else(|| body.strip_prefix("0O")) {
        (8, rest)
    } else if let Some(rest) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        (2, rest)
    } else {
        (10, body)
    };

    if digits.is_empty() {
        return Err("no digits".to_string());
    }
    if digits.starts_with(['_', '+', '-']) || digits.ends_with('_') || digits.contains("__") {
        return Err("invalid digit placement".to_string());
    }

    let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
    let magnitude = u128::from_str_radix(&cleaned, radix).map_err(|e| e.to_string())?;
    Ok((negative, magnitude))
}

fn parse_float(raw: &str) -> Result<f64, String> {
    let trimmed = raw.trim();
    let value: f64 = trimmed.parse().map_err(|e: std::num::ParseFloatError| e.to_string())?;

    // "1e400" parses to infinity instead of failing
    let spelled_infinite = trimmed
        .trim_start_matches(['+', '-'])
        .to_ascii_lowercase()
        .starts_with("inf");
    if value.is_infinite() && !spelled_infinite {
        return Err("value out of range".to_string());
    }
    Ok(value)
}

macro_rules! unsigned_from_property {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl FromProperty for $ty {
                fn from_property(raw: &str) -> Result<Self, String> {
                    let (negative, magnitude) = parse_integer(raw)?;
                    if negative && magnitude != 0 {
                        return Err("negative value for an unsigned target".to_string());
                    }
                    <$ty>::try_from(magnitude)
                        .map_err(|_| format!("value out of range for {}", stringify!($ty)))
                }
            }
        )+
    };
}

macro_rules! signed_from_property {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl FromProperty for $ty {
                fn from_property(raw: &str) -> Result<Self, String> {
                    let (negative, magnitude) = parse_integer(raw)?;
                    let out_of_range = || format!("value out of range for {}", stringify!($ty));
                    let signed = if negative {
                        0i128.checked_sub_unsigned(magnitude)
                    } else {
                        i128::try_from(magnitude).ok()
                    };
                    let signed = signed.ok_or_else(out_of_range)?;
                    <$ty>::try_from(signed).map_err(|_| out_of_range())
                }
            }
        )+
    };
}

unsigned_from_property!(u8, u16, u32, u64, u128, usize);
signed_from_property!(i8, i16, i32, i64, i128, isize);

impl FromProperty for f64 {
    fn from_property(raw: &str) -> Result<Self, String> {
        parse_float(raw)
    }
}

impl FromProperty for f32 {
    fn from_property(raw: &str) -> Result<Self, String> {
        let value = parse_float(raw)?;
        if value.is_finite() && value.abs() > f64::from(f32::MAX) {
            return Err("value out of range for f32".to_string());
        }
        Ok(value as f32)
    }
}

impl FromProperty for bool {
    fn from_property(raw: &str) -> Result<Self, String> {
        match raw.trim() {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            _ => Err("expected one of 1, t, true, 0, f, false".to_string()),
        }
    }
}

impl FromProperty for String {
    fn from_property(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }
}
