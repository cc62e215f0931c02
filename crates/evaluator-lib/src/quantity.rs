//! Kubernetes resource quantity parsing
//!
//! Quantities such as `250m`, `1.5`, `128Mi` or `2e3` are converted to
//! milli-units, rounding any sub-milli remainder up the way the Kubernetes
//! API machinery does.

use crate::error::{GatherError, GatherResult};

/// Parse a quantity string into milli-units
pub fn parse_milli(quantity: &str) -> GatherResult<i64> {
    let invalid = || GatherError::InvalidQuantity(quantity.to_string());
    let s = quantity.trim();
    if s.is_empty() {
        return Err(invalid());
    }

    let (negative, s) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let number_end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(number_end);
    if number.is_empty() || number == "." {
        return Err(invalid());
    }

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if fraction.contains('.') {
        return Err(invalid());
    }

    // value = digits / 10^fraction_len, kept as an exact rational
    let digits: i128 = format!("{whole}{fraction}").parse().map_err(|_| invalid())?;
    let mut numerator = digits.checked_mul(1000).ok_or_else(invalid)?;
    let mut denominator: i128 = 10i128.checked_pow(fraction.len() as u32).ok_or_else(invalid)?;

    match suffix_scale(suffix).ok_or_else(invalid)? {
        Scale::Multiply(factor) => numerator = numerator.checked_mul(factor).ok_or_else(invalid)?,
        Scale::Divide(factor) => denominator = denominator.checked_mul(factor).ok_or_else(invalid)?,
    }

    let mut milli = numerator / denominator;
    if numerator % denominator != 0 {
        milli += 1;
    }
    let milli = if negative { -milli } else { milli };

    i64::try_from(milli).map_err(|_| invalid())
}

enum Scale {
    Multiply(i128),
    Divide(i128),
}

fn suffix_scale(suffix: &str) -> Option<Scale> {
    let scale = match suffix {
        "" => Scale::Multiply(1),
        "n" => Scale::Divide(1_000_000_000),
        "u" => Scale::Divide(1_000_000),
        "m" => Scale::Divide(1_000),
        "k" => Scale::Multiply(1_000),
        "M" => Scale::Multiply(1_000_000),
        "G" => Scale::Multiply(1_000_000_000),
        "T" => Scale::Multiply(1_000_000_000_000),
        "P" => Scale::Multiply(1_000_000_000_000_000),
        "E" => Scale::Multiply(1_000_000_000_000_000_000),
        "Ki" => Scale::Multiply(1 << 10),
        "Mi" => Scale::Multiply(1 << 20),
        "Gi" => Scale::Multiply(1 << 30),
        "Ti" => Scale::Multiply(1 << 40),
        "Pi" => Scale::Multiply(1 << 50),
        "Ei" => Scale::Multiply(1 << 60),
        exp => {
            let digits = exp.strip_prefix(['e', 'E'])?;
            let (negative, digits) = match digits.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, digits.strip_prefix('+').unwrap_or(digits)),
            };
            let power: u32 = digits.parse().ok()?;
            let factor = 10i128.checked_pow(power)?;
            if negative {
                Scale::Divide(factor)
            } else {
                Scale::Multiply(factor)
            }
        }
    };
    Some(scale)
}
