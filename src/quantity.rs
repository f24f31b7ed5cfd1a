use thiserror::Error;

/// Fraction digits kept when reading a decimal magnitude. Anything finer is
/// far below one nanocore or one byte for every supported multiplier.
const MAX_FRACTION_DIGITS: usize = 18;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum QuantityError {
    #[error("unknown unit in quantity {raw:?}")]
    UnknownUnit { raw: String },
    #[error("quantity {raw:?} has no readable numeric value")]
    InvalidNumber { raw: String },
    #[error("quantity {raw:?} is too large")]
    Overflow { raw: String },
}

/// CPU unit used when a quantity carries no suffix of its own.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CpuUnit {
    Milli,
    Micro,
    Nano,
    Cores,
}

impl CpuUnit {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "m" => Some(Self::Milli),
            "u" => Some(Self::Micro),
            "n" => Some(Self::Nano),
            _ => None,
        }
    }

    fn nanocores(self) -> u128 {
        match self {
            Self::Milli => 1_000_000,
            Self::Micro => 1_000,
            Self::Nano => 1,
            Self::Cores => 1_000_000_000,
        }
    }
}

/// Memory and storage units. Every multiplier is binary, so `M` and `Mi`
/// both mean 1024².
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MemoryUnit {
    Tebi,
    Gibi,
    Mebi,
    Kibi,
    Bytes,
}

impl MemoryUnit {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "T" | "Ti" | "t" | "ti" => Some(Self::Tebi),
            "G" | "Gi" | "g" | "gi" => Some(Self::Gibi),
            "M" | "Mi" | "m" | "mi" => Some(Self::Mebi),
            "K" | "Ki" | "k" | "ki" => Some(Self::Kibi),
            _ => None,
        }
    }

    fn bytes(self) -> u128 {
        match self {
            Self::Tebi => 1 << 40,
            Self::Gibi => 1 << 30,
            Self::Mebi => 1 << 20,
            Self::Kibi => 1 << 10,
            Self::Bytes => 1,
        }
    }
}

/// Parses a CPU quantity into nanocores.
///
/// A recognized suffix (`m`, `u`, `n`) always wins. Without one the
/// `fallback` unit is applied, and a missing fallback is an
/// [`QuantityError::UnknownUnit`]. Empty input and zero magnitudes are 0.
pub fn parse_cpu(raw: &str, fallback: Option<CpuUnit>) -> Result<u64, QuantityError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }

    let (magnitude, suffix) = split_quantity(raw)?;
    if magnitude.is_zero() {
        return Ok(0);
    }

    let unit = CpuUnit::from_suffix(suffix)
        .or(fallback)
        .ok_or_else(|| QuantityError::UnknownUnit {
            raw: raw.to_string(),
        })?;
    magnitude.scaled(unit.nanocores(), raw)
}

/// Parses a memory or storage quantity into bytes.
///
/// Suffix resolution mirrors [`parse_cpu`]: suffix first, then `fallback`,
/// otherwise [`QuantityError::UnknownUnit`].
pub fn parse_memory(raw: &str, fallback: Option<MemoryUnit>) -> Result<u64, QuantityError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }

    let (magnitude, suffix) = split_quantity(raw)?;
    if magnitude.is_zero() {
        return Ok(0);
    }

    let unit = MemoryUnit::from_suffix(suffix)
        .or(fallback)
        .ok_or_else(|| QuantityError::UnknownUnit {
            raw: raw.to_string(),
        })?;
    magnitude.scaled(unit.bytes(), raw)
}

/// Decimal number held as `mantissa / 10^scale`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct Magnitude {
    mantissa: u128,
    scale: u32,
}

impl Magnitude {
    fn is_zero(self) -> bool {
        self.mantissa == 0
    }

    /// Multiplies by `multiplier` and rounds half-up to an integer.
    fn scaled(self, multiplier: u128, raw: &str) -> Result<u64, QuantityError> {
        let overflow = || QuantityError::Overflow {
            raw: raw.to_string(),
        };
        let Some(divisor) = 10u128.checked_pow(self.scale) else {
            // Too small to reach one unit.
            return Ok(0);
        };
        let product = self.mantissa.checked_mul(multiplier).ok_or_else(overflow)?;
        let rounded = product.checked_add(divisor / 2).ok_or_else(overflow)? / divisor;
        u64::try_from(rounded).map_err(|_| overflow())
    }

    /// Folds a decimal exponent into the mantissa or the scale.
    fn with_exponent(self, exponent: i32) -> Option<Self> {
        if self.is_zero() {
            return Some(self);
        }
        if exponent < 0 {
            return Some(Self {
                mantissa: self.mantissa,
                scale: self.scale.checked_add(exponent.unsigned_abs())?,
            });
        }

        let exponent = exponent.unsigned_abs();
        if exponent <= self.scale {
            return Some(Self {
                mantissa: self.mantissa,
                scale: self.scale - exponent,
            });
        }
        let factor = 10u128.checked_pow(exponent - self.scale)?;
        Some(Self {
            mantissa: self.mantissa.checked_mul(factor)?,
            scale: 0,
        })
    }
}

/// Returns the unit suffix of `raw` when it is not one of the memory units,
/// i.e. when [`parse_memory`] would resolve it through the fallback.
pub fn unrecognized_memory_suffix(raw: &str) -> Option<&str> {
    let (_, suffix) = split_quantity(raw.trim()).ok()?;
    (!suffix.is_empty() && MemoryUnit::from_suffix(suffix).is_none()).then_some(suffix)
}

fn split_quantity(raw: &str) -> Result<(Magnitude, &str), QuantityError> {
    let invalid = || QuantityError::InvalidNumber {
        raw: raw.to_string(),
    };
    let overflow = || QuantityError::Overflow {
        raw: raw.to_string(),
    };

    let end = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (number, rest) = raw.split_at(end);

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if fraction.contains('.') || (whole.is_empty() && fraction.is_empty()) {
        return Err(invalid());
    }
    let fraction = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];

    let mut mantissa: u128 = 0;
    for digit in whole.bytes().chain(fraction.bytes()) {
        mantissa = mantissa
            .checked_mul(10)
            .and_then(|value| value.checked_add(u128::from(digit - b'0')))
            .ok_or_else(overflow)?;
    }
    let mut magnitude = Magnitude {
        mantissa,
        scale: fraction.len() as u32,
    };

    let (exponent, suffix) = split_exponent(rest);
    if let Some(exponent) = exponent {
        let exponent = exponent.ok_or_else(overflow)?;
        magnitude = magnitude.with_exponent(exponent).ok_or_else(overflow)?;
    }

    Ok((magnitude, suffix.trim()))
}

/// Splits a decimal exponent (`e3`, `E-2`, `e+6`) off the front of `rest`.
/// A bare `E` stays in the suffix, where it would name the exa unit.
/// The inner `None` marks an exponent too large to represent.
fn split_exponent(rest: &str) -> (Option<Option<i32>>, &str) {
    let Some(after_marker) = rest.strip_prefix(['e', 'E']) else {
        return (None, rest);
    };
    let unsigned = after_marker.trim_start_matches(['+', '-']);
    let sign_len = after_marker.len() - unsigned.len();
    let digits_len = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    if sign_len > 1 || digits_len == 0 {
        return (None, rest);
    }

    let negative = after_marker.starts_with('-');
    let value = unsigned[..digits_len]
        .parse::<i32>()
        .ok()
        .map(|value| if negative { -value } else { value });
    (Some(value), &unsigned[digits_len..])
}
