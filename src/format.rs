//! Display-format specifiers for record values.
//!
//! Specifiers follow the common format-spec mini language:
//!
//! ```text
//! [[fill]align][sign][z][#][0][width][grouping][.precision][type]
//! ```
//!
//! `align` is one of `<`, `>`, `^`, `=`; `sign` one of `+`, `-`, space;
//! `grouping` is `,` or `_`; `type` is one of `s d n b o x X c e E f F g G %`.
//! Date values are formatted with a strftime pattern instead
//! (e.g. `%d/%m/%Y`).

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDateTime;

use crate::error::{Error, Result};
use crate::model::{float_repr, Value};

/// Text alignment inside the field width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    /// `<`
    Left,
    /// `>`
    Right,
    /// `^`
    Center,
    /// `=`: padding goes between the sign and the digits
    AfterSign,
}

impl Align {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '<' => Some(Align::Left),
            '>' => Some(Align::Right),
            '^' => Some(Align::Center),
            '=' => Some(Align::AfterSign),
            _ => None,
        }
    }
}

/// Sign display for numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sign {
    /// Only negative numbers get a sign
    #[default]
    Minus,
    /// Always show the sign
    Plus,
    /// Leading space for non-negative numbers
    Space,
}

/// A parsed format specifier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormatSpecifier {
    pub fill: Option<char>,
    pub align: Option<Align>,
    pub sign: Sign,
    /// `z`: turn negative zero into positive zero
    pub coerce_zero: bool,
    /// `#`: alternate form
    pub alternate: bool,
    /// `0`: zero padding
    pub zero_pad: bool,
    pub width: Option<usize>,
    pub grouping: Option<char>,
    pub precision: Option<usize>,
    pub kind: Option<char>,
}

const KINDS: &str = "sdnboxXceEfFgG%";

impl FormatSpecifier {
    /// Parse a specifier such as `.2f`, `>10`, or `+,d`.
    pub fn parse(spec: &str) -> Result<Self> {
        Self::parse_inner(spec).map_err(|reason| Error::InvalidFormatSpec {
            spec: spec.to_string(),
            reason,
        })
    }

    fn parse_inner(spec: &str) -> std::result::Result<Self, String> {
        let chars: Vec<char> = spec.chars().collect();
        let mut out = Self::default();
        let mut i = 0;

        if chars.len() >= 2 && Align::from_char(chars[1]).is_some() {
            out.fill = Some(chars[0]);
            out.align = Align::from_char(chars[1]);
            i = 2;
        } else if let Some(align) = chars.first().and_then(|c| Align::from_char(*c)) {
            out.align = Some(align);
            i = 1;
        }

        match chars.get(i) {
            Some('+') => {
                out.sign = Sign::Plus;
                i += 1;
            }
            Some('-') => {
                out.sign = Sign::Minus;
                i += 1;
            }
            Some(' ') => {
                out.sign = Sign::Space;
                i += 1;
            }
            _ => {}
        }

        if chars.get(i) == Some(&'z') {
            out.coerce_zero = true;
            i += 1;
        }
        if chars.get(i) == Some(&'#') {
            out.alternate = true;
            i += 1;
        }
        if chars.get(i) == Some(&'0') {
            out.zero_pad = true;
            i += 1;
        }

        let (width, next) = read_number(&chars, i)?;
        out.width = width;
        i = next;

        if let Some(&c) = chars.get(i) {
            if c == ',' || c == '_' {
                out.grouping = Some(c);
                i += 1;
            }
        }

        if chars.get(i) == Some(&'.') {
            let (precision, next) = read_number(&chars, i + 1)?;
            if precision.is_none() {
                return Err("Format specifier missing precision".to_string());
            }
            out.precision = precision;
            i = next;
        }

        if let Some(&c) = chars.get(i) {
            if !KINDS.contains(c) {
                return Err(format!("Unknown format code '{}'", c));
            }
            out.kind = Some(c);
            i += 1;
        }

        if i < chars.len() {
            return Err("Invalid format specifier".to_string());
        }

        Ok(out)
    }

    /// Format a value. Dates are not handled here, see [`format_field`].
    pub fn apply(&self, value: &Value) -> std::result::Result<String, String> {
        match value {
            Value::Text(s) => self.format_text(s),
            Value::Integer(i) => self.format_integer(*i),
            Value::Bool(b) => self.format_integer(i64::from(*b)),
            Value::Float(f) => self.format_float(*f),
            Value::Date(dt) => Ok(dt.to_string()),
            Value::Empty => Ok(String::new()),
        }
    }

    fn format_text(&self, text: &str) -> std::result::Result<String, String> {
        if let Some(kind) = self.kind.filter(|k| *k != 's') {
            return Err(format!(
                "Unknown format code '{}' for object of type 'str'",
                kind
            ));
        }
        if self.sign != Sign::Minus {
            return Err("Sign not allowed in string format specifier".to_string());
        }
        if self.alternate {
            return Err("Alternate form (#) not allowed in string format specifier".to_string());
        }
        if let Some(sep) = self.grouping {
            return Err(format!("Cannot specify '{}' with 's'.", sep));
        }
        if self.align == Some(Align::AfterSign) {
            return Err("'=' alignment not allowed in string format specifier".to_string());
        }

        let body: String = match self.precision {
            Some(p) => text.chars().take(p).collect(),
            None => text.to_string(),
        };
        Ok(self.pad("", &body, Align::Left))
    }

    fn format_integer(&self, value: i64) -> std::result::Result<String, String> {
        let kind = self.kind.unwrap_or('d');
        if matches!(kind, 'e' | 'E' | 'f' | 'F' | 'g' | 'G' | '%') {
            return self.format_float(value as f64);
        }
        if kind == 's' {
            return Err("Unknown format code 's' for object of type 'int'".to_string());
        }
        if self.precision.is_some() {
            return Err("Precision not allowed in integer format specifier".to_string());
        }

        let magnitude = value.unsigned_abs();
        let (prefix, digits) = match kind {
            'b' => ("0b", format!("{:b}", magnitude)),
            'o' => ("0o", format!("{:o}", magnitude)),
            'x' => ("0x", format!("{:x}", magnitude)),
            'X' => ("0X", format!("{:X}", magnitude)),
            'c' => {
                let c = u32::try_from(value)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| "%c arg not in range(0x110000)".to_string())?;
                return Ok(self.pad("", &c.to_string(), Align::Left));
            }
            _ => ("", magnitude.to_string()),
        };

        let digits = match self.grouping {
            Some(sep) if prefix.is_empty() => group_digits(&digits, sep, 3),
            Some(sep) => group_digits(&digits, sep, 4),
            None => digits,
        };
        let prefix = if self.alternate { prefix } else { "" };
        let body = format!("{}{}", prefix, digits);
        Ok(self.pad(self.sign_str(value < 0), &body, Align::Right))
    }

    fn format_float(&self, value: f64) -> std::result::Result<String, String> {
        if let Some(kind) = self.kind {
            if matches!(kind, 'd' | 'b' | 'o' | 'x' | 'X' | 'c' | 's') {
                return Err(format!(
                    "Unknown format code '{}' for object of type 'float'",
                    kind
                ));
            }
        }

        let upper = matches!(self.kind, Some('E' | 'F' | 'G'));
        let mut negative = value.is_sign_negative() && !value.is_nan();
        let abs = value.abs();

        let body = if abs.is_nan() || abs.is_infinite() {
            let word = if abs.is_nan() { "nan" } else { "inf" };
            let word = if self.kind == Some('%') {
                format!("{}%", word)
            } else {
                word.to_string()
            };
            if upper {
                word.to_uppercase()
            } else {
                word
            }
        } else {
            let body = match self.kind {
                Some('f' | 'F') => format!("{:.*}", self.precision.unwrap_or(6), abs),
                Some('e' | 'E') => scientific(abs, self.precision.unwrap_or(6)),
                Some('g' | 'G' | 'n') => general(abs, self.precision.unwrap_or(6), self.alternate),
                Some('%') => format!("{:.*}%", self.precision.unwrap_or(6), abs * 100.0),
                _ => match self.precision {
                    Some(p) => {
                        let text = general(abs, p, self.alternate);
                        if text.contains(['.', 'e']) {
                            text
                        } else {
                            format!("{}.0", text)
                        }
                    }
                    None => float_repr(abs),
                },
            };

            if self.coerce_zero && body.chars().all(|c| matches!(c, '0' | '.' | '%')) {
                negative = false;
            }

            let body = match self.grouping {
                Some(sep) => group_float(&body, sep),
                None => body,
            };
            if upper {
                body.to_uppercase()
            } else {
                body
            }
        };

        Ok(self.pad(self.sign_str(negative), &body, Align::Right))
    }

    fn sign_str(&self, negative: bool) -> &'static str {
        match (negative, self.sign) {
            (true, _) => "-",
            (false, Sign::Plus) => "+",
            (false, Sign::Space) => " ",
            (false, Sign::Minus) => "",
        }
    }

    fn pad(&self, sign: &str, body: &str, default_align: Align) -> String {
        let len = sign.chars().count() + body.chars().count();
        let width = self.width.unwrap_or(0);
        if len >= width {
            return format!("{}{}", sign, body);
        }

        let (fill, align) = match (self.zero_pad, self.align) {
            (true, None) => (self.fill.unwrap_or('0'), Align::AfterSign),
            (true, Some(align)) => (self.fill.unwrap_or('0'), align),
            (false, align) => (self.fill.unwrap_or(' '), align.unwrap_or(default_align)),
        };
        let padding = width - len;
        let repeat = |n: usize| fill.to_string().repeat(n);

        match align {
            Align::Left => format!("{}{}{}", sign, body, repeat(padding)),
            Align::Right => format!("{}{}{}", repeat(padding), sign, body),
            Align::Center => {
                let left = padding / 2;
                format!("{}{}{}{}", repeat(left), sign, body, repeat(padding - left))
            }
            Align::AfterSign => format!("{}{}{}", sign, repeat(padding), body),
        }
    }
}

fn read_number(chars: &[char], start: usize) -> std::result::Result<(Option<usize>, usize), String> {
    let mut end = start;
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    if end == start {
        return Ok((None, start));
    }
    let digits: String = chars[start..end].iter().collect();
    let value = digits
        .parse::<usize>()
        .map_err(|_| "Too many decimal digits in format string".to_string())?;
    Ok((Some(value), end))
}

/// Exponent notation with a sign and at least two exponent digits (`1.50e+03`).
fn scientific(value: f64, precision: usize) -> String {
    let raw = format!("{:.*e}", precision, value);
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => raw,
    }
}

/// General format: fixed or exponent notation depending on magnitude.
fn general(value: f64, precision: usize, alternate: bool) -> String {
    let precision = precision.max(1);
    let exp = if value == 0.0 {
        0
    } else {
        let raw = format!("{:.*e}", precision - 1, value);
        raw.split_once('e')
            .and_then(|(_, e)| e.parse::<i32>().ok())
            .unwrap_or(0)
    };

    let text = if exp >= -4 && exp < precision as i32 {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        format!("{:.*}", decimals, value)
    } else {
        scientific(value, precision - 1)
    };

    if alternate {
        return text;
    }
    match text.split_once('e') {
        Some((mantissa, exp)) => format!("{}e{}", strip_fraction_zeros(mantissa), exp),
        None => strip_fraction_zeros(&text).to_string(),
    }
}

fn strip_fraction_zeros(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Insert `sep` every `size` digits, counting from the right.
fn group_digits(digits: &str, sep: char, size: usize) -> String {
    let count = digits.chars().count();
    let mut out = String::with_capacity(digits.len() + count / size);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (count - i) % size == 0 {
            out.push(sep);
        }
        out.push(c);
    }
    out
}

fn group_float(body: &str, sep: char) -> String {
    let split = body
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(body.len());
    let (int_part, rest) = body.split_at(split);
    format!("{}{}", group_digits(int_part, sep, 3), rest)
}

fn format_date(value: &NaiveDateTime, pattern: &str) -> std::result::Result<String, String> {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err("invalid strftime pattern".to_string());
    }
    Ok(value.format(pattern).to_string())
}

/// Format one record field with its specifier.
///
/// An empty specifier yields the plain string form of the value.
pub fn format_field(field: &str, value: &Value, spec: &str) -> Result<String> {
    if spec.is_empty() {
        return Ok(value.to_string());
    }

    let result = match value {
        Value::Date(dt) => format_date(dt, spec),
        _ => FormatSpecifier::parse_inner(spec).and_then(|s| s.apply(value)),
    };

    result.map_err(|reason| Error::Formatting {
        field: field.to_string(),
        spec: spec.to_string(),
        reason,
    })
}
