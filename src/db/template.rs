//! Description templates.
//!
//! A rule description is a printf-style template. Extra-info rules substitute
//! the value they read into it; string rules with the `x` or `>` operator also
//! derive how many bytes to capture from the conversion found inside the
//! bracketed property section (`[title=%s]` or `[title=%.32s]`).

use crate::core::Value;

/// Capture length used when a template does not bound the string.
pub const DEFAULT_CAPTURE_LEN: usize = 255;

/// Number of bytes a string capture may read, derived from the first
/// bracketed section of `description`.
///
/// `%s` allows up to [`DEFAULT_CAPTURE_LEN`] bytes, `%.Ns` exactly `N`.
/// A description without a bracketed section, or whose section carries no
/// string conversion, falls back to the default.
pub fn capture_len(description: &str) -> Result<usize, String> {
    let (Some(start), Some(end)) = (description.find('['), description.find(']')) else {
        return Ok(DEFAULT_CAPTURE_LEN);
    };
    if start >= end {
        return Ok(DEFAULT_CAPTURE_LEN);
    }

    let section = &description[start..=end];
    if section.contains("%s") {
        return Ok(DEFAULT_CAPTURE_LEN);
    }
    let Some(idx) = section.find("%.") else {
        return Ok(DEFAULT_CAPTURE_LEN);
    };

    let rest = &section[idx + 2..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if !rest[digits.len()..].starts_with('s') || digits.is_empty() {
        return Err(format!("invalid string specifier in {description:?}"));
    }
    digits
        .parse()
        .map_err(|_| format!("string width out of range in {description:?}"))
}

/// Substitute `value` into every conversion of `template`.
pub fn format(template: &str, value: &Value) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let mut raw = String::from("%");
        let mut spec = Spec::default();

        while let Some(&f) = chars.peek() {
            match f {
                '-' => spec.left = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '#' => spec.alt = true,
                '0' => spec.zero = true,
                _ => break,
            }
            raw.push(f);
            chars.next();
        }
        spec.width = take_number(&mut chars, &mut raw);
        if chars.peek() == Some(&'.') {
            raw.push('.');
            chars.next();
            spec.precision = Some(take_number(&mut chars, &mut raw).unwrap_or(0));
        }
        while let Some(&m) = chars.peek() {
            if !matches!(m, 'h' | 'l' | 'L' | 'q' | 'j' | 'z' | 't') {
                break;
            }
            raw.push(m);
            chars.next();
        }

        match chars.next() {
            Some(conv) => match convert(conv, &spec, value) {
                Some(text) => out.push_str(&text),
                None => {
                    out.push_str(&raw);
                    out.push(conv);
                }
            },
            None => out.push_str(&raw),
        }
    }

    out
}

#[derive(Debug, Default)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    alt: bool,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

fn take_number(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    raw: &mut String,
) -> Option<usize> {
    let mut digits = String::new();
    while let Some(&d) = chars.peek() {
        if !d.is_ascii_digit() {
            break;
        }
        digits.push(d);
        chars.next();
    }
    raw.push_str(&digits);
    digits.parse().ok()
}

fn convert(conv: char, spec: &Spec, value: &Value) -> Option<String> {
    let text = match conv {
        's' => {
            let mut s = value.to_display_string();
            if let Some(p) = spec.precision {
                s = s.chars().take(p).collect();
            }
            return Some(pad(String::new(), s, spec, false));
        }
        'c' => {
            let c = match value {
                Value::Numeric(n) => char::from(*n as u8),
                Value::Bytes(b) => b.first().map(|&b| char::from(b)).unwrap_or_default(),
            };
            return Some(pad(String::new(), c.to_string(), spec, false));
        }
        'd' | 'i' | 'u' | 'x' | 'X' | 'o' => {
            let Value::Numeric(n) = value else {
                return Some(pad(String::new(), value.to_display_string(), spec, false));
            };
            integer(conv, *n, spec)
        }
        'f' | 'F' => {
            let n = match value {
                Value::Numeric(n) => *n as f64,
                Value::Bytes(_) => return Some(value.to_display_string()),
            };
            let body = format!("{:.*}", spec.precision.unwrap_or(6), n.abs());
            (sign(n < 0.0, spec), body)
        }
        _ => return None,
    };
    let (prefix, body) = text;
    Some(pad(prefix, body, spec, true))
}

fn integer(conv: char, n: i64, spec: &Spec) -> (String, String) {
    let (prefix, mut digits) = match conv {
        'd' | 'i' => (sign(n < 0, spec), n.unsigned_abs().to_string()),
        'u' => (String::new(), (n as u64).to_string()),
        'x' => (alt_prefix(spec, n, "0x"), format!("{:x}", n as u64)),
        'X' => (alt_prefix(spec, n, "0X"), format!("{:X}", n as u64)),
        _ => (alt_prefix(spec, n, "0"), format!("{:o}", n as u64)),
    };
    if let Some(p) = spec.precision {
        if digits.len() < p {
            digits.insert_str(0, &"0".repeat(p - digits.len()));
        }
    }
    (prefix, digits)
}

fn sign(negative: bool, spec: &Spec) -> String {
    if negative {
        "-".to_string()
    } else if spec.plus {
        "+".to_string()
    } else if spec.space {
        " ".to_string()
    } else {
        String::new()
    }
}

fn alt_prefix(spec: &Spec, n: i64, prefix: &str) -> String {
    if spec.alt && n != 0 {
        prefix.to_string()
    } else {
        String::new()
    }
}

fn pad(prefix: String, body: String, spec: &Spec, numeric: bool) -> String {
    let len = prefix.chars().count() + body.chars().count();
    let width = spec.width.unwrap_or(0);
    if len >= width {
        return prefix + &body;
    }
    let fill = width - len;
    if spec.left {
        format!("{prefix}{body}{}", " ".repeat(fill))
    } else if spec.zero && numeric && spec.precision.is_none() {
        format!("{prefix}{}{body}", "0".repeat(fill))
    } else {
        format!("{}{prefix}{body}", " ".repeat(fill))
    }
}
