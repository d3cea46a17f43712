//! Backslash escape decoding for rule values.
//!
//! Rule values are written in C-like notation: `\n`, `\x89`, `\177` and so
//! on. Decoding produces raw bytes; characters above U+00FF cannot be
//! represented in the single-byte value encoding and become `?`.

/// Decode every escape sequence in `s` into the raw bytes it denotes.
///
/// - `\a \b \f \n \r \t \v` map to their control characters.
/// - `\\ \' \" \? \# \< \<space>` map to the literal character.
/// - `\xN` / `\xNN` take one or two hex digits. A `\x` with no hex digit
///   after it decodes to a literal `x`.
/// - `\N`, `\NN`, `\NNN` take one to three octal digits.
/// - Any other escaped character decodes to itself.
/// - A lone backslash at the end of the input is kept as a backslash.
pub fn unescape(s: &str) -> Vec<u8> {
    let chars: Vec<char> = s.chars().collect();
    let mut out = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        if c != '\\' {
            out.push(latin1(c as u32));
            continue;
        }

        let Some(&next) = chars.get(i) else {
            out.push(b'\\');
            break;
        };
        i += 1;

        match next {
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0C),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'v' => out.push(0x0B),
            'x' => {
                let digits = take_digits(&chars, i, 2, 16);
                if digits.is_empty() {
                    out.push(b'x');
                } else {
                    i += digits.len();
                    out.push(latin1(radix_value(&digits, 16)));
                }
            }
            '0'..='7' => {
                let mut digits = vec![next];
                digits.extend(take_digits(&chars, i, 2, 8));
                i += digits.len() - 1;
                out.push(latin1(radix_value(&digits, 8)));
            }
            other => out.push(latin1(other as u32)),
        }
    }

    out
}

/// Map a code point onto the single-byte encoding.
fn latin1(code: u32) -> u8 {
    u8::try_from(code).unwrap_or(b'?')
}

fn take_digits(chars: &[char], start: usize, max: usize, radix: u32) -> Vec<char> {
    chars[start.min(chars.len())..]
        .iter()
        .take(max)
        .take_while(|c| c.is_digit(radix))
        .copied()
        .collect()
}

fn radix_value(digits: &[char], radix: u32) -> u32 {
    digits
        .iter()
        .filter_map(|c| c.to_digit(radix))
        .fold(0, |acc, d| acc * radix + d)
}
