//! Template rendering for the runtime accessor.
//!
//! Two placeholder syntaxes are understood, in one left-to-right pass:
//! `{{ name }}` and the format-string style `{name}` / `{name:spec}` that
//! the codemod emits. Placeholders naming unknown variables stay verbatim.
//!
//! Any other `{{` or `}}` is an escaped brace and renders as one brace, so
//! templates lifted from f-strings such as `{{"k": {value}}}` print what the
//! f-string printed. `{{name}}` around a bare identifier is always read as a
//! placeholder.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeMap;

/// Variables bound at render time
pub type Vars = BTreeMap<String, Value>;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\{\{\s*(?P<double>[A-Za-z_][A-Za-z0-9_]*)\s*\}\}|\{(?P<single>[A-Za-z_][A-Za-z0-9_]*)(?::(?P<spec>[^{}]*))?\}|(?P<open>\{\{)|(?P<close>\}\})",
    )
    .expect("placeholder pattern is valid")
});

/// Substitute `vars` into `template`.
pub fn render(template: &str, vars: &Vars) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            if let Some(name) = caps.name("double") {
                return match vars.get(name.as_str()) {
                    Some(value) => display_value(value),
                    None => whole.to_string(),
                };
            }
            if caps.name("open").is_some() {
                return "{".to_string();
            }
            if caps.name("close").is_some() {
                return "}".to_string();
            }
            let Some(name) = caps.name("single") else {
                return whole.to_string();
            };
            let Some(value) = vars.get(name.as_str()) else {
                return whole.to_string();
            };
            match caps.name("spec") {
                Some(spec) => match FormatSpec::parse(spec.as_str()) {
                    Some(spec) => spec.apply(value),
                    None => display_value(value),
                },
                None => display_value(value),
            }
        })
        .into_owned()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Subset of the Python format mini-language:
/// `[[fill]align][sign][0][width][,][.precision][type]`
#[derive(Debug, Clone, PartialEq)]
struct FormatSpec {
    fill: char,
    align: Option<char>,
    sign: Option<char>,
    width: usize,
    thousands: bool,
    precision: Option<usize>,
    ty: Option<char>,
}

impl FormatSpec {
    fn parse(spec: &str) -> Option<Self> {
        let chars: Vec<char> = spec.chars().collect();
        let mut i = 0;
        let mut fill = ' ';
        let mut align = None;
        let is_align = |c: char| matches!(c, '<' | '>' | '^' | '=');

        if chars.len() >= 2 && is_align(chars[1]) {
            fill = chars[0];
            align = Some(chars[1]);
            i = 2;
        } else if !chars.is_empty() && is_align(chars[0]) {
            align = Some(chars[0]);
            i = 1;
        }

        let mut sign = None;
        if i < chars.len() && matches!(chars[i], '+' | '-' | ' ') {
            sign = Some(chars[i]);
            i += 1;
        }

        if i < chars.len() && chars[i] == '0' {
            if align.is_none() {
                fill = '0';
                align = Some('=');
            }
            i += 1;
        }

        let width = take_digits(&chars, &mut i).unwrap_or(0);

        let mut thousands = false;
        if i < chars.len() && chars[i] == ',' {
            thousands = true;
            i += 1;
        }

        let mut precision = None;
        if i < chars.len() && chars[i] == '.' {
            i += 1;
            precision = Some(take_digits(&chars, &mut i)?);
        }

        let mut ty = None;
        if i < chars.len() {
            let c = chars[i];
            if !matches!(c, 's' | 'd' | 'f' | 'F' | 'e' | 'E' | '%') {
                return None;
            }
            ty = Some(c);
            i += 1;
        }

        if i != chars.len() {
            return None;
        }

        Some(Self {
            fill,
            align,
            sign,
            width,
            thousands,
            precision,
            ty,
        })
    }

    fn apply(&self, value: &Value) -> String {
        let number = value.as_f64();
        let (body, numeric) = match (self.ty, number) {
            (Some('f' | 'F'), Some(x)) => (format!("{:.*}", self.precision.unwrap_or(6), x), true),
            (Some('e' | 'E'), Some(x)) => {
                let s = format_exponent(x, self.precision.unwrap_or(6));
                let s = if self.ty == Some('E') { s.to_uppercase() } else { s };
                (s, true)
            }
            (Some('%'), Some(x)) => (
                format!("{:.*}%", self.precision.unwrap_or(6), x * 100.0),
                true,
            ),
            (Some('d'), Some(x)) if x.fract() == 0.0 => (format!("{}", x as i64), true),
            (None, Some(x)) if self.precision.is_some() => {
                (format!("{:.*}", self.precision.unwrap_or(6), x), true)
            }
            (None | Some('d'), Some(_)) if !value.is_string() => (display_value(value), true),
            _ => {
                let s = display_value(value);
                match self.precision {
                    Some(p) => (s.chars().take(p).collect(), false),
                    None => (s, false),
                }
            }
        };

        let (negative, digits) = match body.strip_prefix('-') {
            Some(rest) if numeric => (true, rest.to_string()),
            _ => (false, body),
        };
        let digits = if numeric && self.thousands {
            group_thousands(&digits)
        } else {
            digits
        };
        let sign = if !numeric {
            ""
        } else if negative {
            "-"
        } else {
            match self.sign {
                Some('+') => "+",
                Some(' ') => " ",
                _ => "",
            }
        };

        self.pad(sign, &digits, numeric)
    }

    fn pad(&self, sign: &str, body: &str, numeric: bool) -> String {
        let len = sign.chars().count() + body.chars().count();
        if len >= self.width {
            return format!("{}{}", sign, body);
        }
        let padding = self.width - len;
        let fill = |n: usize| std::iter::repeat(self.fill).take(n).collect::<String>();
        let align = self.align.unwrap_or(if numeric { '>' } else { '<' });
        match align {
            '<' => format!("{}{}{}", sign, body, fill(padding)),
            '^' => {
                let left = padding / 2;
                format!("{}{}{}{}", fill(left), sign, body, fill(padding - left))
            }
            '=' => format!("{}{}{}", sign, fill(padding), body),
            _ => format!("{}{}{}", fill(padding), sign, body),
        }
    }
}

fn take_digits(chars: &[char], i: &mut usize) -> Option<usize> {
    let start = *i;
    while *i < chars.len() && chars[*i].is_ascii_digit() {
        *i += 1;
    }
    if *i == start {
        return None;
    }
    chars[start..*i].iter().collect::<String>().parse().ok()
}

/// `1234567.5` -> `1,234,567.5`
fn group_thousands(digits: &str) -> String {
    let (int_part, rest) = match digits.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => digits.split_at(idx),
        None => (digits, ""),
    };
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (idx, c) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped.push_str(rest);
    grouped
}

/// Python-style exponent notation: `1.500000e+02`
fn format_exponent(x: f64, precision: usize) -> String {
    let rust = format!("{:.*e}", precision, x);
    match rust.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => rust,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, Value)]) -> Vars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn renders_double_brace_placeholders() {
        let v = vars(&[("name", json!("world"))]);
        assert_eq!(render("Hello {{ name }}", &v), "Hello world");
        assert_eq!(render("Hello {{name}}!", &v), "Hello world!");
    }

    #[test]
    fn renders_multiple_values() {
        let v = vars(&[("a", json!(1)), ("b", json!(2)), ("c", json!(3))]);
        assert_eq!(render("{{ a }} + {{ b }} = {{ c }}", &v), "1 + 2 = 3");
    }

    #[test]
    fn renders_single_brace_placeholders() {
        let v = vars(&[("user_name", json!("Alice"))]);
        assert_eq!(render("Hello {user_name}, welcome!", &v), "Hello Alice, welcome!");
    }

    #[test]
    fn unknown_placeholders_stay_verbatim() {
        let v = Vars::new();
        assert_eq!(render("{{ missing }} and {other}", &v), "{{ missing }} and {other}");
    }

    #[test]
    fn applies_precision_format_spec() {
        let v = vars(&[("price", json!(99.989))]);
        assert_eq!(render("Price: {price:.2f} USD", &v), "Price: 99.99 USD");
    }

    #[test]
    fn applies_width_and_alignment() {
        let v = vars(&[("n", json!(42)), ("s", json!("ab"))]);
        assert_eq!(render("[{n:5d}]", &v), "[   42]");
        assert_eq!(render("[{n:<5}]", &v), "[42   ]");
        assert_eq!(render("[{s:*^6}]", &v), "[**ab**]");
        assert_eq!(render("[{n:05d}]", &v), "[00042]");
        assert_eq!(render("[{n:+d}]", &v), "[+42]");
    }

    #[test]
    fn applies_thousands_percent_and_exponent() {
        let v = vars(&[("big", json!(1234567.891)), ("ratio", json!(0.25))]);
        assert_eq!(render("{big:,.2f}", &v), "1,234,567.89");
        assert_eq!(render("{ratio:.1%}", &v), "25.0%");
        assert_eq!(render("{big:.2e}", &v), "1.23e+06");
    }

    #[test]
    fn invalid_spec_falls_back_to_plain_value() {
        let v = vars(&[("x", json!("text"))]);
        assert_eq!(render("{x:zz}", &v), "text");
    }

    #[test]
    fn handles_non_ascii_text() {
        let v = vars(&[("name", json!("测试"))]);
        assert_eq!(render("尊敬的 {name}，您好！", &v), "尊敬的 测试，您好！");
    }

    #[test]
    fn escaped_braces_collapse_to_single_braces() {
        let v = vars(&[("value", json!(7)), ("user_name", json!("Ann"))]);
        assert_eq!(render("{{\"k\": {value}}}", &v), "{\"k\": 7}");
        assert_eq!(render("Set {{}} for {user_name}", &v), "Set {} for Ann");
        assert_eq!(render("{{{user_name}}}", &v), "{Ann}");
    }

    #[test]
    fn double_brace_identifier_is_a_placeholder() {
        let v = vars(&[("value", json!(7))]);
        assert_eq!(render("{{value}} and {{ other }}", &v), "7 and {{ other }}");
    }

    #[test]
    fn substituted_values_are_not_rendered_again() {
        let v = vars(&[("a", json!("{b}")), ("b", json!("nope"))]);
        assert_eq!(render("{a}", &v), "{b}");
    }
}
