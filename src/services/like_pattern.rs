//! SQL LIKE pattern translation.
//!
//! Scans left to right: an unescaped `%` becomes an any-sequence wildcard, an
//! unescaped `_` an any-single wildcard. `\%`, `\_` and `\\` are literal
//! characters. A backslash before any other character is kept as is.

use crate::models::{WildcardPattern, WildcardToken};

pub fn translate_like(pattern: &str) -> WildcardPattern {
    let mut out = WildcardPattern::default();
    let mut chars = pattern.chars().peekable();
    let mut buf = [0u8; 4];

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek().copied() {
                Some(next @ ('%' | '_' | '\\')) => {
                    chars.next();
                    out.push_literal(next.encode_utf8(&mut buf));
                }
                _ => out.push_literal("\\"),
            },
            '%' => out.push(WildcardToken::AnySequence),
            '_' => out.push(WildcardToken::AnySingle),
            other => out.push_literal(other.encode_utf8(&mut buf)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn lit(s: &str) -> WildcardToken {
        WildcardToken::Literal(s.to_string())
    }

    #[test]
    fn test_escaped_percent_stays_literal() {
        let p = translate_like(r"Like\%String");
        assert_eq!(p.tokens, vec![lit("Like%String")]);
        assert!(!p.has_wildcards());
    }

    #[test]
    fn test_mixed_escapes() {
        let p = translate_like(r"abc\%def_");
        assert_eq!(p.tokens, vec![lit("abc%def"), WildcardToken::AnySingle]);
    }

    #[rstest]
    #[case("%", vec![WildcardToken::AnySequence])]
    #[case("a%b", vec![lit("a"), WildcardToken::AnySequence, lit("b")])]
    #[case("_x_", vec![WildcardToken::AnySingle, lit("x"), WildcardToken::AnySingle])]
    #[case(r"a\_b", vec![lit("a_b")])]
    #[case(r"a\\%", vec![lit("a\\"), WildcardToken::AnySequence])]
    #[case(r"c:\dir", vec![lit(r"c:\dir")])]
    #[case(r"end\", vec![lit("end\\")])]
    #[case("", vec![])]
    fn test_translation(#[case] input: &str, #[case] expected: Vec<WildcardToken>) {
        assert_eq!(translate_like(input).tokens, expected);
    }
}
