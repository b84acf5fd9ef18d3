//! Date patterns and number formats used by naming rules
//!
//! Date patterns follow the familiar `SimpleDateFormat` notation (`yyMM`,
//! `yyyy-MM-dd`, ...), restricted to fixed-width numeric fields so that a
//! formatted prefix can be recognised again at the head of a file name.
use std::ops::RangeInclusive;

use chrono::{NaiveDate, NaiveDateTime};

use super::RuleError;

/// Something that can turn a date into a file name prefix
///
/// The resolver only talks to its date formatter through this trait, so a
/// fixed or instrumented formatter can be supplied in place of [`DatePattern`].
pub trait FormatDate {
    /// Render `date` as a file name prefix
    fn format(&self, date: &NaiveDateTime) -> String;

    /// Strip a valid date prefix from `name`, returning the remainder
    fn strip_prefix<'a>(&self, name: &'a str) -> Option<&'a str>;
}

/// A single element of a date pattern
#[derive(Clone, PartialEq, Eq, Debug)]
enum Element {
    Literal(char),
    Field {
        strftime: &'static str,
        digits: usize,
        range: RangeInclusive<u32>,
    },
}

/// A compiled, validated date pattern
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DatePattern {
    source: String,
    elements: Vec<Element>,
    strftime: String,
}

impl DatePattern {
    /// Compile a `SimpleDateFormat`-style pattern
    ///
    /// Supported fields are `yyyy`, `yy`, `MM`, `dd`, `HH`, `mm` and `ss`.
    /// Text in single quotes is copied verbatim (`''` is a literal quote),
    /// as is any character that is not an ASCII letter.
    pub fn new(pattern: &str) -> Result<Self, RuleError> {
        let invalid = |reason| RuleError::InvalidDatePattern(pattern.into(), reason);
        let mut elements = Vec::new();
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\'' if chars.peek() == Some(&'\'') => {
                    chars.next();
                    elements.push(Element::Literal('\''));
                }
                '\'' => loop {
                    match chars.next() {
                        None => return Err(invalid("unterminated quote")),
                        Some('\'') if chars.peek() == Some(&'\'') => {
                            chars.next();
                            elements.push(Element::Literal('\''));
                        }
                        Some('\'') => break,
                        Some(literal) => elements.push(Element::Literal(literal)),
                    }
                },
                c if c.is_ascii_alphabetic() => {
                    let mut count = 1;
                    while chars.peek() == Some(&c) {
                        chars.next();
                        count += 1;
                    }
                    let (strftime, digits, range) = match (c, count) {
                        ('y', 2) => ("%y", 2, 0..=99),
                        ('y', 4) => ("%Y", 4, 0..=9999),
                        ('M', 2) => ("%m", 2, 1..=12),
                        ('d', 2) => ("%d", 2, 1..=31),
                        ('H', 2) => ("%H", 2, 0..=23),
                        ('m', 2) => ("%M", 2, 0..=59),
                        ('s', 2) => ("%S", 2, 0..=60),
                        ('y' | 'M' | 'd' | 'H' | 'm' | 's', _) => {
                            return Err(invalid(
                                "fields must be fixed width (yy, yyyy, MM, dd, HH, mm, ss)",
                            ))
                        }
                        _ => return Err(invalid("unsupported pattern letter")),
                    };
                    elements.push(Element::Field {
                        strftime,
                        digits,
                        range,
                    });
                }
                literal => elements.push(Element::Literal(literal)),
            }
        }
        let strftime = elements
            .iter()
            .map(|element| match element {
                Element::Literal('%') => "%%".to_string(),
                Element::Literal(c) => c.to_string(),
                Element::Field { strftime, .. } => strftime.to_string(),
            })
            .collect();
        Ok(Self {
            source: pattern.into(),
            elements,
            strftime,
        })
    }

    /// Number of characters a formatted date occupies
    pub fn width(&self) -> usize {
        self.elements
            .iter()
            .map(|element| match element {
                Element::Literal(_) => 1,
                Element::Field { digits, .. } => *digits,
            })
            .sum()
    }
}

impl FormatDate for DatePattern {
    fn format(&self, date: &NaiveDateTime) -> String {
        date.format(&self.strftime).to_string()
    }

    fn strip_prefix<'a>(&self, name: &'a str) -> Option<&'a str> {
        // Fields missing from the pattern default to 2000-01-01, a leap year
        let (mut year, mut month, mut day) = (2000, 1, 1);
        let rest = self.elements.iter().try_fold(name, |rest, element| match element {
            Element::Literal(c) => rest.strip_prefix(*c),
            Element::Field {
                strftime,
                digits,
                range,
            } => {
                let (head, tail) = rest.split_at_checked(*digits)?;
                if !head.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let value: u32 = head.parse().ok()?;
                if !range.contains(&value) {
                    return None;
                }
                match *strftime {
                    "%y" => year = 2000 + i32::try_from(value).ok()?,
                    "%Y" => year = i32::try_from(value).ok()?,
                    "%m" => month = value,
                    "%d" => day = value,
                    _ => {}
                }
                Some(tail)
            }
        })?;
        NaiveDate::from_ymd_opt(year, month, day).map(|_| rest)
    }
}

impl std::fmt::Display for DatePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// A `DecimalFormat`-style zero padding pattern, e.g. `000`
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct NumberFormat {
    min_digits: usize,
}

impl NumberFormat {
    /// Parse a number format made of optional `#` followed by `0` characters
    pub fn new(pattern: &str) -> Result<Self, RuleError> {
        if pattern.is_empty() || !lazy_regex::regex_is_match!(r"^#*0*$", pattern) {
            return Err(RuleError::InvalidNumberFormat(pattern.into()));
        }
        Ok(Self {
            min_digits: pattern.chars().filter(|&c| c == '0').count(),
        })
    }

    /// Minimum number of digits rendered
    pub fn min_digits(&self) -> usize {
        self.min_digits
    }

    /// Render `value`, zero-padded to at least `min_digits` digits
    pub fn format(&self, value: u32) -> String {
        format!("{value:0width$}", width = self.min_digits)
    }
}
