//! Character classification and position bonuses
//!
//! A matched character earns a bonus depending on the class of the character
//! before it: the first letter after whitespace, a path delimiter or other
//! punctuation starts a "word", as does a camelCase hump or the first digit of
//! a number.

/// Points for every matched character
pub const SCORE_MATCH: i32 = 16;
/// Penalty for opening a gap between matched characters
pub const SCORE_GAP_START: i32 = -3;
/// Penalty for each further character inside a gap
pub const SCORE_GAP_EXTENSION: i32 = -1;

/// Match right after a non-word character
pub const BONUS_BOUNDARY: i32 = SCORE_MATCH / 2;
/// Match right after whitespace (or at the start of the candidate)
pub const BONUS_BOUNDARY_WHITE: i32 = BONUS_BOUNDARY + 2;
/// Match right after a delimiter such as `/` or `:`
pub const BONUS_BOUNDARY_DELIMITER: i32 = BONUS_BOUNDARY + 1;
/// Matching a non-word character itself
pub const BONUS_NON_WORD: i32 = SCORE_MATCH / 2;
/// lowerUpper transition or the first digit after a non-digit
pub const BONUS_CAMEL_123: i32 = BONUS_BOUNDARY + SCORE_GAP_EXTENSION;
/// Minimum bonus for every character of a consecutive run
pub const BONUS_CONSECUTIVE: i32 = -(SCORE_GAP_START + SCORE_GAP_EXTENSION);
/// The bonus of the first query character counts this many times
pub const BONUS_FIRST_CHAR_MULTIPLIER: i32 = 2;

const DELIMITERS: &[char] = &['/', ',', ':', ';', '|'];

/// Class of a single candidate character.
///
/// Ordering matters: everything above `Delimiter` is a word character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CharClass {
    White,
    NonWord,
    Delimiter,
    Lower,
    Upper,
    Letter,
    Number,
}

impl CharClass {
    /// The class assumed before the first character of a candidate
    pub const INITIAL: CharClass = CharClass::White;

    pub fn of(c: char) -> Self {
        if c.is_ascii() {
            return Self::of_ascii(c as u8);
        }
        if c.is_lowercase() {
            CharClass::Lower
        } else if c.is_uppercase() {
            CharClass::Upper
        } else if c.is_numeric() {
            CharClass::Number
        } else if c.is_alphabetic() {
            CharClass::Letter
        } else if c.is_whitespace() {
            CharClass::White
        } else if DELIMITERS.contains(&c) {
            CharClass::Delimiter
        } else {
            CharClass::NonWord
        }
    }

    fn of_ascii(b: u8) -> Self {
        match b {
            b'a'..=b'z' => CharClass::Lower,
            b'A'..=b'Z' => CharClass::Upper,
            b'0'..=b'9' => CharClass::Number,
            b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r' => CharClass::White,
            b'/' | b',' | b':' | b';' | b'|' => CharClass::Delimiter,
            _ => CharClass::NonWord,
        }
    }

    fn is_word(self) -> bool {
        self > CharClass::Delimiter
    }
}

/// Bonus for matching a character of class `class` that follows `prev`
pub fn bonus_for(prev: CharClass, class: CharClass) -> i32 {
    if class.is_word() {
        match prev {
            CharClass::White => return BONUS_BOUNDARY_WHITE,
            CharClass::Delimiter => return BONUS_BOUNDARY_DELIMITER,
            CharClass::NonWord => return BONUS_BOUNDARY,
            _ => {}
        }
    }

    if (prev == CharClass::Lower && class == CharClass::Upper)
        || (prev != CharClass::Number && class == CharClass::Number)
    {
        return BONUS_CAMEL_123;
    }

    match class {
        CharClass::NonWord | CharClass::Delimiter => BONUS_NON_WORD,
        CharClass::White => BONUS_BOUNDARY_WHITE,
        _ => 0,
    }
}
