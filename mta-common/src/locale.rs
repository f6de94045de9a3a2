//! Bilingual (Russian / Romanian) text
//!
//! Course content is authored in both languages. Either side may be blank
//! while a translation is pending, so reads fall back to the other language.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Content language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Ru,
    #[default]
    Ro,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::Ru => "ru",
            Locale::Ro => "ro",
        }
    }

    pub fn other(&self) -> Locale {
        match self {
            Locale::Ru => Locale::Ro,
            Locale::Ro => Locale::Ru,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ru" => Ok(Locale::Ru),
            "ro" => Ok(Locale::Ro),
            other => Err(Error::InvalidInput(format!("Unsupported locale: {}", other))),
        }
    }
}

impl TryFrom<String> for Locale {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A text value in both content languages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    #[serde(default)]
    pub ru: String,
    #[serde(default)]
    pub ro: String,
}

impl LocalizedText {
    pub fn new(ru: impl Into<String>, ro: impl Into<String>) -> Self {
        Self {
            ru: ru.into(),
            ro: ro.into(),
        }
    }

    /// Text in one language only; the other side stays blank
    pub fn single(locale: Locale, text: impl Into<String>) -> Self {
        let mut value = Self::default();
        *value.slot_mut(locale) = text.into();
        value
    }

    fn slot(&self, locale: Locale) -> &str {
        match locale {
            Locale::Ru => &self.ru,
            Locale::Ro => &self.ro,
        }
    }

    fn slot_mut(&mut self, locale: Locale) -> &mut String {
        match locale {
            Locale::Ru => &mut self.ru,
            Locale::Ro => &mut self.ro,
        }
    }

    /// Requested language, or the other one when the requested side is blank
    pub fn get(&self, locale: Locale) -> &str {
        let primary = self.slot(locale);
        if primary.trim().is_empty() {
            self.slot(locale.other())
        } else {
            primary
        }
    }

    pub fn is_blank(&self) -> bool {
        self.ru.trim().is_empty() && self.ro.trim().is_empty()
    }

    pub fn is_complete(&self) -> bool {
        !self.ru.trim().is_empty() && !self.ro.trim().is_empty()
    }

    /// Trim both sides
    pub fn trimmed(&self) -> Self {
        Self {
            ru: self.ru.trim().to_string(),
            ro: self.ro.trim().to_string(),
        }
    }
}

/// Maximum slug length in characters
pub const MAX_SLUG_LEN: usize = 80;

/// Latin transliteration for one Cyrillic or Romanian character
fn transliterate(c: char) -> Option<&'static str> {
    let s = match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "e",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "i",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' | 'ь' => "",
        'ы' => "y",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        'ă' | 'â' => "a",
        'î' => "i",
        'ș' | 'ş' => "s",
        'ț' | 'ţ' => "t",
        _ => return None,
    };
    Some(s)
}

/// URL-safe identifier derived from a title
///
/// ```
/// use mta_common::locale::slugify;
///
/// assert_eq!(slugify("Мышцы спины"), "myshtsy-spiny");
/// assert_eq!(slugify("Mușchii  spatelui!"), "muschii-spatelui");
/// assert_eq!(slugify("???"), "item");
/// ```
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        let piece: Option<String> = if c.is_ascii_alphanumeric() {
            Some(c.to_string())
        } else {
            transliterate(c).map(str::to_string)
        };

        match piece {
            Some(p) if !p.is_empty() => {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push_str(&p);
            }
            Some(_) => {}
            None => pending_dash = true,
        }
    }

    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    if slug.is_empty() {
        "item".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_falls_back_when_blank() {
        let text = LocalizedText::new("", "Anatomie");
        assert_eq!(text.get(Locale::Ro), "Anatomie");
        assert_eq!(text.get(Locale::Ru), "Anatomie");

        let text = LocalizedText::new("Анатомия", "Anatomie");
        assert_eq!(text.get(Locale::Ru), "Анатомия");
    }

    #[test]
    fn test_blank_and_complete() {
        assert!(LocalizedText::new(" ", "").is_blank());
        assert!(!LocalizedText::single(Locale::Ru, "x").is_blank());
        assert!(!LocalizedText::single(Locale::Ru, "x").is_complete());
        assert!(LocalizedText::new("a", "b").is_complete());
    }

    #[test]
    fn test_single_sets_requested_side() {
        let text = LocalizedText::single(Locale::Ro, "Masaj");
        assert_eq!(text.ro, "Masaj");
        assert!(text.ru.is_empty());
    }

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("  Deep -- Tissue  Massage "), "deep-tissue-massage");
        assert_eq!(slugify("Țesut conjunctiv"), "tesut-conjunctiv");
        assert_eq!(slugify("Объём"), "obem");
    }

    #[test]
    fn test_slugify_truncates() {
        let long = "a ".repeat(100);
        let slug = slugify(&long);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_locale_parse() {
        assert_eq!("RU".parse::<Locale>().unwrap(), Locale::Ru);
        assert!("en".parse::<Locale>().is_err());
    }
}
