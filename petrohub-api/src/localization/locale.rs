//! Language tags
//!
//! A [`Locale`] is a well-formed BCP 47 tag (`language[-Script][-REGION][-variant...]`)
//! whose primary language is a known ISO 639-1 code, or a three-letter ISO 639
//! code that has CLDR locale data. Subtags are stored in
//! canonical case, so `EN-us` and `en-US` compare equal.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// ISO 639-1 language codes
const ISO_639_1: &[&str] = &[
    "aa", "ab", "ae", "af", "ak", "am", "an", "ar", "as", "av", "ay", "az", "ba", "be", "bg",
    "bh", "bi", "bm", "bn", "bo", "br", "bs", "ca", "ce", "ch", "co", "cr", "cs", "cu", "cv",
    "cy", "da", "de", "dv", "dz", "ee", "el", "en", "eo", "es", "et", "eu", "fa", "ff", "fi",
    "fj", "fo", "fr", "fy", "ga", "gd", "gl", "gn", "gu", "gv", "ha", "he", "hi", "ho", "hr",
    "ht", "hu", "hy", "hz", "ia", "id", "ie", "ig", "ii", "ik", "io", "is", "it", "iu", "ja",
    "jv", "ka", "kg", "ki", "kj", "kk", "kl", "km", "kn", "ko", "kr", "ks", "ku", "kv", "kw",
    "ky", "la", "lb", "lg", "li", "ln", "lo", "lt", "lu", "lv", "mg", "mh", "mi", "mk", "ml",
    "mn", "mr", "ms", "mt", "my", "na", "nb", "nd", "ne", "ng", "nl", "nn", "no", "nr", "nv",
    "ny", "oc", "oj", "om", "or", "os", "pa", "pi", "pl", "ps", "pt", "qu", "rm", "rn", "ro",
    "ru", "rw", "sa", "sc", "sd", "se", "sg", "si", "sk", "sl", "sm", "sn", "so", "sq", "sr",
    "ss", "st", "su", "sv", "sw", "ta", "te", "tg", "th", "ti", "tk", "tl", "tn", "to", "tr",
    "ts", "tt", "tw", "ty", "ug", "uk", "ur", "uz", "ve", "vi", "vo", "wa", "wo", "xh", "yi",
    "yo", "za", "zh", "zu",
];

/// Three-letter ISO 639-2/3 languages with CLDR locale data
const ISO_639_3: &[&str] = &[
    "agq", "arn", "asa", "ast", "bas", "bem", "bez", "brx", "byn", "ccp", "ceb", "cgg", "chr",
    "ckb", "dav", "dje", "doi", "dsb", "dua", "dyo", "ebu", "ewo", "fil", "fur", "gaa", "gez",
    "gsw", "guz", "haw", "hsb", "jgo", "jmc", "kab", "kaj", "kam", "kcg", "kde", "kea", "ken",
    "kgp", "khq", "kkj", "kln", "kok", "ksb", "ksf", "ksh", "lag", "lij", "lkt", "lmo", "lrc",
    "luo", "luy", "mai", "mas", "mdf", "mer", "mfe", "mgh", "mgo", "mni", "moh", "mua", "mus",
    "myv", "mzn", "naq", "nds", "nmg", "nnh", "nqo", "nso", "nus", "nyn", "osa", "pcm", "prg",
    "quc", "rof", "rwk", "sah", "saq", "sat", "sbp", "scn", "sdh", "seh", "ses", "shi", "sid",
    "sma", "smj", "smn", "sms", "syr", "szl", "teo", "tig", "tok", "trv", "trw", "tzm", "vai",
    "vec", "vmw", "vun", "wae", "wal", "xog", "yav", "yrl", "yue", "zgh",
];

/// Why a tag could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocaleError {
    #[error("empty language tag")]
    Empty,

    #[error("malformed language tag '{tag}': unexpected subtag '{subtag}'")]
    Malformed { tag: String, subtag: String },

    #[error("unknown language '{language}' in tag '{tag}'")]
    UnknownLanguage { tag: String, language: String },
}

/// Validated language tag in canonical form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale {
    tag: String,
    language_len: usize,
    script: Option<String>,
    region: Option<String>,
}

impl Locale {
    /// Parse and validate a tag
    pub fn parse(tag: &str) -> Result<Self, LocaleError> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(LocaleError::Empty);
        }

        let malformed = |subtag: &str| LocaleError::Malformed {
            tag: tag.to_string(),
            subtag: subtag.to_string(),
        };

        let mut subtags = tag.split('-').peekable();
        let language = subtags.next().unwrap_or_default();
        if !(2..=3).contains(&language.len()) || !is_alpha(language) {
            return Err(malformed(language));
        }
        let language = language.to_ascii_lowercase();
        let known = match language.len() {
            2 => ISO_639_1.contains(&language.as_str()),
            _ => ISO_639_3.contains(&language.as_str()),
        };
        if !known {
            return Err(LocaleError::UnknownLanguage {
                tag: tag.to_string(),
                language,
            });
        }

        let mut canonical = vec![language.clone()];

        let script = match subtags.peek() {
            Some(s) if s.len() == 4 && is_alpha(s) => {
                let script = title_case(s);
                subtags.next();
                canonical.push(script.clone());
                Some(script)
            }
            _ => None,
        };

        let region = match subtags.peek() {
            Some(s) if (s.len() == 2 && is_alpha(s)) || (s.len() == 3 && is_digit(s)) => {
                let region = s.to_ascii_uppercase();
                subtags.next();
                canonical.push(region.clone());
                Some(region)
            }
            _ => None,
        };

        for variant in subtags {
            let valid = ((5..=8).contains(&variant.len()) && is_alnum(variant))
                || (variant.len() == 4
                    && variant.starts_with(|c: char| c.is_ascii_digit())
                    && is_alnum(variant));
            if !valid {
                return Err(malformed(variant));
            }
            canonical.push(variant.to_ascii_lowercase());
        }

        Ok(Self {
            language_len: language.len(),
            tag: canonical.join("-"),
            script,
            region,
        })
    }

    /// Canonical tag, e.g. `en-US`
    pub fn as_str(&self) -> &str {
        &self.tag
    }

    /// Primary language subtag, e.g. `en`
    pub fn language(&self) -> &str {
        &self.tag[..self.language_len]
    }

    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Language-only locale, or `None` if this already is one
    pub fn parent(&self) -> Option<Locale> {
        if self.tag.len() == self.language_len {
            return None;
        }
        Some(Self {
            tag: self.language().to_string(),
            language_len: self.language_len,
            script: None,
            region: None,
        })
    }
}

fn is_alpha(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphabetic())
}

fn is_digit(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_digit())
}

fn is_alnum(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphanumeric())
}

fn title_case(s: &str) -> String {
    let lower = s.to_ascii_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)
    }
}

impl FromStr for Locale {
    type Err = LocaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Locale {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.tag)
    }
}

impl<'de> Deserialize<'de> for Locale {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Self::parse(&tag).map_err(serde::de::Error::custom)
    }
}
