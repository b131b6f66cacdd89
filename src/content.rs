//! Cached content shapes and composite key builders.
//!
//! The cache stores one of three concrete shapes, one per tier. Content is
//! produced by the scripture source on a cache miss; the cache only holds it.

use serde::{Deserialize, Serialize};

/// A single verse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    pub number: u32,
    pub text: String,
}

/// A contiguous run of verses, e.g. a reading selection or a verse of the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersePassage {
    pub book: String,
    pub chapter: u32,
    pub translation: String,
    pub verses: Vec<Verse>,
}

/// A whole chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub book: String,
    pub number: u32,
    pub translation: String,
    pub verses: Vec<Verse>,
}

/// A whole book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub name: String,
    pub translation: String,
    pub chapters: Vec<Chapter>,
}

/// A cached value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Content {
    Passage(VersePassage),
    Chapter(Chapter),
    Book(Book),
    /// Preformatted text, e.g. a rendered passage string.
    Text(String),
}

impl From<VersePassage> for Content {
    fn from(p: VersePassage) -> Self {
        Content::Passage(p)
    }
}

impl From<Chapter> for Content {
    fn from(c: Chapter) -> Self {
        Content::Chapter(c)
    }
}

impl From<Book> for Content {
    fn from(b: Book) -> Self {
        Content::Book(b)
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

/// Key for a verse range: `KJV:GEN:1:1-5`.
pub fn passage_key(
    book: &str,
    chapter: u32,
    verses: std::ops::RangeInclusive<u32>,
    translation: &str,
) -> String {
    format!(
        "{}:{}:{}:{}-{}",
        translation.to_uppercase(),
        book.to_uppercase(),
        chapter,
        verses.start(),
        verses.end()
    )
}

/// Key for a chapter: `KJV:GEN:1`.
pub fn chapter_key(book: &str, chapter: u32, translation: &str) -> String {
    format!("{}:{}:{}", translation.to_uppercase(), book.to_uppercase(), chapter)
}

/// Key for a book: `KJV:GEN`.
pub fn book_key(book: &str, translation: &str) -> String {
    format!("{}:{}", translation.to_uppercase(), book.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_case_normalized() {
        assert_eq!(chapter_key("gen", 1, "kjv"), "KJV:GEN:1");
        assert_eq!(chapter_key("GEN", 1, "KJV"), chapter_key("gen", 1, "kjv"));
        assert_eq!(book_key("Psa", "esv"), "ESV:PSA");
        assert_eq!(passage_key("jhn", 3, 16..=17, "niv"), "NIV:JHN:3:16-17");
    }

    #[test]
    fn test_keys_distinguish_translation() {
        assert_ne!(chapter_key("GEN", 1, "KJV"), chapter_key("GEN", 1, "ESV"));
    }
}
