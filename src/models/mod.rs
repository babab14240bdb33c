use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which backend operation a submission targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    ChapterMap,
    TextCorrection,
}

impl Mode {
    /// Multipart field names carrying the range bounds.
    pub fn range_fields(self) -> (&'static str, &'static str) {
        match self {
            Mode::ChapterMap => ("start_chapter", "end_chapter"),
            Mode::TextCorrection => ("start", "end"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::ChapterMap => "Map chapters to pages",
            Mode::TextCorrection => "Correct page text",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }
}

impl Default for PageRange {
    fn default() -> Self {
        Self { start: 1, end: 10 }
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A file picked by the user, as declared by the browser.
#[derive(Clone)]
pub struct PdfFile {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl PdfFile {
    pub fn new(name: impl Into<String>, content_type: Option<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type,
            data,
        }
    }

    /// True when the declared type is `application/pdf`, ignoring case and parameters.
    pub fn is_pdf(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|essence| essence.trim().eq_ignore_ascii_case(PDF_CONTENT_TYPE))
            .unwrap_or(false)
    }
}

impl fmt::Debug for PdfFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// One submission handed to the backend client.
#[derive(Debug, Clone)]
pub struct Job {
    pub attempt: Uuid,
    pub mode: Mode,
    pub range: PageRange,
    pub file: PdfFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSpan {
    pub chapter: u32,
    pub start_page: u32,
    pub end_page: u32,
}

/// Page annotation on a corrected-text response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PagesRead {
    Count(u64),
    Pages(Vec<u64>),
    Label(String),
}

impl fmt::Display for PagesRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PagesRead::Count(n) => write!(f, "{n}"),
            PagesRead::Pages(pages) => {
                let joined: Vec<String> = pages.iter().map(u64::to_string).collect();
                f.write_str(&joined.join(", "))
            }
            PagesRead::Label(label) => f.write_str(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectedText {
    pub text: String,
    pub filename: Option<String>,
    pub pages: Option<PagesRead>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Chapters { chapters: Vec<ChapterSpan> },
    CorrectedText(CorrectedText),
}

impl Outcome {
    /// Only an empty chapter list counts as an empty result.
    pub fn is_empty(&self) -> bool {
        matches!(self, Outcome::Chapters { chapters } if chapters.is_empty())
    }
}
