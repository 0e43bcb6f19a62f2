//! Decoding of scraped quiz problem payloads.
//!
//! A payload is a JSON document of the form
//! `{"data": {"font": URL, "problems": [...]}}`. Each problem carries HTML
//! whose marked spans are rendered with the scrambled font. Decoding turns
//! the question body and every option into plain text.

use std::{fmt, io::Write};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    font::JsonStyle,
    mapping::CorrectionMapping,
    markup::{decode_markup, to_plain_text, Marker},
};

/// The top level of a scraped quiz response.
#[derive(Clone, Debug, Deserialize)]
pub struct QuizPayload {
    pub data: QuizData,
}

/// Problems are kept as raw values so a malformed record only affects
/// itself.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct QuizData {
    /// URL of the scrambled font used by this quiz.
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub problems: Vec<Value>,
}

/// The kind of a problem.
///
/// Unknown tags are preserved as written.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProblemType {
    SingleChoice,
    MultipleChoice,
    Judgement,
    Other(String),
}

impl ProblemType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::SingleChoice => "SingleChoice",
            Self::MultipleChoice => "MultipleChoice",
            Self::Judgement => "Judgement",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for ProblemType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "SingleChoice" => Self::SingleChoice,
            "MultipleChoice" => Self::MultipleChoice,
            "Judgement" => Self::Judgement,
            _ => Self::Other(tag),
        }
    }
}

impl From<ProblemType> for String {
    fn from(kind: ProblemType) -> Self {
        match kind {
            ProblemType::Other(tag) => tag,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A problem record as scraped, with its HTML still scrambled.
#[derive(Clone, PartialEq, Debug)]
pub struct RawProblem {
    pub index: Option<i64>,
    pub kind: ProblemType,
    pub body: String,
    /// (key, HTML value) pairs in source order.
    pub options: Vec<(String, String)>,
    pub user: Option<UserRecord>,
}

/// The user's previous attempt at a problem.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct UserRecord {
    pub is_right: bool,
    pub answer: Option<Value>,
    pub explain: Option<Value>,
}

/// A problem record that lacks part of the expected structure.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MissingFieldError {
    /// The record's index, when it has one.
    pub index: Option<i64>,
    /// Dotted path of the missing or mistyped field.
    pub field: &'static str,
}

impl fmt::Display for MissingFieldError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "problem {index}: "),
            None => write!(f, "problem without index: "),
        }?;
        write!(f, "missing or malformed field '{}'", self.field)
    }
}

impl std::error::Error for MissingFieldError {}

impl RawProblem {
    /// Reads a record from its JSON value.
    ///
    /// `content`, `content.Type` and `content.Body` are required. Options
    /// may be absent or null; an option without a key or value gets an empty
    /// string for it.
    pub fn from_value(value: &Value) -> Result<Self, MissingFieldError> {
        let index = value.get("index").and_then(Value::as_i64);
        let missing = |field| MissingFieldError { index, field };
        let content = value
            .get("content")
            .filter(|content| content.is_object())
            .ok_or_else(|| missing("content"))?;
        let kind = content
            .get("Type")
            .and_then(Value::as_str)
            .ok_or_else(|| missing("content.Type"))?;
        let body = content
            .get("Body")
            .and_then(Value::as_str)
            .ok_or_else(|| missing("content.Body"))?;
        let options = match content.get("Options") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(options)) => options
                .iter()
                .map(|option| {
                    let text = |name: &str| {
                        option
                            .get(name)
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_owned()
                    };
                    (text("key"), text("value"))
                })
                .collect(),
            Some(_) => return Err(missing("content.Options")),
        };
        let user = value
            .get("user")
            .filter(|user| user.is_object())
            .map(|user| UserRecord {
                is_right: user.get("is_right").is_some_and(is_truthy),
                answer: user.get("answer").cloned(),
                explain: user.get("explain").cloned(),
            });
        Ok(Self {
            index,
            kind: kind.to_owned().into(),
            body: body.to_owned(),
            options,
            user,
        })
    }
}

/// Loose truthiness, as the platform's `is_right` flag is not always a
/// boolean.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// A problem with its text recovered.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct DecodedProblem {
    pub index: Option<i64>,
    #[serde(rename = "type")]
    pub kind: ProblemType,
    pub question: String,
    pub options: IndexMap<String, String>,
    pub answers: Option<Value>,
    pub explanation: Option<Value>,
}

/// Decodes one record.
///
/// The known answer and explanation are only carried over when the user's
/// attempt was right.
pub fn decode_problem(
    raw: &RawProblem,
    mapping: &CorrectionMapping,
    marker: &Marker,
) -> DecodedProblem {
    let text = |html: &str| to_plain_text(&decode_markup(html, mapping, marker));
    let (answers, explanation) = match &raw.user {
        Some(user) if user.is_right => (user.answer.clone(), user.explain.clone()),
        _ => (None, None),
    };
    DecodedProblem {
        index: raw.index,
        kind: raw.kind.clone(),
        question: text(&raw.body),
        options: raw
            .options
            .iter()
            .map(|(key, value)| (key.clone(), text(value)))
            .collect(),
        answers,
        explanation,
    }
}

/// The result of decoding a whole payload.
#[derive(Clone, Debug, Default)]
pub struct DecodedBatch {
    /// URL of the scrambled font the payload refers to.
    pub font: Option<String>,
    pub problems: Vec<DecodedProblem>,
    /// Records that were skipped, in payload order.
    pub skipped: Vec<MissingFieldError>,
}

impl DecodedBatch {
    /// Writes the decoded problems as a JSON array.
    pub fn to_writer(&self, writer: impl Write, style: JsonStyle) -> Result<(), serde_json::Error> {
        style.to_writer(writer, &self.problems)
    }
}

/// Decodes every record of a payload, skipping malformed ones.
pub fn decode_payload(
    payload: &QuizPayload,
    mapping: &CorrectionMapping,
    marker: &Marker,
) -> DecodedBatch {
    let mut batch = DecodedBatch {
        font: payload.data.font.clone(),
        ..Default::default()
    };
    for value in &payload.data.problems {
        match RawProblem::from_value(value) {
            Ok(raw) => {
                let decoded = decode_problem(&raw, mapping, marker);
                log::debug!(
                    "decoded {} problem {:?} with {} options",
                    decoded.kind,
                    decoded.index,
                    decoded.options.len()
                );
                batch.problems.push(decoded);
            }
            Err(e) => {
                log::warn!("skipping {e}");
                batch.skipped.push(e);
            }
        }
    }
    log::info!(
        "decoded {} problems, skipped {}",
        batch.problems.len(),
        batch.skipped.len()
    );
    batch
}
