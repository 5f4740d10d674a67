// SPDX-License-Identifier: MIT OR Apache-2.0

//! Textual envelope formats understood by storage-element plugins.
//!
//! Two formats exist side by side:
//!
//! - the `&`-delimited `key=value` format, where values escape `%`, `&` and `=` with their
//!   percent-encoding, and
//! - the legacy XML document `<authz><file><access>..</access>..</file></authz>`, optionally
//!   wrapped in `-----BEGIN ENVELOPE-----` / `-----END ENVELOPE-----` markers.
//!
//! [`ReceivedEnvelope::parse`] sniffs which one it was handed and yields the same field set
//! either way.
use std::borrow::Cow;

use alien_core::AccessType;
use thiserror::Error;

pub const BEGIN_ENVELOPE: &str = "-----BEGIN ENVELOPE-----";
pub const END_ENVELOPE: &str = "-----END ENVELOPE-----";

const AUTHZ_OPEN: &str = "<authz>";
const AUTHZ_CLOSE: &str = "</authz>";
const FILE_OPEN: &str = "<file>";
const FILE_CLOSE: &str = "</file>";

/// Escape a value for the `&`-delimited format.
pub fn escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['%', '&', '=']) {
        return Cow::Borrowed(value);
    }

    let mut escaped = String::with_capacity(value.len() + 6);
    for c in value.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '&' => escaped.push_str("%26"),
            '=' => escaped.push_str("%3D"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

pub fn unescape(value: &str) -> Result<String, EnvelopeParseError> {
    urlencoding::decode(value)
        .map(Cow::into_owned)
        .map_err(|_| EnvelopeParseError::InvalidEncoding(value.to_string()))
}

pub fn xml_escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(value);
    }

    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

pub fn xml_unescape(value: &str) -> Result<String, EnvelopeParseError> {
    let mut unescaped = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find('&') {
        unescaped.push_str(&rest[..start]);
        let entity_end = rest[start..]
            .find(';')
            .ok_or_else(|| EnvelopeParseError::InvalidEncoding(value.to_string()))?;
        let entity = &rest[start + 1..start + entity_end];
        unescaped.push(match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => return Err(EnvelopeParseError::InvalidEncoding(value.to_string())),
        });
        rest = &rest[start + entity_end + 1..];
    }

    unescaped.push_str(rest);
    Ok(unescaped)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeFormat {
    Xml,
    Delimited,
}

impl EnvelopeFormat {
    /// Decide the format from marker substrings, without guessing on anything else.
    pub fn detect(input: &str) -> Result<Self, EnvelopeParseError> {
        if input.contains("BEGIN ENVELOPE") || input.contains(AUTHZ_OPEN) {
            Ok(EnvelopeFormat::Xml)
        } else if input.contains(['&', '=']) {
            Ok(EnvelopeFormat::Delimited)
        } else {
            Err(EnvelopeParseError::UnrecognisedFormat)
        }
    }
}

/// One received field with its value as it appeared on the wire and decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub key: String,
    pub raw: String,
    pub value: String,
}

/// Fields of a received envelope in wire order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvelopeFields(Vec<Field>);

impl EnvelopeFields {
    fn insert(&mut self, key: &str, raw: &str, value: String) -> Result<(), EnvelopeParseError> {
        if key.is_empty() {
            return Err(EnvelopeParseError::EmptyKey);
        }

        if self.contains(key) {
            return Err(EnvelopeParseError::DuplicateKey(key.to_string()));
        }

        self.0.push(Field {
            key: key.to_string(),
            raw: raw.to_string(),
            value,
        });
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|field| field.key == key)
    }

    /// Decoded value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.field(key).map(|field| field.value.as_str())
    }

    /// Value of `key` exactly as it was received, before unescaping.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.field(key).map(|field| field.raw.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn field(&self, key: &str) -> Option<&Field> {
        self.0.iter().find(|field| field.key == key)
    }
}

/// A textual envelope received from a client or storage element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedEnvelope {
    format: EnvelopeFormat,
    fields: EnvelopeFields,
}

impl ReceivedEnvelope {
    pub fn parse(input: &str) -> Result<Self, EnvelopeParseError> {
        let format = EnvelopeFormat::detect(input)?;
        let fields = match format {
            EnvelopeFormat::Xml => parse_xml(input)?,
            EnvelopeFormat::Delimited => parse_delimited(input)?,
        };
        Ok(Self { format, fields })
    }

    pub fn format(&self) -> EnvelopeFormat {
        self.format
    }

    pub fn fields(&self) -> &EnvelopeFields {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key)
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.fields.raw(key)
    }

    pub fn access(&self) -> Result<AccessType, EnvelopeParseError> {
        let access = self
            .get("access")
            .ok_or(EnvelopeParseError::MissingField("access"))?;
        access
            .parse()
            .map_err(|_| EnvelopeParseError::InvalidAccess(access.to_string()))
    }
}

fn parse_delimited(input: &str) -> Result<EnvelopeFields, EnvelopeParseError> {
    let mut fields = EnvelopeFields::default();

    for pair in input.trim().split('&') {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| EnvelopeParseError::MalformedPair(pair.to_string()))?;
        fields.insert(key, raw, unescape(raw)?)?;
    }

    Ok(fields)
}

fn parse_xml(input: &str) -> Result<EnvelopeFields, EnvelopeParseError> {
    let mut document = input.trim();
    if let Some(stripped) = document.strip_prefix(BEGIN_ENVELOPE) {
        document = stripped
            .trim_end()
            .strip_suffix(END_ENVELOPE)
            .ok_or(EnvelopeParseError::MalformedXml("missing end marker"))?
            .trim();
    }

    let authz = between(document, AUTHZ_OPEN, AUTHZ_CLOSE)
        .ok_or(EnvelopeParseError::MalformedXml("missing <authz> element"))?;
    let mut rest = between(authz, FILE_OPEN, FILE_CLOSE)
        .ok_or(EnvelopeParseError::MalformedXml("missing <file> element"))?
        .trim();

    let mut fields = EnvelopeFields::default();
    while !rest.is_empty() {
        let open_end = rest
            .strip_prefix('<')
            .and_then(|tail| tail.find('>'))
            .ok_or(EnvelopeParseError::MalformedXml("expected an element"))?;
        let tag = &rest[1..open_end + 1];
        if tag.is_empty() || tag.starts_with('/') {
            return Err(EnvelopeParseError::MalformedXml("expected an opening tag"));
        }

        let body = &rest[open_end + 2..];
        let close = format!("</{tag}>");
        let body_end = body
            .find(&close)
            .ok_or(EnvelopeParseError::MalformedXml("unterminated element"))?;
        let raw = &body[..body_end];
        fields.insert(tag, raw, xml_unescape(raw)?)?;

        rest = body[body_end + close.len()..].trim_start();
    }

    Ok(fields)
}

fn between<'a>(input: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = input.find(open)? + open.len();
    let end = input[start..].rfind(close)? + start;
    Some(&input[start..end])
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeParseError {
    #[error("envelope is neither XML nor '&'-delimited")]
    UnrecognisedFormat,

    #[error("expected 'key=value', got '{0}'")]
    MalformedPair(String),

    #[error("envelope contains an empty key")]
    EmptyKey,

    #[error("key '{0}' appears more than once")]
    DuplicateKey(String),

    #[error("invalid escape sequence in '{0}'")]
    InvalidEncoding(String),

    #[error("malformed XML envelope: {0}")]
    MalformedXml(&'static str),

    #[error("envelope has no '{0}' field")]
    MissingField(&'static str),

    #[error("unknown access type '{0}'")]
    InvalidAccess(String),
}
