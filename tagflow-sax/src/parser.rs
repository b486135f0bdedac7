//! Incremental tag/text tokenizer.
//!
//! Input arrives in arbitrary byte chunks. Complete tokens are cut from the
//! front of an internal buffer; an incomplete token stays buffered until
//! more input or [`TagParser::finish`] arrives.
//!
//! Token rules:
//!
//! - `<name attr="v">` opens a tag; `<name/>` opens and immediately closes it
//! - `</name>` closes a tag (names are not matched against open tags)
//! - text between tags is one event, with character references decoded
//! - `<![CDATA[...]]>` is delivered verbatim as text
//! - comments, processing instructions and `<!DOCTYPE ...>` are skipped

use crate::error::SaxError;
use crate::escape::unescape;
use crate::event::{deliver, EventSource, OpenTag, TagEvent, TagListener};
use bytes::BytesMut;
use std::collections::{BTreeMap, VecDeque};

/// Default limit for a single buffered token (1 MiB).
pub const DEFAULT_MAX_TOKEN_LEN: usize = 1024 * 1024;

const COMMENT_OPEN: &[u8] = b"<!--";
const COMMENT_CLOSE: &[u8] = b"-->";
const CDATA_OPEN: &[u8] = b"<![CDATA[";
const CDATA_CLOSE: &[u8] = b"]]>";
const PI_OPEN: &[u8] = b"<?";
const PI_CLOSE: &[u8] = b"?>";

/// Tokenizer options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Drop text events consisting only of whitespace.
    pub skip_whitespace_text: bool,
    /// Largest token that may sit in the buffer waiting for completion.
    pub max_token_len: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            skip_whitespace_text: false,
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
        }
    }
}

impl ParserConfig {
    pub fn with_skip_whitespace_text(mut self, skip: bool) -> Self {
        self.skip_whitespace_text = skip;
        self
    }

    pub fn with_max_token_len(mut self, len: usize) -> Self {
        self.max_token_len = len;
        self
    }
}

enum Step {
    Emit(TagEvent),
    Skip,
    NeedMore,
}

/// Streaming tokenizer with a pull API ([`feed`](Self::feed),
/// [`finish`](Self::finish), [`next_event`](Self::next_event)) and a push
/// API through [`EventSource`].
#[derive(Debug)]
pub struct TagParser {
    config: ParserConfig,
    buffer: BytesMut,
    /// Absolute stream offset of `buffer[0]`.
    offset: u64,
    pending: VecDeque<TagEvent>,
    finished: bool,
    done: bool,
}

impl TagParser {
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            config,
            buffer: BytesMut::with_capacity(8192),
            offset: 0,
            pending: VecDeque::new(),
            finished: false,
            done: false,
        }
    }

    /// Tokenizes a complete document.
    pub fn parse_all(input: &[u8], config: ParserConfig) -> Result<Vec<TagEvent>, SaxError> {
        let mut parser = Self::with_config(config);
        let mut events = Vec::new();
        parser.write(input, &mut events)?;
        parser.end(&mut events)?;
        Ok(events)
    }

    /// Appends input to the internal buffer.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), SaxError> {
        if self.finished {
            return Err(SaxError::Ended);
        }
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    /// Marks the end of input. Buffered text is flushed and a final
    /// [`TagEvent::End`] is produced by `next_event`.
    pub fn finish(&mut self) -> Result<(), SaxError> {
        if self.finished {
            return Err(SaxError::Ended);
        }
        self.finished = true;
        Ok(())
    }

    /// Returns the next complete event, or `None` if more input is needed
    /// (or the end event was already produced).
    pub fn next_event(&mut self) -> Result<Option<TagEvent>, SaxError> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }

        loop {
            if self.done {
                return Ok(None);
            }

            if self.buffer.is_empty() {
                if self.finished {
                    self.done = true;
                    return Ok(Some(TagEvent::End));
                }
                return Ok(None);
            }

            let step = if self.buffer[0] == b'<' {
                self.next_markup()?
            } else {
                self.next_text()?
            };

            match step {
                Step::Emit(event) => return Ok(Some(event)),
                Step::Skip => continue,
                Step::NeedMore => return Ok(None),
            }
        }
    }

    /// Number of bytes waiting for a complete token.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Stream offset of the first unconsumed byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    fn next_text(&mut self) -> Result<Step, SaxError> {
        let len = match self.buffer.iter().position(|&b| b == b'<') {
            Some(pos) => pos,
            None if self.finished => self.buffer.len(),
            None => {
                self.check_token_len(self.buffer.len())?;
                return Ok(Step::NeedMore);
            }
        };

        let start = self.offset;
        let raw = self.take(len);
        let text = decode_utf8(&raw, start)?;

        if self.config.skip_whitespace_text && text.trim().is_empty() {
            return Ok(Step::Skip);
        }

        tracing::trace!("text token at {} ({} bytes)", start, len);
        Ok(Step::Emit(TagEvent::Text(unescape(text).into_owned())))
    }

    fn next_markup(&mut self) -> Result<Step, SaxError> {
        let Some(len) = markup_len(&self.buffer) else {
            if self.finished {
                return Err(SaxError::UnexpectedEof {
                    offset: self.offset,
                    construct: markup_kind(&self.buffer),
                });
            }
            self.check_token_len(self.buffer.len())?;
            return Ok(Step::NeedMore);
        };

        let start = self.offset;
        let raw = self.take(len);
        let markup = decode_utf8(&raw, start)?;
        tracing::trace!("markup token at {} ({} bytes)", start, len);

        if markup.starts_with("<![CDATA[") {
            let body = &markup[CDATA_OPEN.len()..markup.len() - CDATA_CLOSE.len()];
            return Ok(Step::Emit(TagEvent::Text(body.to_string())));
        }

        if markup.starts_with("<!") || markup.starts_with("<?") {
            return Ok(Step::Skip);
        }

        if let Some(inner) = markup.strip_prefix("</") {
            let name = inner[..inner.len() - 1].trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(malformed(start, format!("bad closing tag '{}'", markup)));
            }
            return Ok(Step::Emit(TagEvent::CloseTag(name.to_string())));
        }

        let tag = parse_open_tag(markup, start)?;
        if tag.self_closing {
            self.pending.push_back(TagEvent::CloseTag(tag.name.clone()));
        }
        Ok(Step::Emit(TagEvent::OpenTag(tag)))
    }

    fn take(&mut self, len: usize) -> BytesMut {
        let raw = self.buffer.split_to(len);
        self.offset += len as u64;
        if self.buffer.is_empty() && self.buffer.capacity() > 4 * self.config.max_token_len {
            // Release memory held after an oversized token
            self.buffer = BytesMut::with_capacity(8192);
        }
        raw
    }

    fn check_token_len(&self, len: usize) -> Result<(), SaxError> {
        if len > self.config.max_token_len {
            return Err(SaxError::TokenTooLarge {
                size: len,
                max: self.config.max_token_len,
            });
        }
        Ok(())
    }

    fn drain<L: TagListener>(&mut self, listener: &mut L) -> Result<(), L::Error> {
        while let Some(event) = self.next_event()? {
            deliver(event, listener)?;
        }
        Ok(())
    }
}

impl Default for TagParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for TagParser {
    fn write<L: TagListener>(&mut self, chunk: &[u8], listener: &mut L) -> Result<(), L::Error> {
        self.feed(chunk)?;
        self.drain(listener)
    }

    fn end<L: TagListener>(&mut self, listener: &mut L) -> Result<(), L::Error> {
        self.finish()?;
        self.drain(listener)
    }
}

/// Length of the markup token at the front of `buf` (which starts with
/// `<`), or `None` if it is not complete yet.
fn markup_len(buf: &[u8]) -> Option<usize> {
    if buf.starts_with(COMMENT_OPEN) {
        return find(buf, COMMENT_OPEN.len(), COMMENT_CLOSE).map(|i| i + COMMENT_CLOSE.len());
    }
    if buf.starts_with(CDATA_OPEN) {
        return find(buf, CDATA_OPEN.len(), CDATA_CLOSE).map(|i| i + CDATA_CLOSE.len());
    }
    if is_partial_prefix(buf, COMMENT_OPEN) || is_partial_prefix(buf, CDATA_OPEN) {
        return None;
    }
    if buf.starts_with(PI_OPEN) {
        return find(buf, PI_OPEN.len(), PI_CLOSE).map(|i| i + PI_CLOSE.len());
    }

    // Tags and declarations: first '>' outside quotes (and, for
    // declarations, outside an internal subset)
    let declaration = buf.starts_with(b"<!");
    let mut quote = None;
    let mut depth = 0usize;
    for (i, &b) in buf.iter().enumerate().skip(1) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'[' if declaration => depth += 1,
                b']' if declaration => depth = depth.saturating_sub(1),
                b'>' if depth == 0 => return Some(i + 1),
                _ => {}
            },
        }
    }
    None
}

fn markup_kind(buf: &[u8]) -> &'static str {
    if buf.starts_with(COMMENT_OPEN) {
        "comment"
    } else if buf.starts_with(CDATA_OPEN) {
        "CDATA section"
    } else if buf.starts_with(PI_OPEN) {
        "processing instruction"
    } else if buf.starts_with(b"<!") {
        "declaration"
    } else {
        "tag"
    }
}

fn find(buf: &[u8], from: usize, pattern: &[u8]) -> Option<usize> {
    if buf.len() < from {
        return None;
    }
    buf[from..]
        .windows(pattern.len())
        .position(|w| w == pattern)
        .map(|i| i + from)
}

fn is_partial_prefix(buf: &[u8], pattern: &[u8]) -> bool {
    buf.len() < pattern.len() && pattern.starts_with(buf)
}

fn decode_utf8(raw: &[u8], offset: u64) -> Result<&str, SaxError> {
    std::str::from_utf8(raw).map_err(|e| SaxError::InvalidUtf8 {
        offset: offset + e.valid_up_to() as u64,
    })
}

fn malformed(offset: u64, reason: impl Into<String>) -> SaxError {
    SaxError::Malformed {
        offset,
        reason: reason.into(),
    }
}

/// Parses `<name attr="v" ...>` or `<name .../>`.
fn parse_open_tag(markup: &str, offset: u64) -> Result<OpenTag, SaxError> {
    let mut inner = &markup[1..markup.len() - 1];
    let self_closing = inner.ends_with('/');
    if self_closing {
        inner = &inner[..inner.len() - 1];
    }

    let name_end = inner.find(char::is_whitespace).unwrap_or(inner.len());
    let name = &inner[..name_end];
    if name.is_empty() {
        return Err(malformed(offset, "empty tag name"));
    }

    Ok(OpenTag {
        name: name.to_string(),
        attributes: parse_attributes(&inner[name_end..], offset)?,
        self_closing,
    })
}

/// Parses `key="v" key='v' key=v key` sequences. Later duplicates win.
fn parse_attributes(s: &str, offset: u64) -> Result<BTreeMap<String, String>, SaxError> {
    let mut attributes = BTreeMap::new();
    let mut rest = s.trim_start();

    while !rest.is_empty() {
        let key_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let key = &rest[..key_end];
        if key.is_empty() {
            return Err(malformed(offset, "attribute without a name"));
        }
        rest = rest[key_end..].trim_start();

        let value = match rest.strip_prefix('=') {
            Some(after_eq) => {
                let after_eq = after_eq.trim_start();
                match after_eq.chars().next() {
                    Some(q @ ('"' | '\'')) => {
                        let body = &after_eq[1..];
                        let close = body.find(q).ok_or_else(|| {
                            malformed(offset, format!("unterminated value for '{}'", key))
                        })?;
                        rest = &body[close + 1..];
                        unescape(&body[..close]).into_owned()
                    }
                    Some(_) => {
                        let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
                        rest = &after_eq[end..];
                        unescape(&after_eq[..end]).into_owned()
                    }
                    None => {
                        return Err(malformed(offset, format!("missing value for '{}'", key)));
                    }
                }
            }
            None => String::new(),
        };

        attributes.insert(key.to_string(), value);
        rest = rest.trim_start();
    }

    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Vec<TagEvent> {
        TagParser::parse_all(input.as_bytes(), ParserConfig::default()).unwrap()
    }

    fn open(name: &str) -> TagEvent {
        TagEvent::OpenTag(OpenTag::new(name))
    }

    fn close(name: &str) -> TagEvent {
        TagEvent::CloseTag(name.to_string())
    }

    fn text(data: &str) -> TagEvent {
        TagEvent::Text(data.to_string())
    }

    #[test]
    fn test_simple_document() {
        assert_eq!(
            parse("<list><item>one</item></list>"),
            vec![
                open("list"),
                open("item"),
                text("one"),
                close("item"),
                close("list"),
                TagEvent::End,
            ]
        );
    }

    #[test]
    fn test_attributes() {
        let events = parse(r#"<a href="/x?a=1&amp;b=2" title='it"s' flag data-n=3>"#);
        let TagEvent::OpenTag(tag) = &events[0] else {
            panic!("expected open tag, got {:?}", events[0]);
        };
        assert_eq!(tag.name, "a");
        assert_eq!(tag.attribute("href"), Some("/x?a=1&b=2"));
        assert_eq!(tag.attribute("title"), Some("it\"s"));
        assert_eq!(tag.attribute("flag"), Some(""));
        assert_eq!(tag.attribute("data-n"), Some("3"));
    }

    #[test]
    fn test_quoted_gt_does_not_end_tag() {
        let events = parse(r#"<a expr="x > 1">y</a>"#);
        let TagEvent::OpenTag(tag) = &events[0] else {
            panic!("expected open tag");
        };
        assert_eq!(tag.attribute("expr"), Some("x > 1"));
        assert_eq!(events[1], text("y"));
    }

    #[test]
    fn test_self_closing_emits_open_then_close() {
        let events = parse(r#"<root><br/><img src="a.png" /></root>"#);
        assert_eq!(events.len(), 7);
        assert!(matches!(&events[1], TagEvent::OpenTag(t) if t.name == "br" && t.self_closing));
        assert_eq!(events[2], close("br"));
        assert!(matches!(&events[3], TagEvent::OpenTag(t) if t.attribute("src") == Some("a.png")));
        assert_eq!(events[4], close("img"));
    }

    #[test]
    fn test_text_entities_decoded() {
        assert_eq!(
            parse("<p>a &lt; b &amp;&amp; c</p>"),
            vec![open("p"), text("a < b && c"), close("p"), TagEvent::End]
        );
    }

    #[test]
    fn test_cdata_is_verbatim_text() {
        assert_eq!(
            parse("<p><![CDATA[<not> &amp; a tag]]></p>"),
            vec![open("p"), text("<not> &amp; a tag"), close("p"), TagEvent::End]
        );
    }

    #[test]
    fn test_skipped_markup() {
        let input = r#"<?xml version="1.0"?><!DOCTYPE doc [<!ENTITY e "v">]><!-- note --><doc/>"#;
        assert_eq!(
            parse(input),
            vec![
                TagEvent::OpenTag(OpenTag {
                    name: "doc".to_string(),
                    attributes: BTreeMap::new(),
                    self_closing: true,
                }),
                close("doc"),
                TagEvent::End,
            ]
        );
    }

    #[test]
    fn test_whitespace_text() {
        let input = "<a>\n  <b>x</b>\n</a>";
        let events = parse(input);
        assert_eq!(events[1], text("\n  "));

        let config = ParserConfig::default().with_skip_whitespace_text(true);
        let events = TagParser::parse_all(input.as_bytes(), config).unwrap();
        assert_eq!(
            events,
            vec![open("a"), open("b"), text("x"), close("b"), close("a"), TagEvent::End]
        );
    }

    #[test]
    fn test_trailing_text_flushed_at_finish() {
        let mut parser = TagParser::new();
        parser.feed(b"<a/>tail").unwrap();
        assert_eq!(parser.next_event().unwrap(), Some(TagEvent::OpenTag(OpenTag {
            name: "a".to_string(),
            attributes: BTreeMap::new(),
            self_closing: true,
        })));
        assert_eq!(parser.next_event().unwrap(), Some(close("a")));
        // Text is held until its end is known
        assert_eq!(parser.next_event().unwrap(), None);
        assert_eq!(parser.buffered(), 4);

        parser.finish().unwrap();
        assert_eq!(parser.next_event().unwrap(), Some(text("tail")));
        assert_eq!(parser.next_event().unwrap(), Some(TagEvent::End));
        assert_eq!(parser.next_event().unwrap(), None);
    }

    #[test]
    fn test_chunk_boundaries() {
        let input = "<doc a=\"1\"><!-- c --><x>h\u{e9}llo &amp; bye</x><![CDATA[z]]></doc>";
        let expected = parse(input);

        for split in 1..input.len() {
            let bytes = input.as_bytes();
            let mut parser = TagParser::new();
            let mut events = Vec::new();
            parser.write(&bytes[..split], &mut events).unwrap();
            parser.write(&bytes[split..], &mut events).unwrap();
            parser.end(&mut events).unwrap();
            assert_eq!(events, expected, "split at {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let input = "<r><i n='1'>a</i><i n='2'/></r>";
        let mut parser = TagParser::new();
        let mut events = Vec::new();
        for b in input.as_bytes() {
            parser.write(std::slice::from_ref(b), &mut events).unwrap();
        }
        parser.end(&mut events).unwrap();
        assert_eq!(events, parse(input));
    }

    #[test]
    fn test_offsets_advance() {
        let mut parser = TagParser::new();
        parser.feed(b"<a>bc</a>").unwrap();
        parser.next_event().unwrap();
        assert_eq!(parser.offset(), 3);
        parser.next_event().unwrap();
        assert_eq!(parser.offset(), 5);
    }

    #[test]
    fn test_malformed_tags() {
        let result = TagParser::parse_all(b"a < b", ParserConfig::default());
        assert!(matches!(result, Err(SaxError::UnexpectedEof { construct: "tag", .. })));

        let result = TagParser::parse_all(b"<>", ParserConfig::default());
        assert!(matches!(result, Err(SaxError::Malformed { offset: 0, .. })));

        let result = TagParser::parse_all(b"<a></a b>", ParserConfig::default());
        assert!(matches!(result, Err(SaxError::Malformed { offset: 3, .. })));

        let result = TagParser::parse_all(b"<a x=>", ParserConfig::default());
        assert!(matches!(result, Err(SaxError::Malformed { .. })));

        let result = TagParser::parse_all(b"<a =\"v\">", ParserConfig::default());
        assert!(matches!(result, Err(SaxError::Malformed { .. })));
    }

    #[test]
    fn test_unterminated_constructs() {
        let result = TagParser::parse_all(b"<a><!-- open", ParserConfig::default());
        assert!(matches!(
            result,
            Err(SaxError::UnexpectedEof { offset: 3, construct: "comment" })
        ));

        let result = TagParser::parse_all(b"<![CDATA[x", ParserConfig::default());
        assert!(matches!(
            result,
            Err(SaxError::UnexpectedEof { construct: "CDATA section", .. })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let result = TagParser::parse_all(b"<a>\xff</a>", ParserConfig::default());
        assert_eq!(result, Err(SaxError::InvalidUtf8 { offset: 3 }));
    }

    #[test]
    fn test_token_too_large() {
        let config = ParserConfig::default().with_max_token_len(8);
        let mut parser = TagParser::with_config(config);
        parser.feed(b"<averylongtagname").unwrap();
        assert!(matches!(
            parser.next_event(),
            Err(SaxError::TokenTooLarge { size: 17, max: 8 })
        ));
    }

    #[test]
    fn test_write_after_end() {
        let mut parser = TagParser::new();
        let mut events = Vec::new();
        parser.end(&mut events).unwrap();
        assert_eq!(events, vec![TagEvent::End]);
        assert_eq!(parser.write(b"<a>", &mut events), Err(SaxError::Ended));
        assert_eq!(parser.end(&mut events), Err(SaxError::Ended));
    }
}
