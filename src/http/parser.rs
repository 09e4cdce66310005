//! HTTP message parsing
//!
//! Incremental parsers for requests and responses. Data is fed as it
//! arrives; a message is returned once the head and the whole body are in.

use super::{
    Error, Headers, HttpRequest, HttpResponse, Method, Result, Status, Version, MAX_HEAD_SIZE,
    MAX_REQUEST_BODY_SIZE,
};

/// Find the end of the message head (the blank line)
fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parse HTTP request line
///
/// Format: METHOD URI VERSION
/// Example: GET /index.html HTTP/1.1
pub fn parse_request_line(line: &str) -> Result<(Method, String, Version)> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    let [method, uri, version] = parts.as_slice() else {
        return Err(Error::Parse(format!(
            "Invalid request line: expected 3 parts, got {}",
            parts.len()
        )));
    };

    Ok((method.parse()?, uri.to_string(), version.parse()?))
}

/// Parse HTTP response status line
///
/// Format: VERSION STATUS [REASON]
/// Example: HTTP/1.1 200 OK
pub fn parse_status_line(line: &str) -> Result<(Version, Status, String)> {
    let mut parts = line.splitn(3, ' ');

    let version = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Parse(format!("Invalid status line: {}", line)))?
        .parse()?;
    let code = parts
        .next()
        .ok_or_else(|| Error::Parse(format!("Invalid status line: {}", line)))?;
    let status = Status::new(
        code.parse::<u16>()
            .map_err(|_| Error::Parse(format!("Invalid status code: {}", code)))?,
    )?;
    let reason = match parts.next() {
        Some(reason) if !reason.is_empty() => reason.to_string(),
        _ => status.reason_phrase().to_string(),
    };

    Ok((version, status, reason))
}

/// Split a head into its start line and parsed headers
fn parse_head(head: &[u8]) -> Result<(String, Headers)> {
    let text = std::str::from_utf8(head)
        .map_err(|_| Error::Parse("message head is not valid UTF-8".to_string()))?;
    let mut lines = text.split("\r\n");

    let start_line = lines.next().unwrap_or_default().to_string();
    let mut headers = Headers::new();
    for line in lines {
        let (name, value) = Headers::parse_header_line(line)?;
        headers.insert(name, value)?;
    }

    Ok((start_line, headers))
}

/// Body framing decided from the headers
#[derive(Debug, Clone, Copy, PartialEq)]
enum BodyFraming {
    Length(usize),
    UntilClose,
}

#[derive(Debug)]
enum ParserState<H> {
    Head,
    Body { head: H, framing: BodyFraming },
    Complete,
}

/// Accumulates bytes and pulls out the head once it is complete
#[derive(Debug, Default)]
struct HeadBuffer {
    buffer: Vec<u8>,
}

impl HeadBuffer {
    fn take_head(&mut self) -> Result<Option<(String, Headers)>> {
        match find_head_end(&self.buffer) {
            Some(end) => {
                let parsed = parse_head(&self.buffer[..end])?;
                self.buffer.drain(..end + 4);
                Ok(Some(parsed))
            }
            None if self.buffer.len() > MAX_HEAD_SIZE => Err(Error::Parse(format!(
                "message head larger than {} bytes",
                MAX_HEAD_SIZE
            ))),
            None => Ok(None),
        }
    }

    fn take_body(&mut self, framing: BodyFraming) -> Option<Vec<u8>> {
        match framing {
            BodyFraming::Length(len) if self.buffer.len() >= len => {
                Some(self.buffer.drain(..len).collect())
            }
            _ => None,
        }
    }
}

fn reject_chunked(headers: &Headers) -> Result<()> {
    match headers.get("Transfer-Encoding") {
        Some(te) if !te.eq_ignore_ascii_case("identity") => Err(Error::Protocol(format!(
            "unsupported Transfer-Encoding: {}",
            te
        ))),
        _ => Ok(()),
    }
}

struct RequestHead {
    method: Method,
    uri: String,
    version: Version,
    headers: Headers,
}

/// HTTP request parser
pub struct RequestParser {
    state: ParserState<RequestHead>,
    input: HeadBuffer,
}

impl RequestParser {
    pub fn new() -> Self {
        RequestParser {
            state: ParserState::Head,
            input: HeadBuffer::default(),
        }
    }

    /// Feed data to the parser
    ///
    /// Returns Ok(Some(request)) when a complete request is parsed,
    /// Ok(None) if more data is needed, or Err on parse error.
    pub fn parse(&mut self, data: &[u8]) -> Result<Option<HttpRequest>> {
        self.input.buffer.extend_from_slice(data);

        if let ParserState::Head = self.state {
            let Some((start_line, headers)) = self.input.take_head()? else {
                return Ok(None);
            };
            let (method, uri, version) = parse_request_line(&start_line)?;
            reject_chunked(&headers)?;
            // Requests without Content-Length carry no body
            let len = headers.content_length()?.unwrap_or(0);
            if len > MAX_REQUEST_BODY_SIZE {
                return Err(Error::Protocol(format!(
                    "request body of {} bytes exceeds {} bytes",
                    len, MAX_REQUEST_BODY_SIZE
                )));
            }
            let framing = BodyFraming::Length(len);
            self.state = ParserState::Body {
                head: RequestHead {
                    method,
                    uri,
                    version,
                    headers,
                },
                framing,
            };
        }

        let framing = match &self.state {
            ParserState::Body { framing, .. } => *framing,
            _ => return Ok(None),
        };
        let Some(body) = self.input.take_body(framing) else {
            return Ok(None);
        };

        match std::mem::replace(&mut self.state, ParserState::Complete) {
            ParserState::Body { head, .. } => Ok(Some(
                HttpRequest::builder()
                    .method(head.method)
                    .uri(head.uri)
                    .version(head.version)
                    .headers(head.headers)
                    .body(body)
                    .build(),
            )),
            _ => Ok(None),
        }
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

struct ResponseHead {
    version: Version,
    status: Status,
    reason: String,
    headers: Headers,
}

impl ResponseHead {
    fn into_response(self, body: Vec<u8>) -> HttpResponse {
        HttpResponse::builder()
            .version(self.version)
            .status(self.status)
            .reason(self.reason)
            .headers(self.headers)
            .body(body)
            .build()
    }
}

/// HTTP response parser
pub struct ResponseParser {
    state: ParserState<ResponseHead>,
    input: HeadBuffer,
}

impl ResponseParser {
    pub fn new() -> Self {
        ResponseParser {
            state: ParserState::Head,
            input: HeadBuffer::default(),
        }
    }

    /// Feed data to the parser
    ///
    /// Returns Ok(Some(response)) when a complete response is parsed,
    /// Ok(None) if more data is needed, or Err on parse error. A response
    /// without Content-Length is only complete at end of stream, see
    /// [`ResponseParser::finish`].
    pub fn parse(&mut self, data: &[u8]) -> Result<Option<HttpResponse>> {
        self.input.buffer.extend_from_slice(data);

        if let ParserState::Head = self.state {
            let Some((start_line, headers)) = self.input.take_head()? else {
                return Ok(None);
            };
            let (version, status, reason) = parse_status_line(&start_line)?;
            reject_chunked(&headers)?;
            let framing = match headers.content_length()? {
                Some(len) => BodyFraming::Length(len),
                None => BodyFraming::UntilClose,
            };
            self.state = ParserState::Body {
                head: ResponseHead {
                    version,
                    status,
                    reason,
                    headers,
                },
                framing,
            };
        }

        let framing = match &self.state {
            ParserState::Body { framing, .. } => *framing,
            _ => return Ok(None),
        };
        let Some(body) = self.input.take_body(framing) else {
            return Ok(None);
        };

        match std::mem::replace(&mut self.state, ParserState::Complete) {
            ParserState::Body { head, .. } => Ok(Some(head.into_response(body))),
            _ => Ok(None),
        }
    }

    /// The peer closed the stream: complete a read-until-close response
    pub fn finish(&mut self) -> Result<HttpResponse> {
        match std::mem::replace(&mut self.state, ParserState::Complete) {
            ParserState::Body {
                head,
                framing: BodyFraming::UntilClose,
            } => Ok(head.into_response(std::mem::take(&mut self.input.buffer))),
            _ => Err(Error::ConnectionClosed),
        }
    }

    /// Reset the parser for reuse
    pub fn reset(&mut self) {
        self.state = ParserState::Head;
        self.input.buffer.clear();
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}
