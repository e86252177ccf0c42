use std::borrow::Cow;

use chrono::{DateTime, FixedOffset};

use crate::{
    error::ParseError,
    invariants::{Hostname, StatusCode},
    models::{LogRecord, TS_FORMAT},
};

/// A field of a combined-format line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    /// Whitespace-delimited, e.g. `127.0.0.1` or `200`.
    Bare(&'a str),
    /// `[...]`, brackets stripped.
    Bracketed(&'a str),
    /// `"..."`, quotes stripped and `\"` / `\\` unescaped.
    Quoted(Cow<'a, str>),
}

/// Splits a line into tokens. Quoted and bracketed spans may contain spaces.
fn tokenize(line: &str) -> Result<Vec<Token<'_>>, ParseError> {
    let mut tokens = Vec::with_capacity(9);
    let mut rest = line.trim_start();
    while !rest.is_empty() {
        let (token, remaining) = match rest.as_bytes()[0] {
            b'[' => {
                let end = rest
                    .find(']')
                    .ok_or(ParseError::MalformedLine("unterminated [timestamp]"))?;
                (Token::Bracketed(&rest[1..end]), &rest[end + 1..])
            }
            b'"' => {
                let (value, consumed) = take_quoted(&rest[1..])?;
                (Token::Quoted(value), &rest[1 + consumed..])
            }
            _ => {
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                (Token::Bare(&rest[..end]), &rest[end..])
            }
        };
        if !remaining.is_empty() && !remaining.starts_with(char::is_whitespace) {
            return Err(ParseError::MalformedLine("missing space between fields"));
        }
        tokens.push(token);
        rest = remaining.trim_start();
    }
    Ok(tokens)
}

/// Reads a quoted span whose opening quote has already been consumed.
/// Returns the unescaped value and the number of bytes consumed, closing quote included.
fn take_quoted(s: &str) -> Result<(Cow<'_, str>, usize), ParseError> {
    let mut owned: Option<String> = None;
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                let value = owned.map_or(Cow::Borrowed(&s[..i]), Cow::Owned);
                return Ok((value, i + 1));
            }
            '\\' => {
                let buf = owned.get_or_insert_with(|| s[..i].to_string());
                match chars.next() {
                    Some((_, escaped @ ('"' | '\\'))) => buf.push(escaped),
                    Some((_, other)) => {
                        buf.push('\\');
                        buf.push(other);
                    }
                    None => break,
                }
            }
            _ => {
                if let Some(buf) = owned.as_mut() {
                    buf.push(c);
                }
            }
        }
    }
    Err(ParseError::MalformedLine("unterminated quoted field"))
}

/// Parses one line of the Apache/NCSA combined log format:
///
/// `host logname user [timestamp] "method path protocol" status bytes "referer" "user-agent"`
///
/// Bytes, referer and user agent may be missing; `-` stands for an absent value.
pub fn parse_line(line: &str) -> Result<LogRecord, ParseError> {
    let tokens = tokenize(line)?;
    let mut tokens = tokens.into_iter();

    let remote_host: Hostname = bare(tokens.next())?.parse()?;
    let remote_logname = bare(tokens.next())?.to_string();
    let user = bare(tokens.next())?.to_string();

    let timestamp = match tokens.next() {
        Some(Token::Bracketed(ts)) => parse_timestamp(ts)?,
        _ => return Err(ParseError::MalformedLine("expected [timestamp]")),
    };

    let (method, path, protocol) = match tokens.next() {
        Some(Token::Quoted(request)) => split_request(&request)?,
        _ => return Err(ParseError::MalformedLine("expected quoted request line")),
    };

    let status: StatusCode = bare(tokens.next())?.parse()?;

    let bytes_sent: u64 = match tokens.next() {
        None | Some(Token::Bare("-")) => 0,
        Some(Token::Bare(bytes)) => parse_bytes(bytes)?,
        Some(_) => return Err(ParseError::MalformedLine("expected byte count")),
    };

    let referer = optional_quoted(tokens.next(), "expected quoted referer")?;
    let user_agent = optional_quoted(tokens.next(), "expected quoted user agent")?;

    Ok(LogRecord {
        remote_host,
        remote_logname,
        user,
        timestamp,
        method,
        path,
        protocol,
        status,
        bytes_sent,
        referer,
        user_agent,
    })
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Accepts exactly `dd/Mon/yyyy:HH:mm:ss ±HHMM`; chrono alone also takes
/// one-digit days, any month case and `±HH:MM` offsets.
fn parse_timestamp(ts: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    let bad = || ParseError::BadTimestamp(ts.to_string());
    let b = ts.as_bytes();
    if b.len() != 26 {
        return Err(bad());
    }
    let digits_at = |range: std::ops::Range<usize>| b[range].iter().all(u8::is_ascii_digit);
    let shape_ok = digits_at(0..2)
        && b[2] == b'/'
        && MONTHS.iter().any(|m| m.as_bytes() == &b[3..6])
        && b[6] == b'/'
        && digits_at(7..11)
        && b[11] == b':'
        && digits_at(12..14)
        && b[14] == b':'
        && digits_at(15..17)
        && b[17] == b':'
        && digits_at(18..20)
        && b[20] == b' '
        && matches!(b[21], b'+' | b'-')
        && digits_at(22..26);
    if !shape_ok {
        return Err(bad());
    }
    DateTime::parse_from_str(ts, TS_FORMAT).map_err(|_| bad())
}

/// Unsigned decimal that fits the store's signed 64-bit integer column.
fn parse_bytes(bytes: &str) -> Result<u64, ParseError> {
    let bad = || ParseError::BadNumber {
        field: "bytes",
        value: bytes.to_string(),
    };
    if !is_unsigned_decimal(bytes) {
        return Err(bad());
    }
    let value: i64 = bytes.parse().map_err(|_| bad())?;
    u64::try_from(value).map_err(|_| bad())
}

/// Digits only: no sign, no whitespace.
pub(crate) fn is_unsigned_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn bare<'a>(token: Option<Token<'a>>) -> Result<&'a str, ParseError> {
    match token {
        Some(Token::Bare(s)) => Ok(s),
        Some(_) => Err(ParseError::MalformedLine("unexpected quoted or bracketed field")),
        None => Err(ParseError::MalformedLine("too few fields")),
    }
}

fn optional_quoted(
    token: Option<Token<'_>>,
    reason: &'static str,
) -> Result<Option<String>, ParseError> {
    match token {
        None => Ok(None),
        Some(Token::Quoted(value)) if value.is_empty() || value == "-" => Ok(None),
        Some(Token::Quoted(value)) => Ok(Some(value.into_owned())),
        Some(_) => Err(ParseError::MalformedLine(reason)),
    }
}

fn split_request(request: &str) -> Result<(String, String, String), ParseError> {
    let parts: Vec<&str> = request.split_whitespace().collect();
    match parts.as_slice() {
        [method, path @ .., protocol] if !path.is_empty() => {
            Ok((method.to_string(), path.join(" "), protocol.to_string()))
        }
        _ => Err(ParseError::MalformedLine(
            "request line needs method, path and protocol",
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use asserting::prelude::*;
    use chrono::TimeZone;

    const EXAMPLE: &str = r#"127.0.0.1 - - [10/Oct/2023:13:55:36 -0700] "GET /index.html HTTP/1.0" 200 2326 "-" "Mozilla/5.0""#;

    #[test]
    fn parse_line_combined_example() {
        let record = parse_line(EXAMPLE).unwrap();
        assert_that!(record.remote_host.as_str()).is_equal_to("127.0.0.1");
        assert_that!(record.remote_logname.as_str()).is_equal_to("-");
        assert_that!(record.user.as_str()).is_equal_to("-");
        assert_that!(record.timestamp).is_equal_to(
            FixedOffset::west_opt(7 * 3600)
                .unwrap()
                .with_ymd_and_hms(2023, 10, 10, 13, 55, 36)
                .unwrap(),
        );
        assert_that!(record.timestamp.offset().local_minus_utc()).is_equal_to(-7 * 3600);
        assert_that!(record.method.as_str()).is_equal_to("GET");
        assert_that!(record.path.as_str()).is_equal_to("/index.html");
        assert_that!(record.protocol.as_str()).is_equal_to("HTTP/1.0");
        assert_that!(record.status.as_u16()).is_equal_to(200);
        assert_that!(record.bytes_sent).is_equal_to(2326);
        assert_that!(record.referer).is_none();
        assert_that!(record.user_agent).is_equal_to(Some("Mozilla/5.0".to_string()));
    }

    #[test]
    fn quoted_fields_keep_embedded_spaces() {
        let line = r#"10.1.2.3 - frank [01/Jun/1995:00:00:59 +0000] "POST /api/v1 HTTP/1.1" 201 15 "http://example.com/a b" "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101""#;
        let record = parse_line(line).unwrap();
        assert_that!(record.user.as_str()).is_equal_to("frank");
        assert_that!(record.referer).is_equal_to(Some("http://example.com/a b".to_string()));
        assert_that!(record.user_agent).is_equal_to(Some(
            "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101".to_string(),
        ));
    }

    #[test]
    fn escaped_quotes_are_unescaped() {
        let line = r#"h - - [01/Jun/1995:00:00:59 +0000] "GET /q HTTP/1.1" 200 1 "-" "say \"hi\"""#;
        let record = parse_line(line).unwrap();
        assert_that!(record.user_agent).is_equal_to(Some(r#"say "hi""#.to_string()));
    }

    #[test]
    fn common_format_without_trailing_fields() {
        let line = r#"202.32.92.47 - - [01/Jun/1995:00:00:59 -0600] "GET /~scottp/publish.html HTTP/1.0" 200 271"#;
        let record = parse_line(line).unwrap();
        assert_that!(record.bytes_sent).is_equal_to(271);
        assert_that!(record.referer).is_none();
        assert_that!(record.user_agent).is_none();
    }

    #[test]
    fn missing_or_dash_bytes_default_to_zero() {
        let missing = r#"h - - [01/Jun/1995:00:00:59 -0600] "GET / HTTP/1.0" 304"#;
        let dash = r#"h - - [01/Jun/1995:00:00:59 -0600] "GET / HTTP/1.0" 304 -"#;
        assert_that!(parse_line(missing).map(|r| r.bytes_sent)).is_equal_to(Ok(0));
        assert_that!(parse_line(dash).map(|r| r.bytes_sent)).is_equal_to(Ok(0));
    }

    #[test]
    fn empty_quoted_referer_is_absent() {
        let line = r#"h - - [01/Jun/1995:00:00:59 -0600] "GET / HTTP/1.0" 200 5 "" "curl/8.0""#;
        let record = parse_line(line).unwrap();
        assert_that!(record.referer).is_none();
        assert_that!(record.user_agent).is_equal_to(Some("curl/8.0".to_string()));
    }

    #[test]
    fn too_few_tokens_is_malformed() {
        for line in [
            "",
            "127.0.0.1 - -",
            r#"127.0.0.1 - - [10/Oct/2023:13:55:36 -0700] "GET /index.html HTTP/1.0""#,
            r#"127.0.0.1 - - [10/Oct/2023:13:55:36 -0700] "GET /index.html" 200 5"#,
        ] {
            assert_that!(matches!(
                parse_line(line),
                Err(ParseError::MalformedLine(_))
            ))
            .is_true();
        }
    }

    #[test]
    fn unterminated_spans_are_malformed() {
        let quote = r#"h - - [10/Oct/2023:13:55:36 -0700] "GET / HTTP/1.0 200 5"#;
        let bracket = r#"h - - [10/Oct/2023:13:55:36 -0700 "GET / HTTP/1.0" 200 5"#;
        assert_that!(matches!(parse_line(quote), Err(ParseError::MalformedLine(_)))).is_true();
        assert_that!(matches!(parse_line(bracket), Err(ParseError::MalformedLine(_)))).is_true();
    }

    #[test]
    fn bad_timestamp() {
        let line = r#"h - - [2023-10-10T13:55:36Z] "GET / HTTP/1.0" 200 5"#;
        assert_that!(parse_line(line))
            .is_equal_to(Err(ParseError::BadTimestamp("2023-10-10T13:55:36Z".into())));
    }

    #[test]
    fn timestamp_must_match_exact_pattern() {
        for ts in [
            "10/Oct/2023:13:55:36 -07:00",
            "1/Oct/2023:13:55:36 -0700",
            "10/oct/2023:13:55:36 -0700",
            "10/OCT/2023:13:55:36 -0700",
            "10/Oct/2023:13:55:36 0700",
        ] {
            let line = format!(r#"h - - [{ts}] "GET / HTTP/1.0" 200 5"#);
            assert_that!(parse_line(&line)).is_equal_to(Err(ParseError::BadTimestamp(ts.into())));
        }
    }

    #[test]
    fn signed_numbers_are_rejected() {
        let status = r#"h - - [10/Oct/2023:13:55:36 -0700] "GET / HTTP/1.0" +200 5"#;
        let bytes = r#"h - - [10/Oct/2023:13:55:36 -0700] "GET / HTTP/1.0" 200 +5"#;
        assert_that!(parse_line(status)).is_equal_to(Err(ParseError::BadNumber {
            field: "status",
            value: "+200".into(),
        }));
        assert_that!(parse_line(bytes)).is_equal_to(Err(ParseError::BadNumber {
            field: "bytes",
            value: "+5".into(),
        }));
    }

    #[test]
    fn byte_count_beyond_signed_64_bits_is_bad_number() {
        let max = format!(
            r#"h - - [10/Oct/2023:13:55:36 -0700] "GET / HTTP/1.0" 200 {}"#,
            i64::MAX
        );
        let over = r#"h - - [10/Oct/2023:13:55:36 -0700] "GET / HTTP/1.0" 200 18446744073709551615"#;
        assert_that!(parse_line(&max).map(|r| r.bytes_sent)).is_equal_to(Ok(i64::MAX as u64));
        assert_that!(parse_line(over)).is_equal_to(Err(ParseError::BadNumber {
            field: "bytes",
            value: "18446744073709551615".into(),
        }));
    }

    #[test]
    fn bad_numbers() {
        let status = r#"h - - [10/Oct/2023:13:55:36 -0700] "GET / HTTP/1.0" OK 5"#;
        let range = r#"h - - [10/Oct/2023:13:55:36 -0700] "GET / HTTP/1.0" 999 5"#;
        let bytes = r#"h - - [10/Oct/2023:13:55:36 -0700] "GET / HTTP/1.0" 200 lots"#;
        assert_that!(parse_line(status)).is_equal_to(Err(ParseError::BadNumber {
            field: "status",
            value: "OK".into(),
        }));
        assert_that!(parse_line(range)).is_equal_to(Err(ParseError::BadNumber {
            field: "status",
            value: "999".into(),
        }));
        assert_that!(parse_line(bytes)).is_equal_to(Err(ParseError::BadNumber {
            field: "bytes",
            value: "lots".into(),
        }));
    }

    #[test]
    fn parse_is_deterministic() {
        assert_that!(parse_line(EXAMPLE)).is_equal_to(parse_line(EXAMPLE));
        let bad = "not a log line";
        assert_that!(parse_line(bad)).is_equal_to(parse_line(bad));
    }

    #[test]
    fn display_reparses_to_same_record() {
        for line in [
            EXAMPLE,
            r#"10.1.2.3 alice bob [01/Jun/1995:00:00:59 +0530] "PUT /a\"b HTTP/2.0" 500 0 "http://ref" "agent \\ x""#,
            r#"h - - [01/Jun/1995:00:00:59 -0600] "GET / HTTP/1.0" 304"#,
        ] {
            let record = parse_line(line).unwrap();
            assert_that!(parse_line(&record.to_string())).is_equal_to(Ok(record));
        }
    }

    #[test]
    fn tokenizer_recognizes_three_kinds() {
        assert_that!(tokenize(r#"a [b c] "d \"e\"""#)).is_equal_to(Ok(vec![
            Token::Bare("a"),
            Token::Bracketed("b c"),
            Token::Quoted(Cow::Owned(r#"d "e""#.to_string())),
        ]));
    }
}
