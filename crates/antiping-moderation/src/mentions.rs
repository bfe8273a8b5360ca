//! Mention counting over HTML message bodies.
//!
//! A mention is an `<a>` start tag whose `href` is a `matrix.to` user
//! permalink (`https://matrix.to/#/@user:server`). Counting stops as soon as
//! the caller's limit is reached, so a message with thousands of pings costs
//! no more than one with `limit`. Character references in attribute values
//! are decoded before the `href` is inspected.

use std::borrow::Cow;

const PERMALINK_HOST: &str = "matrix.to";

/// Count user mentions in `html`, stopping at `limit`.
pub fn count_mentions(html: &str, limit: usize) -> usize {
    let mut count = 0;
    if limit == 0 {
        return count;
    }
    for tag in StartTags::new(html) {
        if !tag.name.eq_ignore_ascii_case("a") {
            continue;
        }
        let mentions_user = tag.attributes.iter().any(|(name, value)| {
            name.eq_ignore_ascii_case("href") && value.is_some_and(|v| is_user_permalink(&decode_char_refs(v)))
        });
        if mentions_user {
            count += 1;
            if count >= limit {
                break;
            }
        }
    }
    count
}

/// Whether `href` is a `matrix.to` permalink to a user.
pub fn is_user_permalink(href: &str) -> bool {
    let Some((location, fragment)) = href.trim().split_once('#') else {
        return false;
    };
    let after_scheme = match location.split_once(':') {
        Some((scheme, rest)) if is_scheme(scheme) => rest,
        _ => location,
    };
    let Some(authority_and_path) = after_scheme.strip_prefix("//") else {
        return false;
    };
    let authority = authority_and_path
        .split(['/', '?'])
        .next()
        .unwrap_or_default();
    authority == PERMALINK_HOST && fragment.starts_with("/@")
}

/// Decode numeric (`&#64;`, `&#x40;`) and basic named (`&amp;`) character
/// references. Unknown references are left as written.
fn decode_char_refs(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }
    let mut decoded = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        decoded.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        match char_ref(after) {
            Some((ch, consumed)) => {
                decoded.push(ch);
                rest = &after[consumed..];
            }
            None => {
                decoded.push('&');
                rest = after;
            }
        }
    }
    decoded.push_str(rest);
    Cow::Owned(decoded)
}

/// Character and byte length of the reference at the start of `input`,
/// which follows an `&`. The trailing `;` is optional for numeric references.
fn char_ref(input: &str) -> Option<(char, usize)> {
    const NAMED: [(&str, char); 5] = [
        ("amp;", '&'),
        ("lt;", '<'),
        ("gt;", '>'),
        ("quot;", '"'),
        ("apos;", '\''),
    ];

    let Some(numeric) = input.strip_prefix('#') else {
        return NAMED
            .iter()
            .find(|(name, _)| input.starts_with(name))
            .map(|(name, ch)| (*ch, name.len()));
    };
    let (radix, digits) = match numeric.strip_prefix(['x', 'X']) {
        Some(hex) => (16, hex),
        None => (10, numeric),
    };
    let len = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    if len == 0 {
        return None;
    }
    let ch = u32::from_str_radix(&digits[..len], radix)
        .ok()
        .and_then(char::from_u32)
        .filter(|c| *c != '\0')
        .unwrap_or(char::REPLACEMENT_CHARACTER);
    let prefix = input.len() - digits.len();
    let terminator = usize::from(digits[len..].starts_with(';'));
    Some((ch, prefix + len + terminator))
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

struct StartTag<'a> {
    name: &'a str,
    attributes: Vec<(&'a str, Option<&'a str>)>,
}

/// Lazily yields start tags; comments, end tags and declarations are skipped.
struct StartTags<'a> {
    rest: &'a str,
}

impl<'a> StartTags<'a> {
    fn new(html: &'a str) -> Self {
        Self { rest: html }
    }
}

impl<'a> Iterator for StartTags<'a> {
    type Item = StartTag<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let open = self.rest.find('<')?;
            let rest = &self.rest[open + 1..];
            self.rest = rest;

            if let Some(comment) = rest.strip_prefix("!--") {
                self.rest = comment.find("-->").map_or("", |end| &comment[end + 3..]);
                continue;
            }

            let name_len = rest
                .find(|c: char| !c.is_ascii_alphanumeric())
                .unwrap_or(rest.len());
            if name_len == 0 {
                continue;
            }
            let name = &rest[..name_len];
            self.rest = &rest[name_len..];
            let attributes = self.parse_attributes();
            return Some(StartTag { name, attributes });
        }
    }
}

impl<'a> StartTags<'a> {
    fn parse_attributes(&mut self) -> Vec<(&'a str, Option<&'a str>)> {
        let mut attributes = Vec::new();
        loop {
            self.rest = self.rest.trim_start_matches(|c: char| c.is_whitespace() || c == '/');
            if self.rest.is_empty() {
                return attributes;
            }
            if let Some(after) = self.rest.strip_prefix('>') {
                self.rest = after;
                return attributes;
            }

            let rest = self.rest;
            let name_len = rest
                .find(|c: char| c.is_whitespace() || matches!(c, '=' | '>' | '/'))
                .unwrap_or(rest.len());
            let name = &rest[..name_len];
            self.rest = rest[name_len..].trim_start();

            let value = match self.rest.strip_prefix('=') {
                Some(after_eq) => {
                    self.rest = after_eq.trim_start();
                    Some(self.parse_value())
                }
                None => None,
            };
            attributes.push((name, value));
        }
    }

    fn parse_value(&mut self) -> &'a str {
        let rest = self.rest;
        if let Some(quote) = rest.chars().next().filter(|c| matches!(c, '"' | '\'')) {
            let body = &rest[1..];
            let end = body.find(quote).unwrap_or(body.len());
            self.rest = body.get(end + 1..).unwrap_or("");
            return &body[..end];
        }
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '>')
            .unwrap_or(rest.len());
        self.rest = &rest[end..];
        &rest[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pill(user: &str) -> String {
        format!(r#"<a href="https://matrix.to/#/{user}">{user}</a>"#)
    }

    #[test]
    fn test_counts_user_pills() {
        let body = format!("{} and {} hi", pill("@a:x.org"), pill("@b:x.org"));
        assert_eq!(count_mentions(&body, 10), 2);
    }

    #[test]
    fn test_stops_at_limit() {
        let body: String = (0..50).map(|i| pill(&format!("@u{i}:x.org"))).collect();
        assert_eq!(count_mentions(&body, 4), 4);
        assert_eq!(count_mentions(&body, 1), 1);
        assert_eq!(count_mentions(&body, 0), 0);
    }

    #[test]
    fn test_ignores_non_user_links() {
        let body = concat!(
            r#"<a href="https://matrix.to/#/!room:x.org">room</a>"#,
            r#"<a href="https://example.org/#/@a:x.org">elsewhere</a>"#,
            r#"<b href="https://matrix.to/#/@a:x.org">bold</b>"#,
            r#"<!-- <a href="https://matrix.to/#/@hidden:x.org"> -->"#,
            r"<a name=anchor>plain</a>",
        );
        assert_eq!(count_mentions(body, 10), 0);
    }

    #[test]
    fn test_attribute_forms() {
        let body = concat!(
            r"<A class=pill HREF='https://matrix.to/#/@a:x.org'>a</A>",
            r"<a href=https://matrix.to/#/@b:x.org>b</a>",
            r#"<a title="x" href="https://matrix.to/#/@c:x.org" href="https://matrix.to/#/@d:x.org">c</a>"#,
        );
        assert_eq!(count_mentions(body, 10), 3);
    }

    #[test]
    fn test_character_references_in_href() {
        let body = concat!(
            r#"<a href="https://matrix.to/#/&#64;a:x.org">a</a>"#,
            r#"<a href="https://matrix.to/#/&#x40;b:x.org">b</a>"#,
            r#"<a href="https&#58;//matrix.to/#/@c:x.org">c</a>"#,
            r#"<a href="https://matrix.to/#/&commat;d:x.org">d</a>"#,
        );
        assert_eq!(count_mentions(body, 10), 3);
    }

    #[test]
    fn test_decode_char_refs() {
        assert_eq!(decode_char_refs("plain"), "plain");
        assert_eq!(decode_char_refs("a&amp;b&lt;&gt;&quot;&apos;"), "a&b<>\"'");
        assert_eq!(decode_char_refs("&#64x&#X41;"), "@xA");
        assert_eq!(decode_char_refs("&unknown; & &#;"), "&unknown; & &#;");
        assert_eq!(decode_char_refs("&#1114112;"), "\u{fffd}");
    }

    #[test]
    fn test_permalink_detection() {
        assert!(is_user_permalink("https://matrix.to/#/@a:x.org"));
        assert!(is_user_permalink("//matrix.to/#/@a:x.org"));
        assert!(!is_user_permalink("https://matrix.to/#/#room:x.org"));
        assert!(!is_user_permalink("https://matrix.to:443/#/@a:x.org"));
        assert!(!is_user_permalink("matrix.to/#/@a:x.org"));
        assert!(!is_user_permalink("https://matrix.to/"));
    }
}
