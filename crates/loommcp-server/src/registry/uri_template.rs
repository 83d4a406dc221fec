//! RFC 6570 URI templates, Level 1 and 2.
//!
//! Level 1 is simple expansion (`{var}`): values are percent-encoded and a
//! matched value never crosses a `/`. Level 2 adds reserved expansion
//! (`{+var}`), which preserves reserved characters such as `/`, `:`, and
//! `@`, and fragment expansion (`{#var}`).

use std::collections::HashMap;

use loommcp_protocol::{Error, Result};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Characters escaped by simple expansion: everything but unreserved
const SIMPLE_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    /// `{var}`: percent-encoded, stops at `/`
    Simple(String),
    /// `{+var}`: reserved characters pass through
    Reserved(String),
    /// `{#var}`: reserved expansion behind a literal `#`
    Fragment(String),
}

/// A parsed URI template that can expand values and match concrete URIs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    source: String,
    tokens: Vec<Token>,
}

impl UriTemplate {
    /// Parse `template`, rejecting expressions beyond Level 2
    ///
    /// # Errors
    ///
    /// Fails on unbalanced braces, empty expressions, multi-variable
    /// expressions, and operators outside `+`/`#`.
    pub fn parse(template: &str) -> Result<Self> {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '{' {
                if c == '}' {
                    return Err(Error::InvalidParams("unbalanced '}' in URI template".into()));
                }
                literal.push(c);
                continue;
            }

            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }

            let mut expression = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                expression.push(c);
            }
            if !closed {
                return Err(Error::InvalidParams("unbalanced '{' in URI template".into()));
            }
            if expression.is_empty() {
                return Err(Error::InvalidParams("empty expression in URI template".into()));
            }
            if expression.contains(',') {
                return Err(Error::InvalidParams(
                    "multi-variable expressions are not supported".into(),
                ));
            }

            let token = match expression.strip_prefix('+') {
                Some(name) => Token::Reserved(validate_name(name)?),
                None => match expression.strip_prefix('#') {
                    Some(name) => Token::Fragment(validate_name(name)?),
                    None => Token::Simple(validate_name(&expression)?),
                },
            };
            tokens.push(token);
        }

        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        Ok(Self {
            source: template.to_string(),
            tokens,
        })
    }

    /// The template text as given
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Variable names, in template order
    pub fn variables(&self) -> Vec<&str> {
        self.tokens
            .iter()
            .filter_map(|token| match token {
                Token::Simple(name) | Token::Reserved(name) | Token::Fragment(name) => {
                    Some(name.as_str())
                }
                Token::Literal(_) => None,
            })
            .collect()
    }

    /// Expand the template with `values`
    ///
    /// Simple variables are percent-encoded; reserved and fragment variables
    /// pass reserved characters through untouched. Missing variables expand
    /// to nothing, per RFC 6570.
    pub fn expand(&self, values: &HashMap<String, String>) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(lit) => out.push_str(lit),
                Token::Simple(name) => {
                    if let Some(value) = values.get(name) {
                        out.push_str(&utf8_percent_encode(value, SIMPLE_ESCAPE).to_string());
                    }
                }
                Token::Reserved(name) => {
                    if let Some(value) = values.get(name) {
                        out.push_str(value);
                    }
                }
                Token::Fragment(name) => {
                    if let Some(value) = values.get(name) {
                        out.push('#');
                        out.push_str(value);
                    }
                }
            }
        }
        out
    }

    /// Match a concrete URI against the template, capturing variable values
    ///
    /// Simple variables never match across `/`; reserved and fragment
    /// variables may. Returns `None` when the URI does not fit.
    pub fn match_uri(&self, uri: &str) -> Option<HashMap<String, String>> {
        let mut values = HashMap::new();
        let mut rest = uri;

        for (index, token) in self.tokens.iter().enumerate() {
            match token {
                Token::Literal(lit) => {
                    rest = rest.strip_prefix(lit.as_str())?;
                }
                Token::Simple(name) | Token::Reserved(name) | Token::Fragment(name) => {
                    let mut remainder = rest;
                    if matches!(token, Token::Fragment(_)) {
                        remainder = remainder.strip_prefix('#')?;
                    }

                    // A capture runs until the next literal, or to the end
                    // when the variable is the final token.
                    let (raw, new_rest) = match self.tokens.get(index + 1) {
                        Some(Token::Literal(next)) => {
                            let at = remainder.find(next.as_str())?;
                            (&remainder[..at], &remainder[at..])
                        }
                        Some(_) => return None,
                        None => (remainder, ""),
                    };

                    if raw.is_empty() {
                        return None;
                    }
                    if matches!(token, Token::Simple(_)) && raw.contains('/') {
                        return None;
                    }

                    let value = percent_decode_str(raw).decode_utf8().ok()?.into_owned();
                    values.insert(name.clone(), value);
                    rest = new_rest;
                }
            }
        }

        rest.is_empty().then_some(values)
    }
}

fn validate_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(Error::InvalidParams("empty variable name in URI template".into()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(Error::InvalidParams(format!(
            "invalid variable name in URI template: {name}"
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn level1_expansion_percent_encodes() {
        let template = UriTemplate::parse("file:///notes/{name}").unwrap();
        assert_eq!(
            template.expand(&vars(&[("name", "hello world")])),
            "file:///notes/hello%20world"
        );
    }

    #[test]
    fn level2_reserved_preserves_path_characters() {
        let template = UriTemplate::parse("file:///{+path}").unwrap();
        assert_eq!(
            template.expand(&vars(&[("path", "a/b:c@d")])),
            "file:///a/b:c@d"
        );
    }

    #[test]
    fn fragment_expansion() {
        let template = UriTemplate::parse("doc://{name}{#section}").unwrap();
        assert_eq!(
            template.expand(&vars(&[("name", "guide"), ("section", "intro")])),
            "doc://guide#intro"
        );
    }

    #[test]
    fn simple_match_rejects_slash() {
        let template = UriTemplate::parse("file:///notes/{name}").unwrap();
        let captured = template.match_uri("file:///notes/today").unwrap();
        assert_eq!(captured["name"], "today");
        assert!(template.match_uri("file:///notes/a/b").is_none());
    }

    #[test]
    fn reserved_match_crosses_slashes() {
        let template = UriTemplate::parse("file:///{+path}").unwrap();
        let captured = template.match_uri("file:///a/b/c").unwrap();
        assert_eq!(captured["path"], "a/b/c");
    }

    #[test]
    fn match_decodes_percent_escapes() {
        let template = UriTemplate::parse("file:///notes/{name}").unwrap();
        let captured = template.match_uri("file:///notes/hello%20world").unwrap();
        assert_eq!(captured["name"], "hello world");
    }

    #[test]
    fn match_with_trailing_literal() {
        let template = UriTemplate::parse("db://{table}/rows").unwrap();
        let captured = template.match_uri("db://users/rows").unwrap();
        assert_eq!(captured["table"], "users");
        assert!(template.match_uri("db://users/cols").is_none());
    }

    #[test]
    fn parse_rejects_malformed_templates() {
        assert!(UriTemplate::parse("file:///{name").is_err());
        assert!(UriTemplate::parse("file:///name}").is_err());
        assert!(UriTemplate::parse("file:///{}").is_err());
        assert!(UriTemplate::parse("file:///{a,b}").is_err());
        assert!(UriTemplate::parse("file:///{a b}").is_err());
    }

    #[test]
    fn variables_lists_names_in_order() {
        let template = UriTemplate::parse("repo://{owner}/{repo}/files/{+path}").unwrap();
        assert_eq!(template.variables(), vec!["owner", "repo", "path"]);
    }
}
