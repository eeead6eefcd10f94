// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Line tokenizer and statement splitter.
//!
//! Source text is scanned one line at a time into flat [`Token`]s using
//! shell-like word splitting. Every line is terminated by a newline marker
//! token so that [`chunk_split`] can cut the stream into per-statement
//! chunks. The same splitter is reused for text produced at assembly time
//! by generator statements.

/// One lexical token. The stream it belongs to is carried by the chunk
/// cache key, not the token itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub line: u32,
}

impl Token {
    pub fn new(text: impl Into<String>, line: u32) -> Self {
        Self {
            text: text.into(),
            line,
        }
    }

    /// The newline marker that separates statements.
    pub fn newline(line: u32) -> Self {
        Self::new("\n", line)
    }

    pub fn is_newline(&self) -> bool {
        self.text == "\n"
    }
}

/// One statement's worth of tokens. Blank lines yield empty chunks.
pub type Chunk = Vec<Token>;

#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub line: u32,
}

/// Characters that belong to words. `$` and `%` start rewritten numeric
/// literals, `_` participates in local label names.
fn is_word_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'_' | b'$' | b'%')
}

/// Characters that coalesce into multi-character punctuation runs
/// (so `<<` or `>=` arrive as one token).
fn is_punct_run_char(c: u8) -> bool {
    matches!(c, b'|' | b'&' | b'<' | b'>' | b'.' | b'=')
}

fn is_space(c: u8) -> bool {
    c == b' ' || c == b'\t' || c == b'\r'
}

/// Rewrite `$xx` to `0xxx` and `%bb` to `0bbb` so the expression
/// interpreter only ever sees its own literal syntax.
fn fix_prefix(word: &str) -> String {
    if let Some(rest) = word.strip_prefix('$') {
        format!("0x{rest}")
    } else if let Some(rest) = word.strip_prefix('%') {
        format!("0b{rest}")
    } else {
        word.to_string()
    }
}

/// Tokenize a block of source text. Each line contributes its tokens plus
/// a trailing newline marker. Malformed quoting is reported per line; the
/// truncated token is still emitted so the statement fails loudly later.
pub fn tokenize(text: &str) -> (Vec<Token>, Vec<LexError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line_num = index as u32 + 1;
        tokenize_line(line, line_num, &mut tokens, &mut errors);
        tokens.push(Token::newline(line_num));
    }

    (tokens, errors)
}

fn tokenize_line(line: &str, line_num: u32, tokens: &mut Vec<Token>, errors: &mut Vec<LexError>) {
    let input = line.as_bytes();
    let mut cursor = 0;

    while cursor < input.len() {
        let c = input[cursor];

        if is_space(c) {
            cursor += 1;
        } else if c == b';' {
            break;
        } else if c == b'"' || c == b'\'' {
            let start = cursor;
            cursor += 1;
            while cursor < input.len() && input[cursor] != c {
                cursor += 1;
            }
            if cursor >= input.len() {
                errors.push(LexError {
                    message: format!("Unterminated quote: {}", &line[start..]),
                    line: line_num,
                });
                tokens.push(Token::new(&line[start..], line_num));
                break;
            }
            cursor += 1;
            tokens.push(Token::new(&line[start..cursor], line_num));
        } else if is_word_char(c) {
            let start = cursor;
            while cursor < input.len() && is_word_char(input[cursor]) {
                cursor += 1;
            }
            tokens.push(Token::new(fix_prefix(&line[start..cursor]), line_num));
        } else if is_punct_run_char(c) {
            let start = cursor;
            while cursor < input.len() && is_punct_run_char(input[cursor]) {
                cursor += 1;
            }
            tokens.push(Token::new(&line[start..cursor], line_num));
        } else {
            tokens.push(Token::new(&line[cursor..cursor + 1], line_num));
            cursor += 1;
        }
    }
}

/// Tokenize a whole file's text, then qualify local labels: any `_name`
/// token is rewritten to `_<label>_name` using the nearest preceding
/// chunk-initial label that does not itself start with an underscore.
pub fn tokenize_source(text: &str) -> (Vec<Token>, Vec<LexError>) {
    let (tokens, errors) = tokenize(text);
    (translate_local_labels(tokens), errors)
}

fn translate_local_labels(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut last_label = String::new();

    for chunk in chunk_split(&tokens) {
        if chunk.len() >= 2 && !chunk[0].text.starts_with('_') && chunk[1].text == ":" {
            last_label = chunk[0].text.clone();
        }

        let line = chunk.first().map_or(0, |t| t.line);
        for token in chunk {
            if token.text.len() > 1 && token.text.starts_with('_') {
                out.push(Token::new(
                    format!("_{}{}", last_label, token.text),
                    token.line,
                ));
            } else {
                out.push(token);
            }
        }
        out.push(Token::newline(line));
    }

    out
}

/// Split a token stream into per-statement chunks at newline markers.
/// Pure and stateless; adjacent markers yield empty chunks.
pub fn chunk_split(tokens: &[Token]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();

    for token in tokens {
        if token.is_newline() {
            chunks.push(std::mem::take(&mut current));
        } else {
            current.push(token.clone());
        }
    }
    chunks.push(current);

    chunks
}

/// Reassemble a token slice into expression text. Tokens were split on
/// word boundaries, so plain concatenation restores the original spelling
/// minus insignificant whitespace.
pub fn join_tokens(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.text.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn rewrites_numeric_prefixes() {
        assert_eq!(fix_prefix(""), "");
        assert_eq!(fix_prefix("abc"), "abc");
        assert_eq!(fix_prefix("$1234"), "0x1234");
        assert_eq!(fix_prefix("%010101"), "0b010101");
    }

    #[test]
    fn splits_words_and_punctuation() {
        let (tokens, errors) = tokenize("lda #$10 ; comment");
        assert!(errors.is_empty());
        assert_eq!(texts(&tokens), vec!["lda", "#", "0x10", "\n"]);
    }

    #[test]
    fn groups_punctuation_runs() {
        let (tokens, _) = tokenize("a << b");
        assert_eq!(texts(&tokens), vec!["a", "<<", "b", "\n"]);
    }

    #[test]
    fn keeps_quotes_on_string_tokens() {
        let (tokens, errors) = tokenize(".text \"HELLO\"");
        assert!(errors.is_empty());
        assert_eq!(texts(&tokens), vec![".", "text", "\"HELLO\"", "\n"]);
    }

    #[test]
    fn reports_unterminated_quote() {
        let (_, errors) = tokenize(".text \"oops");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Unterminated"));
    }

    #[test]
    fn chunk_split_yields_empty_chunks_for_blank_lines() {
        let (tokens, _) = tokenize("a\nb c\n\nd");
        let chunks = chunk_split(&tokens);
        assert_eq!(texts(&chunks[0]), vec!["a"]);
        assert_eq!(texts(&chunks[1]), vec!["b", "c"]);
        assert!(chunks[2].is_empty());
        assert_eq!(texts(&chunks[3]), vec!["d"]);
    }

    #[test]
    fn qualifies_local_labels() {
        let source = "main:\n_loop: bne _loop\nnext:\n_loop: beq _loop";
        let (tokens, _) = tokenize_source(source);
        let chunks = chunk_split(&tokens);
        assert_eq!(
            texts(&chunks[1]),
            vec!["_main_loop", ":", "bne", "_main_loop"]
        );
        assert_eq!(
            texts(&chunks[3]),
            vec!["_next_loop", ":", "beq", "_next_loop"]
        );
    }

    #[test]
    fn leaves_bare_underscore_alone() {
        let (tokens, _) = tokenize_source("main:\n.word _ + 2");
        let chunks = chunk_split(&tokens);
        assert_eq!(texts(&chunks[1]), vec![".", "word", "_", "+", "2"]);
    }

    #[test]
    fn join_restores_expression_text() {
        let (tokens, _) = tokenize("lda value + 1,x");
        let chunks = chunk_split(&tokens);
        assert_eq!(join_tokens(&chunks[0][1..]), "value+1,x");
    }
}
