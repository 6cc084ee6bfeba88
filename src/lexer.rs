//! Lexical analysis (tokenization) for the guest shell language.

use std::fmt;

/// A part of a word, which can be either literal text, a command substitution, or a parameter substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordPart {
    /// Literal text that requires no further processing.
    Literal(String),
    /// Command substitution in the format `$(...)`. Contains the text inside the parentheses.
    CmdSubst(String),
    /// Parameter substitution `$name`, `${name}` or `$?`. Contains the parameter name.
    ParamSubst(String),
}

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word token, which may be composed of multiple parts (`WordPart`).
    Word(Vec<WordPart>),
    /// The pipe operator, `|`.
    Pipe,
    /// `&&`
    AndIf,
    /// `||`
    OrIf,
    /// `;`
    Semicolon,
    /// A line break outside of quotes.
    Newline,
    /// Input redirection symbol, `<`.
    RedirectIn,
    /// Output redirection symbol, `>`.
    RedirectOut,
    /// Appending output redirection symbol, `>>`.
    RedirectAppend,
    /// Output descriptor duplication, `>&`.
    RedirectDup,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(_) => f.write_str("word"),
            Token::Pipe => f.write_str("`|`"),
            Token::AndIf => f.write_str("`&&`"),
            Token::OrIf => f.write_str("`||`"),
            Token::Semicolon => f.write_str("`;`"),
            Token::Newline => f.write_str("newline"),
            Token::RedirectIn => f.write_str("`<`"),
            Token::RedirectOut => f.write_str("`>`"),
            Token::RedirectAppend => f.write_str("`>>`"),
            Token::RedirectDup => f.write_str("`>&`"),
        }
    }
}

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    #[error("unterminated quoted string")]
    UnfinishedQuote,
    /// A closing parenthesis for command substitution `$(...)` was not found.
    #[error("unterminated command substitution `$(`")]
    UnfinishedCmdSubst,
    /// A closing brace for parameter substitution `${...}` was not found.
    #[error("unterminated parameter substitution `${{`")]
    UnfinishedParamSubst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    current_word: Vec<WordPart>,
    buffer: String,
    // distinguishes `""` (an empty word) from no word at all
    word_started: bool,
}

impl LexingFSM {
    fn new(source: &str) -> Self {
        LexingFSM {
            input: source.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            current_word: Vec::new(),
            buffer: String::new(),
            word_started: false,
        }
    }

    /// Performs lexical analysis on the input and returns a vector of tokens.
    ///
    /// # Returns
    /// A vector of tokens on success, or a `LexingError` if an incomplete
    /// structure (like an unclosed quote) is found.
    fn make_tokens(&mut self) -> Result<Vec<Token>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch, &mut out)?,
                LexingState::ReadingWord => self.handle_word(ch, &mut out)?,
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch)?,
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote | LexingState::ReadingDoubleQuote => {
                return Err(LexingError::UnfinishedQuote);
            }
            LexingState::ReadingWord => self.finish_word(&mut out),
            LexingState::Start => {}
        }

        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn handle_start(&mut self, ch: char, out: &mut Vec<Token>) -> Result<(), LexingError> {
        match ch {
            ' ' | '\t' | '\r' => {}
            '#' => self.skip_comment(),
            c => {
                self.state = LexingState::ReadingWord;
                self.handle_word(c, out)?;
            }
        }
        Ok(())
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<Token>) -> Result<(), LexingError> {
        match ch {
            ' ' | '\t' | '\r' => {
                self.finish_word(out);
                self.state = LexingState::Start;
            }
            '|' | ';' | '\n' | '<' | '>' => {
                self.finish_word(out);
                out.push(self.operator(ch));
                self.state = LexingState::Start;
            }
            '&' if self.peek_char() == Some('&') => {
                self.read_char();
                self.finish_word(out);
                out.push(Token::AndIf);
                self.state = LexingState::Start;
            }
            '\'' => {
                self.word_started = true;
                self.state = LexingState::ReadingSingleQuote;
            }
            '"' => {
                self.word_started = true;
                self.state = LexingState::ReadingDoubleQuote;
            }
            '\\' => match self.read_char() {
                // line continuation
                Some('\n') => {}
                Some(c) => {
                    self.word_started = true;
                    self.buffer.push(c);
                }
                None => {
                    self.word_started = true;
                    self.buffer.push('\\');
                }
            },
            '$' => {
                self.word_started = true;
                self.read_dollar()?;
            }
            c => {
                self.word_started = true;
                self.buffer.push(c);
            }
        }
        Ok(())
    }

    /// Turns an operator character, plus a lookahead where needed, into its token.
    fn operator(&mut self, ch: char) -> Token {
        match ch {
            '|' if self.peek_char() == Some('|') => {
                self.read_char();
                Token::OrIf
            }
            '|' => Token::Pipe,
            ';' => Token::Semicolon,
            '\n' => Token::Newline,
            '<' => Token::RedirectIn,
            '>' if self.peek_char() == Some('>') => {
                self.read_char();
                Token::RedirectAppend
            }
            '>' if self.peek_char() == Some('&') => {
                self.read_char();
                Token::RedirectDup
            }
            '>' => Token::RedirectOut,
            _ => unreachable!("not an operator: {ch:?}"),
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) -> Result<(), LexingError> {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' => match self.read_char() {
                Some(c @ ('"' | '\\' | '$' | '`')) => self.buffer.push(c),
                Some('\n') => {}
                Some(c) => {
                    self.buffer.push('\\');
                    self.buffer.push(c);
                }
                None => return Err(LexingError::UnfinishedQuote),
            },
            '$' => self.read_dollar()?,
            c => self.buffer.push(c),
        }
        Ok(())
    }

    /// Reads whatever follows a `$`: `$(...)`, `${...}`, `$?`, `$name`, or a lone `$`.
    fn read_dollar(&mut self) -> Result<(), LexingError> {
        match self.peek_char() {
            Some('(') => {
                self.read_char();
                self.flush_literal();
                let nested = self.collect_cmdsubst(1)?;
                self.current_word.push(WordPart::CmdSubst(nested));
            }
            Some('{') => {
                self.read_char();
                self.flush_literal();
                let nested = self.collect_paramsubst(1)?;
                self.current_word.push(WordPart::ParamSubst(nested));
            }
            Some('?') => {
                self.read_char();
                self.flush_literal();
                self.current_word.push(WordPart::ParamSubst("?".to_string()));
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                self.flush_literal();
                let mut name = String::new();
                while let Some(c) = self.peek_char() {
                    if !(c.is_ascii_alphanumeric() || c == '_') {
                        break;
                    }
                    name.push(c);
                    self.read_char();
                }
                self.current_word.push(WordPart::ParamSubst(name));
            }
            _ => self.buffer.push('$'),
        }
        Ok(())
    }

    fn skip_comment(&mut self) {
        // the newline itself is left for the caller to tokenize
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            self.read_char();
        }
    }

    /// Collects characters within a command substitution block `$(...)`.
    /// Handles nested parentheses by tracking the `depth`.
    fn collect_cmdsubst(&mut self, mut depth: usize) -> Result<String, LexingError> {
        let mut s = String::new();
        while let Some(ch) = self.read_char() {
            match ch {
                '(' => {
                    depth += 1;
                    s.push(ch);
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(s);
                    }
                    s.push(ch);
                }
                _ => s.push(ch),
            }
        }
        Err(LexingError::UnfinishedCmdSubst)
    }

    /// Collects characters within a parameter substitution block `${...}`.
    fn collect_paramsubst(&mut self, mut depth: usize) -> Result<String, LexingError> {
        let mut s = String::new();
        while let Some(ch) = self.read_char() {
            match ch {
                '{' => {
                    depth += 1;
                    s.push(ch);
                }
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(s);
                    }
                    s.push(ch);
                }
                _ => s.push(ch),
            }
        }
        Err(LexingError::UnfinishedParamSubst)
    }

    fn flush_literal(&mut self) {
        if !self.buffer.is_empty() {
            self.current_word
                .push(WordPart::Literal(std::mem::take(&mut self.buffer)));
        }
    }

    fn finish_word(&mut self, out: &mut Vec<Token>) {
        self.flush_literal();
        if self.word_started {
            let mut parts = std::mem::take(&mut self.current_word);
            if parts.is_empty() {
                parts.push(WordPart::Literal(String::new()));
            }
            out.push(Token::Word(parts));
        }
        self.word_started = false;
    }
}

/// The main entry point function to perform lexical analysis.
///
/// Creates and runs the finite state machine to tokenize the whole source text.
pub fn split_into_tokens(source: &str) -> Result<Vec<Token>, LexingError> {
    let mut lexer = LexingFSM::new(source);
    lexer.make_tokens()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Token {
        Token::Word(vec![WordPart::Literal(s.to_string())])
    }

    #[test]
    fn test_simple_words_and_pipe() {
        let tokens = split_into_tokens("echo  hello | wc").unwrap();
        assert_eq!(tokens, vec![lit("echo"), lit("hello"), Token::Pipe, lit("wc")]);
    }

    #[test]
    fn test_operators_without_spaces() {
        let tokens = split_into_tokens("a&&b||c;d>f>>g<h").unwrap();
        assert_eq!(
            tokens,
            vec![
                lit("a"),
                Token::AndIf,
                lit("b"),
                Token::OrIf,
                lit("c"),
                Token::Semicolon,
                lit("d"),
                Token::RedirectOut,
                lit("f"),
                Token::RedirectAppend,
                lit("g"),
                Token::RedirectIn,
                lit("h"),
            ]
        );
    }

    #[test]
    fn test_quotes_join_into_one_word() {
        let tokens = split_into_tokens(r#"echo 'a b'"c d"e"#).unwrap();
        assert_eq!(tokens, vec![lit("echo"), lit("a bc de")]);
    }

    #[test]
    fn test_empty_quotes_are_a_word() {
        let tokens = split_into_tokens("echo ''").unwrap();
        assert_eq!(tokens, vec![lit("echo"), lit("")]);
    }

    #[test]
    fn test_parameters() {
        let tokens = split_into_tokens("x$HOME-${a}$? '$b'").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Word(vec![
                    WordPart::Literal("x".to_string()),
                    WordPart::ParamSubst("HOME".to_string()),
                    WordPart::Literal("-".to_string()),
                    WordPart::ParamSubst("a".to_string()),
                    WordPart::ParamSubst("?".to_string()),
                ]),
                lit("$b"),
            ]
        );
    }

    #[test]
    fn test_command_substitution_nests() {
        let tokens = split_into_tokens("echo $(echo $(echo hi))").unwrap();
        assert_eq!(
            tokens,
            vec![
                lit("echo"),
                Token::Word(vec![WordPart::CmdSubst("echo $(echo hi)".to_string())]),
            ]
        );
    }

    #[test]
    fn test_comments_and_newlines() {
        let tokens = split_into_tokens("# leading\necho a # trailing\necho b").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Newline,
                lit("echo"),
                lit("a"),
                Token::Newline,
                lit("echo"),
                lit("b"),
            ]
        );
    }

    #[test]
    fn test_escapes() {
        let tokens = split_into_tokens(r#"echo \$x "\"q\"" a\ b"#).unwrap();
        assert_eq!(tokens, vec![lit("echo"), lit("$x"), lit("\"q\""), lit("a b")]);
    }

    #[test]
    fn test_single_ampersand_stays_in_word() {
        let tokens = split_into_tokens("echo a&b").unwrap();
        assert_eq!(tokens, vec![lit("echo"), lit("a&b")]);
    }

    #[test]
    fn test_descriptor_duplication_only_when_unquoted() {
        let tokens = split_into_tokens("echo x >&2").unwrap();
        assert_eq!(tokens, vec![lit("echo"), lit("x"), Token::RedirectDup, lit("2")]);

        let tokens = split_into_tokens("echo x > '&2'").unwrap();
        assert_eq!(tokens, vec![lit("echo"), lit("x"), Token::RedirectOut, lit("&2")]);
    }

    #[test]
    fn test_unfinished_structures() {
        assert_eq!(split_into_tokens("echo 'abc"), Err(LexingError::UnfinishedQuote));
        assert_eq!(split_into_tokens("echo \"abc"), Err(LexingError::UnfinishedQuote));
        assert_eq!(split_into_tokens("echo $(ls"), Err(LexingError::UnfinishedCmdSubst));
        assert_eq!(split_into_tokens("echo ${x"), Err(LexingError::UnfinishedParamSubst));
    }

    #[test]
    fn test_empty_source_has_no_tokens() {
        assert_eq!(split_into_tokens("").unwrap(), Vec::new());
        assert_eq!(split_into_tokens("   \t ").unwrap(), Vec::new());
    }
}
