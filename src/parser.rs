use crate::lexer::{Token, WordPart};

/// A shell word, either a simple literal or a compound (with substitutions)
#[derive(Debug, Clone, PartialEq)]
pub enum Word {
    Literal(String),
    Compound(Vec<WordPart>),
}

/// AST node for the shell
///
/// Represents a single element in the Abstract Syntax Tree (AST) constructed
/// from guest source text. The root is always a [`AstNode::Script`].
#[derive(Debug, PartialEq)]
pub enum AstNode {
    /// Statements separated by `;` or newlines, executed in order.
    Script(Vec<AstNode>),

    /// Pipelines joined by `&&` / `||`, evaluated left to right with short-circuiting.
    AndOr {
        first: Box<AstNode>,
        rest: Vec<(Connector, AstNode)>,
    },

    /// A **pipeline** of commands connected by the pipe operator (`|`).
    /// The inner `Vec<AstNode>` contains the individual commands in execution order.
    Pipeline(Vec<AstNode>),

    /// A **simple command** unit, which includes the command name and its arguments,
    /// variable assignments preceding the command, and I/O redirections.
    Command {
        /// The words forming the command name and its arguments (`argv[0]`, `argv[1]`, etc.).
        /// Empty for a bare assignment such as `X=1`.
        argv: Vec<Word>,
        /// Assignment nodes. Scoped to the command when `argv` is non-empty,
        /// otherwise they persist for the rest of the evaluation.
        assignments: Vec<AstNode>,
        /// Redirect nodes, applied in order.
        redirects: Vec<AstNode>,
    },

    /// A **variable assignment** statement in the form `name=value`.
    Assignment {
        name: String,
        /// `None` for `name=` (empty string value).
        value: Option<Word>,
    },

    /// An **I/O redirection** specification.
    Redirect { kind: RedirectKind, target: Word },
}

/// Operator between two pipelines of an and-or list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    /// `&&`: run the right side only if the left side succeeded.
    And,
    /// `||`: run the right side only if the left side failed.
    Or,
}

/// Kind of redirection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `<`: read standard input from an in-memory file.
    Input,
    /// `>`: write standard output to an in-memory file, truncating it.
    Output,
    /// `>>`: append standard output to an in-memory file.
    Append,
    /// `>&2`: send standard output to standard error.
    ToStderr,
}

/// Errors that can occur during the AST construction (parsing) phase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParsingError {
    /// Encountered a token that was not expected at the current position according to the grammar.
    #[error("syntax error near unexpected token {0}")]
    UnexpectedToken(Token),
    /// Reached the end of the token stream prematurely.
    #[error("syntax error: unexpected end of input")]
    UnexpectedEnd,
    /// A descriptor duplication other than `>&2`.
    #[error("unsupported redirection target `{0}`")]
    UnsupportedRedirect(String),
}

struct AstBuilder {
    tokens: Vec<Token>,
    pos: usize,
}

impl AstBuilder {
    fn from(tokens: Vec<Token>) -> Self {
        AstBuilder { tokens, pos: 0 }
    }

    fn build_ast(mut self) -> Result<AstNode, ParsingError> {
        self.parse_script()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn skip_newlines(&mut self) {
        while let Some(Token::Newline) = self.peek() {
            self.pos += 1;
        }
    }

    /// Parse a script: and_or ((';' | newline) and_or)*
    fn parse_script(&mut self) -> Result<AstNode, ParsingError> {
        let mut statements = Vec::new();

        loop {
            self.skip_newlines();
            if self.peek().is_none() {
                break;
            }
            statements.push(self.parse_and_or()?);

            match self.peek() {
                None => break,
                Some(Token::Semicolon | Token::Newline) => {
                    self.consume();
                }
                Some(token) => return Err(ParsingError::UnexpectedToken(token.clone())),
            }
        }

        Ok(AstNode::Script(statements))
    }

    /// Parse an and-or list: pipeline (('&&' | '||') pipeline)*
    fn parse_and_or(&mut self) -> Result<AstNode, ParsingError> {
        let first = self.parse_pipeline()?;
        let mut rest = Vec::new();

        loop {
            let connector = match self.peek() {
                Some(Token::AndIf) => Connector::And,
                Some(Token::OrIf) => Connector::Or,
                _ => break,
            };
            self.consume();
            // a trailing operator continues on the next line
            self.skip_newlines();
            rest.push((connector, self.parse_pipeline()?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(AstNode::AndOr {
                first: Box::new(first),
                rest,
            })
        }
    }

    /// Parse a pipeline: command ('|' command)*
    fn parse_pipeline(&mut self) -> Result<AstNode, ParsingError> {
        let mut commands = vec![self.parse_command()?];

        while let Some(Token::Pipe) = self.peek() {
            self.consume();
            self.skip_newlines();
            commands.push(self.parse_command()?);
        }

        if commands.len() == 1 {
            Ok(commands.remove(0))
        } else {
            Ok(AstNode::Pipeline(commands))
        }
    }

    /// Parse a command: assignment* (word | redirect)*
    fn parse_command(&mut self) -> Result<AstNode, ParsingError> {
        let mut assignments = Vec::new();
        let mut argv = Vec::new();
        let mut redirects = Vec::new();

        while let Some(token) = self.peek() {
            match token {
                Token::Word(parts) => {
                    let assignment = if argv.is_empty() {
                        Self::split_assignment(parts)
                    } else {
                        None
                    };
                    match assignment {
                        Some(node) => assignments.push(node),
                        None => argv.push(Self::word_parts_to_ast_word(parts.clone())),
                    }
                    self.consume();
                }
                Token::RedirectIn
                | Token::RedirectOut
                | Token::RedirectAppend
                | Token::RedirectDup => {
                    redirects.push(self.parse_redirect()?);
                }
                _ => break,
            }
        }

        // A command must have at least something (argv, assignment, or redirect)
        if assignments.is_empty() && argv.is_empty() && redirects.is_empty() {
            return Err(match self.peek() {
                Some(token) => ParsingError::UnexpectedToken(token.clone()),
                None => ParsingError::UnexpectedEnd,
            });
        }

        Ok(AstNode::Command {
            argv,
            assignments,
            redirects,
        })
    }

    /// Recognizes `NAME=value` in a leading word.
    fn split_assignment(parts: &[WordPart]) -> Option<AstNode> {
        let Some(WordPart::Literal(first)) = parts.first() else {
            return None;
        };
        let (name, value) = first.split_once('=')?;
        if !is_valid_name(name) {
            return None;
        }

        let mut value_parts = Vec::new();
        if !value.is_empty() {
            value_parts.push(WordPart::Literal(value.to_string()));
        }
        value_parts.extend(parts[1..].iter().cloned());

        let value = if value_parts.is_empty() {
            None
        } else {
            Some(Self::word_parts_to_ast_word(value_parts))
        };

        Some(AstNode::Assignment {
            name: name.to_string(),
            value,
        })
    }

    /// Parse a redirect: ('<' | '>' | '>>' | '>&') word
    fn parse_redirect(&mut self) -> Result<AstNode, ParsingError> {
        let kind = match self.consume() {
            Some(Token::RedirectIn) => RedirectKind::Input,
            Some(Token::RedirectOut) => RedirectKind::Output,
            Some(Token::RedirectAppend) => RedirectKind::Append,
            Some(Token::RedirectDup) => RedirectKind::ToStderr,
            Some(token) => return Err(ParsingError::UnexpectedToken(token)),
            None => return Err(ParsingError::UnexpectedEnd),
        };

        let target = match self.consume() {
            Some(Token::Word(parts)) => Self::word_parts_to_ast_word(parts),
            Some(token) => return Err(ParsingError::UnexpectedToken(token)),
            None => return Err(ParsingError::UnexpectedEnd),
        };

        // stderr is the only descriptor `>&` may name
        if kind == RedirectKind::ToStderr && target != Word::Literal("2".to_string()) {
            let shown = match &target {
                Word::Literal(t) => t.clone(),
                Word::Compound(_) => "...".to_string(),
            };
            return Err(ParsingError::UnsupportedRedirect(format!("&{shown}")));
        }

        Ok(AstNode::Redirect { kind, target })
    }

    /// Convert lexer WordParts to AST Word
    fn word_parts_to_ast_word(parts: Vec<WordPart>) -> Word {
        if let [WordPart::Literal(s)] = parts.as_slice() {
            return Word::Literal(s.clone());
        }
        Word::Compound(parts)
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Constructs an **Abstract Syntax Tree (AST)** from a vector of tokens.
///
/// An empty token stream yields an empty [`AstNode::Script`].
pub fn construct_ast(tokens: Vec<Token>) -> Result<AstNode, ParsingError> {
    let builder = AstBuilder::from(tokens);
    builder.build_ast()
}
