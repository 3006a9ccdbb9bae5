//! Wildcard matching for SQL `LIKE` patterns and file name globs
//!
//! Both syntaxes compile to the same token stream: a single-character
//! wildcard, a wildcard for any run of characters, and literals.

/// A compiled pattern token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyChar,
    AnyRun,
}

/// A compiled wildcard pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wildcard {
    tokens: Vec<Token>,
}

impl Wildcard {
    /// Compile a SQL `LIKE` pattern (`_` one character, `%` any run, `\` escapes)
    pub fn like(pattern: &str) -> Self {
        let mut tokens = Vec::with_capacity(pattern.len());
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            let token = match c {
                '_' => Token::AnyChar,
                '%' => Token::AnyRun,
                // A trailing backslash matches itself
                '\\' => Token::Literal(chars.next().unwrap_or('\\')),
                c => Token::Literal(c),
            };
            tokens.push(token);
        }
        Self { tokens }
    }

    /// Compile a shell-style glob (`?` one character, `*` any run)
    pub fn glob(pattern: &str) -> Self {
        let tokens = pattern
            .chars()
            .map(|c| match c {
                '?' => Token::AnyChar,
                '*' => Token::AnyRun,
                c => Token::Literal(c),
            })
            .collect();
        Self { tokens }
    }

    /// Check whether the whole of `text` matches the pattern
    pub fn matches(&self, text: &str) -> bool {
        let text: Vec<char> = text.chars().collect();
        let (mut t, mut p) = (0, 0);
        // Resume point after the most recent `AnyRun`: (pattern index, text index)
        let mut backtrack: Option<(usize, usize)> = None;

        while t < text.len() {
            match self.tokens.get(p) {
                Some(Token::AnyRun) => {
                    backtrack = Some((p + 1, t));
                    p += 1;
                }
                Some(Token::AnyChar) => {
                    p += 1;
                    t += 1;
                }
                Some(Token::Literal(c)) if *c == text[t] => {
                    p += 1;
                    t += 1;
                }
                _ => match backtrack {
                    Some((bp, bt)) => {
                        backtrack = Some((bp, bt + 1));
                        p = bp;
                        t = bt + 1;
                    }
                    None => return false,
                },
            }
        }

        self.tokens[p..].iter().all(|token| *token == Token::AnyRun)
    }
}
