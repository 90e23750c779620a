//! Lexical analysis (tokenization) of a single input line.
//!
//! A token is a maximal run of non-whitespace characters. There is no quoting,
//! escaping or substitution: `echo "a b"` yields the tokens `echo`, `"a` and `b"`.

use std::str::SplitWhitespace;

/// Lazy sequence of tokens borrowed from an input line.
///
/// The sequence is terminated when the iterator returns `None`.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    inner: SplitWhitespace<'a>,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Starts tokenizing `line` without allocating.
pub fn tokens(line: &str) -> Tokens<'_> {
    Tokens {
        inner: line.split_whitespace(),
    }
}

/// Splits `line` into owned tokens, in their original order.
///
/// Empty or whitespace-only input produces an empty vector.
pub fn split_into_tokens(line: &str) -> Vec<String> {
    tokens(line).map(str::to_owned).collect()
}
