//! Shell-like token splitter with a memoizing cache (spec.md §4.B).
//!
//! Zone directive lines are tokenized repeatedly (once per `resolve_be` call
//! that touches them), so identical lines are cached by their raw text.
//! Quote characters are retained in the returned token, matching the
//! "quote characters are retained" requirement literally rather than
//! stripping them as a typical shlex would.

use crate::cache::SweepCache;

/// Splits `line` into whitespace-delimited tokens, treating a `"…"` or
/// `'…'` run as one token (quotes included) even if it contains spaces.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_token = false;

    for ch in line.chars() {
        match quote {
            Some(q) => {
                current.push(ch);
                if ch == q {
                    quote = None;
                }
            }
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                current.push(ch);
                in_token = true;
            }
            None if ch.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(ch);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}

/// Memoizing wrapper over [`tokenize`], keyed by the raw line text.
pub struct TokenCache {
    cache: SweepCache<String, Vec<String>>,
}

impl TokenCache {
    pub fn new(max_size: usize) -> Self {
        TokenCache { cache: SweepCache::new(max_size) }
    }

    pub async fn tokenize(&self, line: &str) -> Vec<String> {
        if let Some(cached) = self.cache.get(&line.to_string()).await {
            return cached;
        }
        let tokens = tokenize(line);
        self.cache.insert(line.to_string(), tokens.clone()).await;
        tokens
    }

    pub async fn sweep(&self) {
        self.cache.sweep().await;
    }

    pub async fn clear(&self) {
        self.cache.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(tokenize("A 192.0.2.1"), vec!["A", "192.0.2.1"]);
    }

    #[test]
    fn preserves_quoted_whitespace_and_quote_chars() {
        assert_eq!(tokenize(r#"TXT "hello world""#), vec!["TXT", "\"hello world\""]);
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn single_quotes_also_preserved() {
        assert_eq!(tokenize("TXT 'a b'"), vec!["TXT", "'a b'"]);
    }

    #[tokio::test]
    async fn cache_returns_equal_tokens_on_repeat() {
        let cache = TokenCache::new(10);
        let first = cache.tokenize("A 192.0.2.1").await;
        let second = cache.tokenize("A 192.0.2.1").await;
        assert_eq!(first, second);
    }
}
