//! Text normalization for ids, option tokens and pack filenames
//!
//! All externally visible handles (poll ids, QR filenames, vote URLs, pack
//! filenames) go through the same two steps:
//! 1. `sanitize` - drop everything except ASCII alphanumerics and whitespace
//! 2. `hyphenize` - lowercase and join the remaining words with `-`

/// Remove every character that is neither ASCII alphanumeric nor whitespace.
///
/// ```
/// use livepoll::domain::naming::sanitize;
///
/// assert_eq!(sanitize("I don't know!"), "I dont know");
/// ```
pub fn sanitize(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace()).collect()
}

/// Lowercase and join whitespace-separated words with hyphens.
pub fn hyphenize(text: &str) -> String {
    text.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join("-")
}

/// Sanitize then hyphenize. Used for option tokens, id topics and pack titles.
///
/// ```
/// use livepoll::domain::naming::tokenize;
///
/// assert_eq!(tokenize("I don't know"), "i-dont-know");
/// assert_eq!(tokenize("Yes!"), "yes");
/// ```
#[inline]
pub fn tokenize(text: &str) -> String {
    hyphenize(&sanitize(text))
}

/// True if `s` looks like something `tokenize` could have produced.
///
/// Tokens arriving on request paths are checked with this before they are
/// used to build filesystem paths.
pub fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}
