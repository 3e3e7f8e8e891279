/// Lowercase fragments of tags that describe the listener, a nationality or an
/// opinion rather than a genre.
const NON_GENRE_TAGS: [&str; 22] = [
    "seen live",
    "favorites",
    "favourite",
    "own",
    "albums i own",
    "check out",
    "unknown",
    "beautiful",
    "awesome",
    "good",
    "great",
    "love",
    "loved",
    "british",
    "american",
    "canadian",
    "german",
    "swedish",
    "norwegian",
    "danish",
    "icelandic",
    "australian",
];

/// Returns `true` when a tag can be counted as a genre.
///
/// The check lowercases the tag and rejects it if any denylisted fragment appears
/// anywhere inside it, so "Seen Live 2019" and "British Rock" are both rejected.
///
/// # Examples
///
/// ```
/// use genrefm::foundation::utils::is_genre_tag;
///
/// assert!(is_genre_tag("shoegaze"));
/// assert!(!is_genre_tag("Seen Live"));
/// ```
pub fn is_genre_tag(tag_name: &str) -> bool {
    let lowered = tag_name.to_lowercase();
    !NON_GENRE_TAGS
        .iter()
        .any(|fragment| lowered.contains(fragment))
}
