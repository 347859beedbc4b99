//! Word-list sentiment for football chatter.

/// Word weights. Keys are lowercase single words; the summed score is
/// clamped to `[-1.0, 1.0]`.
pub(crate) const LEXICON: &[(&str, f64)] = &[
    // Positive
    ("amazing", 0.5),
    ("brilliant", 0.5),
    ("class", 0.3),
    ("genius", 0.5),
    ("goat", 0.6),
    ("great", 0.4),
    ("hero", 0.5),
    ("incredible", 0.5),
    ("legend", 0.5),
    ("love", 0.5),
    ("masterclass", 0.6),
    ("record", 0.3),
    ("stunning", 0.5),
    ("superb", 0.5),
    ("champions", 0.4),
    ("win", 0.4),
    ("wins", 0.4),
    ("winner", 0.4),
    ("victory", 0.5),
    ("comeback", 0.4),
    // Negative
    ("awful", -0.5),
    ("ban", -0.5),
    ("banned", -0.5),
    ("controversy", -0.4),
    ("disaster", -0.6),
    ("disgrace", -0.7),
    ("embarrassing", -0.5),
    ("flop", -0.5),
    ("injury", -0.4),
    ("injured", -0.4),
    ("loss", -0.4),
    ("lost", -0.3),
    ("robbed", -0.6),
    ("sacked", -0.5),
    ("scandal", -0.7),
    ("shocking", -0.4),
    ("terrible", -0.6),
    ("worst", -0.6),
    ("racism", -0.8),
    ("relegated", -0.5),
];

/// Score a text string against the football lexicon.
///
/// Returns `0.0` for empty or unknown text.
#[must_use]
pub fn lexicon_score(text: &str) -> f64 {
    let mut score = 0.0_f64;
    for word in text.split_whitespace() {
        let w = word
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase();
        if let Some(&(_, weight)) = LEXICON.iter().find(|(lex, _)| *lex == w) {
            score += weight;
        }
    }
    score.clamp(-1.0, 1.0)
}
