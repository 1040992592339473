use serde::{Deserialize, Serialize};

const POSITIVE_WORDS: &[&str] = &[
    "love",
    "beautiful",
    "wonderful",
    "amazing",
    "happy",
    "joy",
    "perfect",
    "blessed",
    "congratulations",
    "lovely",
    "best",
    "grateful",
];

const NEGATIVE_WORDS: &[&str] = &[
    "sad", "miss", "sorry", "loss", "gone", "cry", "pain", "difficult", "hard", "grief",
];

/// Coarse tone of a guestbook message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Count positive and negative word occurrences; the majority wins and a
    /// tie (including no matches) is neutral.
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();
        let (mut positive, mut negative) = (0usize, 0usize);

        for word in lowered.split(|c: char| !c.is_alphanumeric()) {
            if POSITIVE_WORDS.contains(&word) {
                positive += 1;
            } else if NEGATIVE_WORDS.contains(&word) {
                negative += 1;
            }
        }

        match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        }
    }
}
