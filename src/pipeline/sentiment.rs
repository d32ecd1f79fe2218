use super::ollama::LlmGenerate;
use super::parser::parse_sentiment;
use super::prompt::SENTIMENT_SYSTEM_PROMPT;
use super::types::Sentiment;
use super::LlmError;
use crate::models::SentimentLabel;

/// Estimates the emotional tone of a raw message.
pub trait SentimentEstimator {
    fn estimate(&self, message: &str) -> Result<Sentiment, LlmError>;
}

pub struct LlmSentimentEstimator<'a, G: LlmGenerate> {
    llm: &'a G,
}

impl<'a, G: LlmGenerate> LlmSentimentEstimator<'a, G> {
    pub fn new(llm: &'a G) -> Self {
        Self { llm }
    }
}

impl<G: LlmGenerate> SentimentEstimator for LlmSentimentEstimator<'_, G> {
    fn estimate(&self, message: &str) -> Result<Sentiment, LlmError> {
        let reply = self.llm.generate(SENTIMENT_SYSTEM_PROMPT, message)?;
        Ok(parse_sentiment(&reply))
    }
}

/// Offline word-list estimator. Counts positive and negative words; no negation handling.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexiconSentimentEstimator;

const POSITIVE_WORDS: &[&str] = &[
    "thanks", "thank", "grateful", "great", "good", "better", "happy", "glad", "relieved",
    "appreciate", "wonderful",
];

const NEGATIVE_WORDS: &[&str] = &[
    "worried", "anxious", "scared", "afraid", "nervous", "pain", "hurt", "hurts", "terrible",
    "awful", "frustrated", "angry", "annoyed", "upset", "sad", "worse", "sick", "urgent",
    "emergency",
];

/// Emotion tag → words that evoke it.
const EMOTIONS: &[(&str, &[&str])] = &[
    ("anxious", &["worried", "anxious", "scared", "afraid", "nervous"]),
    ("frustrated", &["frustrated", "angry", "annoyed", "upset"]),
    ("distressed", &["pain", "hurt", "hurts", "terrible", "awful", "worse", "sick"]),
    ("grateful", &["thanks", "thank", "grateful", "appreciate"]),
    ("relieved", &["relieved", "better"]),
];

/// Weight of each net word towards intensity.
const INTENSITY_STEP: f32 = 0.25;

impl SentimentEstimator for LexiconSentimentEstimator {
    fn estimate(&self, message: &str) -> Result<Sentiment, LlmError> {
        let lower = message.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|w| !w.is_empty())
            .collect();

        let count = |list: &[&str]| words.iter().filter(|w| list.contains(*w)).count() as i32;
        let positive = count(POSITIVE_WORDS);
        let negative = count(NEGATIVE_WORDS);
        let net = positive - negative;

        let label = match net {
            n if n > 0 => SentimentLabel::Positive,
            n if n < 0 => SentimentLabel::Negative,
            _ => SentimentLabel::Neutral,
        };

        let emotions = EMOTIONS
            .iter()
            .filter(|(_, cues)| words.iter().any(|w| cues.contains(w)))
            .map(|(tag, _)| tag.to_string())
            .collect();

        Ok(Sentiment {
            label,
            intensity: (net.unsigned_abs() as f32 * INTENSITY_STEP).min(1.0),
            emotions,
            notes: format!("{positive} positive / {negative} negative cue words"),
            raw: None,
        })
    }
}
