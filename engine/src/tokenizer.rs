use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

use crate::error::EngineError;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref DEFAULT_STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Splits raw article text into content tokens.
///
/// Built once at process start; a configured stop-word list that cannot be
/// read fails construction, never an individual `tokenize` call.
pub struct Tokenizer {
    stopwords: Option<HashSet<String>>,
    stemmer: Stemmer,
}

impl Tokenizer {
    /// Tokenizer with the built-in English stop-word list.
    pub fn new() -> Self {
        Self { stopwords: None, stemmer: Stemmer::create(Algorithm::English) }
    }

    /// Tokenizer whose stop-word list is loaded from a newline-separated
    /// file. Blank lines and `#` comments are ignored.
    pub fn with_stopwords_file<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|source| EngineError::Stopwords {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let stopwords = raw
            .lines()
            .map(|line| line.trim().to_lowercase())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect();
        Ok(Self { stopwords: Some(stopwords), stemmer: Stemmer::create(Algorithm::English) })
    }

    fn is_stopword(&self, token: &str) -> bool {
        match &self.stopwords {
            Some(set) => set.contains(token),
            None => DEFAULT_STOPWORDS.contains(token),
        }
    }

    /// Tokenize text using NFKC normalization, lowercasing, stop-word
    /// removal, and stemming. The word breaker only emits tokens starting
    /// with a letter, so pure punctuation, whitespace, and digit runs never
    /// appear; single-character tokens are dropped afterwards.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut tokens = Vec::new();
        for mat in RE.find_iter(&normalized) {
            let token = mat.as_str();
            if token.chars().count() <= 1 || self.is_stopword(token) {
                continue;
            }
            tokens.push(self.stemmer.stem(token).to_string());
        }
        tokens
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}
