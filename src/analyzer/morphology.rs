//! Morphological analysis
//!
//! The analyzer only needs two answers about a word: its candidate normal
//! forms and its coarse grammatical class. [`Morphology`] is that seam;
//! [`SnowballMorphology`] answers it with a Snowball stemmer and a small
//! closed-class lexicon per language.

use crate::config::Language;
use rust_stemmers::{Algorithm, Stemmer};

/// Coarse grammatical class of a word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordClass {
    Content,
    Article,
    Conjunction,
    Interjection,
    Particle,
    Preposition,
}

impl WordClass {
    /// Closed-class words carry no meaning on their own and are never indexed
    pub fn is_closed(self) -> bool {
        !matches!(self, WordClass::Content)
    }
}

/// External morphology capability consumed by the text analyzer
pub trait Morphology: Send + Sync {
    /// Candidate normal forms of a lowercase word, best candidate first
    fn normal_forms(&self, word: &str) -> Vec<String>;

    /// Grammatical classes the word may belong to
    fn morph_info(&self, word: &str) -> Vec<WordClass>;

    /// Returns true if `c` belongs to the language's alphabet
    fn is_alphabetic(&self, c: char) -> bool;
}

const ENGLISH_ARTICLES: &[&str] = &["a", "an", "the"];

const ENGLISH_CONJUNCTIONS: &[&str] = &[
    "and", "or", "but", "nor", "yet", "so", "because", "although", "though", "if", "unless",
    "while", "whereas", "whether", "than", "either", "neither", "both",
];

const ENGLISH_PREPOSITIONS: &[&str] = &[
    "of", "in", "on", "at", "to", "for", "with", "by", "from", "about", "into", "onto", "over",
    "under", "after", "before", "between", "through", "during", "without", "within", "upon",
    "among", "against", "across", "behind", "beyond", "near", "toward", "towards", "via", "per",
    "along", "around", "despite", "except", "inside", "outside", "since", "until", "till", "off",
];

const ENGLISH_INTERJECTIONS: &[&str] = &[
    "oh", "ah", "wow", "hey", "ouch", "oops", "alas", "hmm", "ugh", "hooray", "eh",
];

const ENGLISH_PARTICLES: &[&str] = &["not", "no"];

const RUSSIAN_CONJUNCTIONS: &[&str] = &[
    "и", "а", "но", "или", "да", "что", "чтобы", "если", "хотя", "либо", "тоже", "также",
    "зато", "однако", "потому", "когда", "пока", "словно", "будто",
];

const RUSSIAN_PREPOSITIONS: &[&str] = &[
    "в", "во", "на", "с", "со", "к", "ко", "по", "о", "об", "обо", "от", "до", "из", "изо",
    "у", "за", "над", "под", "при", "про", "без", "для", "через", "между", "перед", "около",
    "среди", "вокруг",
];

const RUSSIAN_INTERJECTIONS: &[&str] = &["ах", "ох", "ой", "эх", "увы", "ура", "ага", "эй"];

const RUSSIAN_PARTICLES: &[&str] = &["не", "ни", "же", "ли", "бы", "вот", "даже", "лишь", "уж"];

/// Closed-class lexicon of one language
struct Lexicon {
    classes: &'static [(WordClass, &'static [&'static str])],
}

impl Lexicon {
    fn for_language(language: Language) -> Self {
        match language {
            Language::English => Self {
                classes: &[
                    (WordClass::Article, ENGLISH_ARTICLES),
                    (WordClass::Conjunction, ENGLISH_CONJUNCTIONS),
                    (WordClass::Preposition, ENGLISH_PREPOSITIONS),
                    (WordClass::Interjection, ENGLISH_INTERJECTIONS),
                    (WordClass::Particle, ENGLISH_PARTICLES),
                ],
            },
            Language::Russian => Self {
                classes: &[
                    (WordClass::Conjunction, RUSSIAN_CONJUNCTIONS),
                    (WordClass::Preposition, RUSSIAN_PREPOSITIONS),
                    (WordClass::Interjection, RUSSIAN_INTERJECTIONS),
                    (WordClass::Particle, RUSSIAN_PARTICLES),
                ],
            },
        }
    }

    fn classify(&self, word: &str) -> Vec<WordClass> {
        self.classes
            .iter()
            .filter(|(_, words)| words.contains(&word))
            .map(|(class, _)| *class)
            .collect()
    }
}

/// Snowball-stemmer backed morphology
pub struct SnowballMorphology {
    language: Language,
    stemmer: Stemmer,
    lexicon: Lexicon,
}

impl SnowballMorphology {
    pub fn new(language: Language) -> Self {
        let algorithm = match language {
            Language::English => Algorithm::English,
            Language::Russian => Algorithm::Russian,
        };
        Self {
            language,
            stemmer: Stemmer::create(algorithm),
            lexicon: Lexicon::for_language(language),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }
}

impl Morphology for SnowballMorphology {
    fn normal_forms(&self, word: &str) -> Vec<String> {
        if word.is_empty() {
            return Vec::new();
        }
        vec![self.stemmer.stem(word).into_owned()]
    }

    fn morph_info(&self, word: &str) -> Vec<WordClass> {
        let classes = self.lexicon.classify(word);
        if classes.is_empty() {
            vec![WordClass::Content]
        } else {
            classes
        }
    }

    fn is_alphabetic(&self, c: char) -> bool {
        match self.language {
            Language::English => c.is_ascii_lowercase(),
            Language::Russian => matches!(c, 'а'..='я' | 'ё'),
        }
    }
}
