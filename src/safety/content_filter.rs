//! Content Filter
//!
//! Detects and neutralizes diagnostic and treatment language in generated text.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Kind of forbidden language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermCategory {
    Diagnostic,
    Treatment,
}

impl TermCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermCategory::Diagnostic => "diagnostic",
            TermCategory::Treatment => "treatment",
        }
    }
}

impl std::fmt::Display for TermCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A forbidden stem and the neutral rewrite of each word form built on it.
/// The first form is the base term.
struct ForbiddenStem {
    stem: &'static str,
    category: TermCategory,
    forms: &'static [(&'static str, &'static str)],
}

/// No replacement contains any stem in this table.
const FORBIDDEN_STEMS: &[ForbiddenStem] = &[
    ForbiddenStem {
        stem: "diagnos",
        category: TermCategory::Diagnostic,
        forms: &[
            ("diagnosis", "clinical impression"),
            ("diagnoses", "clinical impressions"),
            ("diagnose", "assess"),
            ("diagnosed", "assessed"),
            ("diagnosing", "assessing"),
            ("diagnostic", "clinical"),
            ("diagnostics", "clinical findings"),
            ("diagnostically", "clinically"),
        ],
    },
    ForbiddenStem {
        stem: "disease",
        category: TermCategory::Diagnostic,
        forms: &[("disease", "presentation"), ("diseases", "presentations"), ("diseased", "affected")],
    },
    ForbiddenStem {
        stem: "disorder",
        category: TermCategory::Diagnostic,
        forms: &[("disorder", "presentation"), ("disorders", "presentations"), ("disordered", "disrupted")],
    },
    ForbiddenStem {
        stem: "syndrome",
        category: TermCategory::Diagnostic,
        forms: &[("syndrome", "symptom pattern"), ("syndromes", "symptom patterns")],
    },
    ForbiddenStem {
        stem: "condition",
        category: TermCategory::Diagnostic,
        forms: &[
            ("condition", "state"),
            ("conditions", "states"),
            ("conditioned", "shaped"),
            ("conditioning", "shaping"),
        ],
    },
    ForbiddenStem {
        stem: "patholog",
        category: TermCategory::Diagnostic,
        forms: &[
            ("pathology", "clinical finding"),
            ("pathologies", "clinical findings"),
            ("pathological", "atypical"),
            ("pathologic", "atypical"),
            ("pathologically", "atypically"),
            ("pathologist", "specialist"),
        ],
    },
    ForbiddenStem {
        stem: "prescri",
        category: TermCategory::Treatment,
        forms: &[
            ("prescribe", "consider"),
            ("prescribes", "considers"),
            ("prescribed", "considered"),
            ("prescribing", "considering"),
            ("prescriber", "clinician"),
            ("prescription", "care plan"),
            ("prescriptions", "care plans"),
        ],
    },
    ForbiddenStem {
        stem: "medicat",
        category: TermCategory::Treatment,
        forms: &[
            ("medication", "management"),
            ("medications", "management"),
            ("medicate", "manage"),
            ("medicated", "managed"),
            ("medicating", "managing"),
        ],
    },
    ForbiddenStem {
        stem: "drug",
        category: TermCategory::Treatment,
        forms: &[("drug", "substance"), ("drugs", "substances"), ("drugged", "sedated")],
    },
    ForbiddenStem {
        stem: "treat",
        category: TermCategory::Treatment,
        forms: &[
            ("treatment", "management"),
            ("treatments", "management"),
            ("treat", "manage"),
            ("treats", "manages"),
            ("treated", "managed"),
            ("treating", "managing"),
            ("treatable", "manageable"),
        ],
    },
    ForbiddenStem {
        stem: "therap",
        category: TermCategory::Treatment,
        forms: &[
            ("therapy", "support"),
            ("therapies", "supports"),
            ("therapeutic", "supportive"),
            ("therapeutically", "supportively"),
            ("therapist", "support worker"),
            ("therapists", "support workers"),
        ],
    },
    ForbiddenStem {
        stem: "surger",
        category: TermCategory::Treatment,
        forms: &[("surgery", "specialist review"), ("surgeries", "specialist reviews")],
    },
    ForbiddenStem {
        stem: "surgic",
        category: TermCategory::Treatment,
        forms: &[("surgical", "specialist"), ("surgically", "by a specialist")],
    },
    ForbiddenStem {
        stem: "procedur",
        category: TermCategory::Treatment,
        forms: &[("procedure", "step"), ("procedures", "steps"), ("procedural", "stepwise")],
    },
    ForbiddenStem {
        stem: "intervention",
        category: TermCategory::Treatment,
        forms: &[
            ("intervention", "action"),
            ("interventions", "actions"),
            ("interventional", "active"),
        ],
    },
];

/// Whole words that contain a stem but carry no clinical meaning.
const ALLOWED_WORDS: &[&str] = &[
    "conditional",
    "conditionally",
    "unconditional",
    "unconditionally",
    "treaty",
    "treaties",
    "retreat",
    "retreats",
    "retreated",
    "retreating",
    "entreat",
    "entreated",
    "treatise",
    "treatises",
];

lazy_static! {
    static ref WORD_PATTERN: Regex = Regex::new(r"\w+").unwrap();
    static ref STEM_PATTERN: Regex = {
        let stems: Vec<&str> = FORBIDDEN_STEMS.iter().map(|s| s.stem).collect();
        Regex::new(&format!("(?i)({})", stems.join("|"))).unwrap()
    };
}

/// A forbidden term found in some text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TermMatch {
    /// Word form matched, e.g. "diagnosing"
    pub term: &'static str,
    pub category: TermCategory,
}

/// Result of sanitizing one piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    pub text: String,
    /// Distinct terms found, in order of first occurrence
    pub matches: Vec<TermMatch>,
}

/// Forbidden-term filter for generated clinical text. Terms match anywhere
/// inside a word ("misdiagnosis", "pretreatment"); any prefix is kept and
/// the term's word form is replaced.
#[derive(Debug, Clone, Default)]
pub struct ForbiddenTermFilter;

impl ForbiddenTermFilter {
    pub fn new() -> Self {
        Self
    }

    /// Distinct forbidden terms in `text`.
    pub fn check(&self, text: &str) -> Vec<TermMatch> {
        self.sanitize(text).matches
    }

    /// Rewrite every forbidden term with its neutral equivalent.
    pub fn sanitize(&self, text: &str) -> Sanitized {
        let mut matches = Vec::new();
        let rewritten = WORD_PATTERN.replace_all(text, |caps: &Captures| {
            let word = &caps[0];
            if ALLOWED_WORDS.contains(&word.to_lowercase().as_str()) {
                return word.to_string();
            }
            rewrite_word(word, &mut matches)
        });
        Sanitized {
            text: rewritten.into_owned(),
            matches,
        }
    }
}

/// Replace each stem-bearing form inside `word`, left to right.
fn rewrite_word(word: &str, matches: &mut Vec<TermMatch>) -> String {
    let mut out = String::with_capacity(word.len());
    let mut rest = word;

    while let Some(found) = STEM_PATTERN.find(rest) {
        let prefix = &rest[..found.start()];
        let tail = &rest[found.start()..];
        let Some(stem) = FORBIDDEN_STEMS.iter().find(|s| found.as_str().eq_ignore_ascii_case(s.stem)) else {
            break;
        };

        // Longest listed form wins; an unlisted form is replaced up to the
        // end of the word with the base term's rewrite.
        let (form, replacement, consumed) = match longest_form(stem, tail) {
            Some((form, replacement)) => (form, replacement, form.len()),
            None => (stem.forms[0].0, stem.forms[0].1, tail.len()),
        };

        let m = TermMatch {
            term: form,
            category: stem.category,
        };
        if !matches.contains(&m) {
            matches.push(m);
        }

        out.push_str(prefix);
        if prefix.is_empty() {
            out.push_str(&match_case(tail, replacement));
        } else {
            out.push_str(replacement);
        }
        rest = &tail[consumed..];
    }

    out.push_str(rest);
    out
}

fn longest_form(stem: &ForbiddenStem, tail: &str) -> Option<(&'static str, &'static str)> {
    stem.forms
        .iter()
        .filter(|(form, _)| {
            tail.as_bytes()
                .get(..form.len())
                .map_or(false, |head| head.eq_ignore_ascii_case(form.as_bytes()))
        })
        .max_by_key(|(form, _)| form.len())
        .copied()
}

fn match_case(original: &str, replacement: &str) -> String {
    let upper = original.chars().next().map(char::is_uppercase).unwrap_or(false);
    if !upper {
        return replacement.to_string();
    }
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnosis_becomes_clinical_impression() {
        let filter = ForbiddenTermFilter::new();
        let out = filter.sanitize("Working diagnosis: musculoskeletal strain.");
        assert_eq!(out.text, "Working clinical impression: musculoskeletal strain.");
        assert_eq!(
            out.matches,
            vec![TermMatch {
                term: "diagnosis",
                category: TermCategory::Diagnostic
            }]
        );
    }

    #[test]
    fn test_case_and_inflection_preserved() {
        let filter = ForbiddenTermFilter::new();
        assert_eq!(filter.sanitize("Treatment options").text, "Management options");
        assert_eq!(filter.sanitize("no drugs taken").text, "no substances taken");
        assert_eq!(filter.sanitize("treating the pain").text, "managing the pain");
        assert_eq!(filter.sanitize("DIAGNOSE later").text, "Assess later");
        assert_eq!(filter.sanitize("was prescribed rest").text, "was considered rest");
        assert_eq!(filter.sanitize("prescribing nothing").text, "considering nothing");
        assert_eq!(filter.sanitize("diagnosing early").text, "assessing early");
        assert_eq!(filter.sanitize("Therapies vary").text, "Supports vary");
        assert_eq!(filter.sanitize("two surgeries").text, "two specialist reviews");
    }

    #[test]
    fn test_terms_inside_words() {
        let filter = ForbiddenTermFilter::new();

        let out = filter.sanitize("pretreatment and overmedication");
        assert_eq!(out.text, "premanagement and overmanagement");
        assert_eq!(out.matches.len(), 2);

        let out = filter.sanitize("a misdiagnosis");
        assert_eq!(out.text, "a misclinical impression");
        assert_eq!(out.matches[0].category, TermCategory::Diagnostic);

        assert_eq!(filter.sanitize("Nondrug options").text, "Nonsubstance options");
    }

    #[test]
    fn test_allowed_words() {
        let filter = ForbiddenTermFilter::new();
        assert!(filter.check("a retreat by the sea").is_empty());
        assert!(filter.check("conditional on rest").is_empty());
        assert!(filter.check("Unconditionally calm").is_empty());
        assert_eq!(filter.check("an underlying condition").len(), 1);
    }

    #[test]
    fn test_every_replacement_is_clean() {
        let filter = ForbiddenTermFilter::new();
        for stem in FORBIDDEN_STEMS {
            for (form, replacement) in stem.forms {
                assert!(filter.check(replacement).is_empty(), "replacement for {} is not clean", form);
                for word in [form.to_string(), format!("mis{}", form), format!("{}ly", form)] {
                    let once = filter.sanitize(&word);
                    assert!(!once.matches.is_empty(), "{} not matched", word);
                    assert!(filter.check(&once.text).is_empty(), "{} -> {}", word, once.text);
                }
            }
        }
        for word in ["prescribed", "prescribing", "diagnosing", "therapies", "surgeries", "diagnosable"] {
            let once = filter.sanitize(word);
            assert!(!once.matches.is_empty(), "{} not matched", word);
            assert!(filter.check(&once.text).is_empty(), "{} -> {}", word, once.text);
        }
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let filter = ForbiddenTermFilter::new();
        let text = "Diagnosis unclear; surgical procedures and drug therapy were discussed as treatment.";
        let once = filter.sanitize(text);
        assert!(!once.matches.is_empty());
        let twice = filter.sanitize(&once.text);
        assert_eq!(twice.text, once.text);
        assert!(twice.matches.is_empty());
    }
}
