//! OASF taxonomy classification (§3 "Classification").

use crate::agent::{ScoredSlug, Slug, SEARCH_CONFIDENCE_THRESHOLD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a classification came from. Resolution priority is
/// `CreatorDefined > LlmClassification > None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassificationSource {
    None,
    LlmClassification,
    CreatorDefined,
}

/// One resolved skill or domain slug with optional reasoning text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationEntry {
    pub slug: Slug,
    pub confidence: f64,
    pub reasoning: Option<String>,
}

/// Full classification result for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub skills: Vec<ClassificationEntry>,
    pub domains: Vec<ClassificationEntry>,
    pub overall_confidence: f64,
    pub source: ClassificationSource,
    pub model_version: Option<String>,
    pub classified_at: DateTime<Utc>,
}

impl Classification {
    /// Merge two classification sources by the documented priority,
    /// preferring whichever has the higher `source` rank; ties keep `self`.
    pub fn resolve_priority(self, other: Classification) -> Classification {
        if other.source > self.source {
            other
        } else {
            self
        }
    }

    /// Entries eligible for search indexing (I6): confidence >= 0.7.
    pub fn indexed_skills(&self) -> Vec<ScoredSlug> {
        Self::filter_indexed(&self.skills)
    }

    pub fn indexed_domains(&self) -> Vec<ScoredSlug> {
        Self::filter_indexed(&self.domains)
    }

    fn filter_indexed(entries: &[ClassificationEntry]) -> Vec<ScoredSlug> {
        entries
            .iter()
            .filter(|e| e.confidence >= SEARCH_CONFIDENCE_THRESHOLD)
            .map(|e| ScoredSlug {
                slug: e.slug.clone(),
                confidence: e.confidence,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification(source: ClassificationSource) -> Classification {
        Classification {
            skills: vec![
                ClassificationEntry { slug: "nlp".into(), confidence: 0.9, reasoning: None },
                ClassificationEntry { slug: "low-conf".into(), confidence: 0.4, reasoning: None },
            ],
            domains: vec![],
            overall_confidence: 0.8,
            source,
            model_version: None,
            classified_at: Utc::now(),
        }
    }

    #[test]
    fn creator_defined_wins_over_llm() {
        let llm = classification(ClassificationSource::LlmClassification);
        let creator = classification(ClassificationSource::CreatorDefined);
        let resolved = llm.resolve_priority(creator.clone());
        assert_eq!(resolved.source, ClassificationSource::CreatorDefined);

        let resolved2 = creator.resolve_priority(classification(ClassificationSource::LlmClassification));
        assert_eq!(resolved2.source, ClassificationSource::CreatorDefined);
    }

    #[test]
    fn indexed_skills_excludes_low_confidence() {
        let c = classification(ClassificationSource::LlmClassification);
        let indexed = c.indexed_skills();
        assert_eq!(indexed.len(), 1);
        assert_eq!(indexed[0].slug, "nlp");
    }
}
