//! Built-in verified health knowledge base
//!
//! Bulk-loaded into the semantic tier at startup. Facts are general and never
//! user-specific; sources are public clinical guidelines.

use crate::memory::types::{FactConfidence, FactType, SemanticFact};

pub(crate) struct KnowledgeEntry {
    pub fact_text: &'static str,
    pub fact_type: FactType,
    pub category: &'static str,
    pub context: &'static str,
    pub source: &'static str,
    pub confidence: FactConfidence,
}

impl KnowledgeEntry {
    pub fn to_fact(&self) -> SemanticFact {
        SemanticFact {
            fact_text: self.fact_text.to_string(),
            fact_type: self.fact_type,
            category: self.category.to_string(),
            context: self.context.to_string(),
            source: self.source.to_string(),
            confidence: self.confidence,
        }
    }
}

pub(crate) const VERIFIED_FACTS: &[KnowledgeEntry] = &[
    KnowledgeEntry {
        fact_text: "A normal resting heart rate for adults ranges from 60 to 100 beats per minute",
        fact_type: FactType::Guideline,
        category: "heart_rate",
        context: "resting, adults",
        source: "American Heart Association",
        confidence: FactConfidence::High,
    },
    KnowledgeEntry {
        fact_text: "Resting heart rate is the number of heartbeats per minute while at complete rest",
        fact_type: FactType::Definition,
        category: "heart_rate",
        context: "measurement",
        source: "American Heart Association",
        confidence: FactConfidence::High,
    },
    KnowledgeEntry {
        fact_text: "Well-trained athletes may have a resting heart rate closer to 40 beats per minute",
        fact_type: FactType::Guideline,
        category: "heart_rate",
        context: "athletes",
        source: "American Heart Association",
        confidence: FactConfidence::High,
    },
    KnowledgeEntry {
        fact_text: "Adults should aim for at least 150 minutes of moderate aerobic activity per week",
        fact_type: FactType::Guideline,
        category: "exercise",
        context: "weekly activity, adults",
        source: "WHO physical activity guidelines",
        confidence: FactConfidence::High,
    },
    KnowledgeEntry {
        fact_text: "A commonly cited daily step target for general health is 8000 to 10000 steps",
        fact_type: FactType::Guideline,
        category: "steps",
        context: "daily activity",
        source: "CDC",
        confidence: FactConfidence::Medium,
    },
    KnowledgeEntry {
        fact_text: "Adults should get 7 or more hours of sleep per night on a regular basis",
        fact_type: FactType::Guideline,
        category: "sleep",
        context: "adults",
        source: "American Academy of Sleep Medicine",
        confidence: FactConfidence::High,
    },
    KnowledgeEntry {
        fact_text: "Sleep duration is the total time spent asleep, excluding time awake in bed",
        fact_type: FactType::Definition,
        category: "sleep",
        context: "measurement",
        source: "American Academy of Sleep Medicine",
        confidence: FactConfidence::High,
    },
    KnowledgeEntry {
        fact_text: "Body mass index is body weight in kilograms divided by height in meters squared",
        fact_type: FactType::Definition,
        category: "weight",
        context: "measurement",
        source: "WHO",
        confidence: FactConfidence::High,
    },
    KnowledgeEntry {
        fact_text: "A body mass index between 18.5 and 24.9 is considered within the healthy range for adults",
        fact_type: FactType::Guideline,
        category: "weight",
        context: "adults",
        source: "WHO",
        confidence: FactConfidence::High,
    },
    KnowledgeEntry {
        fact_text: "Gradual weight loss of 1 to 2 pounds per week is considered safe and sustainable",
        fact_type: FactType::Guideline,
        category: "weight",
        context: "weight loss",
        source: "CDC",
        confidence: FactConfidence::High,
    },
    KnowledgeEntry {
        fact_text: "Regular aerobic exercise tends to lower resting heart rate over time",
        fact_type: FactType::Relationship,
        category: "heart_rate",
        context: "exercise adaptation",
        source: "American Heart Association",
        confidence: FactConfidence::High,
    },
    KnowledgeEntry {
        fact_text: "Insufficient sleep is associated with elevated resting heart rate the following day",
        fact_type: FactType::Relationship,
        category: "sleep",
        context: "sleep and heart rate",
        source: "sleep research literature",
        confidence: FactConfidence::Medium,
    },
    KnowledgeEntry {
        fact_text: "Normal blood oxygen saturation measured by pulse oximetry is 95 to 100 percent",
        fact_type: FactType::Guideline,
        category: "spo2",
        context: "healthy adults at sea level",
        source: "WHO pulse oximetry training manual",
        confidence: FactConfidence::High,
    },
    KnowledgeEntry {
        fact_text: "Heart rate variability is the variation in time between consecutive heartbeats",
        fact_type: FactType::Definition,
        category: "hrv",
        context: "measurement",
        source: "clinical literature",
        confidence: FactConfidence::High,
    },
    KnowledgeEntry {
        fact_text: "Higher heart rate variability at rest generally indicates better cardiovascular fitness",
        fact_type: FactType::Relationship,
        category: "hrv",
        context: "fitness",
        source: "clinical literature",
        confidence: FactConfidence::Medium,
    },
    KnowledgeEntry {
        fact_text: "Active energy is the energy burned through movement above the resting baseline",
        fact_type: FactType::Definition,
        category: "energy",
        context: "measurement",
        source: "exercise physiology references",
        confidence: FactConfidence::High,
    },
];
