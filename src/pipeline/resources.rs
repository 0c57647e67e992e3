//! Quick-reference tips for recurring classroom challenges.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceTopic {
    pub title: &'static str,
    pub title_hi: &'static str,
    pub strategies: &'static [&'static str],
}

/// The full reference sheet, one topic per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuickReference {
    pub classroom_management: ResourceTopic,
    pub differentiation: ResourceTopic,
    pub local_materials: ResourceTopic,
    pub assessment: ResourceTopic,
}

impl QuickReference {
    pub fn topics(&self) -> [(&'static str, &ResourceTopic); 4] {
        [
            ("classroom_management", &self.classroom_management),
            ("differentiation", &self.differentiation),
            ("local_materials", &self.local_materials),
            ("assessment", &self.assessment),
        ]
    }
}

static QUICK_REFERENCE: QuickReference = QuickReference {
    classroom_management: ResourceTopic {
        title: "Classroom Management Quick Tips",
        title_hi: "कक्षा प्रबंधन त्वरित सुझाव",
        strategies: &[
            "Use a signal (bell, clap pattern) to get attention",
            "Establish clear routines for transitions",
            "Create mixed-ability groups of 4-5 students",
            "Use non-verbal cues (hand signals) for common needs",
        ],
    },
    differentiation: ResourceTopic {
        title: "Differentiated Learning Strategies",
        title_hi: "विभेदित शिक्षण रणनीतियाँ",
        strategies: &[
            "Task cards with different difficulty levels",
            "Peer tutoring: advanced students help struggling ones",
            "Learning stations with different activities",
            "Extension tasks for early finishers",
        ],
    },
    local_materials: ResourceTopic {
        title: "Teaching with Local Materials",
        title_hi: "स्थानीय सामग्री से शिक्षण",
        strategies: &[
            "Math: stones, sticks, seeds for counting and operations",
            "Science: leaves, flowers, soil samples for observations",
            "Language: local stories, community members as resources",
            "Art: natural dyes, clay, leaves for creative activities",
        ],
    },
    assessment: ResourceTopic {
        title: "Quick Formative Assessment",
        title_hi: "त्वरित रचनात्मक मूल्यांकन",
        strategies: &[
            "Thumbs up/down for understanding checks",
            "Exit tickets: one question on scrap paper",
            "Think-pair-share for oral assessment",
            "Observation checklists during group work",
        ],
    },
};

pub fn quick_reference() -> &'static QuickReference {
    &QUICK_REFERENCE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_topic_is_bilingual_with_four_tips() {
        for (key, topic) in quick_reference().topics() {
            assert!(!topic.title.is_empty(), "{key}");
            assert!(
                topic.title_hi.chars().any(|c| ('\u{0900}'..='\u{097F}').contains(&c)),
                "{key}"
            );
            assert_eq!(topic.strategies.len(), 4, "{key}");
        }
    }

    #[test]
    fn serializes_every_topic_by_key() {
        let value = serde_json::to_value(quick_reference()).unwrap();
        let keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys.len(), 4);
        assert!(keys.contains(&"local_materials"));
        assert_eq!(
            value["assessment"]["strategies"][0],
            "Thumbs up/down for understanding checks"
        );
    }
}
