//! Canned strategy sets served when retrieval or generation is unavailable.

use serde::Serialize;

use crate::llm::{Difficulty, Strategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Fractions,
    ClassroomManagement,
    Engagement,
    General,
}

const FRACTION_KEYWORDS: &[&str] = &["fraction", "भिन्न", "half", "आधा"];
const CLASSROOM_KEYWORDS: &[&str] = &["chaos", "discipline", "अनुशासन", "noise", "control"];
const ENGAGEMENT_KEYWORDS: &[&str] = &["engage", "attention", "ध्यान", "bore", "interest"];

/// First matching keyword set wins, in the order fractions, classroom
/// management, engagement.
pub fn classify(text: &str) -> Scenario {
    let lowered = text.to_lowercase();
    let matches = |keywords: &[&str]| keywords.iter().any(|k| lowered.contains(k));

    if matches(FRACTION_KEYWORDS) {
        Scenario::Fractions
    } else if matches(CLASSROOM_KEYWORDS) {
        Scenario::ClassroomManagement
    } else if matches(ENGAGEMENT_KEYWORDS) {
        Scenario::Engagement
    } else {
        Scenario::General
    }
}

pub fn fallback_for(query: &str) -> Vec<Strategy> {
    strategies(classify(query))
}

struct Canned {
    title: &'static str,
    title_hi: &'static str,
    minutes: u32,
    difficulty: Difficulty,
    steps: &'static [&'static str],
    materials: &'static [&'static str],
    alignment: &'static str,
    success_count: u32,
}

impl Canned {
    fn into_strategy(self, id: u32) -> Strategy {
        Strategy {
            id,
            title: self.title.to_string(),
            title_localized: self.title_hi.to_string(),
            time_minutes: self.minutes,
            difficulty: self.difficulty,
            steps: self.steps.iter().map(|s| s.to_string()).collect(),
            materials: self.materials.iter().map(|s| s.to_string()).collect(),
            ncf_alignment: self.alignment.to_string(),
            success_count: self.success_count,
            video_url: None,
        }
    }
}

pub fn strategies(scenario: Scenario) -> Vec<Strategy> {
    let set = match scenario {
        Scenario::Fractions => fractions(),
        Scenario::ClassroomManagement => classroom_management(),
        Scenario::Engagement => engagement(),
        Scenario::General => general(),
    };
    set.into_iter()
        .zip(1u32..)
        .map(|(canned, id)| canned.into_strategy(id))
        .collect()
}

fn fractions() -> [Canned; 3] {
    [
        Canned {
            title: "Roti Division Method",
            title_hi: "रोटी विभाजन विधि",
            minutes: 2,
            difficulty: Difficulty::Easy,
            steps: &[
                "Draw a whole roti on the board and label it 1",
                "Split it down the middle and label each part 1/2",
                "Ask: if two friends share it, what does each get?",
            ],
            materials: &["blackboard", "chalk"],
            alignment: "Concrete to abstract (NCF 2023)",
            success_count: 156,
        },
        Canned {
            title: "Pair-Share Tiffin Count",
            title_hi: "जोड़ी में टिफिन गिनती",
            minutes: 5,
            difficulty: Difficulty::Medium,
            steps: &[
                "Seat students in pairs",
                "Have each pair count the items in one tiffin",
                "One partner takes half, both count their share",
                "Write my_items / total_items on the slate",
            ],
            materials: &["students' tiffins", "slate"],
            alignment: "Peer learning (NCF 2023)",
            success_count: 89,
        },
        Canned {
            title: "Pizza Circle Visual",
            title_hi: "पिज्जा वृत्त चित्र",
            minutes: 1,
            difficulty: Difficulty::Easy,
            steps: &[
                "Draw three pizza circles on the board",
                "Shade half of each circle with chalk",
                "Point and say: the shaded part is 1/2",
            ],
            materials: &["blackboard", "coloured chalk"],
            alignment: "Visual representation (NCF 2023)",
            success_count: 201,
        },
    ]
}

fn classroom_management() -> [Canned; 3] {
    [
        Canned {
            title: "Clap Pattern Game",
            title_hi: "ताली पैटर्न खेल",
            minutes: 1,
            difficulty: Difficulty::Easy,
            steps: &[
                "Clap a simple pattern: clap, clap, pause",
                "Have the class repeat it together",
                "Slow the pattern down until the room is silent",
            ],
            materials: &[],
            alignment: "Active engagement (NCF 2023)",
            success_count: 324,
        },
        Canned {
            title: "Statue Challenge",
            title_hi: "मूर्ति चुनौती",
            minutes: 2,
            difficulty: Difficulty::Easy,
            steps: &[
                "Call out: 1, 2, 3... STATUE!",
                "Students freeze on the spot",
                "Praise the stillest statues, let others retry",
                "Give the next instruction while everyone is frozen",
            ],
            materials: &[],
            alignment: "Game-based learning (NCF 2023)",
            success_count: 278,
        },
        Canned {
            title: "Whisper Chain",
            title_hi: "फुसफुसाहट श्रृंखला",
            minutes: 3,
            difficulty: Difficulty::Medium,
            steps: &[
                "Whisper the instruction to the front row",
                "Each row whispers it to the row behind",
                "Ask the last row to say it aloud",
                "Notice how the class quiets down to listen",
            ],
            materials: &[],
            alignment: "Collaborative learning (NCF 2023)",
            success_count: 145,
        },
    ]
}

fn engagement() -> [Canned; 3] {
    [
        Canned {
            title: "Quick Stand Up",
            title_hi: "तुरंत खड़े हो जाओ",
            minutes: 1,
            difficulty: Difficulty::Easy,
            steps: &[
                "Ask a yes or no question about the topic",
                "Say: stand up if your answer is YES",
                "Count who stands and discuss the reasons",
            ],
            materials: &[],
            alignment: "Physical movement (NCF 2023)",
            success_count: 412,
        },
        Canned {
            title: "Board Helper",
            title_hi: "बोर्ड सहायक",
            minutes: 3,
            difficulty: Difficulty::Easy,
            steps: &[
                "Invite a quiet student to the board",
                "Name them today's teacher's helper",
                "Let them write or draw while you explain",
                "Rotate helpers every five minutes",
            ],
            materials: &["blackboard", "chalk"],
            alignment: "Student agency (NCF 2023)",
            success_count: 289,
        },
        Canned {
            title: "Story Hook",
            title_hi: "कहानी का हुक",
            minutes: 2,
            difficulty: Difficulty::Easy,
            steps: &[
                "Begin: let me tell you about Ram...",
                "Tie the character to today's topic",
                "Continue: Ram had 4 rotis and 2 friends arrived",
                "Ask: how much does each person get?",
            ],
            materials: &[],
            alignment: "Narrative pedagogy (NCF 2023)",
            success_count: 356,
        },
    ]
}

fn general() -> [Canned; 3] {
    [
        Canned {
            title: "Think-Pair-Share",
            title_hi: "सोचो-जोड़ी बनाओ-बताओ",
            minutes: 5,
            difficulty: Difficulty::Easy,
            steps: &[
                "Pose a question and give 30 seconds to think",
                "Pair with a neighbour and discuss for a minute",
                "Pick random pairs to share with the class",
            ],
            materials: &[],
            alignment: "Collaborative learning (NCF 2023)",
            success_count: 523,
        },
        Canned {
            title: "Real Object Demo",
            title_hi: "असली वस्तु प्रदर्शन",
            minutes: 3,
            difficulty: Difficulty::Easy,
            steps: &[
                "Pick up any object in the classroom",
                "Link it to today's topic",
                "Pass it around so students can touch it",
                "Ask questions about the object",
            ],
            materials: &["any classroom object"],
            alignment: "Experiential learning (NCF 2023)",
            success_count: 234,
        },
        Canned {
            title: "Quick Quiz Fingers",
            title_hi: "उंगलियों से क्विज़",
            minutes: 2,
            difficulty: Difficulty::Easy,
            steps: &[
                "Ask a multiple choice question with options A, B, C",
                "Show 1 finger for A, 2 for B, 3 for C",
                "Scan the fingers and address common mistakes",
            ],
            materials: &[],
            alignment: "Formative assessment (NCF 2023)",
            success_count: 467,
        },
    ]
}
