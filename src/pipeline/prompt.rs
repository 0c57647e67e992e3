//! Prompt construction. Everything here is pure string assembly.

use serde::{Deserialize, Serialize};

use crate::llm::Prompt;

const NO_CONTEXT: &str = "No specific NCF context available.";

const STRATEGY_PERSONA: &str = r#"You are "Shiksha Saathi", a pedagogy assistant for teachers in Indian government schools. A teacher is in the middle of a lesson and needs help that works right now.

You know NCF 2023, NEP 2020 and the FLN (foundational literacy and numeracy) mission, and the NCERT, DIKSHA and DIET teacher material built on them.

RULES
1. Give EXACTLY 3 strategies.
   - Strategy 1: quick fix, at most 2 minutes.
   - Strategy 2: interactive activity, 5 to 7 minutes.
   - Strategy 3: visual demonstration, 1 to 3 minutes.
2. Each strategy has 3 or 4 steps. Each step is under 15 words and starts with a verb ("Draw", "Ask", "Divide", "Show").
3. No theory or background. The teacher is in class.
4. Assume a blackboard, chalk and basic stationery. No projector, no internet.
5. Prefer Indian examples: roti, dal, cricket, Diwali, the village market.
6. Match the language the teacher asks for. Multilingual classrooms are normal.

OUTPUT
Return ONLY one JSON object, no markdown and no commentary:
{
  "strategies": [
    {
      "title": "Short catchy name",
      "title_hi": "हिंदी में नाम",
      "time_minutes": 2,
      "difficulty": "easy",
      "steps": ["Step 1", "Step 2", "Step 3"],
      "materials": ["blackboard", "chalk"],
      "ncf_alignment": "One NCF principle this follows"
    }
  ]
}
"difficulty" is one of "easy", "medium", "hard"."#;

const SOLVE_PERSONA: &str = r#"You are an experienced school teacher in India. Solve the problem step by step, clearly and simply, for the given grade.

GUIDELINES
1. Keep explanations student-friendly.
2. For maths, show every calculation step.
3. For science, state the concept before applying it.
4. Use Indian curriculum (NCERT) terminology.

OUTPUT
Return ONLY one JSON object, no markdown fence:
{
  "solution_markdown": "Full solution in markdown. LaTeX is allowed for maths.",
  "steps": [
    {"title": "Step 1", "content": "What to do and why"}
  ],
  "concept_explanation": "Short explanation of the underlying concept",
  "difficulty_level": "Easy, Medium or Hard",
  "detected_subject": "Mathematics, Science, ..."
}"#;

const MEDIA_QUERY_PERSONA: &str =
    "You turn teacher questions into short video search queries. Reply with the query only.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Hi,
    En,
    Hinglish,
}

impl Language {
    pub fn label(&self) -> &'static str {
        match self {
            Language::Hi => "Hindi",
            Language::En => "English",
            Language::Hinglish => "Hinglish (Hindi and English mixed, Latin script)",
        }
    }
}

/// Everything a strategy prompt interpolates.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub grade: &'a str,
    pub subject: &'a str,
    pub query: &'a str,
    pub time_left_minutes: u32,
    pub language: Language,
    pub class_size: Option<u32>,
    pub teacher_name: Option<&'a str>,
    pub extra_context: Option<&'a str>,
    /// Formatted retrieval context; empty when nothing cleared the threshold.
    pub ncf_context: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct SolveContext<'a> {
    pub problem_text: &'a str,
    pub grade: &'a str,
    pub subject: &'a str,
    pub language: Language,
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    temperature: f64,
    solve_temperature: f64,
    emergency_threshold_minutes: u32,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(0.7, 0.4, 5)
    }
}

impl PromptBuilder {
    pub fn new(temperature: f64, solve_temperature: f64, emergency_threshold_minutes: u32) -> Self {
        Self {
            temperature,
            solve_temperature,
            emergency_threshold_minutes,
        }
    }

    pub fn is_emergency(&self, time_left_minutes: u32) -> bool {
        time_left_minutes <= self.emergency_threshold_minutes
    }

    /// The emergency variant when little class time remains, otherwise the
    /// regular strategy prompt.
    pub fn for_request(&self, ctx: &StrategyContext<'_>) -> Prompt {
        if self.is_emergency(ctx.time_left_minutes) {
            self.emergency_prompt(ctx)
        } else {
            self.strategy_prompt(ctx)
        }
    }

    pub fn strategy_prompt(&self, ctx: &StrategyContext<'_>) -> Prompt {
        let mut user = String::new();
        user.push_str(&format!("Teacher: {}\n", ctx.teacher_name.unwrap_or("Teacher")));
        user.push_str(&teacher_context(ctx));
        user.push_str(&format!(
            "\nQuestion: {}\n\nAdditional Context: {}\n\n",
            ctx.query.trim(),
            ctx.extra_context
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or("None provided")
        ));
        user.push_str(&ncf_block(ctx.ncf_context));
        user.push_str("\n\nRespond with ONLY valid JSON containing 3 strategies.");

        Prompt::new(STRATEGY_PERSONA, user, self.temperature)
    }

    pub fn emergency_prompt(&self, ctx: &StrategyContext<'_>) -> Prompt {
        let minutes = ctx.time_left_minutes;
        let user = format!(
            "EMERGENCY: the teacher is in front of the class right now \
             and the lesson is slipping.\n\
             Only {minutes} minute(s) remain. Every strategy must fit in that time; \
             lead with the fastest.\n\
             {pacing}\n\n\
             # TEACHER CONTEXT\n{teacher}Challenge: {challenge}\n\n\
             # RETRIEVED NCF CONTEXT\n{ncf}\n\n\
             Respond with ONLY valid JSON containing 3 strategies. \
             No markdown, no explanation.",
            pacing = emergency_pacing(minutes),
            teacher = teacher_context(ctx),
            challenge = ctx.query.trim(),
            ncf = ncf_block(ctx.ncf_context),
        );

        Prompt::new(STRATEGY_PERSONA, user, self.temperature)
    }

    pub fn solve_prompt(&self, ctx: &SolveContext<'_>) -> Prompt {
        let user = format!(
            "Problem: {}\nStudent Grade: {}\nSubject: {}\nLanguage: {}\n\nSolve this step-by-step.",
            ctx.problem_text.trim(),
            ctx.grade,
            ctx.subject,
            ctx.language.label(),
        );
        Prompt::new(SOLVE_PERSONA, user, self.solve_temperature)
    }

    /// Asks for a 3 to 5 word video search query for `question`.
    pub fn media_query_prompt(&self, question: &str) -> Prompt {
        let user = format!(
            "Convert this teacher question into a 3-5 word YouTube search query \
             for Indian education: '{}'. Return ONLY the query.",
            question.trim()
        );
        Prompt::new(MEDIA_QUERY_PERSONA, user, 0.2)
    }
}

/// Replaces the persona's 2 / 5-7 / 1-3 minute pacing under a hard cap.
fn emergency_pacing(minutes: u32) -> String {
    format!(
        "PACING OVERRIDE: this time cap replaces the usual pacing rules. \
         Strategy 2 is not a 5 to 7 minute activity here; \
         all three strategies, time_minutes included, must be {} minute(s) or less.",
        minutes.max(1)
    )
}

fn teacher_context(ctx: &StrategyContext<'_>) -> String {
    let mut block = format!(
        "Grade: {}\nSubject: {}\nTime Left: {} minutes\nLanguage: {}\n",
        ctx.grade,
        ctx.subject,
        ctx.time_left_minutes,
        ctx.language.label()
    );
    if let Some(size) = ctx.class_size {
        block.push_str(&format!("Class Size: {} students\n", size));
    }
    block
}

fn ncf_block(context: &str) -> String {
    if context.trim().is_empty() {
        NO_CONTEXT.to_string()
    } else {
        format!("NCF GUIDELINES (use these as primary reference):\n{}", context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(time_left: u32, ncf: &'a str) -> StrategyContext<'a> {
        StrategyContext {
            grade: "4",
            subject: "Math",
            query: "bachche fractions nahi samajh rahe",
            time_left_minutes: time_left,
            language: Language::Hinglish,
            class_size: Some(40),
            teacher_name: Some("Sunita"),
            extra_context: None,
            ncf_context: ncf,
        }
    }

    #[test]
    fn strategy_prompt_interpolates_request() {
        let prompt =
            PromptBuilder::default().strategy_prompt(&ctx(20, "[NCF, Page 3]\nUse play.\n"));

        assert!(prompt.system.contains("EXACTLY 3 strategies"));
        assert!(prompt.user.contains("Teacher: Sunita"));
        assert!(prompt.user.contains("Grade: 4\nSubject: Math\nTime Left: 20 minutes"));
        assert!(prompt.user.contains("Class Size: 40 students"));
        assert!(prompt.user.contains("Question: bachche fractions nahi samajh rahe"));
        assert!(prompt.user.contains("Additional Context: None provided"));
        assert!(prompt.user.contains("NCF GUIDELINES"));
        assert!(prompt.user.contains("[NCF, Page 3]"));
        assert_eq!(prompt.temperature, 0.7);
    }

    #[test]
    fn empty_context_uses_placeholder() {
        let prompt = PromptBuilder::default().strategy_prompt(&ctx(20, "  "));
        assert!(prompt.user.contains(NO_CONTEXT));
        assert!(!prompt.user.contains("NCF GUIDELINES"));
    }

    #[test]
    fn emergency_prompt_used_at_or_below_threshold() {
        let builder = PromptBuilder::default();
        assert!(builder.for_request(&ctx(5, "")).user.starts_with("EMERGENCY"));
        assert!(builder.for_request(&ctx(3, "")).user.contains("Only 3 minute(s) remain"));
        assert!(!builder.for_request(&ctx(6, "")).user.starts_with("EMERGENCY"));
    }

    #[test]
    fn emergency_prompt_overrides_persona_pacing() {
        let prompt = PromptBuilder::default().emergency_prompt(&ctx(1, ""));
        assert!(prompt.system.contains("5 to 7 minutes"));
        assert!(prompt.user.contains("PACING OVERRIDE"));
        assert!(prompt.user.contains("must be 1 minute(s) or less"));

        let normal = PromptBuilder::default().strategy_prompt(&ctx(20, ""));
        assert!(!normal.user.contains("PACING OVERRIDE"));
    }

    #[test]
    fn solve_prompt_uses_solve_temperature() {
        let prompt = PromptBuilder::default().solve_prompt(&SolveContext {
            problem_text: "2x + 3 = 7",
            grade: "8",
            subject: "Math",
            language: Language::En,
        });
        assert!(prompt.system.contains("\"solution_markdown\""));
        assert!(prompt.user.starts_with("Problem: 2x + 3 = 7\nStudent Grade: 8"));
        assert!(prompt.user.contains("Language: English"));
        assert_eq!(prompt.temperature, 0.4);
    }

    #[test]
    fn media_query_prompt_quotes_question() {
        let prompt = PromptBuilder::default().media_query_prompt(" noisy class ");
        assert!(prompt.user.contains("'noisy class'"));
        assert!(prompt.user.ends_with("Return ONLY the query."));
    }
}
