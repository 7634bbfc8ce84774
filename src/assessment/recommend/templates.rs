use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GoalHorizon {
    Short,
    Medium,
    Long,
}

impl GoalHorizon {
    pub fn label(self) -> &'static str {
        match self {
            Self::Short => "short-term",
            Self::Medium => "medium-term",
            Self::Long => "long-term",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTemplate {
    pub id: String,
    pub title: String,
    pub description: String,
    /// 1 (easiest) to 5.
    pub difficulty: u8,
    pub related_interests: Vec<String>,
    pub skills_covered: Vec<String>,
    pub goal_horizon: GoalHorizon,
    pub category: String,
    #[serde(default)]
    pub estimated_hours: u32,
}

#[allow(clippy::too_many_arguments)]
fn template(
    id: &str,
    title: &str,
    description: &str,
    difficulty: u8,
    interests: &[&str],
    skills: &[&str],
    goal_horizon: GoalHorizon,
    category: &str,
    estimated_hours: u32,
) -> ProjectTemplate {
    ProjectTemplate {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        difficulty,
        related_interests: interests.iter().map(|s| s.to_string()).collect(),
        skills_covered: skills.iter().map(|s| s.to_string()).collect(),
        goal_horizon,
        category: category.to_string(),
        estimated_hours,
    }
}

pub fn builtin_templates() -> Vec<ProjectTemplate> {
    use GoalHorizon::*;
    vec![
        template(
            "personal-portfolio",
            "Personal portfolio site",
            "A responsive single-page portfolio with an accessible contact form.",
            1,
            &["web-apps", "design"],
            &["web.html", "web.css", "web.accessibility", "design.visual_hierarchy"],
            Short,
            "frontend",
            8,
        ),
        template(
            "cli-todo",
            "Command-line todo list",
            "Add, complete and filter tasks stored in a JSON file.",
            1,
            &["automation"],
            &["fundamentals.variables", "fundamentals.control_flow", "fundamentals.functions"],
            Short,
            "tooling",
            6,
        ),
        template(
            "quiz-game",
            "Browser quiz game",
            "A timed multiple-choice quiz with a score board, built with plain DOM APIs.",
            2,
            &["games", "web-apps"],
            &["javascript.syntax", "javascript.dom", "fundamentals.data_structures"],
            Short,
            "frontend",
            10,
        ),
        template(
            "weather-dashboard",
            "Weather dashboard",
            "Fetch a public weather API and render a forecast with loading and error states.",
            2,
            &["web-apps", "data"],
            &["javascript.async", "web.http", "javascript.dom", "design.ui_principles"],
            Medium,
            "frontend",
            12,
        ),
        template(
            "file-organizer",
            "Downloads folder organizer",
            "A script that sorts files into folders by type and date, with a dry-run mode.",
            2,
            &["automation"],
            &["fundamentals.functions", "fundamentals.debugging", "backend.node", "practices.testing"],
            Short,
            "tooling",
            8,
        ),
        template(
            "notes-api",
            "Notes REST API",
            "CRUD endpoints for notes backed by a database, with validation and tests.",
            3,
            &["web-apps", "data"],
            &["backend.rest_api", "backend.databases", "backend.node", "practices.testing"],
            Medium,
            "backend",
            20,
        ),
        template(
            "data-viz",
            "Open data explorer",
            "Load a public CSV dataset and build interactive charts with filters.",
            3,
            &["data", "design"],
            &["fundamentals.data_structures", "fundamentals.algorithms", "javascript.async", "design.visual_hierarchy"],
            Medium,
            "data",
            18,
        ),
        template(
            "platformer",
            "Canvas platformer",
            "A small 2D platformer with a game loop, collision detection and levels.",
            3,
            &["games"],
            &["fundamentals.algorithms", "javascript.closures", "fundamentals.debugging", "meta.problem_decomposition"],
            Medium,
            "games",
            25,
        ),
        template(
            "oss-contribution",
            "First open-source contribution",
            "Pick a beginner-friendly issue, open a pull request and respond to review.",
            3,
            &["open-source"],
            &["practices.git", "practices.code_review", "practices.code_quality", "meta.communication"],
            Medium,
            "community",
            15,
        ),
        template(
            "mobile-habits",
            "Habit tracker PWA",
            "An installable progressive web app with offline storage and reminders.",
            4,
            &["mobile", "web-apps"],
            &["javascript.typescript", "javascript.async", "design.ux_critique", "web.accessibility"],
            Long,
            "mobile",
            30,
        ),
        template(
            "auth-service",
            "Authentication service",
            "Sign-up, login and session handling with hashed passwords and rate limiting.",
            4,
            &["web-apps"],
            &["backend.auth", "backend.rest_api", "systems.tradeoffs", "practices.testing"],
            Long,
            "backend",
            30,
        ),
        template(
            "ai-chat-assistant",
            "Study-buddy chat assistant",
            "A chat UI that calls a language model API, streams replies and keeps history.",
            4,
            &["ai", "web-apps"],
            &["javascript.async", "web.http", "systems.architecture", "meta.learning"],
            Long,
            "ai",
            28,
        ),
        template(
            "realtime-board",
            "Realtime collaboration board",
            "A shared board with live updates over websockets, presence and conflict handling.",
            5,
            &["web-apps", "open-source"],
            &["systems.architecture", "systems.scalability", "systems.tradeoffs", "backend.databases"],
            Long,
            "fullstack",
            45,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::assessment::taxonomy::TAXONOMY;

    #[test]
    fn builtin_templates_are_well_formed() {
        let templates = builtin_templates();
        let ids: HashSet<_> = templates.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), templates.len());
        for t in &templates {
            assert!((1..=5).contains(&t.difficulty), "{}", t.id);
            assert!(t.skills_covered.iter().all(|s| TAXONOMY.contains(s)), "{}", t.id);
        }
    }
}
