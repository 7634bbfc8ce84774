use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKey {
    ProgrammingFundamentals,
    WebFundamentals,
    Javascript,
    Backend,
    DevPractices,
    SystemThinking,
    Design,
    MetaSkills,
}

impl DimensionKey {
    pub const ALL: [DimensionKey; 8] = [
        Self::ProgrammingFundamentals,
        Self::WebFundamentals,
        Self::Javascript,
        Self::Backend,
        Self::DevPractices,
        Self::SystemThinking,
        Self::Design,
        Self::MetaSkills,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProgrammingFundamentals => "programming_fundamentals",
            Self::WebFundamentals => "web_fundamentals",
            Self::Javascript => "javascript",
            Self::Backend => "backend",
            Self::DevPractices => "dev_practices",
            Self::SystemThinking => "system_thinking",
            Self::Design => "design",
            Self::MetaSkills => "meta_skills",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ProgrammingFundamentals => "Programming Fundamentals",
            Self::WebFundamentals => "Web Fundamentals",
            Self::Javascript => "JavaScript",
            Self::Backend => "Backend",
            Self::DevPractices => "Dev Practices",
            Self::SystemThinking => "System Thinking",
            Self::Design => "Design",
            Self::MetaSkills => "Meta Skills",
        }
    }

    /// Display rank, 1 = shown first.
    pub fn rank(self) -> u32 {
        match self {
            Self::ProgrammingFundamentals => 1,
            Self::WebFundamentals => 2,
            Self::Javascript => 3,
            Self::Backend => 4,
            Self::DevPractices => 5,
            Self::SystemThinking => 6,
            Self::Design => 7,
            Self::MetaSkills => 8,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillTag {
    pub key: &'static str,
    pub label: &'static str,
    pub dimension: DimensionKey,
    pub weight: f64,
    #[serde(skip_serializing_if = "no_prerequisites")]
    pub prerequisites: &'static [&'static str],
}

fn no_prerequisites(prerequisites: &&'static [&'static str]) -> bool {
    prerequisites.is_empty()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    pub key: DimensionKey,
    pub label: &'static str,
    pub rank: u32,
    pub skills: Vec<SkillTag>,
}

const fn skill(
    key: &'static str,
    label: &'static str,
    dimension: DimensionKey,
    weight: f64,
    prerequisites: &'static [&'static str],
) -> SkillTag {
    SkillTag {
        key,
        label,
        dimension,
        weight,
        prerequisites,
    }
}

use DimensionKey::*;

const SKILLS: &[SkillTag] = &[
    skill("fundamentals.variables", "Variables & types", ProgrammingFundamentals, 0.8, &[]),
    skill("fundamentals.control_flow", "Control flow", ProgrammingFundamentals, 0.9, &[]),
    skill("fundamentals.functions", "Functions", ProgrammingFundamentals, 1.0, &["fundamentals.control_flow"]),
    skill("fundamentals.data_structures", "Data structures", ProgrammingFundamentals, 0.9, &["fundamentals.variables"]),
    skill("fundamentals.algorithms", "Algorithms", ProgrammingFundamentals, 0.7, &["fundamentals.data_structures"]),
    skill("fundamentals.debugging", "Debugging", ProgrammingFundamentals, 0.6, &[]),
    skill("web.html", "HTML", WebFundamentals, 0.7, &[]),
    skill("web.css", "CSS", WebFundamentals, 0.6, &["web.html"]),
    skill("web.http", "HTTP", WebFundamentals, 0.9, &[]),
    skill("web.accessibility", "Accessibility", WebFundamentals, 0.5, &["web.html"]),
    skill("javascript.syntax", "JavaScript syntax", Javascript, 0.8, &["fundamentals.variables"]),
    skill("javascript.closures", "Closures & scope", Javascript, 0.9, &["fundamentals.functions"]),
    skill("javascript.async", "Async JavaScript", Javascript, 1.0, &["javascript.syntax"]),
    skill("javascript.dom", "DOM manipulation", Javascript, 0.6, &["web.html", "javascript.syntax"]),
    skill("javascript.typescript", "TypeScript", Javascript, 0.5, &["javascript.syntax"]),
    skill("backend.rest_api", "REST APIs", Backend, 0.9, &["web.http"]),
    skill("backend.databases", "Databases", Backend, 0.9, &[]),
    skill("backend.auth", "Authentication", Backend, 0.6, &["backend.rest_api"]),
    skill("backend.node", "Node.js runtime", Backend, 0.7, &["javascript.async"]),
    skill("practices.git", "Git", DevPractices, 0.9, &[]),
    skill("practices.testing", "Testing", DevPractices, 0.8, &["fundamentals.functions"]),
    skill("practices.code_review", "Code review", DevPractices, 0.7, &[]),
    skill("practices.code_quality", "Code quality", DevPractices, 0.8, &[]),
    skill("systems.architecture", "Architecture", SystemThinking, 0.9, &["backend.rest_api"]),
    skill("systems.tradeoffs", "Trade-off analysis", SystemThinking, 0.8, &[]),
    skill("systems.scalability", "Scalability", SystemThinking, 0.6, &["systems.architecture"]),
    skill("design.ui_principles", "UI principles", Design, 0.8, &[]),
    skill("design.ux_critique", "UX critique", Design, 0.7, &["design.ui_principles"]),
    skill("design.visual_hierarchy", "Visual hierarchy", Design, 0.6, &[]),
    skill("meta.learning", "Self-directed learning", MetaSkills, 0.8, &[]),
    skill("meta.communication", "Technical communication", MetaSkills, 0.7, &[]),
    skill("meta.problem_decomposition", "Problem decomposition", MetaSkills, 0.9, &[]),
];

/// Process-wide immutable skill taxonomy.
pub static TAXONOMY: Lazy<Taxonomy> = Lazy::new(|| Taxonomy::new(SKILLS));

#[derive(Debug)]
pub struct Taxonomy {
    skills: BTreeMap<&'static str, SkillTag>,
}

impl Taxonomy {
    fn new(skills: &[SkillTag]) -> Self {
        Self {
            skills: skills.iter().map(|s| (s.key, s.clone())).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&SkillTag> {
        self.skills.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.skills.contains_key(key)
    }

    /// Importance weight; unknown skills weigh 1.0.
    pub fn weight_of(&self, key: &str) -> f64 {
        self.get(key).map(|s| s.weight).unwrap_or(1.0)
    }

    pub fn skills(&self) -> impl Iterator<Item = &SkillTag> {
        self.skills.values()
    }

    pub fn skills_in(&self, dimension: DimensionKey) -> impl Iterator<Item = &SkillTag> {
        self.skills.values().filter(move |s| s.dimension == dimension)
    }

    pub fn dimensions(&self) -> Vec<Dimension> {
        DimensionKey::ALL
            .iter()
            .map(|&key| Dimension {
                key,
                label: key.label(),
                rank: key.rank(),
                skills: self.skills_in(key).cloned().collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prerequisites_reference_known_skills() {
        for skill in TAXONOMY.skills() {
            for pre in skill.prerequisites {
                assert!(TAXONOMY.contains(pre), "{} -> {}", skill.key, pre);
            }
        }
    }

    #[test]
    fn weights_in_unit_interval() {
        assert!(TAXONOMY.skills().all(|s| s.weight > 0.0 && s.weight <= 1.0));
    }

    #[test]
    fn every_dimension_has_skills() {
        let dims = TAXONOMY.dimensions();
        assert_eq!(dims.len(), 8);
        assert!(dims.iter().all(|d| !d.skills.is_empty()));
        assert_eq!(dims[0].key, DimensionKey::ProgrammingFundamentals);
    }
}
