//! Participant registry
//!
//! Maps a participant name to the provider, model, persona prompt and
//! sampling settings used to generate its replies. The registry order is the
//! default speaking order.

use crate::llm::Provider;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Generation settings for one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantConfig {
    pub name: String,
    pub provider: Provider,
    pub model: String,
    /// Short description shown to clients
    #[serde(default)]
    pub personality: String,
    pub system_prompt: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    250
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),
    #[error("Duplicate participant: {0}")]
    DuplicateParticipant(String),
    #[error("Participant roster is empty")]
    Empty,
    #[error("Failed to read participants file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse participants file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Ordered roster of configured participants
#[derive(Debug, Clone)]
pub struct ParticipantRegistry {
    participants: Vec<ParticipantConfig>,
}

impl ParticipantRegistry {
    pub fn new(participants: Vec<ParticipantConfig>) -> Result<Self, RegistryError> {
        if participants.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = HashSet::new();
        for p in &participants {
            if !seen.insert(p.name.to_lowercase()) {
                return Err(RegistryError::DuplicateParticipant(p.name.clone()));
            }
        }

        Ok(Self { participants })
    }

    /// Load a JSON array of participant configs
    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        let participants: Vec<ParticipantConfig> = serde_json::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            count = participants.len(),
            "Loaded participant roster"
        );
        Self::new(participants)
    }

    pub fn get(&self, name: &str) -> Result<&ParticipantConfig, RegistryError> {
        self.participants
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| RegistryError::UnknownParticipant(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.participants.iter().map(|p| p.name.clone()).collect()
    }

    pub fn all(&self) -> &[ParticipantConfig] {
        &self.participants
    }
}

impl Default for ParticipantRegistry {
    fn default() -> Self {
        Self {
            participants: default_roster(),
        }
    }
}

// ============================================================================
// Default roster
// ============================================================================

const ALICE_PROMPT: &str = "You are Alice, an analytical, fact-focused, and methodical thinker who focuses on facts and evidence.

Your personality: Analytical, fact-focused, methodical approach to discussions

In conversations with other AI participants and humans:
- Always reference other participants by name using the format `@Name` when responding to their points
- Base your arguments on data, research, and logical reasoning
- Ask clarifying questions when information is unclear
- Maintain a respectful but direct communication style
- Keep responses concise but thorough (2-4 sentences typical)
- Remember you are part of a multi-participant conversation where each voice matters";

const BOB_PROMPT: &str = "You are Bob, a creative, empathetic, and big-picture thinker who considers emotional and human aspects.

Your personality: Creative, empathetic, big-picture thinker with focus on human impact

In conversations with other AI participants and humans:
- Always reference other participants by name using the format `@Name` when building on their ideas
- Consider the human impact and emotional dimensions of topics
- Offer creative solutions and alternative perspectives
- Bridge different viewpoints with empathy and understanding
- Keep responses warm but substantial (2-4 sentences typical)
- Remember you are part of a collaborative multi-participant conversation";

const CHARLIE_PROMPT: &str = "You are Charlie, a devil's advocate and contrarian thinker who enjoys challenging popular assumptions.

Your personality: Devil's advocate, contrarian, challenges assumptions and pushes for deeper thinking

In conversations with other AI participants and humans:
- Always reference other participants by name using the format `@Name` when challenging their points
- Question underlying assumptions and conventional wisdom
- Present counterarguments and alternative scenarios
- Push for deeper thinking without being dismissive
- Keep responses provocative but respectful (2-4 sentences typical)
- Remember you are part of a multi-participant conversation where dissent adds value";

fn default_roster() -> Vec<ParticipantConfig> {
    vec![
        ParticipantConfig {
            name: "Alice".to_string(),
            provider: Provider::OpenAI,
            model: "gpt-4.1-mini".to_string(),
            personality: "Analytical, fact-focused, methodical".to_string(),
            system_prompt: ALICE_PROMPT.to_string(),
            temperature: 0.3,
            max_tokens: 250,
        },
        ParticipantConfig {
            name: "Bob".to_string(),
            provider: Provider::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            personality: "Creative, empathetic, big-picture".to_string(),
            system_prompt: BOB_PROMPT.to_string(),
            temperature: 0.7,
            max_tokens: 250,
        },
        ParticipantConfig {
            name: "Charlie".to_string(),
            provider: Provider::Gemini,
            model: "gemini-2.5-flash".to_string(),
            personality: "Devil's advocate, contrarian".to_string(),
            system_prompt: CHARLIE_PROMPT.to_string(),
            temperature: 0.8,
            max_tokens: 250,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_roster_order_and_models() {
        let registry = ParticipantRegistry::default();
        assert_eq!(registry.names(), vec!["Alice", "Bob", "Charlie"]);

        let bob = registry.get("Bob").unwrap();
        assert_eq!(bob.provider, Provider::Anthropic);
        assert_eq!(bob.model, "claude-sonnet-4-20250514");
        assert_eq!(bob.max_tokens, 250);
        assert!(bob.system_prompt.contains("@Name"));
    }

    #[test]
    fn test_unknown_participant() {
        let registry = ParticipantRegistry::default();
        assert!(matches!(
            registry.get("Dave"),
            Err(RegistryError::UnknownParticipant(name)) if name == "Dave"
        ));
        assert!(registry.get("alice").is_err());
    }

    #[test]
    fn test_rejects_empty_and_duplicate_rosters() {
        assert!(matches!(ParticipantRegistry::new(vec![]), Err(RegistryError::Empty)));

        let mut roster = default_roster();
        let mut dup = roster[0].clone();
        dup.name = "alice".to_string();
        roster.push(dup);
        assert!(matches!(
            ParticipantRegistry::new(roster),
            Err(RegistryError::DuplicateParticipant(_))
        ));
    }

    #[test]
    fn test_from_file_applies_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "Dana", "provider": "openai", "model": "gpt-4o", "system_prompt": "Be brief"}}]"#
        )
        .unwrap();

        let registry = ParticipantRegistry::from_file(file.path()).unwrap();
        let dana = registry.get("Dana").unwrap();
        assert_eq!(dana.provider, Provider::OpenAI);
        assert_eq!(dana.max_tokens, 250);
        assert!((dana.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            ParticipantRegistry::from_file(file.path()),
            Err(RegistryError::Parse(_))
        ));
    }
}
