use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub imap: ImapConfig,
    pub smtp: SmtpConfig,
    pub llm: LlmConfig,
    pub language: LanguageConfig,
    pub scheduler: SchedulerConfig,
    pub batch_size: usize,
    pub run_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub schedule_times: Vec<String>, // Format: "HH:MM" (e.g., ["07:00", "19:00"])
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImapConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender_name: String,
    pub recipient: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Claude,
    OpenAi,
    Perplexity,
}

impl std::str::FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "claude" => Ok(LlmProvider::Claude),
            "openai" => Ok(LlmProvider::OpenAi),
            "perplexity" => Ok(LlmProvider::Perplexity),
            other => anyhow::bail!(
                "Unknown LLM provider '{}' (expected: claude, openai or perplexity)",
                other
            ),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: String,
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// CEFR proficiency tier controlling generated text complexity
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum LanguageLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl std::str::FromStr for LanguageLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "A1" => Ok(LanguageLevel::A1),
            "A2" => Ok(LanguageLevel::A2),
            "B1" => Ok(LanguageLevel::B1),
            "B2" => Ok(LanguageLevel::B2),
            "C1" => Ok(LanguageLevel::C1),
            "C2" => Ok(LanguageLevel::C2),
            other => anyhow::bail!(
                "Unknown language level '{}' (expected a CEFR code: A1, A2, B1, B2, C1 or C2)",
                other
            ),
        }
    }
}

impl std::fmt::Display for LanguageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            LanguageLevel::A1 => "A1",
            LanguageLevel::A2 => "A2",
            LanguageLevel::B1 => "B1",
            LanguageLevel::B2 => "B2",
            LanguageLevel::C1 => "C1",
            LanguageLevel::C2 => "C2",
        };
        write!(f, "{}", code)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LanguageConfig {
    pub known: String,
    pub target: String,
    pub level: LanguageLevel,
}

impl Config {
    pub fn new() -> Result<Self> {
        // Vérifier que les variables essentielles sont définies
        Self::check_required_env_vars()?;

        // Configuration chargée depuis les variables d'environnement
        Ok(Config {
            imap: ImapConfig {
                server: std::env::var("IMAP_SERVER")
                    .unwrap_or_else(|_| "imap.gmail.com".to_string()),
                port: std::env::var("IMAP_PORT")
                    .unwrap_or_else(|_| "993".to_string())
                    .parse()
                    .unwrap_or(993),
                username: std::env::var("IMAP_USERNAME")
                    .expect("IMAP_USERNAME doit être défini"),
                password: std::env::var("IMAP_PASSWORD")
                    .expect("IMAP_PASSWORD doit être défini"),
            },
            smtp: SmtpConfig {
                server: std::env::var("SMTP_SERVER")
                    .unwrap_or_else(|_| "smtp.gmail.com".to_string()),
                port: std::env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse()
                    .unwrap_or(587),
                username: std::env::var("SMTP_USERNAME")
                    .or_else(|_| std::env::var("IMAP_USERNAME"))
                    .expect("SMTP_USERNAME ou IMAP_USERNAME doit être défini"),
                password: std::env::var("SMTP_PASSWORD")
                    .or_else(|_| std::env::var("IMAP_PASSWORD"))
                    .expect("SMTP_PASSWORD ou IMAP_PASSWORD doit être défini"),
                sender_name: std::env::var("SMTP_SENDER_NAME")
                    .unwrap_or_else(|_| "Lingodigest".to_string()),
                recipient: std::env::var("DIGEST_RECIPIENT")
                    .expect("DIGEST_RECIPIENT doit être défini"),
            },
            llm: LlmConfig {
                provider: std::env::var("LLM_PROVIDER")
                    .unwrap_or_else(|_| "claude".to_string())
                    .parse()?,
                api_key: std::env::var("LLM_API_KEY")
                    .expect("LLM_API_KEY doit être défini"),
                model: std::env::var("LLM_MODEL").ok(),
                max_tokens: std::env::var("LLM_MAX_TOKENS")
                    .unwrap_or_else(|_| "4096".to_string())
                    .parse()
                    .unwrap_or(4096),
                temperature: std::env::var("LLM_TEMPERATURE")
                    .unwrap_or_else(|_| "0.7".to_string())
                    .parse()
                    .unwrap_or(0.7),
            },
            language: LanguageConfig {
                known: std::env::var("KNOWN_LANGUAGE")
                    .unwrap_or_else(|_| "English".to_string()),
                target: std::env::var("TARGET_LANGUAGE")
                    .expect("TARGET_LANGUAGE doit être défini"),
                level: std::env::var("TARGET_LANGUAGE_LEVEL")
                    .unwrap_or_else(|_| "B1".to_string())
                    .parse()?,
            },
            scheduler: SchedulerConfig {
                enabled: std::env::var("SCHEDULER_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
                schedule_times: std::env::var("SCHEDULER_TIMES")
                    .unwrap_or_else(|_| "07:00".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
            batch_size: std::env::var("BATCH_SIZE")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(20),
            run_timeout_secs: std::env::var("RUN_TIMEOUT_SECS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .unwrap_or(600),
        })
    }

    fn check_required_env_vars() -> Result<()> {
        let required_vars = [
            "IMAP_USERNAME",
            "IMAP_PASSWORD",
            "DIGEST_RECIPIENT",
            "LLM_API_KEY",
            "TARGET_LANGUAGE",
        ];

        let mut missing_vars = Vec::new();

        for var in &required_vars {
            if std::env::var(var).is_err() {
                missing_vars.push(*var);
            }
        }

        if !missing_vars.is_empty() {
            anyhow::bail!(
                "Variables d'environnement manquantes: {}\n\
                 \n\
                 💡 Solutions :\n\
                 1. Créer un fichier .env avec vos credentials :\n\
                    cp .env.example .env\n\
                    # Puis éditer .env avec vos valeurs\n\
                 \n\
                 2. Ou définir les variables manuellement :\n\
                    export IMAP_USERNAME=me@gmail.com\n\
                    export IMAP_PASSWORD=app-password\n\
                    export DIGEST_RECIPIENT=me@gmail.com\n\
                    export LLM_API_KEY=sk-...\n\
                    export TARGET_LANGUAGE=German\n\
                    cargo run -- --dry-run",
                missing_vars.join(", ")
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_level_parsing() {
        assert_eq!("b2".parse::<LanguageLevel>().unwrap(), LanguageLevel::B2);
        assert_eq!("A1".parse::<LanguageLevel>().unwrap(), LanguageLevel::A1);
        assert_eq!(" c2 ".parse::<LanguageLevel>().unwrap(), LanguageLevel::C2);
        assert!("D1".parse::<LanguageLevel>().is_err());
    }

    #[test]
    fn test_language_level_display() {
        assert_eq!(LanguageLevel::B1.to_string(), "B1");
        assert_eq!(LanguageLevel::C2.to_string(), "C2");
    }

    #[test]
    fn test_llm_provider_parsing() {
        assert_eq!("claude".parse::<LlmProvider>().unwrap(), LlmProvider::Claude);
        assert_eq!("OpenAI".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAi);
        assert_eq!(
            "perplexity".parse::<LlmProvider>().unwrap(),
            LlmProvider::Perplexity
        );
        assert!("mistral".parse::<LlmProvider>().is_err());
    }
}
