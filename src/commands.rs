use crate::config::{self, SettingsStore, TomlStore};
use anyhow::Result;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Save one or more settings
    Set {
        /// AWS access key id
        #[arg(long)]
        access_key: Option<String>,
        /// AWS secret access key
        #[arg(long)]
        secret_key: Option<String>,
        /// Endpoint override, e.g. the reverse proxy URL
        #[arg(long)]
        endpoint: Option<String>,
        /// API key forwarded as the x-bedrock-api-key header
        #[arg(long)]
        api_key: Option<String>,
        /// AWS region for request signing
        #[arg(long)]
        region: Option<String>,
        /// Default model id
        #[arg(long)]
        model: Option<String>,
    },
    /// Print the stored settings with secrets redacted
    Show,
}

pub fn settings(action: SettingsAction) -> Result<()> {
    let mut store = TomlStore::open_default()?;

    match action {
        SettingsAction::Set {
            access_key,
            secret_key,
            endpoint,
            api_key,
            region,
            model,
        } => {
            let updates = [
                (config::KEY_ACCESS_KEY, access_key),
                (config::KEY_SECRET_KEY, secret_key),
                (config::KEY_ENDPOINT, endpoint),
                (config::KEY_BEDROCK_API_KEY, api_key),
                (config::KEY_REGION, region),
                (config::KEY_MODEL_ID, model),
            ];

            let mut changed = 0;
            for (key, value) in updates {
                if let Some(value) = value {
                    store.set(key, &value)?;
                    changed += 1;
                }
            }

            if changed == 0 {
                println!("Nothing to save. Pass at least one --option.");
            } else {
                println!("✅ Saved {} setting(s) to {}", changed, store.path().display());
            }
        }
        SettingsAction::Show => {
            let settings = config::Settings::from_store(&store);
            println!("Settings file: {}", store.path().display());
            println!();
            println!("  access key:  {}", redact(&settings.access_key));
            println!("  secret key:  {}", redact(&settings.secret_key));
            println!(
                "  endpoint:    {}",
                settings.endpoint.as_deref().unwrap_or("(regional default)")
            );
            println!(
                "  api key:     {}",
                settings
                    .api_key
                    .as_deref()
                    .map(redact)
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("  region:      {}", settings.region);
            println!("  model:       {}", settings.model_id);
            println!(
                "  streaming:   {}",
                if settings.streaming { "on" } else { "off" }
            );
        }
    }

    Ok(())
}

/// Keep the last four characters, mask the rest.
fn redact(value: &str) -> String {
    if value.is_empty() {
        return "(not set)".to_string();
    }
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_keeps_only_the_tail() {
        assert_eq!(redact("AKIDEXAMPLE"), "*******MPLE");
        assert_eq!(redact("abcd"), "****");
        assert_eq!(redact(""), "(not set)");
    }
}
