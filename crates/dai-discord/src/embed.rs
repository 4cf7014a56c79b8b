//! Status summary for the built-in `status` command.

use serenity::builder::{CreateEmbed, CreateEmbedFooter};

use dai_agent::pipeline::CommandTable;

const STATUS_COLOR: u32 = 0x2ecc71;

/// Everything shown by `!status`, independent of serenity types.
pub struct StatusSummary {
    pub bot_name: String,
    pub bot_user_id: Option<u64>,
    pub version: &'static str,
    /// `(invocation, model label, provider kind)` per registered command.
    pub commands: Vec<(String, String, String)>,
}

impl StatusSummary {
    pub fn new(bot_name: &str, bot_user_id: Option<u64>, prefix: &str, table: &CommandTable) -> Self {
        let commands = table
            .iter()
            .map(|spec| {
                (
                    format!("{prefix}{}", spec.keyword),
                    spec.label.clone(),
                    spec.provider
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "unconfigured".to_string()),
                )
            })
            .collect();
        Self {
            bot_name: bot_name.to_string(),
            bot_user_id,
            version: env!("CARGO_PKG_VERSION"),
            commands,
        }
    }

    /// Embed fields as `(name, value, inline)`.
    pub fn fields(&self) -> Vec<(String, String, bool)> {
        let user_id = self
            .bot_user_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let commands = if self.commands.is_empty() {
            "none".to_string()
        } else {
            self.commands
                .iter()
                .map(|(cmd, label, provider)| format!("`{cmd}` → {label} ({provider})"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        vec![
            ("Bot ID".to_string(), user_id, true),
            ("Version".to_string(), self.version.to_string(), true),
            ("Commands".to_string(), commands, false),
        ]
    }

    pub fn to_create_embed(&self) -> CreateEmbed {
        let mut e = CreateEmbed::new()
            .title("Bot Status")
            .description(format!("**{}** is online", self.bot_name))
            .color(STATUS_COLOR);
        for (name, value, inline) in self.fields() {
            e = e.field(name, value, inline);
        }
        e.footer(CreateEmbedFooter::new("D.AI bot manager"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_lists_no_commands() {
        let summary = StatusSummary::new("alpha", Some(42), "!", &CommandTable::default());
        let fields = summary.fields();
        assert_eq!(fields[0], ("Bot ID".to_string(), "42".to_string(), true));
        assert_eq!(fields[1].1, env!("CARGO_PKG_VERSION"));
        assert_eq!(fields[2].1, "none");
    }

    #[test]
    fn unknown_user_id_before_ready() {
        let summary = StatusSummary::new("alpha", None, "!", &CommandTable::default());
        assert_eq!(summary.fields()[0].1, "unknown");
    }
}
