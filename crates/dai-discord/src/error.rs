use dai_catalog::CatalogError;
use dai_core::types::BotId;
use dai_fleet::FleetError;

/// Errors produced while building a Discord bot instance.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("serenity error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("could not load commands: {0}")]
    Catalog(#[from] CatalogError),

    #[error("no bot token configured")]
    NoToken,
}

impl DiscordError {
    pub fn into_fleet(self, id: BotId) -> FleetError {
        FleetError::Setup {
            id,
            reason: self.to_string(),
        }
    }
}
