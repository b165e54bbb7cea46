use std::time::Duration;

use clap::Parser;
use pratas_common::address::PostalCode;

use crate::melhor_envio::DEFAULT_MELHOR_ENVIO_URL;
use crate::viacep::DEFAULT_VIACEP_URL;

fn parse_postal_code(raw: &str) -> Result<PostalCode, String> {
    PostalCode::parse(raw).ok_or_else(|| format!("{raw:?} is not an 8-digit postal code"))
}

/// Credentials are read from flags or the environment only; none have defaults.
#[derive(Parser, Clone)]
#[command(name = "pratas-storefront", about = "Jewelry storefront API: catalog, shipping, checkout, admin")]
pub struct Cli {
    /// HTTP port to listen on.
    #[arg(long, env = "PRATAS_PORT", default_value_t = 3010)]
    pub port: u16,

    /// Postal code parcels ship from.
    #[arg(long, env = "PRATAS_ORIGIN_POSTAL_CODE", default_value = "96020360", value_parser = parse_postal_code)]
    pub origin_postal_code: PostalCode,

    #[arg(long, env = "MELHOR_ENVIO_URL", default_value = DEFAULT_MELHOR_ENVIO_URL)]
    pub melhor_envio_url: String,

    /// Bearer token for shipping quotes. Without it quotes report "not configured".
    #[arg(long, env = "MELHOR_ENVIO_TOKEN", hide_env_values = true)]
    pub melhor_envio_token: Option<String>,

    /// Melhor Envio requires a contact in the User-Agent.
    #[arg(long, env = "MELHOR_ENVIO_USER_AGENT", default_value = "pratas-storefront")]
    pub melhor_envio_user_agent: String,

    #[arg(long, env = "VIACEP_URL", default_value = DEFAULT_VIACEP_URL)]
    pub viacep_url: String,

    /// Hosted backend project URL. Demo mode (in-memory store) when unset.
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    #[arg(long, env = "SUPABASE_SERVICE_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,

    /// Bearer token for /admin routes. Admin routes refuse every call when unset.
    #[arg(long, env = "PRATAS_ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Timeout for outbound HTTP calls, in seconds.
    #[arg(long, env = "PRATAS_HTTP_TIMEOUT_SECS", default_value_t = 10)]
    pub http_timeout_secs: u64,
}

impl Cli {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    /// Backend URL and key, when both are present.
    pub fn supabase(&self) -> Option<(&str, &str)> {
        let url = self.supabase_url.as_deref().filter(|u| !u.trim().is_empty())?;
        let key = self.supabase_key.as_deref().filter(|k| !k.trim().is_empty())?;
        Some((url, key))
    }
}
