use clap::Args;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{issue_token, Claims};
use crate::cli::{utils::output_success, OutputFormat};
use crate::config;

#[derive(Args)]
pub struct TokenArgs {
    #[arg(long, help = "Tenant the token acts within")]
    pub tenant: String,

    #[arg(long, help = "Acting user id (random UUID when omitted)")]
    pub actor: Option<String>,

    #[arg(long = "role", help = "Role granted to the actor (repeatable)")]
    pub roles: Vec<String>,

    #[arg(long, help = "Hours until expiry (defaults to SECURITY_JWT_EXPIRY_HOURS)")]
    pub expiry_hours: Option<u64>,
}

pub async fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = &config::config().security;
    let actor = args.actor.unwrap_or_else(|| Uuid::new_v4().to_string());
    let expiry_hours = args.expiry_hours.unwrap_or(security.jwt_expiry_hours);

    let claims = Claims::new(actor, args.tenant, args.roles, expiry_hours);
    let token = issue_token(&security.jwt_secret, &claims)?;

    match output_format {
        OutputFormat::Json => output_success(
            &output_format,
            "Token issued",
            Some(json!({ "token": token, "claims": claims })),
        ),
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
    }
}
