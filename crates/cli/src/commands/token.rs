use chrono::Utc;
use serde::Serialize;
use shoprec_core::domain::analytics::UserId;
use shoprec_core::TokenSigner;

use crate::commands::{load_config, to_data, CommandResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenOutput {
    user_id: String,
    token: String,
    expires_at: String,
}

/// Mints a bearer token for `GET /recommendations/{user_id}`.
pub fn run(user_id: &str) -> CommandResult {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return CommandResult::failure("token", "invalid_input", "user id must not be empty", 2);
    }

    let config = match load_config("token") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let signer = TokenSigner::new(config.auth.signing_secret.clone(), config.auth.token_ttl_secs);
    let now = Utc::now();
    let issued = (signer.issue(&UserId::from(user_id), now), signer.expires_at(now));
    let (token, expires_at) = match issued {
        (Ok(token), Ok(expires_at)) => (token, expires_at),
        (Err(error), _) | (_, Err(error)) => {
            return CommandResult::failure("token", "signing", error.to_string(), 7)
        }
    };

    let output =
        TokenOutput { user_id: user_id.to_string(), token, expires_at: expires_at.to_rfc3339() };
    CommandResult::success_with(
        "token",
        format!("token for {user_id} expires at {}", output.expires_at),
        to_data(&output),
    )
}
