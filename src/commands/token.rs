//! Lookup token administration.

use anyhow::Result;
use chrono::Utc;

use depot::Depot;

use crate::TokenAction;

pub fn execute(depot: &Depot, action: TokenAction) -> Result<()> {
    match action {
        TokenAction::Create { user, description } => {
            let token = depot.create_token(&user, &description, Utc::now())?;
            println!("{}", token.secret);
        },
        TokenAction::List { user } => {
            for token in depot.list_tokens(&user)? {
                println!(
                    "{}  {}  {}",
                    token.secret,
                    token.created_at.format("%Y-%m-%d %H:%M:%S"),
                    token.description
                );
            }
        },
        TokenAction::Delete { user, secret } => {
            depot.delete_token(&user, &secret)?;
            println!("Token deleted");
        },
    }
    Ok(())
}
