//! Share inspection.

use anyhow::Result;

use depot::Depot;

use crate::ShareAction;

pub fn execute(depot: &Depot, action: ShareAction) -> Result<()> {
    match action {
        ShareAction::List { user } => {
            let identity = depot.identity_of(&user)?;
            for share in depot.list_shares(&identity)? {
                println!(
                    "/shares/{}  {}  {}",
                    share.token,
                    share.created_at.format("%Y-%m-%d %H:%M:%S"),
                    share.artifact
                );
            }
        },
    }
    Ok(())
}
