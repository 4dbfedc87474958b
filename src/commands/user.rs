//! Account administration.

use anyhow::Result;

use depot::Depot;
use depot::model::Account;

use crate::UserAction;

pub fn execute(depot: &Depot, action: UserAction) -> Result<()> {
    match action {
        UserAction::Add { name, group } => {
            let account = depot.add_user(&name, &group)?;
            println!("Added {}", describe(&account));
        },
        UserAction::List => {
            let accounts = depot.list_users()?;
            if accounts.is_empty() {
                println!("No users");
            }
            for account in accounts {
                println!("{}", describe(&account));
            }
        },
        UserAction::Activate { name } => {
            depot.set_user_active(&name, true)?;
            println!("{name} is active");
        },
        UserAction::Deactivate { name } => {
            depot.set_user_active(&name, false)?;
            println!("{name} is inactive");
        },
        UserAction::AddGroup { name, group } => {
            let account = depot.add_user_group(&name, &group)?;
            println!("{}", describe(&account));
        },
        UserAction::RemoveGroup { name, group } => {
            let account = depot.remove_user_group(&name, &group)?;
            println!("{}", describe(&account));
        },
    }
    Ok(())
}

fn describe(account: &Account) -> String {
    let groups: Vec<&str> = account.groups.iter().map(String::as_str).collect();
    format!(
        "{}{} [{}]",
        account.name,
        if account.is_active { "" } else { " (inactive)" },
        groups.join(", ")
    )
}
