//! Directory administration.

use anyhow::Result;

use depot::Depot;
use depot::model::{DirectoryUpdate, NewDirectory, Owner};

use super::format_bytes;
use crate::DirAction;

pub fn execute(depot: &Depot, action: DirAction) -> Result<()> {
    match action {
        DirAction::Create {
            path,
            user,
            group,
            public,
            ttl,
            quota,
        } => {
            let directory = depot.create_directory(NewDirectory {
                path,
                user,
                group,
                is_public: public,
                ttl,
                quota,
            })?;
            println!("Created {} ({})", directory.path, directory.owner);
        },
        DirAction::Update {
            path,
            user,
            group,
            anonymous,
            public,
            ttl,
            quota,
        } => {
            let owner = if anonymous {
                Some(Owner::Anonymous)
            } else {
                match (user, group) {
                    (None, None) => None,
                    (user, group) => Some(Owner::from_parts(user, group)?),
                }
            };
            let directory = depot.update_directory(
                &path,
                DirectoryUpdate {
                    owner,
                    is_public: public,
                    ttl,
                    quota,
                },
            )?;
            println!("Updated {}", directory.path);
        },
        DirAction::Delete { path } => {
            let (directory, removed) = depot.delete_directory(&path)?;
            println!("Deleted {} and {removed} artifact(s)", directory.path);
        },
        DirAction::List => {
            let directories = depot.list_all_directories()?;
            if directories.is_empty() {
                println!("No directories");
                return Ok(());
            }
            println!(
                "{:<30} {:<20} {:<7} {:>5} {:>12} {:>12}",
                "PATH", "OWNER", "PUBLIC", "TTL", "SIZE", "QUOTA"
            );
            for directory in directories {
                let size = depot.directory_usage(&directory)?;
                println!(
                    "{:<30} {:<20} {:<7} {:>5} {:>12} {:>12}",
                    directory.path,
                    directory.owner.to_string(),
                    if directory.is_public { "yes" } else { "no" },
                    directory.ttl,
                    format_bytes(size),
                    format_bytes(directory.quota)
                );
            }
        },
    }
    Ok(())
}
