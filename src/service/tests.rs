//! Tests for the depot facade.

use super::*;
use crate::model::Owner;
use chrono::TimeZone;
use tempfile::TempDir;

fn user(name: &str) -> Identity {
    Identity::user(Account::new(name))
}

fn upload(name: &str, data: &[u8], is_permanent: bool) -> Upload {
    Upload {
        filename: Some(name.to_string()),
        data: data.to_vec(),
        is_permanent,
    }
}

fn new_dir(path: &str) -> NewDirectory {
    NewDirectory {
        path: path.to_string(),
        ..Default::default()
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 1, 2, 3, 4, 5).unwrap()
}

#[test]
fn test_quota_scenario() {
    let depot = Depot::memory();
    depot
        .create_directory(NewDirectory {
            user: Some("user1".into()),
            quota: Some(27),
            ..new_dir("/home/user1")
        })
        .unwrap();
    let user1 = user("user1");

    depot
        .upload("home/user1", upload("a.txt", &[1; 14], false), &user1, now())
        .unwrap();

    let err = depot
        .upload("home/user1/", upload("b.txt", &[2; 14], false), &user1, now())
        .unwrap_err();
    assert!(matches!(err, Error::QuotaExceeded { size: 14, incoming: 14, quota: 27 }));
    assert_eq!(err.status_code(), 403);

    depot
        .update_directory(
            "/home/user1",
            DirectoryUpdate {
                quota: Some(28),
                ..Default::default()
            },
        )
        .unwrap();
    depot
        .upload("home/user1", upload("b.txt", &[2; 14], false), &user1, now())
        .unwrap();

    let entries = depot.directories(&user1).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].size, 28);
    assert_eq!(entries[0].progress, 100);
    assert!(entries[0].writable);
}

#[test]
fn test_upload_checks() {
    let depot = Depot::memory();
    depot
        .create_directory(NewDirectory {
            user: Some("user1".into()),
            ..new_dir("/home/user1")
        })
        .unwrap();
    depot.create_directory(new_dir("/anon")).unwrap();

    let err = depot
        .upload("nope", upload("a", b"a", false), &user("user1"), now())
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = depot
        .upload("home/user1", upload("a", b"a", false), &user("user2"), now())
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    let err = depot
        .upload("home/user1", Upload::default(), &user("user1"), now())
        .unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));

    // Parent of a real directory is not itself a directory
    let err = depot
        .upload("home", upload("a", b"a", false), &user("user1"), now())
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // Owner-less directories accept anonymous uploads
    let artifact = depot
        .upload("anon", upload("../../x.bin", b"x", false), &Identity::Anonymous, now())
        .unwrap();
    assert_eq!(artifact.path, "anon/2015/01/02/03/04/x.bin");
    assert_eq!(artifact.directory, "/anon");
}

#[test]
fn test_upload_name_collision() {
    let depot = Depot::memory();
    depot.create_directory(new_dir("/anon")).unwrap();
    let anon = Identity::Anonymous;

    let first = depot
        .upload("anon", upload("data.txt", b"1", true), &anon, now())
        .unwrap();
    let second = depot
        .upload("anon", upload("data.txt", b"2", true), &anon, now())
        .unwrap();

    assert_eq!(first.path, "anon/data.txt");
    assert_ne!(second.path, first.path);
    assert!(second.path.starts_with("anon/data_"));
    assert!(second.path.ends_with(".txt"));
    assert_eq!(second.path.len(), "anon/data_1234567.txt".len());

    let (_, data) = depot.fetch("anon/data.txt", &user("someone")).unwrap();
    assert_eq!(data, b"1");
}

#[test]
fn test_upload_does_not_shadow_child_directory() {
    let tmp = TempDir::new().unwrap();
    let depot = Depot::open(tmp.path(), DirectoryDefaults::default()).unwrap();
    depot.create_directory(new_dir("/pub")).unwrap();
    depot.create_directory(new_dir("/pub/debian")).unwrap();
    let anon = Identity::Anonymous;

    let file = depot
        .upload("pub", upload("debian", b"not a dir", true), &anon, now())
        .unwrap();
    assert_ne!(file.path, "pub/debian");
    assert!(file.path.starts_with("pub/debian_"));

    let nested = depot
        .upload("pub/debian", upload("x.iso", b"iso", false), &anon, now())
        .unwrap();
    assert_eq!(nested.path, "pub/debian/2015/01/02/03/04/x.iso");

    // A name equal to a pseudo-directory is renamed too
    let bucket = depot
        .upload("pub/debian", upload("2015", b"year", true), &anon, now())
        .unwrap();
    assert_ne!(bucket.path, "pub/debian/2015");

    let Resolved::Listing(listing) = depot.resolve("pub/", &user("someone")).unwrap() else {
        panic!("expected a listing");
    };
    assert_eq!(listing.directories, vec!["debian".to_string()]);
    assert!(listing.files.iter().all(|f| f.name != "debian"));
}

#[test]
fn test_delete_artifact() {
    let depot = Depot::memory();
    depot
        .create_directory(NewDirectory {
            user: Some("user1".into()),
            is_public: true,
            ..new_dir("/pub")
        })
        .unwrap();
    let artifact = depot
        .upload("pub", upload("a.txt", b"abc", true), &user("user1"), now())
        .unwrap();

    let err = depot.delete_artifact("pub/", &user("user1")).unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));

    let err = depot
        .delete_artifact(&artifact.path, &Identity::Anonymous)
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    depot.delete_artifact(&artifact.path, &user("user1")).unwrap();
    let err = depot.fetch(&artifact.path, &user("user1")).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    let err = depot.delete_artifact(&artifact.path, &user("user1")).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn test_describe() {
    let depot = Depot::memory();
    depot
        .create_directory(NewDirectory {
            is_public: true,
            ..new_dir("/pub")
        })
        .unwrap();
    depot
        .upload("pub", upload("notes.json", b"{}", true), &Identity::Anonymous, now())
        .unwrap();

    let info = depot.describe("pub/notes.json", &Identity::Anonymous).unwrap();
    assert_eq!(info.size, 2);
    assert_eq!(info.content_type, "application/json");
    assert_eq!(info.digest, blake3::hash(b"{}").to_hex().to_string());

    assert!(matches!(
        depot.describe("", &Identity::Anonymous).unwrap_err(),
        Error::NotFound(_)
    ));
    assert!(matches!(
        depot.describe("pub/missing", &Identity::Anonymous).unwrap_err(),
        Error::NotFound(_)
    ));
}

#[test]
fn test_directory_admin() {
    let depot = Depot::memory();

    let err = depot
        .create_directory(NewDirectory {
            user: Some("u".into()),
            group: Some("g".into()),
            ..new_dir("/both")
        })
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    for bad in ["relative", "/trailing/", "/", "/a/../b"] {
        assert!(depot.create_directory(new_dir(bad)).is_err(), "{bad}");
    }

    let dir = depot.create_directory(new_dir("/pub")).unwrap();
    assert_eq!(dir.ttl, DEFAULT_TTL_DAYS);
    assert_eq!(dir.quota, DEFAULT_QUOTA_BYTES);
    assert!(matches!(
        depot.create_directory(new_dir("/pub")).unwrap_err(),
        Error::Validation(_)
    ));

    let updated = depot
        .update_directory(
            "/pub",
            DirectoryUpdate {
                owner: Some(Owner::Group("staff".into())),
                ttl: Some(7),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.owner, Owner::Group("staff".into()));
    assert_eq!(updated.ttl, 7);

    let err = depot
        .update_directory(
            "/pub",
            DirectoryUpdate {
                quota: Some(0),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(matches!(
        depot
            .update_directory("/nope", DirectoryUpdate::default())
            .unwrap_err(),
        Error::NotFound(_)
    ));
}

#[test]
fn test_delete_directory_releases_blobs() {
    let tmp = TempDir::new().unwrap();
    let depot = Depot::open(tmp.path(), DirectoryDefaults::default()).unwrap();
    depot.create_directory(new_dir("/anon")).unwrap();
    depot
        .upload("anon", upload("a.bin", b"a", false), &Identity::Anonymous, now())
        .unwrap();
    depot
        .upload("anon", upload("b.bin", b"b", true), &Identity::Anonymous, now())
        .unwrap();

    let (dir, removed) = depot.delete_directory("/anon").unwrap();
    assert_eq!(dir.path, "/anon");
    assert_eq!(removed, 2);
    assert!(!tmp.path().join("blobs/anon").exists());
    assert!(tmp.path().join("blobs").exists());
    assert!(matches!(
        depot.delete_directory("/anon").unwrap_err(),
        Error::NotFound(_)
    ));
}

#[test]
fn test_upload_rechecks_directory_under_lock() {
    let blobs = Arc::new(MemoryBlobs::new());
    let depot = Depot::new(MetadataStore::memory(), blobs.clone(), DirectoryDefaults::default());
    depot.create_directory(new_dir("/anon")).unwrap();

    let lock = depot.upload_lock("/anon");
    let guard = lock.lock();
    let result = std::thread::scope(|scope| {
        let pending = scope.spawn(|| {
            depot.upload("anon", upload("late.bin", b"late", true), &Identity::Anonymous, now())
        });
        // Let the upload pass its first lookup and wait on the lock
        std::thread::sleep(std::time::Duration::from_millis(50));
        depot.store.remove_directory("/anon").unwrap();
        drop(guard);
        pending.join().unwrap()
    });

    assert!(matches!(result.unwrap_err(), Error::NotFound(_)));
    assert!(depot.store.artifacts_with_prefix("anon/").unwrap().is_empty());
    assert_eq!(blobs.count(), 0);
}

#[test]
fn test_delete_directory_waits_for_upload_lock() {
    let depot = Depot::memory();
    depot.create_directory(new_dir("/anon")).unwrap();

    let lock = depot.upload_lock("/anon");
    let guard = lock.lock();
    std::thread::scope(|scope| {
        let deleting = scope.spawn(|| depot.delete_directory("/anon"));
        std::thread::sleep(std::time::Duration::from_millis(50));
        // Still blocked: the directory is intact while an upload holds the lock
        assert!(depot.store.get_directory("/anon").unwrap().is_some());
        drop(guard);
        let (dir, removed) = deleting.join().unwrap().unwrap();
        assert_eq!(dir.path, "/anon");
        assert_eq!(removed, 0);
    });
    assert!(depot.store.get_directory("/anon").unwrap().is_none());
}

#[test]
fn test_clean_releases_blobs_on_disk() {
    let tmp = TempDir::new().unwrap();
    let depot = Depot::open(tmp.path(), DirectoryDefaults::default()).unwrap();
    depot
        .create_directory(NewDirectory {
            ttl: Some(1),
            ..new_dir("/tmp")
        })
        .unwrap();
    let old = depot
        .upload("tmp", upload("old.log", b"old", false), &Identity::Anonymous, now())
        .unwrap();

    let report = depot
        .clean(None, false, now() + chrono::Duration::days(2))
        .unwrap();
    assert_eq!(report.removed(), 1);
    assert!(!tmp.path().join("blobs").join(&old.path).exists());
    assert!(!tmp.path().join("blobs/tmp/2015").exists());
    assert!(report.pruned_dirs >= 1);
}

#[test]
fn test_accounts_and_tokens() {
    let depot = Depot::memory();
    depot.add_user("user1", &["staff".to_string()]).unwrap();
    assert!(matches!(
        depot.add_user("user1", &[]).unwrap_err(),
        Error::Validation(_)
    ));

    let t1 = depot.create_token("user1", "ci", now()).unwrap();
    let t2 = depot
        .create_token("user1", "laptop", now() + chrono::Duration::seconds(1))
        .unwrap();
    assert!(matches!(
        depot.create_token("ghost", "", now()).unwrap_err(),
        Error::NotFound(_)
    ));

    let tokens = depot.list_tokens("user1").unwrap();
    assert_eq!(tokens, vec![t1.clone(), t2.clone()]);

    let identity = depot
        .identify(Identity::Anonymous, Some(&t1.secret))
        .unwrap();
    assert!(identity.is_user("user1"));
    assert!(identity.in_group("staff"));

    depot.add_user("user2", &[]).unwrap();
    assert!(matches!(
        depot.delete_token("user2", &t1.secret).unwrap_err(),
        Error::NotFound(_)
    ));
    depot.delete_token("user1", &t1.secret).unwrap();
    let identity = depot
        .identify(Identity::Anonymous, Some(&t1.secret))
        .unwrap();
    assert!(identity.is_anonymous());

    let account = depot.set_user_active("user1", false).unwrap();
    assert!(!account.is_active);
    let account = depot.remove_user_group("user1", "staff").unwrap();
    assert!(account.groups.is_empty());
    assert_eq!(depot.list_users().unwrap().len(), 2);
}

#[test]
fn test_with_suffix() {
    assert_eq!(with_suffix("data.txt", "abcdefg"), "data_abcdefg.txt");
    assert_eq!(with_suffix("archive.tar.gz", "abcdefg"), "archive.tar_abcdefg.gz");
    assert_eq!(with_suffix(".bashrc", "abcdefg"), ".bashrc_abcdefg");
    assert_eq!(with_suffix("README", "abcdefg"), "README_abcdefg");
}

#[tokio::test]
async fn test_async_wrappers() {
    let depot = Depot::memory();
    depot
        .create_directory(NewDirectory {
            is_public: true,
            ..new_dir("/pub")
        })
        .unwrap();

    let artifact = depot
        .upload_async("pub".into(), upload("a.txt", b"hello", true), Identity::Anonymous)
        .await
        .unwrap();

    let (resolved, data) = depot
        .get_async(artifact.path.clone(), Identity::Anonymous)
        .await
        .unwrap();
    assert!(matches!(resolved, Resolved::File(_)));
    assert_eq!(data.as_deref(), Some(&b"hello"[..]));

    let (resolved, data) = depot
        .get_async("pub/".into(), Identity::Anonymous)
        .await
        .unwrap();
    assert!(matches!(resolved, Resolved::Listing(_)));
    assert!(data.is_none());
}
