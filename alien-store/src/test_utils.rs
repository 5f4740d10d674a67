// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for pre-populated in-memory catalogues.
use alien_core::{FileIdentity, Guid, Lfn, LogicalName, Permissions, Replica, StorageElement};

use crate::memory::MemoryStore;

pub const TEST_SIZE: u64 = 1024;
pub const TEST_MD5: &str = "abc123";

/// Storage element `VO::SITE::NAME` with an xrootd endpoint derived from its name.
pub fn storage_element(id: u32, name: &str) -> StorageElement {
    let host = name
        .rsplit("::")
        .take(2)
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(".");
    StorageElement::new(id, name, &format!("root://{host}.example.org:1094"), "/data")
}

/// Register `lfn` and all its missing parent directories, owned by `owner`.
pub fn register_directories(store: &mut MemoryStore, lfn: &Lfn, owner: &str) {
    let mut parent = lfn.parent();
    while let Some(dir) = parent {
        parent = dir.parent();
        if store.contains_name(&dir) {
            continue;
        }
        store.insert_name(LogicalName::directory(
            dir,
            owner,
            owner,
            Permissions::new(7, 5, 5),
        ));
    }
}

/// Register a file readable by everyone at `lfn` with one replica on each of `ses`.
///
/// Storage elements are registered as well. Returns the new file identity.
pub fn register_file(
    store: &mut MemoryStore,
    lfn: &str,
    owner: &str,
    ses: &[StorageElement],
) -> FileIdentity {
    let lfn: Lfn = lfn.parse().expect("valid test LFN");
    let file = FileIdentity::new(Guid::new(), TEST_SIZE, Some(TEST_MD5), owner, owner)
        .with_perm(Permissions::new(6, 4, 4));

    register_directories(store, &lfn, owner);
    store.insert_name(LogicalName::file(
        lfn,
        file.guid,
        owner,
        owner,
        file.perm,
    ));
    store.insert_file(file.clone());

    for se in ses {
        store.insert_se(se.clone());
        store.insert_replica(Replica::new(file.guid, se.id, &se.generate_pfn(&file.guid)));
    }

    file
}
