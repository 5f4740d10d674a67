// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use alien_auth::{AccessRequest, CatalogueAuthorization, Principal};
use alien_core::{
    AccessType, EnvelopePolicy, FileIdentity, Guid, Lfn, LogicalName, Permissions, Replica,
    SeNumber,
};
use alien_envelope::crypto::keys::{private_key_from_pem, public_key_from_pem};
use alien_envelope::test_utils::{AUTHEN_PRIVATE_PEM, TEST_TOKEN_ISSUER, key_material, sealer_config};
use alien_envelope::{EnvelopeKey, EnvelopeVerifier, KeyMaterial, Sealers};
use alien_store::test_utils::{register_file, storage_element};
use alien_store::{MemoryStore, ReplicaCatalogue, SiteTopology};

use crate::selection::{FileRef, QosRequirements, ReplicaSelectionService, SePreferences};
use crate::test_utils::{service, service_with, setup_logging};

/// RSA-512 key, too small to wrap a session key with OAEP-SHA256.
const UNDERSIZED_SE_PUBLIC_PEM: &str = "-----BEGIN PUBLIC KEY-----
MFwwDQYJKoZIhvcNAQEBBQADSwAwSAJBAM7EhqnN6+qi1ibtmzyspj0fZxjCIJaa
GF5QOHxnPHaJgeJPtRPd/Bwnhix5GED6xH4w9cMYcBkuVXB9SC2E2oMCAwEAAQ==
-----END PUBLIC KEY-----
";

fn lfn(path: &str) -> FileRef {
    FileRef::Lfn(path.parse().unwrap())
}

fn verifier() -> EnvelopeVerifier {
    EnvelopeVerifier::new(key_material(), TEST_TOKEN_ISSUER)
}

#[test]
fn eos_and_dcache_replicas() {
    setup_logging();

    let mut store = MemoryStore::new();
    let eos = storage_element(1, "ALICE::CERN::EOS");
    let dcache = storage_element(2, "ALICE::GSI::DCACHE");
    let file = register_file(&mut store, "/alice/test/file1", "alice", &[eos.clone(), dcache.clone()]);
    let replicas = store.get_replicas(&file.guid).unwrap();

    let service = service(store);
    let tickets = service
        .select_for_read(
            &lfn("/alice/test/file1"),
            &SePreferences::default(),
            &Principal::new("alice"),
        )
        .unwrap();

    assert_eq!(tickets.len(), 2);

    let eos_ticket = &tickets[0];
    assert_eq!(eos_ticket.se.name, "ALICE::CERN::EOS");
    assert_eq!(eos_ticket.sealed.policy, EnvelopePolicy::Signed);
    assert_eq!(eos_ticket.turl(), replicas[0].pfn);
    assert_eq!(eos_ticket.envelope.get(EnvelopeKey::Size), Some("1024"));
    assert_eq!(eos_ticket.envelope.get(EnvelopeKey::Md5), Some("abc123"));

    let dcache_ticket = &tickets[1];
    assert_eq!(dcache_ticket.se.name, "ALICE::GSI::DCACHE");
    assert_eq!(
        dcache_ticket.turl(),
        format!("{}/alice/test/file1", dcache.seio_daemons)
    );
    assert_ne!(dcache_ticket.turl(), replicas[1].pfn);

    for ticket in &tickets {
        let verified = verifier().verify(&ticket.sealed.token, true).unwrap();
        assert_eq!(verified.get("turl"), Some(ticket.turl()));
        assert_eq!(verified.get("guid"), Some(file.guid.to_string().as_str()));
        assert_eq!(verified.key_order(), ticket.envelope.key_order());
    }
}

#[test]
fn denial_does_not_abort() {
    setup_logging();

    let mut store = MemoryStore::new();
    let ses = [
        storage_element(1, "ALICE::CERN::EOS"),
        storage_element(2, "ALICE::GSI::SE"),
        storage_element(3, "ALICE::FZK::SE"),
    ];
    let file = register_file(&mut store, "/alice/test/file1", "alice", &ses);

    let deny_cern_and_fzk = |_: &Principal, request: &AccessRequest<'_>| {
        if request.se.name == "ALICE::GSI::SE" {
            None
        } else {
            Some(format!("{} is closed", request.se.name))
        }
    };

    let service = service_with(store, deny_cern_and_fzk);
    let tickets = service
        .select_for_read(
            &FileRef::Guid(file.guid),
            &SePreferences::default(),
            &Principal::new("alice"),
        )
        .unwrap();

    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].se.name, "ALICE::GSI::SE");
    assert_eq!(
        tickets[0].envelope.get(EnvelopeKey::Lfn),
        Some("/alice/test/file1")
    );
}

#[test]
fn no_replicas() {
    setup_logging();

    let mut store = MemoryStore::new();
    let file = register_file(&mut store, "/alice/test/empty", "alice", &[]);
    let service = service(store);

    let tickets = service
        .select_for_read(
            &FileRef::Guid(file.guid),
            &SePreferences::default(),
            &Principal::new("alice"),
        )
        .unwrap();
    assert!(tickets.is_empty());

    // Unknown names and GUIDs are not errors either.
    assert!(
        service
            .select_for_read(
                &lfn("/alice/test/missing"),
                &SePreferences::default(),
                &Principal::new("alice"),
            )
            .unwrap()
            .is_empty()
    );
    assert!(
        service
            .select_for_delete(&FileRef::Guid(Guid::new()), &Principal::new("alice"))
            .unwrap()
            .is_empty()
    );
    assert!(
        service
            .select_for_read(&lfn("/alice/test"), &SePreferences::default(), &Principal::new("alice"))
            .unwrap()
            .is_empty()
    );
}

#[test]
fn closest_replicas_first() {
    let mut store = MemoryStore::new();
    let ses = [
        storage_element(1, "ALICE::CERN::EOS"),
        storage_element(2, "ALICE::GSI::SE"),
        storage_element(3, "ALICE::FZK::SE"),
    ];
    register_file(&mut store, "/alice/test/file1", "alice", &ses);
    store.set_distance("GSI", "FZK", 0.1);
    store.set_distance("GSI", "CERN", 0.4);
    let service = service(store);

    let names = |preferences: &SePreferences, requester: &Principal| -> Vec<String> {
        service
            .select_for_read(&lfn("/alice/test/file1"), preferences, requester)
            .unwrap()
            .into_iter()
            .map(|ticket| ticket.se.name)
            .collect()
    };

    let at_gsi = Principal::new("alice").at_site("GSI");
    assert_eq!(
        names(&SePreferences::default(), &at_gsi),
        vec!["ALICE::GSI::SE", "ALICE::FZK::SE", "ALICE::CERN::EOS"]
    );
    assert_eq!(
        names(&SePreferences::default(), &at_gsi),
        names(&SePreferences::default(), &at_gsi)
    );
    assert_eq!(
        names(
            &SePreferences::new(&["ALICE::CERN::EOS"], &["ALICE::GSI::SE"]),
            &at_gsi
        ),
        vec!["ALICE::CERN::EOS", "ALICE::FZK::SE"]
    );
}

#[test]
fn security_policies_of_storage_elements() {
    let mut store = MemoryStore::new();
    let ses = [
        storage_element(1, "ALICE::CERN::EOS"),
        storage_element(2, "ALICE::CERN::SECURE").with_encrypted_envelope(),
        storage_element(3, "ALICE::CERN::XCACHE").with_scitokens_envelope(),
    ];
    register_file(&mut store, "/alice/test/file1", "alice", &ses);
    let service = service(store);

    let tickets = service
        .select_for_read(
            &lfn("/alice/test/file1"),
            &SePreferences::default(),
            &Principal::new("alice"),
        )
        .unwrap();
    let policies: Vec<EnvelopePolicy> = tickets.iter().map(|ticket| ticket.sealed.policy).collect();
    assert_eq!(
        policies,
        vec![
            EnvelopePolicy::Signed,
            EnvelopePolicy::Encrypted,
            EnvelopePolicy::Token
        ]
    );

    let verifier = verifier();
    assert_eq!(
        verifier.unseal(&tickets[1].sealed.token).unwrap(),
        tickets[1].envelope
    );
    let claims = verifier
        .verify_token(&tickets[2].sealed.token, "ALICE::CERN::XCACHE")
        .unwrap();
    assert_eq!(claims.sub, "alice");
    assert!(claims.scope.starts_with("storage.read:/data/"));
}

#[test]
fn sealing_failure_skips_replica() {
    setup_logging();

    let mut store = MemoryStore::new();
    let ses = [
        storage_element(1, "ALICE::CERN::SECURE").with_encrypted_envelope(),
        storage_element(2, "ALICE::CERN::EOS"),
    ];
    register_file(&mut store, "/alice/test/file1", "alice", &ses);

    let keys = KeyMaterial::new(
        private_key_from_pem(AUTHEN_PRIVATE_PEM).unwrap(),
        public_key_from_pem(UNDERSIZED_SE_PUBLIC_PEM).unwrap(),
    );
    let service = ReplicaSelectionService::new(
        store,
        CatalogueAuthorization::new(),
        Sealers::new(Arc::new(keys), &sealer_config()),
    );

    let tickets = service
        .select_for_read(
            &lfn("/alice/test/file1"),
            &SePreferences::default(),
            &Principal::new("alice"),
        )
        .unwrap();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].se.name, "ALICE::CERN::EOS");
}

/// Member `member.root` packed into `/alice/test/archive.zip`.
fn archive_store(archive_perm: Permissions) -> (MemoryStore, FileIdentity, FileIdentity) {
    let mut store = MemoryStore::new();
    let eos = storage_element(1, "ALICE::CERN::EOS");
    let gsi = storage_element(2, "ALICE::GSI::SE");
    let mut archive = register_file(&mut store, "/alice/test/archive.zip", "alice", &[eos, gsi]);
    archive.perm = archive_perm;
    store.insert_file(archive.clone());

    let member_lfn: Lfn = "/alice/test/member.root".parse().unwrap();
    let member = FileIdentity::new(Guid::new(), 10, Some("ff00"), "alice", "alice")
        .with_perm(Permissions::new(6, 4, 4));
    store.insert_name(LogicalName::file(
        member_lfn,
        member.guid,
        "alice",
        "alice",
        member.perm,
    ));
    store.insert_file(member.clone());
    store.insert_replica(Replica::new(
        member.guid,
        SeNumber(0),
        &format!("guid:///{}?ZIP=member.root", archive.guid),
    ));

    (store, archive, member)
}

#[test]
fn archive_members_are_read_from_the_archive() {
    setup_logging();

    let (store, archive, member) = archive_store(Permissions::new(6, 4, 4));
    let service = service(store);

    let tickets = service
        .select_for_read(
            &lfn("/alice/test/member.root"),
            &SePreferences::default(),
            &Principal::new("bob"),
        )
        .unwrap();

    assert_eq!(tickets.len(), 2);
    for ticket in &tickets {
        assert_eq!(ticket.replica.guid, archive.guid);
        assert_eq!(
            ticket.envelope.get(EnvelopeKey::Guid),
            Some(archive.guid.to_string().as_str())
        );
        assert_eq!(
            ticket.envelope.get(EnvelopeKey::Zguid),
            Some(member.guid.to_string().as_str())
        );
        assert_eq!(
            ticket.envelope.get(EnvelopeKey::Lfn),
            Some("/alice/test/archive.zip")
        );
        assert_eq!(ticket.envelope.get(EnvelopeKey::Size), Some("1024"));
        assert!(ticket.turl().ends_with("#member.root"));
        assert!(verifier().is_valid(&ticket.sealed.token, true));
    }
}

#[test]
fn archive_members_need_no_storage_element_of_their_own() {
    let (mut store, archive, member) = archive_store(Permissions::new(6, 4, 4));
    assert!(store.resolve_se(SeNumber(0)).unwrap().is_none());

    // The member also has a plain copy of its own, granted before the archive.
    let fzk = storage_element(3, "ALICE::FZK::SE");
    store.insert_se(fzk.clone());
    store.insert_replica(Replica::new(member.guid, fzk.id, &fzk.generate_pfn(&member.guid)));
    let service = service(store);

    let tickets = service
        .select_for_read(
            &FileRef::Guid(member.guid),
            &SePreferences::default(),
            &Principal::new("alice"),
        )
        .unwrap();

    let guids: Vec<&str> = tickets
        .iter()
        .map(|ticket| ticket.envelope.get(EnvelopeKey::Guid).unwrap())
        .collect();
    let member_guid = member.guid.to_string();
    let archive_guid = archive.guid.to_string();
    assert_eq!(guids, vec![member_guid.as_str(), archive_guid.as_str(), archive_guid.as_str()]);
    assert_eq!(tickets[0].se.name, "ALICE::FZK::SE");
    assert_eq!(tickets[0].envelope.get(EnvelopeKey::Zguid), None);
}

#[test]
fn unreadable_archive_voids_member_grant() {
    let (store, _, _) = archive_store(Permissions::new(6, 0, 0));
    let service = service(store);

    let tickets = service
        .select_for_read(
            &lfn("/alice/test/member.root"),
            &SePreferences::default(),
            &Principal::new("bob"),
        )
        .unwrap();
    assert!(tickets.is_empty());

    // The owner may read both.
    let tickets = service
        .select_for_read(
            &lfn("/alice/test/member.root"),
            &SePreferences::default(),
            &Principal::new("alice"),
        )
        .unwrap();
    assert_eq!(tickets.len(), 2);
}

#[test]
fn archive_replica_is_granted_once() {
    let (mut store, archive, member) = archive_store(Permissions::new(6, 4, 4));
    // A second link to the same archive, addressed by location this time.
    let location = store.get_replicas(&archive.guid).unwrap()[0].pfn.clone();
    store.insert_replica(Replica::new(
        member.guid,
        SeNumber(0),
        &format!("{location}?ZIP=member.root"),
    ));
    let service = service(store);

    let tickets = service
        .select_for_read(
            &FileRef::Guid(member.guid),
            &SePreferences::default(),
            &Principal::new("alice"),
        )
        .unwrap();
    assert_eq!(tickets.len(), 2);
}

fn write_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    store.insert_se(storage_element(1, "ALICE::CERN::EOS").with_qos(&["disk"]));
    store.insert_se(storage_element(2, "ALICE::GSI::SE").with_qos(&["disk"]));
    store.insert_se(storage_element(3, "ALICE::FZK::SE").with_qos(&["disk"]));
    store.insert_se(storage_element(4, "ALICE::CERN::CTA").with_qos(&["tape"]));
    store.set_distance("CERN", "FZK", 0.2);
    store.set_distance("CERN", "GSI", 0.5);
    register_file(&mut store, "/alice/test/existing", "alice", &[]);
    store
}

fn new_file(owner: &str) -> FileIdentity {
    FileIdentity::new(Guid::new(), 2048, Some("0123abcd"), owner, owner)
        .with_perm(Permissions::new(6, 4, 4))
}

#[test]
fn write_to_qos_storage_elements() {
    setup_logging();

    let service = service(write_store());
    let file = new_file("alice");
    let target: Lfn = "/alice/test/new".parse().unwrap();
    let requester = Principal::new("alice").at_site("CERN");

    let tickets = service
        .select_for_write(
            &target,
            &file,
            &SePreferences::new(&["ALICE::GSI::SE"], &["ALICE::FZK::SE"]),
            &"disk=2,tape=1".parse::<QosRequirements>().unwrap(),
            &requester,
        )
        .unwrap();

    let names: Vec<&str> = tickets.iter().map(|ticket| ticket.se.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["ALICE::GSI::SE", "ALICE::CERN::EOS", "ALICE::CERN::CTA"]
    );

    for ticket in &tickets {
        assert_eq!(ticket.envelope.access(), AccessType::Write);
        assert_eq!(ticket.replica.guid, file.guid);
        assert_eq!(ticket.replica.pfn, ticket.se.generate_pfn(&file.guid));
        assert_eq!(ticket.envelope.get(EnvelopeKey::Lfn), Some("/alice/test/new"));
        assert_eq!(ticket.envelope.get(EnvelopeKey::Size), Some("2048"));

        let verified = verifier().verify(&ticket.sealed.token, true).unwrap();
        assert_eq!(verified.access().unwrap(), AccessType::Write);
    }
}

#[test]
fn write_skips_storage_elements_holding_a_replica() {
    let mut store = write_store();
    let file = new_file("alice");
    let eos = storage_element(1, "ALICE::CERN::EOS").with_qos(&["disk"]);
    store.insert_replica(Replica::new(file.guid, eos.id, &eos.generate_pfn(&file.guid)));
    let service = service(store);

    let tickets = service
        .select_for_write(
            &"/alice/test/new".parse().unwrap(),
            &file,
            &SePreferences::default(),
            &QosRequirements::new().with("disk", 1),
            &Principal::new("alice").at_site("CERN"),
        )
        .unwrap();

    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].se.name, "ALICE::FZK::SE");
}

#[test]
fn write_needs_a_writable_parent() {
    let service = service(write_store());
    let qos = QosRequirements::new().with("disk", 1);

    // Directory is owned by alice with mode 755.
    let tickets = service
        .select_for_write(
            &"/alice/test/new".parse().unwrap(),
            &new_file("bob"),
            &SePreferences::default(),
            &qos,
            &Principal::new("bob"),
        )
        .unwrap();
    assert!(tickets.is_empty());

    let tickets = service
        .select_for_write(
            &"/alice/missing/new".parse().unwrap(),
            &new_file("alice"),
            &SePreferences::default(),
            &qos,
            &Principal::new("alice"),
        )
        .unwrap();
    assert!(tickets.is_empty());

    // Taken by another file.
    let tickets = service
        .select_for_write(
            &"/alice/test/existing".parse().unwrap(),
            &new_file("alice"),
            &SePreferences::default(),
            &qos,
            &Principal::new("alice"),
        )
        .unwrap();
    assert!(tickets.is_empty());
}

#[test]
fn delete_by_owner_only() {
    let mut store = MemoryStore::new();
    let ses = [
        storage_element(1, "ALICE::CERN::EOS"),
        storage_element(2, "ALICE::GSI::SE"),
    ];
    let file = register_file(&mut store, "/alice/test/file1", "alice", &ses);
    let replicas = store.get_replicas(&file.guid).unwrap();
    let service = service(store);

    let tickets = service
        .select_for_delete(&lfn("/alice/test/file1"), &Principal::new("alice").at_site("GSI"))
        .unwrap();
    let pfns: Vec<&str> = tickets.iter().map(|ticket| ticket.replica.pfn.as_str()).collect();
    assert_eq!(pfns, vec![replicas[0].pfn.as_str(), replicas[1].pfn.as_str()]);
    assert!(
        tickets
            .iter()
            .all(|ticket| ticket.envelope.access() == AccessType::Delete)
    );

    assert!(
        service
            .select_for_delete(&lfn("/alice/test/file1"), &Principal::new("bob"))
            .unwrap()
            .is_empty()
    );
}
