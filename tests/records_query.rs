//! Query visibility and ordering across owners and non-owners

use async_trait::async_trait;
use bytes::Bytes;
use dwn_records::records::types::DateRange;
use dwn_records::store::MessageStore;
use dwn_records::{
    DateSort, DidKeyResolver, Dwn, Ed25519Signer, FsDataStore, MessageReply, ProtocolAuthorizer,
    RecordsQuery, RecordsQueryFilter, RecordsQueryOptions, RecordsWrite, RecordsWriteOptions,
    SledMessageStore, Signer,
};
use std::sync::Arc;
use tempfile::TempDir;

const CHAT: &str = "https://example.com/chat";

/// Lets anyone write under any protocol
struct OpenProtocols;

#[async_trait]
impl ProtocolAuthorizer for OpenProtocols {
    async fn authorize(
        &self,
        _tenant: &str,
        _write: &RecordsWrite,
        _message_store: &dyn MessageStore,
    ) -> dwn_records::Result<()> {
        Ok(())
    }
}

async fn open_node() -> (Dwn, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let dwn = Dwn::new(
        Arc::new(DidKeyResolver::new()),
        Arc::new(SledMessageStore::temporary().unwrap()),
        Arc::new(FsDataStore::new(temp_dir.path()).await.unwrap()),
        Arc::new(OpenProtocols),
    );
    (dwn, temp_dir)
}

struct Record<'a> {
    author: &'a Ed25519Signer,
    recipient: Option<&'a Ed25519Signer>,
    protocol: Option<&'a str>,
    published: bool,
    date_created: &'a str,
}

impl<'a> Record<'a> {
    fn by(author: &'a Ed25519Signer, date_created: &'a str) -> Self {
        Self {
            author,
            recipient: None,
            protocol: None,
            published: false,
            date_created,
        }
    }
}

async fn write(dwn: &Dwn, tenant: &str, record: Record<'_>) -> RecordsWrite {
    let write = RecordsWrite::create(RecordsWriteOptions {
        schema: Some("https://schema.org/Note".to_string()),
        recipient: record.recipient.map(|r| r.did().to_string()),
        protocol: record.protocol.map(str::to_string),
        published: Some(record.published),
        date_created: Some(record.date_created.to_string()),
        date_modified: Some(record.date_created.to_string()),
        data: Some(Bytes::from(record.date_created.to_string())),
        ..RecordsWriteOptions::new("text/plain", record.author)
    })
    .unwrap();
    let reply = dwn
        .process_records_write(
            tenant,
            write.message().clone(),
            Some(Bytes::from(record.date_created.to_string())),
        )
        .await;
    assert_eq!(reply.code(), 202, "{}", reply.status.detail);
    write
}

async fn query(
    dwn: &Dwn,
    tenant: &str,
    requester: &Ed25519Signer,
    filter: RecordsQueryFilter,
    date_sort: Option<DateSort>,
) -> MessageReply {
    let query = RecordsQuery::create(RecordsQueryOptions {
        date_sort,
        ..RecordsQueryOptions::new(filter, requester)
    })
    .unwrap();
    dwn.process_records_query(tenant, query.message().clone()).await
}

fn record_ids(reply: &MessageReply) -> Vec<String> {
    let mut ids: Vec<String> = reply
        .entries
        .as_ref()
        .unwrap()
        .iter()
        .map(|e| e.record_id.clone())
        .collect();
    ids.sort();
    ids
}

fn sorted(ids: &[&RecordsWrite]) -> Vec<String> {
    let mut ids: Vec<String> = ids.iter().map(|w| w.record_id().to_string()).collect();
    ids.sort();
    ids
}

struct Scenario {
    alice: Ed25519Signer,
    bob: Ed25519Signer,
    published: RecordsWrite,
    for_bob: RecordsWrite,
    for_carol: RecordsWrite,
    by_bob: RecordsWrite,
}

async fn populate(dwn: &Dwn) -> Scenario {
    let alice = Ed25519Signer::generate();
    let bob = Ed25519Signer::generate();
    let carol = Ed25519Signer::generate();
    let tenant = alice.did().to_string();

    let published = write(
        dwn,
        &tenant,
        Record {
            published: true,
            ..Record::by(&alice, "2023-01-01T00:00:00.000000Z")
        },
    )
    .await;
    let for_bob = write(
        dwn,
        &tenant,
        Record {
            recipient: Some(&bob),
            ..Record::by(&alice, "2023-02-01T00:00:00.000000Z")
        },
    )
    .await;
    let for_carol = write(
        dwn,
        &tenant,
        Record {
            recipient: Some(&carol),
            ..Record::by(&alice, "2023-03-01T00:00:00.000000Z")
        },
    )
    .await;
    let by_bob = write(
        dwn,
        &tenant,
        Record {
            protocol: Some(CHAT),
            ..Record::by(&bob, "2023-04-01T00:00:00.000000Z")
        },
    )
    .await;

    Scenario {
        alice,
        bob,
        published,
        for_bob,
        for_carol,
        by_bob,
    }
}

#[tokio::test]
async fn test_owner_sees_everything() {
    let (dwn, _temp) = open_node().await;
    let s = populate(&dwn).await;

    let reply = query(&dwn, s.alice.did(), &s.alice, RecordsQueryFilter::default(), None).await;
    assert_eq!(reply.code(), 200);
    assert_eq!(
        record_ids(&reply),
        sorted(&[&s.published, &s.for_bob, &s.for_carol, &s.by_bob])
    );
}

#[tokio::test]
async fn test_non_owner_sees_published_addressed_and_own() {
    let (dwn, _temp) = open_node().await;
    let s = populate(&dwn).await;

    let reply = query(&dwn, s.alice.did(), &s.bob, RecordsQueryFilter::default(), None).await;
    assert_eq!(reply.code(), 200);
    assert_eq!(
        record_ids(&reply),
        sorted(&[&s.published, &s.for_bob, &s.by_bob])
    );
}

#[tokio::test]
async fn test_non_owner_recipient_filter() {
    let (dwn, _temp) = open_node().await;
    let s = populate(&dwn).await;

    let for_self = RecordsQueryFilter {
        recipient: Some(s.bob.did().to_string()),
        ..Default::default()
    };
    let reply = query(&dwn, s.alice.did(), &s.bob, for_self, None).await;
    assert_eq!(reply.code(), 200);
    assert_eq!(record_ids(&reply), sorted(&[&s.for_bob]));

    let carol = s.for_carol.message().descriptor.recipient.clone();
    let for_other = RecordsQueryFilter {
        recipient: carol,
        ..Default::default()
    };
    let reply = query(&dwn, s.alice.did(), &s.bob, for_other, None).await;
    assert_eq!(reply.code(), 401);
    assert!(reply.entries.is_none());
}

#[tokio::test]
async fn test_stranger_sees_only_published() {
    let (dwn, _temp) = open_node().await;
    let s = populate(&dwn).await;
    let stranger = Ed25519Signer::generate();

    let reply = query(&dwn, s.alice.did(), &stranger, RecordsQueryFilter::default(), None).await;
    assert_eq!(record_ids(&reply), sorted(&[&s.published]));
}

#[tokio::test]
async fn test_date_sorts() {
    let (dwn, _temp) = open_node().await;
    let s = populate(&dwn).await;
    let owner = |sort| query(&dwn, s.alice.did(), &s.alice, RecordsQueryFilter::default(), Some(sort));

    let reply = owner(DateSort::CreatedAscending).await;
    let ids: Vec<_> = reply.entries.unwrap().into_iter().map(|e| e.record_id).collect();
    assert_eq!(
        ids,
        vec![
            s.published.record_id().to_string(),
            s.for_bob.record_id().to_string(),
            s.for_carol.record_id().to_string(),
            s.by_bob.record_id().to_string(),
        ]
    );

    let reply = owner(DateSort::CreatedDescending).await;
    let entries = reply.entries.unwrap();
    assert_eq!(entries.first().unwrap().record_id, s.by_bob.record_id());
    assert_eq!(entries.last().unwrap().record_id, s.published.record_id());

    let reply = owner(DateSort::PublishedDescending).await;
    let ids: Vec<_> = reply.entries.unwrap().into_iter().map(|e| e.record_id).collect();
    assert_eq!(ids, vec![s.published.record_id().to_string()]);
}

#[tokio::test]
async fn test_date_created_range_is_half_open() {
    let (dwn, _temp) = open_node().await;
    let s = populate(&dwn).await;

    let filter = RecordsQueryFilter {
        date_created: Some(DateRange {
            from: Some("2023-02-01T00:00:00.000000Z".to_string()),
            to: Some("2023-04-01T00:00:00.000000Z".to_string()),
        }),
        ..Default::default()
    };
    let reply = query(&dwn, s.alice.did(), &s.alice, filter, None).await;
    assert_eq!(record_ids(&reply), sorted(&[&s.for_bob, &s.for_carol]));
}

#[tokio::test]
async fn test_entries_have_no_authorization() {
    let (dwn, _temp) = open_node().await;
    let s = populate(&dwn).await;

    let reply = query(&dwn, s.alice.did(), &s.alice, RecordsQueryFilter::default(), None).await;
    let json = serde_json::to_value(&reply).unwrap();
    let entries = json["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 4);
    for entry in entries {
        assert!(entry.get("authorization").is_none());
        assert!(entry.get("descriptor").is_some());
    }
    let by_bob = entries
        .iter()
        .find(|e| e["recordId"] == s.by_bob.record_id())
        .unwrap();
    assert_eq!(by_bob["contextId"], s.by_bob.record_id());
}

#[tokio::test]
async fn test_malformed_and_unauthenticated_queries() {
    let (dwn, _temp) = open_node().await;
    let alice = Ed25519Signer::generate();
    let mallory = Ed25519Signer::generate();

    let query = RecordsQuery::create(RecordsQueryOptions::new(RecordsQueryFilter::default(), &alice))
        .unwrap();

    let mut tampered = query.message().clone();
    tampered.descriptor.filter.schema = Some("https://schema.org/Photo".to_string());
    assert_eq!(dwn.process_records_query(alice.did(), tampered).await.code(), 400);

    let mut forged = query.message().clone();
    let input = dwn_records::jws::signing_input(
        &forged.authorization.signatures[0].protected,
        &forged.authorization.payload,
    );
    forged.authorization.signatures[0].signature =
        dwn_records::jws::base64url_encode(&mallory.sign(&input).unwrap());
    assert_eq!(dwn.process_records_query(alice.did(), forged).await.code(), 401);
}
