//! Integration tests for FileStore persistence
//!
//! Each test writes through one store instance, drops it, and checks what a
//! second instance over the same directory loads:
//! - Round trips for every record type
//! - Message retention and cursor selection
//! - Construction-time validation of version and identity
//! - Corruption recovery
//! - User merge rules and receipt loading

use std::sync::Arc;

use chatvault_core::{
    Credentials, Direction, Event, Membership, ReceiptRecord, RoomAccountData, RoomId,
    RoomMember, RoomState, RoomSummary, SentState, StoreMetadata, ThirdPartyIdentifier, UserId,
    UserProfile, FORMAT_VERSION,
};
use chatvault_durability::{list_entries, RoomCategory, StoreConfig};
use chatvault_engine::{
    FileStore, Lifecycle, RecordingListener, SessionStore, StoreNotification,
};
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

fn credentials() -> Credentials {
    Credentials::new("@me:example.org", "secret")
}

fn room() -> RoomId {
    RoomId::from("!room:example.org")
}

fn event(id: usize) -> Event {
    Event::new(
        format!("$e{}", id).as_str(),
        "!room:example.org",
        "@alice:example.org",
        "m.room.message",
        1_000 + id as u64,
    )
    .with_content(json!({ "body": format!("message {}", id) }))
}

fn create(dir: &TempDir) -> FileStore {
    FileStore::new(dir.path(), credentials(), StoreConfig::for_testing()).unwrap()
}

/// Construct over an existing directory and wait for the open to finish.
fn reopen(dir: &TempDir) -> FileStore {
    let store = create(dir);
    store.open();
    store.drain();
    store
}

fn persist(store: &FileStore) {
    store.commit();
    store.drain();
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_existing_store_starts_fresh_then_ready() {
    let dir = TempDir::new().unwrap();
    {
        let store = create(&dir);
        assert!(store.is_new_storage());
        store.drain();
    }

    let store = create(&dir);
    assert!(!store.is_new_storage());
    assert_eq!(store.lifecycle(), Lifecycle::Fresh);

    let listener = Arc::new(RecordingListener::default());
    store.add_listener(listener.clone());
    store.open();
    store.drain();

    assert!(store.is_ready());
    assert!(store.users_loaded());
    assert_eq!(
        listener.notifications(),
        vec![StoreNotification::Ready(UserId::from("@me:example.org"))]
    );
}

#[test]
fn test_close_is_terminal() {
    let dir = TempDir::new().unwrap();
    let store = create(&dir);
    store.close();

    assert!(store.is_killed());
    store.open();
    assert_eq!(store.lifecycle(), Lifecycle::Killed);
}

#[test]
fn test_clear_wipes_disk_without_killing() {
    let dir = TempDir::new().unwrap();
    let store = create(&dir);
    store.store_room_events(&room(), vec![event(1)], None, Direction::Forwards);
    store.store_summary(RoomSummary::new(room()));
    persist(&store);
    assert!(store.paths().room_file(RoomCategory::Messages, &room()).exists());

    store.clear();

    assert!(!store.is_killed());
    assert!(store.room_ids().is_empty());
    assert!(store.metadata().is_none());
    assert!(!store.paths().metadata().exists());
    assert!(list_entries(&store.paths().category_dir(RoomCategory::Messages))
        .unwrap()
        .is_empty());
    assert!(store.paths().category_dir(RoomCategory::Summary).is_dir());

    // Nothing reaches disk until the store is rebuilt.
    store.store_summary(RoomSummary::new(room()));
    persist(&store);
    assert!(!store.paths().room_file(RoomCategory::Summary, &room()).exists());
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn test_session_fields_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let ignored = vec![UserId::from("@spam:example.org")];
    let direct = [(
        UserId::from("@bob:example.org"),
        vec![RoomId::from("!dm:example.org")],
    )]
    .into_iter()
    .collect();
    let pids = vec![ThirdPartyIdentifier {
        medium: "email".to_string(),
        address: "me@example.org".to_string(),
    }];

    {
        let store = create(&dir);
        store.set_sync_cursor(Some("s42".to_string()));
        store.set_display_name(Some("Me".to_string()));
        store.set_avatar_url(Some("mxc://example.org/me".to_string()));
        store.set_ignored_user_ids(ignored.clone());
        store.set_direct_chat_map(direct);
        store.set_third_party_ids(pids.clone());
        persist(&store);
    }

    let store = create(&dir);
    // Session fields come from the metadata read at construction.
    assert_eq!(store.sync_cursor(), Some("s42".to_string()));
    assert_eq!(store.display_name(), Some("Me".to_string()));
    assert_eq!(store.avatar_url(), Some("mxc://example.org/me".to_string()));
    assert_eq!(store.ignored_user_ids(), ignored);
    assert_eq!(store.third_party_ids(), pids);
    assert_eq!(
        store.direct_chat_map()[&UserId::from("@bob:example.org")],
        vec![RoomId::from("!dm:example.org")]
    );
}

#[test]
fn test_room_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let mut state = RoomState {
        name: Some("Lobby".to_string()),
        topic: Some("Say hi".to_string()),
        ..RoomState::default()
    };
    state.set_member(RoomMember::new("@alice:example.org", Membership::Join));
    let mut summary = RoomSummary::new(room());
    summary.unread_count = 3;
    summary.latest_event = Some(event(2));
    let mut account_data = RoomAccountData::default();
    account_data.tags.insert("m.favourite".to_string(), 0.5);

    {
        let store = create(&dir);
        store.store_room_state(&room(), state.clone());
        store.store_room_events(
            &room(),
            vec![event(1), event(2)],
            Some("t-start".to_string()),
            Direction::Forwards,
        );
        store.store_summary(summary.clone());
        store.store_account_data(&room(), account_data.clone());
        store.store_receipt(&room(), ReceiptRecord::new("@alice:example.org", "$e2", 5));
        persist(&store);
    }

    let store = reopen(&dir);
    assert_eq!(store.room_ids(), vec![room()]);
    assert_eq!(store.room_state(&room()), Some(state));
    assert_eq!(store.summary(&room()), Some(summary));
    assert_eq!(store.account_data(&room()), Some(account_data));
    assert_eq!(store.pagination_token(&room()), Some("t-start".to_string()));

    let events = store.room_events(&room());
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].token.as_deref(), Some("t-start"));
    assert_eq!(events[1].content, json!({ "body": "message 2" }));

    assert_eq!(
        store.receipts(&room()),
        vec![ReceiptRecord::new("@alice:example.org", "$e2", 5)]
    );
}

#[test]
fn test_flush_summary_persists_without_commit() {
    let dir = TempDir::new().unwrap();
    {
        let store = create(&dir);
        store.store_room_events(&room(), vec![event(1)], None, Direction::Forwards);
        persist(&store);

        let mut summary = RoomSummary::new(room());
        summary.unread_count = 7;
        store.flush_summary(summary);
        store.drain();
    }

    let store = reopen(&dir);
    assert_eq!(store.summary(&room()).map(|s| s.unread_count), Some(7));
}

#[test]
fn test_flush_summaries_writes_every_room() {
    let dir = TempDir::new().unwrap();
    let rooms = [RoomId::from("!a:example.org"), RoomId::from("!b:example.org")];
    {
        let store = create(&dir);
        for (i, room) in rooms.iter().enumerate() {
            let event = Event::new(
                format!("$x{}", i).as_str(),
                room.clone(),
                "@alice:example.org",
                "m.room.message",
                i as u64,
            );
            store.store_room_events(room, vec![event], None, Direction::Forwards);
        }
        persist(&store);

        for room in &rooms {
            let mut summary = RoomSummary::new(room.clone());
            summary.unread_count = 3;
            store.store_summary(summary);
        }
        store.flush_summaries();
        store.drain();
    }

    let store = reopen(&dir);
    for room in &rooms {
        assert_eq!(store.summary(room).map(|s| s.unread_count), Some(3));
    }
}

#[test]
fn test_room_id_with_temp_suffix_keeps_its_history() {
    let dir = TempDir::new().unwrap();
    let plain = RoomId::from("!a:host");
    let suffixed = RoomId::from("!a:host.tmp");
    {
        let store = create(&dir);
        for (room, id) in [(&plain, "$a1"), (&suffixed, "$b1")] {
            let event = Event::new(id, room.clone(), "@alice:example.org", "m.room.message", 1);
            store.store_room_events(room, vec![event], None, Direction::Forwards);
        }
        persist(&store);
    }

    let store = reopen(&dir);
    let mut rooms = store.room_ids();
    rooms.sort();
    assert_eq!(rooms, vec![plain.clone(), suffixed.clone()]);
    assert_eq!(store.room_events(&plain)[0].event_id.as_str(), "$a1");
    assert_eq!(store.room_events(&suffixed)[0].event_id.as_str(), "$b1");
}

#[test]
fn test_zstd_store_round_trip() {
    let dir = TempDir::new().unwrap();
    {
        let store = FileStore::new(dir.path(), credentials(), StoreConfig::default()).unwrap();
        assert_eq!(store.blobs().codec_id(), "zstd");
        store.store_room_events(&room(), (0..10).map(event).collect(), None, Direction::Forwards);
        persist(&store);
    }

    let store = FileStore::new(dir.path(), credentials(), StoreConfig::default()).unwrap();
    store.open();
    store.drain();
    assert_eq!(store.room_events(&room()).len(), 10);
}

#[test]
fn test_state_only_room_is_reloaded() {
    let dir = TempDir::new().unwrap();
    {
        let store = create(&dir);
        store.store_room_state(&room(), RoomState::default());
        persist(&store);
    }

    let store = reopen(&dir);
    assert!(store.has_room(&room()));
    assert!(store.room_events(&room()).is_empty());
}

#[test]
fn test_delete_room_removes_files() {
    let dir = TempDir::new().unwrap();
    let store = create(&dir);
    store.store_room_state(&room(), RoomState::default());
    store.store_room_events(&room(), vec![event(1)], Some("t".into()), Direction::Forwards);
    store.store_summary(RoomSummary::new(room()));
    persist(&store);

    store.delete_room(&room());
    persist(&store);

    for category in RoomCategory::ALL {
        assert!(
            !store.paths().room_file(category, &room()).exists(),
            "{:?} file left behind",
            category
        );
    }
}

#[test]
fn test_delete_all_room_messages_keeps_unsent() {
    let dir = TempDir::new().unwrap();
    {
        let store = create(&dir);
        store.store_room_events(&room(), vec![event(1), event(2)], None, Direction::Forwards);
        store.store_live_event(Event::local_echo(
            "$e3",
            "!room:example.org",
            "@me:example.org",
            "m.room.message",
        ));
        store.store_summary(RoomSummary::new(room()));
        persist(&store);

        store.delete_all_room_messages(&room(), true);
        persist(&store);
        assert!(!store.paths().room_file(RoomCategory::Summary, &room()).exists());
    }

    let store = reopen(&dir);
    let events = store.room_events(&room());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_id.as_str(), "$e3");
    assert!(store.summary(&room()).is_none());
}

// ============================================================================
// Retention
// ============================================================================

#[test]
fn test_short_history_persisted_whole() {
    let dir = TempDir::new().unwrap();
    let events: Vec<Event> = (0..50).map(event).collect();
    {
        let store = create(&dir);
        store.store_room_events(&room(), events.clone(), None, Direction::Forwards);
        persist(&store);
    }

    let store = reopen(&dir);
    assert_eq!(store.room_events(&room()), events);
}

#[test]
fn test_long_history_trimmed_at_token() {
    let dir = TempDir::new().unwrap();
    {
        let store = create(&dir);
        let events: Vec<Event> = (0..120)
            .map(|i| if i == 60 { event(i).with_token("t60") } else { event(i) })
            .collect();
        store.store_room_events(&room(), events, None, Direction::Forwards);
        persist(&store);
        // Memory keeps everything.
        assert_eq!(store.room_events(&room()).len(), 120);
    }

    let store = reopen(&dir);
    let events = store.room_events(&room());
    assert_eq!(events.len(), 60);
    assert_eq!(events[0].event_id.as_str(), "$e60");
    assert_eq!(store.pagination_token(&room()), Some("t60".to_string()));
}

#[test]
fn test_backward_chunk_on_full_history_is_not_persisted() {
    let dir = TempDir::new().unwrap();
    {
        let store = create(&dir);
        store.store_room_events(
            &room(),
            (10..60).map(event).collect(),
            None,
            Direction::Forwards,
        );
        persist(&store);

        store.store_room_events(
            &room(),
            vec![event(9), event(8)],
            Some("older".to_string()),
            Direction::Backwards,
        );
        persist(&store);
        assert_eq!(store.room_events(&room()).len(), 52);
    }

    let store = reopen(&dir);
    assert_eq!(store.room_events(&room()).len(), 50);
    assert_eq!(store.pagination_token(&room()), None);
}

// ============================================================================
// Validation and recovery
// ============================================================================

#[test]
fn test_identity_mismatch_empties_directory() {
    let dir = TempDir::new().unwrap();
    {
        let store = create(&dir);
        store.store_room_events(&room(), vec![event(1)], None, Direction::Forwards);
        persist(&store);
    }

    let other = Credentials::new("@me:example.org", "rotated");
    let store = FileStore::new(dir.path(), other, StoreConfig::for_testing()).unwrap();
    assert!(store.is_new_storage());
    assert!(store.is_ready());
    assert!(list_entries(&store.paths().category_dir(RoomCategory::Messages))
        .unwrap()
        .is_empty());

    store.drain();
    let metadata: StoreMetadata = store.blobs().read(&store.paths().metadata()).unwrap();
    assert_eq!(metadata.access_token, "rotated");
}

#[test]
fn test_version_mismatch_resets_store() {
    let dir = TempDir::new().unwrap();
    let metadata_path;
    {
        let store = create(&dir);
        store.store_summary(RoomSummary::new(room()));
        persist(&store);
        metadata_path = store.paths().metadata();

        let mut stale = store.metadata().unwrap();
        stale.format_version = FORMAT_VERSION - 1;
        store.blobs().write(&metadata_path, &stale).unwrap();
    }

    let store = create(&dir);
    assert!(store.is_new_storage());
    assert!(!store.paths().room_file(RoomCategory::Summary, &room()).exists());

    store.drain();
    let metadata: StoreMetadata = store.blobs().read(&metadata_path).unwrap();
    assert_eq!(metadata.format_version, FORMAT_VERSION);
}

#[test]
fn test_corrupted_state_resets_and_notifies() {
    let dir = TempDir::new().unwrap();
    {
        let store = create(&dir);
        store.set_sync_cursor(Some("s1".to_string()));
        store.set_display_name(Some("Me".to_string()));
        store.store_room_state(&room(), RoomState::default());
        store.store_room_events(&room(), vec![event(1)], None, Direction::Forwards);
        persist(&store);
        std::fs::write(
            store.paths().room_file(RoomCategory::State, &room()),
            b"\xc1 not a record",
        )
        .unwrap();
    }

    let store = create(&dir);
    let listener = Arc::new(RecordingListener::default());
    store.add_listener(listener.clone());
    store.open();
    store.drain();

    assert!(store.is_ready());
    assert!(store.room_ids().is_empty());
    assert_eq!(store.sync_cursor(), None);
    assert_eq!(store.display_name(), Some("Me".to_string()));

    let notifications = listener.notifications();
    assert_eq!(notifications.len(), 1);
    assert!(matches!(
        &notifications[0],
        StoreNotification::Corrupted(user, _) if user.as_str() == "@me:example.org"
    ));

    let metadata: StoreMetadata = store.blobs().read(&store.paths().metadata()).unwrap();
    assert_eq!(metadata.sync_cursor, None);
    assert!(list_entries(&store.paths().category_dir(RoomCategory::Messages))
        .unwrap()
        .is_empty());
}

#[test]
fn test_orphan_token_and_state_files_removed() {
    let dir = TempDir::new().unwrap();
    let ghost = RoomId::from("!ghost:example.org");
    {
        let store = create(&dir);
        store.drain();
        let blobs = store.blobs();
        blobs
            .write(&store.paths().room_file(RoomCategory::Tokens, &ghost), "t")
            .unwrap();
        blobs
            .write(
                &store.paths().room_file(RoomCategory::State, &ghost),
                &RoomState::default(),
            )
            .unwrap();
    }

    let store = reopen(&dir);
    assert!(store.is_ready());
    assert!(!store.has_room(&ghost));
    assert!(!store.paths().room_file(RoomCategory::Tokens, &ghost).exists());
    assert!(!store.paths().room_file(RoomCategory::State, &ghost).exists());
}

#[test]
fn test_pending_echoes_become_undeliverable() {
    let dir = TempDir::new().unwrap();
    {
        let store = create(&dir);
        store.store_live_event(event(1));
        store.store_live_event(event(2).with_sent_state(SentState::Sending));
        store.store_live_event(event(3).with_sent_state(SentState::Encrypting));
        persist(&store);
    }

    let store = reopen(&dir);
    let events = store.room_events(&room());
    assert_eq!(events[0].sent_state, SentState::Sent);
    assert_eq!(events[0].origin_server_ts, 1_001);
    assert_eq!(events[1].sent_state, SentState::Undeliverable);
    assert_eq!(events[1].origin_server_ts, 1 << 50);
    assert_eq!(events[2].origin_server_ts, (1 << 50) + 1);

    // The rewrite is persisted right away.
    let on_disk: Vec<Event> = store
        .blobs()
        .read(&store.paths().room_file(RoomCategory::Messages, &room()))
        .unwrap();
    assert_eq!(on_disk, events);
}

// ============================================================================
// Users
// ============================================================================

#[test]
fn test_users_persisted_in_shards() {
    let dir = TempDir::new().unwrap();
    {
        let store = create(&dir);
        for i in 0..20 {
            store.store_user(
                UserProfile::new(format!("@user{}:example.org", i)).with_presence_ts(i),
            );
        }
        persist(&store);
        assert!(!list_entries(&store.paths().users_dir()).unwrap().is_empty());
    }

    let store = reopen(&dir);
    assert_eq!(store.user_count(), 20);
    let user = store.user(&UserId::from("@user7:example.org")).unwrap();
    assert_eq!(user.latest_presence_ts, 7);
    assert!(!user.is_placeholder);
}

#[test]
fn test_own_profile_not_persisted() {
    let dir = TempDir::new().unwrap();
    {
        let store = create(&dir);
        store.store_user(UserProfile::new("@me:example.org").with_display_name("Me"));
        persist(&store);
        assert!(list_entries(&store.paths().users_dir()).unwrap().is_empty());
    }

    let store = reopen(&dir);
    assert!(store.user(&UserId::from("@me:example.org")).is_none());
}

#[test]
fn test_user_merge_prefers_newer_presence() {
    let dir = TempDir::new().unwrap();
    {
        let store = create(&dir);
        store.store_user(UserProfile::new("@alice:example.org").with_presence_ts(100));
        store.store_user(UserProfile::new("@bob:example.org").with_presence_ts(100));
        persist(&store);
    }

    let store = create(&dir);
    // Updates arriving before the background load finished.
    store.store_user(UserProfile::new("@alice:example.org").with_presence_ts(200));
    store.store_user(UserProfile::new("@bob:example.org").with_presence_ts(50));
    store.open();
    store.drain();

    let alice = store.user(&UserId::from("@alice:example.org")).unwrap();
    let bob = store.user(&UserId::from("@bob:example.org")).unwrap();
    assert_eq!(alice.latest_presence_ts, 200);
    assert_eq!(bob.latest_presence_ts, 100);
}

#[test]
fn test_persisted_profile_replaces_placeholder() {
    let dir = TempDir::new().unwrap();
    {
        let store = create(&dir);
        store.store_user(UserProfile::new("@alice:example.org").with_display_name("Alice"));
        let mut state = RoomState::default();
        state.set_member(RoomMember::new("@alice:example.org", Membership::Join));
        state.set_member(
            RoomMember::new("@carol:example.org", Membership::Invite).with_display_name("Carol"),
        );
        store.store_room_state(&room(), state);
        persist(&store);
    }

    let store = reopen(&dir);
    let alice = store.user(&UserId::from("@alice:example.org")).unwrap();
    assert!(!alice.is_placeholder);
    assert_eq!(alice.display_name.as_deref(), Some("Alice"));

    let carol = store.user(&UserId::from("@carol:example.org")).unwrap();
    assert!(carol.is_placeholder);
    assert_eq!(carol.display_name.as_deref(), Some("Carol"));
}

// ============================================================================
// Receipts
// ============================================================================

#[test]
fn test_receipts_loaded_in_background_and_merged() {
    let dir = TempDir::new().unwrap();
    let rooms: Vec<RoomId> = (0..3)
        .map(|i| RoomId::from(format!("!r{}:example.org", i)))
        .collect();
    {
        let store = create(&dir);
        for room in &rooms {
            store.store_room_state(room, RoomState::default());
            store.store_receipt(room, ReceiptRecord::new("@alice:example.org", "$old", 10));
            store.store_receipt(room, ReceiptRecord::new("@bob:example.org", "$b", 10));
        }
        persist(&store);
    }

    let store = create(&dir);
    let listener = Arc::new(RecordingListener::default());
    store.add_listener(listener.clone());
    // A newer receipt seen before the load must survive it.
    store.store_receipt(&rooms[1], ReceiptRecord::new("@alice:example.org", "$new", 20));
    store.open();
    store.drain();

    assert!(store.pending_receipt_rooms().is_empty());
    let loaded: Vec<RoomId> = listener
        .notifications()
        .into_iter()
        .filter_map(|n| match n {
            StoreNotification::ReceiptsLoaded(room) => Some(room),
            _ => None,
        })
        .collect();
    assert_eq!(loaded, rooms);

    assert_eq!(
        store.receipts(&rooms[1]),
        vec![
            ReceiptRecord::new("@alice:example.org", "$new", 20),
            ReceiptRecord::new("@bob:example.org", "$b", 10),
        ]
    );
    assert_eq!(store.receipts(&rooms[0])[0].event_id.as_str(), "$old");

    // The merged map was written back.
    let on_disk: Vec<ReceiptRecord> = store
        .blobs()
        .read(&store.paths().room_file(RoomCategory::Receipts, &rooms[1]))
        .unwrap();
    assert_eq!(on_disk[0].event_id.as_str(), "$new");
}

#[test]
fn test_disk_usage_grows_with_data() {
    let dir = TempDir::new().unwrap();
    let store = create(&dir);
    store.drain();
    let before = store.disk_usage();

    store.store_room_events(&room(), (0..30).map(event).collect(), None, Direction::Forwards);
    persist(&store);
    assert!(store.disk_usage() > before);
}
