//! Behavioural properties of the chat store, exercised against the bundled
//! seed fixture.

use std::sync::Arc;
use std::thread;

use chat_store::models::UserStatus;
use chat_store::{ChatStore, Fixture, StoreError, SEED_FIXTURE, UNKNOWN_USERNAME};

fn seeded() -> ChatStore {
    ChatStore::seeded().expect("seed fixture should load")
}

fn unread(store: &ChatStore, user_id: &str, chat_id: &str) -> u32 {
    store
        .get_user_by_id(user_id)
        .and_then(|u| u.chat_user.get(chat_id).map(|s| s.unread_count))
        .unwrap_or(0)
}

#[test]
fn test_messages_are_returned_in_timestamp_order() {
    let store = seeded();
    store.send_message("g1", "one more", "u2").unwrap();
    store.send_message("g1", "and another", "u3").unwrap();

    for chat_id in ["c1", "c2", "c3", "g1"] {
        let messages = store.get_messages_by_chat_id(chat_id);
        assert!(
            messages.windows(2).all(|w| w[0].timestamp <= w[1].timestamp),
            "messages of {} out of order",
            chat_id
        );
    }
}

#[test]
fn test_out_of_order_fixture_is_sorted_with_stable_ties() {
    let json = r#"{
        "chats": {
            "c1": {
                "type": "individual",
                "participants": ["a", "b"],
                "messages": {
                    "late":   {"senderId": "a", "content": "late",   "timestamp": "2024-01-01T12:00:00Z"},
                    "tie-1":  {"senderId": "b", "content": "tie-1",  "timestamp": "2024-01-01T11:00:00Z"},
                    "early":  {"senderId": "a", "content": "early",  "timestamp": "2024-01-01T10:00:00Z"},
                    "tie-2":  {"senderId": "a", "content": "tie-2",  "timestamp": "2024-01-01T11:00:00Z"}
                }
            }
        }
    }"#;
    let store = ChatStore::from_json(json).unwrap();
    let order: Vec<String> = store
        .get_messages_by_chat_id("c1")
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(order, vec!["early", "tie-1", "tie-2", "late"]);
}

#[test]
fn test_send_message_effects_on_group() {
    let store = seeded();
    let before_u1 = unread(&store, "u1", "g1");
    let before_u3 = unread(&store, "u3", "g1");

    let sent = store.send_message("g1", "hello", "u2").unwrap();

    let messages = store.get_messages_by_chat_id("g1");
    let found = messages.iter().find(|m| m.id == sent.id).unwrap();
    assert_eq!(found.content, "hello");
    assert_eq!(found.sender_id, "u2");
    assert!(!found.read);

    assert_eq!(unread(&store, "u1", "g1"), before_u1 + 1);
    assert_eq!(unread(&store, "u3", "g1"), before_u3 + 1);
    assert_eq!(unread(&store, "u2", "g1"), 0);

    for user_id in ["u1", "u2", "u3"] {
        let user = store.get_user_by_id(user_id).unwrap();
        let summary = &user.chat_user["g1"];
        assert_eq!(summary.last_message.as_deref(), Some("hello"));
        assert_eq!(summary.last_user.as_deref(), Some("u2"));
        assert_eq!(summary.timestamp, Some(sent.timestamp));
    }
}

#[test]
fn test_send_message_to_missing_chat_changes_nothing() {
    let store = seeded();
    let before = store.export();
    let err = store.send_message("does-not-exist", "hello", "u1").unwrap_err();
    assert!(matches!(err, StoreError::UnknownChat(_)));
    assert_eq!(store.export(), before);
}

#[test]
fn test_mark_chat_as_read_is_idempotent() {
    let store = seeded();
    assert!(unread(&store, "u1", "g1") > 0);

    let first = store.mark_chat_as_read("g1", "u1");
    assert_eq!(first, 2);
    assert_eq!(unread(&store, "u1", "g1"), 0);
    let after_first = store.export();

    assert_eq!(store.mark_chat_as_read("g1", "u1"), 0);
    assert_eq!(store.export(), after_first);

    assert!(store
        .get_messages_by_chat_id("g1")
        .iter()
        .filter(|m| m.sender_id != "u1")
        .all(|m| m.read));
}

#[test]
fn test_get_chats_matches_chat_user_keys() {
    let store = seeded();
    for user_id in ["u1", "u2", "u3", "u4"] {
        let user = store.get_user_by_id(user_id).unwrap();
        let expected: Vec<String> = user.chat_user.keys().cloned().collect();
        let listed: Vec<String> = store.get_chats(user_id).into_iter().map(|c| c.id).collect();
        assert_eq!(listed, expected);
    }

    // c2 exists but alice is not in it
    assert!(store.get_chat_by_id("c2").is_some());
    assert!(store.get_chats("u1").iter().all(|c| c.id != "c2"));
}

#[test]
fn test_friends_list_covers_every_friend() {
    let store = seeded();
    let user = store.get_user_by_id("u1").unwrap();
    let friends = store.get_friends_list("u1");
    assert_eq!(friends.len(), user.friends.len());

    for friend in &friends {
        assert_eq!(friend.friendship_status, user.friends[&friend.id].status);
    }

    let ghost = friends.iter().find(|f| f.id == "u42").unwrap();
    assert_eq!(ghost.username, UNKNOWN_USERNAME);
    assert_eq!(ghost.status, UserStatus::Offline);
}

#[test]
fn test_export_reimport_round_trip() {
    let store = seeded();
    store.send_message("c1", "round trip", "u1").unwrap();
    store.mark_chat_as_read("c1", "u2");

    let exported = store.export();
    let json = store.to_json().unwrap();
    let reloaded = ChatStore::from_json(&json).unwrap();
    assert_eq!(reloaded.export(), exported);

    let pretty = reloaded.to_json_pretty().unwrap();
    assert_eq!(Fixture::from_json(&pretty).unwrap(), exported);
}

#[test]
fn test_load_from_file() {
    let path = std::env::temp_dir().join(format!("chat-store-{}.json", std::process::id()));
    std::fs::write(&path, SEED_FIXTURE).unwrap();
    let store = ChatStore::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(store.export(), seeded().export());
}

#[test]
fn test_concurrent_sends_keep_counts_consistent() {
    let store = Arc::new(seeded());
    store.mark_chat_as_read("g1", "u1");
    store.mark_chat_as_read("g1", "u3");
    let before = store.get_messages_by_chat_id("g1").len();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            thread::spawn(move || {
                for j in 0..25 {
                    store
                        .send_message("g1", &format!("msg {} {}", i, j), "u2")
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let messages = store.get_messages_by_chat_id("g1");
    assert_eq!(messages.len(), before + 200);
    assert!(messages.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert_eq!(unread(&store, "u1", "g1"), 200);
    assert_eq!(unread(&store, "u3", "g1"), 200);
    assert_eq!(unread(&store, "u2", "g1"), 0);
}
