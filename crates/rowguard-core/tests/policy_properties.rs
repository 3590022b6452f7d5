//! Policy properties evaluated against a real SQLite store.
//!
//! Every test enumerates the principals (anonymous plus three users) and
//! checks the decision of each against the expected predicate.

mod common;

use common::{principals, World};
use rowguard_core::store::{sql, StoreError};
use rowguard_core::types::{
    ConversationId, EntityType, FriendRequest, FriendRequestStatus, Friendship, Message,
    Operation, Profile, Row, RowId, RowKey,
};
use rowguard_core::{reason_codes, Decision, DenialKind, Principal, SqliteResolver, Target};

fn is_allowed(decision: &Decision) -> bool {
    match decision {
        Decision::Allow { .. } => true,
        Decision::Filtered(set) => !set.is_empty(),
        Decision::Deny(_) => false,
    }
}

#[test]
fn test_profile_read_public_update_owner_only() {
    let world = World::new();
    let profile = Profile {
        id: world.alice,
        username: "alice".to_string(),
    };

    world.store().with_conn(|conn| {
        let resolver = SqliteResolver::new(conn);
        for principal in principals(&world) {
            let read = world.engine().authorize(
                &principal,
                EntityType::Profile,
                Operation::Read,
                Target::Rows(vec![profile.clone().into()]),
                &resolver,
            );
            assert!(is_allowed(&read), "{} should read profiles", principal);

            let update = world.engine().authorize_update(
                &principal,
                RowKey::Profile(world.alice),
                Some(
                    Profile {
                        username: "alice2".to_string(),
                        ..profile.clone()
                    }
                    .into(),
                ),
                &resolver,
            );
            assert_eq!(
                is_allowed(&update),
                principal.user_id() == Some(world.alice),
                "profile update by {}",
                principal
            );
        }
    });
}

#[test]
fn test_friendship_member_only_and_never_inserted_directly() {
    let world = World::new();
    world.befriend(world.alice, world.bob);
    let friendship = world
        .store()
        .with_conn(|conn| sql::friendships_for(conn, world.alice))
        .unwrap()
        .remove(0);

    world.store().with_conn(|conn| {
        let resolver = SqliteResolver::new(conn);
        for principal in principals(&world) {
            let member = principal
                .user_id()
                .is_some_and(|u| friendship.involves(u));

            let read = world.engine().filter_rows(
                &principal,
                EntityType::Friendship,
                vec![friendship.clone().into()],
                &resolver,
            );
            assert_eq!(!read.is_empty(), member, "friendship read by {}", principal);

            let delete = world.engine().authorize_delete(
                &principal,
                RowKey::Friendship(friendship.id),
                &resolver,
            );
            assert_eq!(delete.is_allowed(), member, "friendship delete by {}", principal);

            // Even a pair member cannot write a friendship row directly.
            let insert = world.engine().authorize_insert(
                &principal,
                Friendship::between(RowId::new_v4(), world.alice, world.carol)
                    .unwrap()
                    .into(),
                &resolver,
            );
            assert!(!insert.is_allowed());
            assert_eq!(insert.denial().unwrap().kind, DenialKind::Unregistered);
        }
    });
}

#[test]
fn test_friend_request_roles() {
    let world = World::new();
    let request = world
        .guarded
        .send_friend_request(&Principal::user(world.alice), "bob")
        .unwrap();

    world.store().with_conn(|conn| {
        let resolver = SqliteResolver::new(conn);
        for principal in principals(&world) {
            let user = principal.user_id();

            let proposed = FriendRequest {
                id: RowId::new_v4(),
                sender: world.alice,
                receiver: world.carol,
                status: FriendRequestStatus::Pending,
            };
            let insert = world
                .engine()
                .authorize_insert(&principal, proposed.into(), &resolver);
            assert_eq!(insert.is_allowed(), user == Some(world.alice));

            let update = world.engine().authorize_update(
                &principal,
                RowKey::FriendRequest(request.id),
                Some(
                    FriendRequest {
                        status: FriendRequestStatus::Accepted,
                        ..request.clone()
                    }
                    .into(),
                ),
                &resolver,
            );
            assert_eq!(update.is_allowed(), user == Some(world.bob));

            let read = world.engine().filter_rows(
                &principal,
                EntityType::FriendRequest,
                vec![request.clone().into()],
                &resolver,
            );
            assert_eq!(
                !read.is_empty(),
                user == Some(world.alice) || user == Some(world.bob)
            );
        }
    });
}

#[test]
fn test_message_access_follows_current_membership() {
    let world = World::new();
    let conv = world
        .store()
        .create_conversation(true, &[world.alice, world.bob])
        .unwrap();
    let message = world
        .guarded
        .send_message(&Principal::user(world.alice), conv, "hello")
        .unwrap();

    world.store().with_conn(|conn| {
        let resolver = SqliteResolver::new(conn);
        for principal in principals(&world) {
            let member = matches!(principal.user_id(), Some(u) if u == world.alice || u == world.bob);

            let read = world.engine().filter_rows(
                &principal,
                EntityType::Message,
                vec![message.clone().into()],
                &resolver,
            );
            assert_eq!(!read.is_empty(), member, "message read by {}", principal);

            if let Some(user) = principal.user_id() {
                let insert = world.engine().authorize_insert(
                    &principal,
                    Message {
                        id: RowId::new_v4(),
                        conversation_id: conv,
                        sender_id: user,
                        content: "x".to_string(),
                    }
                    .into(),
                    &resolver,
                );
                assert_eq!(insert.is_allowed(), member, "message insert by {}", principal);
            }
        }
    });
}

#[test]
fn test_revoked_membership_is_seen_within_same_transaction() {
    let world = World::new();
    let conv = world
        .store()
        .create_conversation(false, &[world.alice, world.bob])
        .unwrap();
    let message = world
        .guarded
        .send_message(&Principal::user(world.bob), conv, "before")
        .unwrap();
    let alice = Principal::user(world.alice);

    world
        .store()
        .transaction(|conn| {
            let resolver = SqliteResolver::new(conn);
            let rows = vec![Row::from(message.clone())];

            let before = world
                .engine()
                .filter_rows(&alice, EntityType::Message, rows.clone(), &resolver);
            assert_eq!(before.len(), 1);

            sql::delete_member(conn, conv, world.alice)?;

            let after = world
                .engine()
                .filter_rows(&alice, EntityType::Message, rows, &resolver);
            assert!(after.is_empty());
            Ok::<_, StoreError>(())
        })
        .unwrap();
}

#[test]
fn test_unregistered_pairs_deny_everyone() {
    let world = World::new();
    let conv = world
        .store()
        .create_conversation(false, &[world.alice])
        .unwrap();
    let message = world
        .guarded
        .send_message(&Principal::user(world.alice), conv, "mine")
        .unwrap();

    world.store().with_conn(|conn| {
        let resolver = SqliteResolver::new(conn);
        for principal in principals(&world) {
            for op in [Operation::Update, Operation::Delete] {
                let decision = world.engine().authorize(
                    &principal,
                    EntityType::Message,
                    op,
                    Target::existing(RowKey::Message(message.id)),
                    &resolver,
                );
                let denial = decision.denial().expect("message writes are never allowed");
                assert_eq!(denial.kind, DenialKind::Unregistered);
                assert_eq!(denial.reason_code, reason_codes::A_UNREGISTERED);
            }
        }
    });

    let gaps = world.engine().table().unregistered();
    assert!(gaps.contains(&(EntityType::Message, Operation::Update)));
    assert!(gaps.contains(&(EntityType::Message, Operation::Delete)));
    assert!(gaps.contains(&(EntityType::Friendship, Operation::Insert)));
}

#[test]
fn test_mixed_visibility_returns_visible_subset_in_order() {
    let world = World::new();
    let shared = world
        .store()
        .create_conversation(false, &[world.alice, world.bob])
        .unwrap();
    let private = world
        .store()
        .create_conversation(false, &[world.bob, world.carol])
        .unwrap();
    let bob = Principal::user(world.bob);

    let mut rows = Vec::new();
    for (i, conv) in [shared, private, shared, private, private, shared]
        .into_iter()
        .enumerate()
    {
        let m = world
            .guarded
            .send_message(&bob, conv, &format!("m{}", i))
            .unwrap();
        rows.push(Row::from(m));
    }

    let set = world.store().with_conn(|conn| {
        world.engine().filter_rows(
            &Principal::user(world.alice),
            EntityType::Message,
            rows,
            &SqliteResolver::new(conn),
        )
    });
    let contents: Vec<String> = set
        .rows
        .into_iter()
        .filter_map(|r| Message::try_from(r).ok())
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, vec!["m0", "m2", "m5"]);
    assert_eq!(set.hidden, 3);
}

#[test]
fn test_conversation_visibility_tracks_membership_changes() {
    let world = World::new();
    let conv = world
        .store()
        .create_conversation(true, &[world.bob])
        .unwrap();
    let alice = Principal::user(world.alice);
    let read = |world: &World| -> Vec<ConversationId> {
        world.store().with_conn(|conn| {
            world
                .engine()
                .authorize(
                    &alice,
                    EntityType::Conversation,
                    Operation::Read,
                    Target::existing(RowKey::Conversation(conv)),
                    &SqliteResolver::new(conn),
                )
                .into_row_set()
                .unwrap()
                .rows
                .into_iter()
                .map(|r| match r {
                    Row::Conversation(c) => c.id,
                    other => panic!("unexpected {:?}", other),
                })
                .collect()
        })
    };

    assert!(read(&world).is_empty());

    world.store().add_member(conv, world.alice).unwrap();
    assert_eq!(read(&world), vec![conv]);

    assert!(world.store().remove_member(conv, world.alice).unwrap());
    assert!(read(&world).is_empty());
}

#[test]
fn test_friend_request_with_forged_sender_is_denied() {
    let world = World::new();
    let forged = FriendRequest {
        id: RowId::new_v4(),
        sender: world.bob,
        receiver: world.carol,
        status: FriendRequestStatus::Pending,
    };

    let decision = world.store().with_conn(|conn| {
        world.engine().authorize_insert(
            &Principal::user(world.alice),
            forged.into(),
            &SqliteResolver::new(conn),
        )
    });

    let denial = decision.denial().unwrap();
    assert_eq!(denial.kind, DenialKind::Forbidden);
    assert_eq!(denial.rule, Some("friend_request_insert_sender"));
    let events = world.sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].principal, world.alice.to_string());
    assert_eq!(events[0].rule.as_deref(), Some("friend_request_insert_sender"));
}

#[test]
fn test_friendship_delete_by_member_and_outsider() {
    let world = World::new();
    world.befriend(world.alice, world.bob);
    let friendship = world
        .guarded
        .list_friendships(&Principal::user(world.alice))
        .unwrap()
        .remove(0);

    let err = world
        .guarded
        .delete_friendship(&Principal::user(world.carol), friendship.id)
        .unwrap_err();
    assert!(err.is_access_denied());

    world
        .guarded
        .delete_friendship(&Principal::user(world.alice), friendship.id)
        .unwrap();
    assert!(world
        .guarded
        .list_friendships(&Principal::user(world.bob))
        .unwrap()
        .is_empty());
}
