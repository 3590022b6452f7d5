//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use rowguard_core::types::UserId;
use rowguard_core::{
    EngineConfig, GuardedStore, MemoryDenialSink, PolicyEngine, Principal, SocialStore,
};
use std::sync::Arc;

pub struct World {
    pub guarded: GuardedStore,
    pub sink: Arc<MemoryDenialSink>,
    pub alice: UserId,
    pub bob: UserId,
    pub carol: UserId,
}

impl World {
    /// In-memory store with three registered users.
    pub fn new() -> Self {
        let store = SocialStore::memory().unwrap();
        let sink = Arc::new(MemoryDenialSink::new());
        let engine = PolicyEngine::with_standard_policies(sink.clone());
        let guarded = GuardedStore::new(store, engine, EngineConfig::default());

        let alice = UserId::new_v4();
        let bob = UserId::new_v4();
        let carol = UserId::new_v4();
        guarded.store().create_profile(alice, "alice").unwrap();
        guarded.store().create_profile(bob, "bob").unwrap();
        guarded.store().create_profile(carol, "carol").unwrap();

        Self {
            guarded,
            sink,
            alice,
            bob,
            carol,
        }
    }

    pub fn store(&self) -> &SocialStore {
        self.guarded.store()
    }

    pub fn engine(&self) -> &PolicyEngine {
        self.guarded.engine()
    }

    /// Make `a` and `b` friends through the request flow.
    pub fn befriend(&self, a: UserId, b: UserId) {
        let b_name = self.username(b);
        let request = self
            .guarded
            .send_friend_request(&Principal::user(a), &b_name)
            .unwrap();
        self.guarded
            .respond_to_friend_request(&Principal::user(b), request.id, true)
            .unwrap();
    }

    pub fn username(&self, user: UserId) -> String {
        if user == self.alice {
            "alice".to_string()
        } else if user == self.bob {
            "bob".to_string()
        } else if user == self.carol {
            "carol".to_string()
        } else {
            panic!("unknown user {}", user)
        }
    }
}

pub fn principals(world: &World) -> Vec<Principal> {
    vec![
        Principal::Anonymous,
        Principal::user(world.alice),
        Principal::user(world.bob),
        Principal::user(world.carol),
    ]
}
