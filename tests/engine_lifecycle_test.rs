//! Seed lifecycle properties exercised through the public API

use provably_fair::{
    config::SeedConfig, derive_outcome, hash_server_seed, verify, FairnessEngine, FairnessError,
    GameType,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

#[test]
fn test_commitment_holds_until_rotation() {
    let engine = FairnessEngine::initialized(SeedConfig::default()).unwrap();
    let commitment = engine.commit_seed_pair().unwrap();

    for _ in 0..5 {
        let round = engine.capture_round(None).unwrap();
        assert_eq!(round.server_seed_hash, commitment.server_seed_hash);
        assert_eq!(hash_server_seed(&round.server_seed), round.server_seed_hash);
    }

    // rotating after 5 rounds resets the nonce and reveals the committed seed
    let revealed = engine.rotate_seed_pair().unwrap();
    assert_eq!(revealed.previous_hash, commitment.server_seed_hash);
    assert_eq!(hash_server_seed(&revealed.revealed_server_seed), commitment.server_seed_hash);
    assert!(revealed.verify().is_ok());
    assert_eq!(engine.draw_nonce().unwrap(), 0);
}

#[test]
fn test_nonce_sequence_is_exact() {
    let engine = FairnessEngine::initialized(SeedConfig::default()).unwrap();
    let n = 250;
    let drawn: Vec<u64> = (0..n).map(|_| engine.draw_nonce().unwrap()).collect();
    assert_eq!(drawn, (0..n).collect::<Vec<u64>>());
}

#[test]
fn test_concurrent_captures_never_share_a_nonce() {
    let engine = Arc::new(FairnessEngine::initialized(SeedConfig::default()).unwrap());
    let threads = 8;
    let per_thread = 200;

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let engine = engine.clone();
            thread::spawn(move || {
                (0..per_thread)
                    .map(|_| engine.capture_round(None).unwrap().nonce)
                    .collect::<Vec<u64>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for nonce in handle.join().unwrap() {
            assert!(seen.insert(nonce), "nonce {} issued twice", nonce);
        }
    }
    assert_eq!(seen.len(), threads * per_thread);
    assert_eq!(*seen.iter().max().unwrap(), (threads * per_thread - 1) as u64);
}

#[test]
fn test_rotation_interleaved_with_captures_stays_consistent() {
    let engine = Arc::new(FairnessEngine::initialized(SeedConfig::default()).unwrap());

    let players: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            thread::spawn(move || {
                (0..100)
                    .map(|_| engine.capture_round(None).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let rotator = {
        let engine = engine.clone();
        thread::spawn(move || {
            (0..10)
                .map(|_| engine.rotate_seed_pair().unwrap())
                .collect::<Vec<_>>()
        })
    };

    let rounds: Vec<_> = players
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let revealed = rotator.join().unwrap();

    // every captured snapshot is internally consistent
    for round in &rounds {
        assert_eq!(hash_server_seed(&round.server_seed), round.server_seed_hash);
    }

    // per seed, nonces are unique
    let mut seen = HashSet::new();
    for round in &rounds {
        assert!(seen.insert((round.server_seed.clone(), round.nonce)));
    }

    // every revealed epoch accounts for exactly the rounds captured under it
    for epoch in &revealed {
        let captured = rounds
            .iter()
            .filter(|r| r.server_seed == epoch.revealed_server_seed)
            .count() as u64;
        assert_eq!(captured, epoch.rounds_played);
    }
}

#[test]
fn test_revealed_rounds_verify() {
    let engine = FairnessEngine::initialized(SeedConfig::default()).unwrap();
    let mut rounds = Vec::new();
    for game in GameType::ALL {
        let fair = engine.capture_round(None).unwrap();
        let outcome = derive_outcome(game, &fair.server_seed, &fair.client_seed, fair.nonce).unwrap();
        rounds.push((game, fair, outcome));
    }

    let revealed = engine.rotate_seed_pair().unwrap();
    for (game, fair, outcome) in rounds {
        assert!(verify(game, &revealed.revealed_server_seed, &fair.client_seed, fair.nonce, &outcome).unwrap());
    }
}

#[test]
fn test_uninitialized_engine_refuses_rounds() {
    let engine = FairnessEngine::new(SeedConfig::default());
    assert!(matches!(engine.capture_round(None), Err(FairnessError::NotInitialized)));
    assert!(matches!(engine.rotate_seed_pair(), Err(FairnessError::NotInitialized)));
    assert!(matches!(engine.commitment(), Err(FairnessError::NotInitialized)));
}

#[test]
fn test_custom_seed_lengths() {
    let config = SeedConfig {
        server_seed_length: 64,
        client_seed_length: 8,
        max_client_seed_length: 32,
    };
    let engine = FairnessEngine::initialized(config).unwrap();
    let round = engine.capture_round(None).unwrap();
    assert_eq!(round.server_seed.len(), 64);
    assert_eq!(round.client_seed.len(), 8);

    let too_long = "x".repeat(33);
    assert!(matches!(engine.set_client_seed(&too_long), Err(FairnessError::InvalidSeed(_))));
}
