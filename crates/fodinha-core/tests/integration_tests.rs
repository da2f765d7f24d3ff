//! Integration tests for the Fodinha game engine.
//!
//! These tests drive complete bidding/trick/scoring flows through the
//! public API, plus a few rigged end-of-round states to exercise
//! elimination paths that random deals cannot force deterministically.

use fodinha_core::*;

fn game(names: &[&str]) -> GameState {
    GameState::new(names.iter().map(|n| n.to_string()).collect())
}

/// Submit a prediction for whoever is due, preferring `preferred` but
/// falling back when the forbidden-sum rule rejects it.
fn predict_due(g: &mut GameState, preferred: u8) {
    let actor = g.current_actor().expect("someone must be due to bid");
    if g.make_prediction(actor, preferred).is_err() {
        let max = g.round_state().unwrap().cards_per_player;
        for v in 0..=max {
            if v != preferred && g.make_prediction(actor, v).is_ok() {
                return;
            }
        }
        panic!("no legal prediction found");
    }
}

/// Play the first card in the due player's hand.
fn play_due(g: &mut GameState) {
    let actor = g.current_actor().expect("someone must be due to play");
    let card_id = g
        .players()
        .iter()
        .find(|p| p.id == actor)
        .and_then(|p| p.hand.first())
        .map(|c| c.id())
        .expect("due player must hold a card");
    g.play_card(actor, &card_id).unwrap();
}

#[test]
fn test_last_bidder_cannot_complete_forbidden_sum() {
    // Scenario: 2 players, round 1 (1 card each). The opener predicts 0,
    // so the last bidder may not predict 1 (0 + 1 == cards per player).
    let mut g = game(&["Ana", "Bruno"]);
    g.start_game().unwrap();

    g.make_prediction(0, 0).unwrap();

    assert!(matches!(
        g.make_prediction(1, 1),
        Err(GameError::InvalidPrediction)
    ));
    // The rejected bid left nothing behind.
    assert_eq!(g.round_state().unwrap().predictions.len(), 1);
    assert_eq!(g.players()[1].prediction, None);

    g.make_prediction(1, 0).unwrap();
    assert_eq!(g.phase(), GamePhase::Playing);
    assert_eq!(g.round_state().unwrap().trick_number, 1);
}

#[test]
fn test_full_round_with_scoring() {
    let mut g = game(&["Ana", "Bruno"]);
    g.start_game().unwrap();

    predict_due(&mut g, 0);
    predict_due(&mut g, 0);
    assert_eq!(g.phase(), GamePhase::Playing);

    play_due(&mut g);
    play_due(&mut g);

    // Both cards are in: the trick resolved and the round is over.
    assert_eq!(
        g.phase(),
        GamePhase::TrickComplete {
            outcome: TrickOutcome::RoundComplete
        }
    );
    let round = g.round_state().unwrap();
    assert_eq!(round.played_cards.len(), 2);
    let winner = round.current_trick_winner.expect("trick must have a winner");
    assert_eq!(round.tricks_won.get(&winner), Some(&1));
    assert_eq!(round.tricks_won.len(), 1);

    // The display window ends: scoring runs and round 2 is dealt.
    g.continue_trick().unwrap();

    // Both predicted 0 and exactly one trick was won, so the trick
    // winner lost one life and the other player none.
    let total: u32 = g.players().iter().map(|p| p.lives as u32).sum();
    assert_eq!(total, 19);
    let winner_player = g.players().iter().find(|p| p.id == winner).unwrap();
    assert_eq!(winner_player.lives, 9);

    let round = g.round_state().unwrap();
    assert_eq!(round.round_number, 2);
    assert_eq!(round.cards_per_player, 2);
    assert_eq!(round.phase, GamePhase::Prediction);
    assert_eq!(round.trick_number, 0);
    assert!(round.played_cards.is_empty());
    assert!(round.predictions.is_empty());
    // Round 2 starts one seat over.
    assert_eq!(round.current_turn, 1);
    for p in g.players() {
        assert_eq!(p.hand.len(), 2);
        assert_eq!(p.prediction, None);
        assert_eq!(p.tricks_won, 0);
    }
}

#[test]
fn test_multi_trick_round_pauses_between_tricks() {
    let mut g = game(&["Ana", "Bruno"]);
    g.start_game().unwrap();

    // Get to round 2 (two cards each) by playing out round 1.
    predict_due(&mut g, 0);
    predict_due(&mut g, 0);
    play_due(&mut g);
    play_due(&mut g);
    g.continue_trick().unwrap();
    assert_eq!(g.round_state().unwrap().cards_per_player, 2);

    predict_due(&mut g, 0);
    predict_due(&mut g, 0);

    play_due(&mut g);
    play_due(&mut g);
    assert_eq!(
        g.phase(),
        GamePhase::TrickComplete {
            outcome: TrickOutcome::MoreTricksRemain
        }
    );
    let leader = g.round_state().unwrap().current_trick_winner.unwrap();

    // Cards may not be played during the display window.
    let held = g
        .players()
        .iter()
        .find(|p| p.id == leader)
        .unwrap()
        .hand
        .first()
        .unwrap()
        .id();
    assert!(matches!(
        g.play_card(leader, &held),
        Err(GameError::IllegalPhase)
    ));

    g.continue_trick().unwrap();
    let round = g.round_state().unwrap();
    assert_eq!(round.phase, GamePhase::Playing);
    assert_eq!(round.trick_number, 2);
    assert!(round.played_cards.is_empty());
    // The trick winner leads.
    assert_eq!(g.current_actor(), Some(leader));

    play_due(&mut g);
    play_due(&mut g);
    assert_eq!(
        g.phase(),
        GamePhase::TrickComplete {
            outcome: TrickOutcome::RoundComplete
        }
    );
}

#[test]
fn test_rejected_play_leaves_state_unchanged() {
    let mut g = game(&["Ana", "Bruno"]);
    g.start_game().unwrap();
    g.make_prediction(0, 0).unwrap();
    g.make_prediction(1, 0).unwrap();

    let due = g.current_actor().unwrap();
    let other = 1 - due;
    let other_card = g
        .players()
        .iter()
        .find(|p| p.id == other)
        .unwrap()
        .hand
        .first()
        .unwrap()
        .id();

    // Out of turn.
    assert!(matches!(
        g.play_card(other, &other_card),
        Err(GameError::NotYourTurn)
    ));
    // Not in hand.
    assert!(matches!(
        g.play_card(due, "Q-nowhere"),
        Err(GameError::CardNotInHand)
    ));

    let round = g.round_state().unwrap();
    assert!(round.played_cards.is_empty());
    assert_eq!(round.current_turn, 0);
    for p in g.players() {
        assert_eq!(p.hand.len(), 1);
    }
}

#[test]
fn test_elimination_excludes_player_from_future_rounds() {
    // Rig an end-of-round state where seat 0 is at one life and missed
    // their bid, while seats 1 and 2 were exact.
    let mut g = game(&["Ana", "Bruno", "Caio"]);
    g.start_game().unwrap();

    for p in &mut g.players {
        p.hand.clear();
        p.tricks_won = 0;
    }
    g.players[0].lives = 1;
    g.players[0].prediction = Some(1);
    g.players[1].prediction = Some(0);
    g.players[2].prediction = Some(1);
    g.players[2].tricks_won = 1;

    let round = g.round.as_mut().unwrap();
    round.phase = GamePhase::TrickComplete {
        outcome: TrickOutcome::RoundComplete,
    };
    round.played_cards.clear();

    let events = g.continue_trick().unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::PlayerEliminated { player: 0 })));

    assert!(g.players()[0].eliminated);
    assert_eq!(g.players()[0].lives, 0);

    // Round 2 runs with only the two survivors.
    let round = g.round_state().unwrap();
    assert_eq!(round.round_number, 2);
    assert_eq!(round.cards_per_player, 2);
    assert!(g.players()[0].hand.is_empty());
    assert_eq!(g.players()[1].hand.len(), 2);
    assert_eq!(g.players()[2].hand.len(), 2);

    // Starting actor is (2-1) % 2 = 1 into the active list [1, 2].
    assert_eq!(g.current_actor(), Some(2));

    // The eliminated player is rejected everywhere.
    assert!(matches!(
        g.make_prediction(0, 0),
        Err(GameError::UnknownOrEliminatedPlayer)
    ));
}

#[test]
fn test_lives_floor_at_zero_and_game_finishes() {
    let mut g = game(&["Ana", "Bruno"]);
    g.start_game().unwrap();

    for p in &mut g.players {
        p.hand.clear();
        p.tricks_won = 0;
    }
    // Seat 0 misses by 3 holding a single life: floored at 0, not -2.
    g.players[0].lives = 1;
    g.players[0].prediction = Some(3);
    g.players[1].prediction = Some(0);

    let round = g.round.as_mut().unwrap();
    round.phase = GamePhase::TrickComplete {
        outcome: TrickOutcome::RoundComplete,
    };

    let events = g.continue_trick().unwrap();

    assert_eq!(g.players()[0].lives, 0);
    assert!(g.players()[0].eliminated);
    assert!(events.iter().any(|e| matches!(
        e,
        GameEvent::LivesLost {
            player: 0,
            lives_lost: 1,
            lives_remaining: 0
        }
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::GameFinished { winner: Some(1) })));

    assert!(g.is_finished());
    assert_eq!(g.winner().map(|p| p.id), Some(1));
    assert_eq!(g.current_actor(), None);
}

#[test]
fn test_oversized_next_deal_rejected_before_scoring() {
    // A full 10-player table ending round 3 with everyone surviving
    // would need 10 x 4 + 1 = 41 cards for round 4. The round end must
    // fail without applying scoring or leaving the pause phase.
    let names: Vec<String> = (0..10).map(|i| format!("P{i}")).collect();
    let mut g = GameState::new(names);
    g.start_game().unwrap();

    for p in &mut g.players {
        p.hand.clear();
        p.tricks_won = 0;
        p.prediction = Some(0);
    }
    // Seat 0 missed their bid and would lose a life if scoring ran.
    g.players[0].prediction = Some(1);

    let round = g.round.as_mut().unwrap();
    round.round_number = 3;
    round.phase = GamePhase::TrickComplete {
        outcome: TrickOutcome::RoundComplete,
    };

    assert!(matches!(
        g.continue_trick(),
        Err(GameError::DeckExhausted)
    ));

    // Nothing moved: no lives lost, no eliminations, phase unchanged.
    for p in g.players() {
        assert_eq!(p.lives, STARTING_LIVES);
        assert!(!p.eliminated);
    }
    assert_eq!(g.players()[0].prediction, Some(1));
    assert_eq!(
        g.phase(),
        GamePhase::TrickComplete {
            outcome: TrickOutcome::RoundComplete
        }
    );
    assert_eq!(g.round_state().unwrap().round_number, 3);
}

#[test]
fn test_restart_resets_players() {
    let mut g = game(&["Ana", "Bruno"]);
    g.start_game().unwrap();

    g.players[0].lives = 0;
    g.players[0].eliminated = true;

    g.start_game().unwrap();
    for p in g.players() {
        assert_eq!(p.lives, STARTING_LIVES);
        assert!(!p.eliminated);
        assert_eq!(p.hand.len(), 1);
    }
    assert_eq!(g.round_state().unwrap().round_number, 1);
}
