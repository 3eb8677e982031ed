//! Whole-game scenarios driven through the public API only.
//!
//! Roles are dealt by a seeded RNG, so each test finds who holds which
//! power through `role_of` instead of assuming seat order.

use std::time::Duration;

use nightfall_engine::{
    Alignment, ClientAction, GameError, GameEvent, Phase, Power, RoomState, Rules, TimerPurpose,
};
use nightfall_protocol::{PlayerId, RoomCode, Seat};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::time::Instant;

struct Game {
    state: RoomState,
    now: Instant,
}

impl Game {
    /// Seats `players`, starts, and readies everyone into the first night.
    fn start(players: usize, rules: Rules) -> Self {
        let now = Instant::now();
        let mut state =
            RoomState::new(RoomCode::parse("GAME").unwrap(), None, rules, now).unwrap();
        for i in 0..players {
            state.join(&format!("player{i}"), "owl").unwrap();
        }
        state
            .start_game(now, &mut StdRng::seed_from_u64(7))
            .unwrap();
        let ids: Vec<PlayerId> = state.players().iter().map(|p| p.id).collect();
        for id in ids {
            state.ready(id, now).unwrap();
        }
        assert_eq!(state.phase(), Phase::NightPhase);
        Self { state, now }
    }

    fn advance(&mut self, by: Duration) -> Vec<GameEvent> {
        self.now += by;
        self.state.fire_due(self.now)
    }

    fn act(&mut self, seat: Seat, action: ClientAction) -> Result<Vec<GameEvent>, GameError> {
        self.state.apply(seat, action, self.now)
    }

    fn living(&self, power: Power) -> Vec<PlayerId> {
        self.state
            .alive()
            .iter()
            .copied()
            .filter(|id| self.state.role_of(*id).map(|r| r.power) == Some(power))
            .collect()
    }

    fn one(&self, power: Power) -> PlayerId {
        self.living(power)[0]
    }

    /// Every healer heals `heal` and every investigator checks someone
    /// other than themselves.
    fn good_night_actions(&mut self, heal: PlayerId) {
        for healer in self.living(Power::Heal) {
            self.act(Seat::Player(healer), ClientAction::Heal { target: heal })
                .unwrap();
        }
        for investigator in self.living(Power::Investigate) {
            let target = self
                .state
                .alive()
                .iter()
                .copied()
                .find(|id| *id != investigator)
                .unwrap();
            self.act(
                Seat::Player(investigator),
                ClientAction::Investigate { target },
            )
            .unwrap();
        }
    }

    /// All living evil players vote for `target`, then lock-in elapses.
    fn kill(&mut self, target: PlayerId) -> Vec<GameEvent> {
        for voter in self.living(Power::Kill) {
            self.act(
                Seat::Player(voter),
                ClientAction::KillVote {
                    target: Some(target),
                },
            )
            .unwrap();
        }
        let lock_in = self.state.rules().lock_in;
        self.advance(lock_in)
    }

    /// Every other living player accuses `target`, then the
    /// countdown elapses.
    fn lynch(&mut self, target: PlayerId) -> Vec<GameEvent> {
        let accusers: Vec<PlayerId> = self
            .state
            .alive()
            .iter()
            .copied()
            .filter(|id| *id != target)
            .collect();
        for accuser in accusers {
            self.act(
                Seat::Player(accuser),
                ClientAction::Accuse {
                    target: Some(target),
                },
            )
            .unwrap();
        }
        let countdown = self.state.rules().countdown;
        self.advance(countdown)
    }

    fn host_continue(&mut self) {
        self.act(Seat::Host, ClientAction::Continue).unwrap();
    }
}

fn quick_rules() -> Rules {
    Rules {
        lock_in: Duration::from_secs(3),
        countdown: Duration::from_secs(5),
        resolution_delay: Duration::ZERO,
        ..Rules::default()
    }
}

#[test]
fn test_scenario_unhealed_target_is_eliminated() {
    let mut game = Game::start(5, quick_rules());
    assert_eq!(game.living(Power::Kill).len(), 1);
    assert_eq!(game.state.kill_votes_required(), 1);
    let victim = game.living(Power::Citizen)[0];
    let healer = game.one(Power::Heal);

    game.good_night_actions(healer);
    let events = game.kill(victim);

    assert!(events.contains(&GameEvent::VotesLocked { target: victim }));
    assert!(events.contains(&GameEvent::NightEliminated { player: victim }));
    assert_eq!(game.state.night().eliminated, Some(victim));
    assert!(!game.state.is_alive(victim));
    assert_eq!(game.state.alive().len(), 4);
    assert_eq!(game.state.phase(), Phase::NightResolved);
}

#[test]
fn test_scenario_healed_target_is_saved() {
    let mut game = Game::start(5, quick_rules());
    let victim = game.living(Power::Citizen)[0];

    game.good_night_actions(victim);
    let events = game.kill(victim);

    assert!(events.contains(&GameEvent::NightSaved { player: victim }));
    assert_eq!(game.state.night().saved, Some(victim));
    assert_eq!(game.state.night().eliminated, None);
    assert_eq!(game.state.alive().len(), 5);
}

#[test]
fn test_scenario_countdown_survives_partial_withdrawal() {
    let mut game = Game::start(5, quick_rules());
    let victim = game.living(Power::Citizen)[0];
    let healer = game.one(Power::Heal);
    game.good_night_actions(healer);
    game.kill(victim);
    game.host_continue();
    assert_eq!(game.state.phase(), Phase::DayPhase);
    assert_eq!(game.state.alive().len(), 4);
    assert_eq!(game.state.accusation_threshold(), 2);

    let accused = game.one(Power::Kill);
    let accusers: Vec<PlayerId> = game
        .state
        .alive()
        .iter()
        .copied()
        .filter(|id| *id != accused)
        .collect();
    let accuse = |game: &mut Game, who: PlayerId, target: Option<PlayerId>| {
        game.act(Seat::Player(who), ClientAction::Accuse { target })
            .unwrap();
    };

    accuse(&mut game, accusers[0], Some(accused));
    accuse(&mut game, accusers[1], Some(accused));
    let deadline = game
        .state
        .schedule()
        .get(TimerPurpose::Countdown)
        .unwrap()
        .deadline;

    game.advance(Duration::from_secs(1));
    accuse(&mut game, accusers[2], Some(accused));
    let timer = game.state.schedule().get(TimerPurpose::Countdown).unwrap();
    assert_eq!(timer.deadline, deadline);

    accuse(&mut game, accusers[2], None);
    assert_eq!(
        game.state.schedule().get(TimerPurpose::Countdown).unwrap().deadline,
        deadline
    );

    accuse(&mut game, accusers[1], None);
    assert!(game.state.schedule().get(TimerPurpose::Countdown).is_none());

    game.advance(Duration::from_secs(10));
    assert!(game.state.is_alive(accused));
    assert_eq!(game.state.phase(), Phase::DayPhase);
}

#[test]
fn test_scenario_parity_after_elimination_evil_wins() {
    let mut game = Game::start(8, quick_rules());
    assert_eq!(game.living(Power::Kill).len(), 2);
    let healer = game.one(Power::Heal);

    // Night 1: a citizen dies.
    game.good_night_actions(healer);
    game.kill(game.living(Power::Citizen)[0]);
    game.host_continue();

    // Day 1: the town lynches a citizen.
    game.lynch(game.living(Power::Citizen)[0]);
    assert_eq!(game.state.phase(), Phase::DayResolved);
    game.host_continue();

    // Night 2: another citizen dies. 2 evil, 3 good.
    game.good_night_actions(healer);
    game.kill(game.living(Power::Citizen)[0]);
    assert_eq!(game.state.phase(), Phase::NightResolved);
    assert_eq!(game.state.current_winner(), None);
    game.host_continue();

    // Day 2: one more good player falls and evil reaches parity.
    let events = game.lynch(game.living(Power::Citizen)[0]);

    assert_eq!(game.state.alive().len(), 4);
    assert_eq!(game.state.phase(), Phase::Ended);
    assert_eq!(game.state.winner(), Some(Alignment::Evil));
    assert_eq!(
        game.state.win_condition(),
        Some(game.state.theme().evil_wins)
    );
    assert!(events.contains(&GameEvent::GameEnded {
        winner: Alignment::Evil
    }));
}

#[test]
fn test_night_not_resolved_while_healer_pending() {
    let mut game = Game::start(5, quick_rules());
    let investigator = game.one(Power::Investigate);
    let evil = game.one(Power::Kill);
    game.act(
        Seat::Player(investigator),
        ClientAction::Investigate { target: evil },
    )
    .unwrap();

    game.kill(game.living(Power::Citizen)[0]);
    game.advance(Duration::from_secs(60));

    assert!(game.state.night().locked);
    assert_eq!(game.state.phase(), Phase::NightPhase);
    assert_eq!(game.state.alive().len(), 5);
}

#[test]
fn test_rejected_action_leaves_state_untouched() {
    let mut game = Game::start(5, quick_rules());
    let citizen = game.living(Power::Citizen)[0];
    let before = game.state.clone();

    let result = game.act(
        Seat::Player(citizen),
        ClientAction::KillVote {
            target: Some(game.one(Power::Heal)),
        },
    );

    assert!(matches!(result, Err(GameError::WrongRole { .. })));
    assert_eq!(game.state, before);
}

#[test]
fn test_reconnect_restores_in_flight_night() {
    let mut game = Game::start(5, quick_rules());
    let healer = game.one(Power::Heal);
    let evil = game.one(Power::Kill);
    let citizen = game.living(Power::Citizen)[0];
    game.act(Seat::Player(healer), ClientAction::Heal { target: citizen })
        .unwrap();
    game.act(
        Seat::Player(evil),
        ClientAction::KillVote {
            target: Some(citizen),
        },
    )
    .unwrap();
    let before = game.state.clone();

    assert!(!game.state.disconnect(healer).unwrap());
    assert!(!game.state.player(healer).unwrap().connected);
    game.state.reconnect(healer).unwrap();

    assert_eq!(game.state, before);
    assert_eq!(game.state.role_of(healer).unwrap().power, Power::Heal);
    assert_eq!(game.state.night().heals.get(&healer), Some(&citizen));
}

#[test]
fn test_reconnect_unknown_player_changes_nothing() {
    let mut game = Game::start(5, quick_rules());
    let before = game.state.clone();

    let result = game.state.reconnect(PlayerId(99));

    assert_eq!(result, Err(GameError::UnknownPlayer(PlayerId(99))));
    assert_eq!(game.state, before);
}

#[test]
fn test_snapshot_reflects_every_accepted_change() {
    let mut game = Game::start(5, quick_rules());
    let first = game.state.snapshot(game.now);
    let evil = game.one(Power::Kill);
    let target = game.living(Power::Citizen)[0];

    game.act(
        Seat::Player(evil),
        ClientAction::KillVote {
            target: Some(target),
        },
    )
    .unwrap();
    let second = game.state.snapshot(game.now);

    assert!(second.seq > first.seq);
    let view = second.players.iter().find(|p| p.id == evil).unwrap();
    assert_eq!(view.kill_vote, Some(target));
    assert_eq!(second.consensus.unwrap().target, Some(target));
}
