//! Property tests for roster arithmetic.

#![allow(clippy::unwrap_used)]

use chrono::{NaiveDate, NaiveTime};
use courtside::{
    Admission, Capacity, EventDefinition, Occurrence, OccurrenceCommand, OccurrenceEnvironment,
    OccurrenceId, OccurrenceReducer, UserId, color_for,
};
use courtside_core::reducer::Reducer;
use courtside_testing::test_clock;
use proptest::prelude::*;
use std::sync::Arc;

fn roster(capacity: u32) -> Occurrence {
    let definition = EventDefinition::new(UserId::new(), "Props", "2024-01-01", "18:00", "20:00")
        .with_max_players(capacity);
    Occurrence::new(
        OccurrenceId::new(definition.id, 0),
        definition,
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
    )
}

fn env() -> OccurrenceEnvironment {
    OccurrenceEnvironment::new(Arc::new(test_clock()))
}

/// Random roster operations over a small pool of users
#[derive(Clone, Debug)]
enum Op {
    Admit(usize),
    Leave(usize),
    Request(usize),
    Approve(usize),
    Reject(usize),
    Remove(usize),
    ToggleWaitlist(bool),
    Grow(u32),
    Shrink(u32),
    Add(usize, bool),
    Edit(u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..12usize).prop_map(Op::Admit),
        2 => (0..12usize).prop_map(Op::Leave),
        2 => (0..12usize).prop_map(Op::Request),
        2 => (0..12usize).prop_map(Op::Approve),
        1 => (0..12usize).prop_map(Op::Reject),
        1 => (0..12usize).prop_map(Op::Remove),
        1 => any::<bool>().prop_map(Op::ToggleWaitlist),
        1 => (0..4u32).prop_map(Op::Grow),
        1 => (0..4u32).prop_map(Op::Shrink),
        2 => ((0..12usize), any::<bool>()).prop_map(|(i, force)| Op::Add(i, force)),
        1 => (2..12u32).prop_map(Op::Edit),
    ]
}

proptest! {
    #[test]
    fn admissions_split_at_capacity(capacity in 4u32..16, attempts in 0usize..40) {
        let reducer = OccurrenceReducer::new();
        let env = env();
        let mut state = roster(capacity);
        let users: Vec<UserId> = (0..attempts).map(|_| UserId::new()).collect();

        let mut outcomes = Vec::new();
        for &user in &users {
            let events = reducer.reduce(&mut state, OccurrenceCommand::Admit { user }, &env).unwrap();
            outcomes.push(Admission::from_events(user, &events));
        }

        let admitted = outcomes.iter().filter(|o| **o == Admission::Admitted).count();
        let expected = attempts.min(capacity as usize);
        prop_assert_eq!(admitted, expected);
        prop_assert_eq!(state.participants.len(), expected);
        prop_assert_eq!(state.waitlist.len(), attempts - expected);
        prop_assert_eq!(&state.participants[..], &users[..expected]);
    }

    #[test]
    fn leaving_promotes_fifo(capacity in 4u32..12, extra in 0usize..6, leaver in 0usize..12) {
        let reducer = OccurrenceReducer::new();
        let env = env();
        let mut state = roster(capacity);
        let users: Vec<UserId> = (0..capacity as usize + extra).map(|_| UserId::new()).collect();
        for &user in &users {
            reducer.reduce(&mut state, OccurrenceCommand::Admit { user }, &env).unwrap();
        }
        let leaver = users[leaver % capacity as usize];

        reducer.reduce(&mut state, OccurrenceCommand::Leave { user: leaver }, &env).unwrap();

        let expected = if extra > 0 { capacity as usize } else { capacity as usize - 1 };
        prop_assert_eq!(state.participants.len(), expected);
        if extra > 0 {
            prop_assert_eq!(state.participants.last(), Some(&users[capacity as usize]));
            prop_assert_eq!(&state.waitlist[..], &users[capacity as usize + 1..]);
        }
    }

    #[test]
    fn random_operations_keep_invariants(
        capacity in 4u32..8,
        ops in proptest::collection::vec(op(), 0..60),
    ) {
        let reducer = OccurrenceReducer::new();
        let env = env();
        let mut state = roster(capacity);
        let users: Vec<UserId> = (0..12).map(|_| UserId::new()).collect();

        for op in ops {
            let command = match op {
                Op::Admit(i) => OccurrenceCommand::Admit { user: users[i] },
                Op::Leave(i) => OccurrenceCommand::Leave { user: users[i] },
                Op::Request(i) => OccurrenceCommand::SubmitJoinRequest { user: users[i] },
                Op::Approve(i) => OccurrenceCommand::ApproveJoinRequest { user: users[i] },
                Op::Reject(i) => OccurrenceCommand::RejectJoinRequest { user: users[i] },
                Op::Remove(i) => OccurrenceCommand::RemoveUser { user: users[i] },
                Op::ToggleWaitlist(open) => OccurrenceCommand::SetWaitlistOpen { open },
                Op::Grow(by) => OccurrenceCommand::SetCapacity {
                    capacity: Capacity::new(state.capacity.value() + by),
                },
                Op::Shrink(by) => OccurrenceCommand::SetCapacity {
                    capacity: Capacity::new(state.capacity.value().saturating_sub(by)),
                },
                Op::Add(i, override_capacity) => OccurrenceCommand::AddUser {
                    user: users[i],
                    override_capacity,
                },
                Op::Edit(max_players) => OccurrenceCommand::EditDetails {
                    definition: Box::new(state.definition.clone().with_max_players(max_players)),
                },
            };
            let before = state.clone();
            if reducer.reduce(&mut state, command, &env).is_err() {
                prop_assert_eq!(&state, &before);
            }
            prop_assert!(state.check_invariants().is_ok(), "{:?}", state.check_invariants());
        }
    }

    #[test]
    fn override_add_grows_capacity_only_when_full(capacity in 4u32..10, admitted in 0usize..10) {
        let reducer = OccurrenceReducer::new();
        let env = env();
        let mut state = roster(capacity);
        for _ in 0..admitted.min(capacity as usize) {
            reducer.reduce(&mut state, OccurrenceCommand::Admit { user: UserId::new() }, &env).unwrap();
        }
        let was_full = state.is_full();
        let before = state.capacity.value();

        let user = UserId::new();
        let command = OccurrenceCommand::AddUser { user, override_capacity: true };
        reducer.reduce(&mut state, command, &env).unwrap();

        prop_assert!(state.is_participant(user));
        prop_assert_eq!(state.capacity.value(), if was_full { before + 1 } else { before });
        prop_assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn colors_are_deterministic(title in ".{0,40}") {
        prop_assert_eq!(color_for(&title), color_for(&title.clone()));
    }
}
