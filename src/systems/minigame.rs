use rand::seq::SliceRandom;
use rand::Rng;

use crate::simulation::minigame::{
    MinigameInput, MinigameKind, MinigameOutcome, MinigameProgress, MinigameSession,
    MinigameState, MinigameTimer, Obstacle, SequencePhase, ALL_KINDS, BALANCE_LIMIT,
    FIELD_HEIGHT, FIELD_WIDTH, FOCUS_CAPTURE_RADIUS, FOCUS_GOAL, HOLD_MAX, LANE_COUNT,
    LANE_OBSTACLE_HEIGHT, LANE_OBSTACLE_START_Y, LANE_PASSED_Y, LANE_PLAYER_HEIGHT,
    LANE_PLAYER_Y, MEMORY_FLIP_BACK_MS, RHYTHM_MAX_RADIUS, RHYTHM_TARGET_RADIUS,
    SEQUENCE_TIMEOUT_MS,
};
use crate::systems::ActionRejected;

pub fn start_minigame<R: Rng + ?Sized>(
    state: &mut MinigameState,
    kind: MinigameKind,
    difficulty: f32,
    rng: &mut R,
) -> Result<(), ActionRejected> {
    if state.is_active() {
        return Err(ActionRejected::Busy);
    }
    state.outcome = None;
    tracing::info!(kind = kind.label(), difficulty, "minigame started");
    state.session = Some(MinigameSession::new(kind, difficulty, rng));
    Ok(())
}

pub fn start_random<R: Rng + ?Sized>(
    state: &mut MinigameState,
    difficulty: f32,
    rng: &mut R,
) -> Result<MinigameKind, ActionRejected> {
    let kind = *ALL_KINDS.choose(rng).unwrap_or(&MinigameKind::RapidPress);
    start_minigame(state, kind, difficulty, rng)?;
    Ok(kind)
}

/// What one step of a session decided.
enum Step {
    Continue,
    Win,
    Lose,
}

pub fn tick_minigame<R: Rng + ?Sized>(
    state: &mut MinigameState,
    input: &MinigameInput,
    delta_ms: u32,
    rng: &mut R,
) {
    let Some(session) = state.session.as_mut() else {
        return;
    };
    session.elapsed_ms = session.elapsed_ms.saturating_add(delta_ms);

    let mut step = update(session, input, delta_ms, rng);
    if matches!(step, Step::Continue) {
        step = run_timer(session, delta_ms);
    }
    match step {
        Step::Continue => {}
        Step::Win => finish(state, true),
        Step::Lose => finish(state, false),
    }
}

fn run_timer(session: &mut MinigameSession, delta_ms: u32) -> Step {
    let Some(timer) = session.timer.as_mut() else {
        return Step::Continue;
    };
    timer.remaining_ms = timer.remaining_ms.saturating_sub(delta_ms);
    if timer.remaining_ms > 0 {
        return Step::Continue;
    }
    if timer.win_on_expiry {
        Step::Win
    } else {
        Step::Lose
    }
}

fn update<R: Rng + ?Sized>(
    session: &mut MinigameSession,
    input: &MinigameInput,
    delta_ms: u32,
    rng: &mut R,
) -> Step {
    let delta = delta_ms as f32;
    let difficulty = session.difficulty;
    let combo = &mut session.combo;
    match &mut session.progress {
        MinigameProgress::RapidPress { count, target } => {
            if input.confirm_pressed {
                *count += 1;
                if *count >= *target {
                    return Step::Win;
                }
            }
            Step::Continue
        }
        MinigameProgress::BalanceHold { value, velocity } => {
            if input.left_held {
                *velocity -= 0.05;
            }
            if input.right_held {
                *velocity += 0.05;
            }
            *velocity += (rng.gen::<f32>() - 0.5) * 0.2;
            *value += *velocity;
            if value.abs() > BALANCE_LIMIT {
                return Step::Lose;
            }
            Step::Continue
        }
        MinigameProgress::RhythmMatch {
            radius,
            speed,
            hits,
            goal,
        } => {
            *radius += *speed * delta * 20.0;
            if *radius > RHYTHM_MAX_RADIUS {
                *radius = 0.0;
            }
            if input.confirm_pressed {
                let diff = (*radius - RHYTHM_TARGET_RADIUS).abs();
                if diff < 10.0 {
                    *hits += 1;
                    if diff < 5.0 {
                        *combo += 1;
                    }
                    *radius = 0.0;
                    if *hits >= *goal {
                        return Step::Win;
                    }
                } else {
                    *combo = 0;
                }
            }
            Step::Continue
        }
        MinigameProgress::HoldToFill { value, decay } => {
            if input.confirm_held {
                *value += 2.0;
            }
            *value = (*value - *decay).clamp(0.0, HOLD_MAX);
            if *value >= HOLD_MAX {
                return Step::Win;
            }
            Step::Continue
        }
        MinigameProgress::BreathTiming { phase, speed } => {
            *phase += *speed * delta;
            let scale = 1.0 + phase.sin() * 0.5;
            if input.confirm_pressed {
                if scale > 0.9 && scale < 1.1 {
                    *combo += 1;
                } else {
                    return Step::Lose;
                }
            }
            Step::Continue
        }
        MinigameProgress::PursuitFocus { target, score } => {
            target.0 = (target.0 + (rng.gen::<f32>() - 0.5) * 10.0).clamp(100.0, FIELD_WIDTH - 100.0);
            target.1 =
                (target.1 + (rng.gen::<f32>() - 0.5) * 10.0).clamp(100.0, FIELD_HEIGHT - 100.0);
            if let Some((x, y)) = input.pointer {
                let distance = ((x - target.0).powi(2) + (y - target.1).powi(2)).sqrt();
                if distance < FOCUS_CAPTURE_RADIUS {
                    *score += delta;
                }
            }
            if *score >= FOCUS_GOAL {
                return Step::Win;
            }
            Step::Continue
        }
        MinigameProgress::MemoryMatch {
            values,
            revealed,
            first_pick,
            matches,
            flip_back,
        } => {
            if let Some((a, b, remaining)) = flip_back.as_mut() {
                *remaining = remaining.saturating_sub(delta_ms);
                if *remaining > 0 {
                    return Step::Continue;
                }
                revealed[*a] = false;
                revealed[*b] = false;
                *flip_back = None;
            }
            let Some(pick) = input.pick else {
                return Step::Continue;
            };
            if pick >= values.len() || revealed[pick] {
                return Step::Continue;
            }
            revealed[pick] = true;
            match first_pick.take() {
                None => *first_pick = Some(pick),
                Some(first) => {
                    if values[first] == values[pick] {
                        *matches += 1;
                        *combo += 1;
                        if *matches as usize * 2 == values.len() {
                            return Step::Win;
                        }
                    } else {
                        *combo = 0;
                        *flip_back = Some((first, pick, MEMORY_FLIP_BACK_MS));
                    }
                }
            }
            Step::Continue
        }
        MinigameProgress::LaneDodge {
            lane,
            obstacles,
            spawn_every_ms,
            spawn_elapsed_ms,
            spawned,
            max_spawns,
            dodges,
            goal,
        } => {
            if input.left_pressed {
                *lane = (*lane - 1).max(0);
            }
            if input.right_pressed {
                *lane = (*lane + 1).min(LANE_COUNT - 1);
            }
            if *spawned < *max_spawns {
                *spawn_elapsed_ms += delta_ms;
                while *spawn_elapsed_ms >= *spawn_every_ms && *spawned < *max_spawns {
                    *spawn_elapsed_ms -= *spawn_every_ms;
                    *spawned += 1;
                    obstacles.push(Obstacle {
                        lane: rng.gen_range(0..LANE_COUNT),
                        y: LANE_OBSTACLE_START_Y,
                    });
                }
            }

            let speed = delta * (0.3 + difficulty * 0.05);
            let reach = (LANE_PLAYER_HEIGHT + LANE_OBSTACLE_HEIGHT) / 2.0;
            let mut index = 0;
            while index < obstacles.len() {
                let obstacle = &mut obstacles[index];
                obstacle.y += speed;
                if obstacle.lane == *lane && (obstacle.y - LANE_PLAYER_Y).abs() < reach {
                    return Step::Lose;
                }
                if obstacle.y > LANE_PASSED_Y {
                    obstacles.remove(index);
                    *dodges += 1;
                    *combo += 1;
                    if *dodges >= *goal {
                        return Step::Win;
                    }
                    continue;
                }
                index += 1;
            }
            Step::Continue
        }
        MinigameProgress::SequenceRepeat {
            sequence,
            entered,
            phase,
            show_ms,
            gap_ms,
        } => {
            let mut budget = delta_ms;
            loop {
                match phase {
                    SequencePhase::LeadIn { remaining_ms } => {
                        let spent = budget.min(*remaining_ms);
                        *remaining_ms -= spent;
                        budget -= spent;
                        if *remaining_ms > 0 {
                            break;
                        }
                        *phase = SequencePhase::Showing {
                            index: 0,
                            lit: true,
                            remaining_ms: *show_ms,
                        };
                        // run_timer charges the whole delta, including the lead-in part.
                        session.timer = Some(MinigameTimer {
                            remaining_ms: SEQUENCE_TIMEOUT_MS + (delta_ms - budget),
                            win_on_expiry: false,
                        });
                    }
                    SequencePhase::Showing {
                        index,
                        lit,
                        remaining_ms,
                    } => {
                        let spent = budget.min(*remaining_ms);
                        *remaining_ms -= spent;
                        budget -= spent;
                        if *remaining_ms > 0 {
                            break;
                        }
                        if *lit {
                            *lit = false;
                            *remaining_ms = *gap_ms;
                        } else if *index + 1 >= sequence.len() {
                            *phase = SequencePhase::Input;
                        } else {
                            *index += 1;
                            *lit = true;
                            *remaining_ms = *show_ms;
                        }
                    }
                    SequencePhase::Input => break,
                }
            }

            if *phase != SequencePhase::Input {
                return Step::Continue;
            }
            let Some(symbol) = input.pick else {
                return Step::Continue;
            };
            if sequence.get(*entered).map(|s| *s as usize) != Some(symbol) {
                *combo = 0;
                return Step::Lose;
            }
            *entered += 1;
            *combo += 1;
            if *entered == sequence.len() {
                return Step::Win;
            }
            Step::Continue
        }
    }
}

fn finish(state: &mut MinigameState, success: bool) {
    let Some(session) = state.session.take() else {
        return;
    };
    let perfect = success && session.combo >= 3;
    let score = if success { session.score() } else { 0 };
    let new_record = success && state.record_score(session.kind, score);
    let karma_nudge = if success {
        session.kind.karma_nudge(perfect)
    } else {
        0
    };
    tracing::info!(
        kind = session.kind.label(),
        success,
        perfect,
        score,
        "minigame finished"
    );
    state.outcome = Some(MinigameOutcome {
        kind: session.kind,
        success,
        perfect,
        score,
        karma_nudge,
        new_record,
    });
}

/// Wrong-kind or locked input is simply ignored, never an error.
pub fn accepts_pick(state: &MinigameState) -> bool {
    state
        .session
        .as_ref()
        .map(|s| !s.is_locked())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::minigame::MAX_DIFFICULTY;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn started(kind: MinigameKind, difficulty: f32, rng: &mut StdRng) -> MinigameState {
        let mut state = MinigameState::default();
        start_minigame(&mut state, kind, difficulty, rng).unwrap();
        state
    }

    #[test]
    fn extreme_difficulty_is_capped_for_every_kind() {
        let mut rng = rng();
        for kind in ALL_KINDS {
            for difficulty in [5e9, f32::INFINITY, f32::NAN, -3.0] {
                let mut state = started(kind, difficulty, &mut rng);
                let session = state.session.as_ref().unwrap();
                assert!((0.0..=MAX_DIFFICULTY).contains(&session.difficulty));
                for _ in 0..50 {
                    tick_minigame(&mut state, &MinigameInput::default(), 100, &mut rng);
                }
            }
        }
    }

    #[test]
    fn rapid_press_seven_presses_in_time_wins() {
        let mut rng = rng();
        let mut state = started(MinigameKind::RapidPress, 1.0, &mut rng);
        for _ in 0..7 {
            tick_minigame(&mut state, &MinigameInput::confirm(), 100, &mut rng);
        }
        let outcome = state.take_outcome().unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.score, 7);
        assert_eq!(outcome.karma_nudge, -1);
        assert!(outcome.new_record);
        assert!(!state.is_active());
    }

    #[test]
    fn rapid_press_short_of_target_fails_on_timeout() {
        let mut rng = rng();
        let mut state = started(MinigameKind::RapidPress, 1.0, &mut rng);
        for _ in 0..6 {
            tick_minigame(&mut state, &MinigameInput::confirm(), 100, &mut rng);
        }
        tick_minigame(&mut state, &MinigameInput::default(), 3099, &mut rng);
        assert!(state.is_active());
        tick_minigame(&mut state, &MinigameInput::default(), 1, &mut rng);
        let outcome = state.take_outcome().unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.karma_nudge, 0);
    }

    #[test]
    fn start_while_active_is_rejected() {
        let mut rng = rng();
        let mut state = started(MinigameKind::HoldToFill, 0.0, &mut rng);
        assert!(matches!(
            start_minigame(&mut state, MinigameKind::RapidPress, 0.0, &mut rng),
            Err(ActionRejected::Busy)
        ));
    }

    #[test]
    fn balance_survives_to_timeout_when_steered() {
        let mut rng = rng();
        let mut state = started(MinigameKind::BalanceHold, 0.0, &mut rng);
        for _ in 0..400 {
            let (value, velocity) = match &state.session.as_ref().unwrap().progress {
                MinigameProgress::BalanceHold { value, velocity } => (*value, *velocity),
                _ => unreachable!(),
            };
            let drift = value + velocity * 10.0;
            let input = MinigameInput {
                left_held: drift > 0.0,
                right_held: drift < 0.0,
                ..MinigameInput::default()
            };
            tick_minigame(&mut state, &input, 10, &mut rng);
            if !state.is_active() {
                break;
            }
        }
        let outcome = state.take_outcome().unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.karma_nudge, 1);
    }

    #[test]
    fn balance_unattended_tips_over_eventually() {
        let mut rng = rng();
        let mut state = started(MinigameKind::BalanceHold, 8.0, &mut rng);
        if let Some(MinigameProgress::BalanceHold { velocity, .. }) =
            state.session.as_mut().map(|s| &mut s.progress)
        {
            *velocity = 5.0;
        }
        for _ in 0..100 {
            tick_minigame(&mut state, &MinigameInput::default(), 1, &mut rng);
        }
        assert!(!state.take_outcome().unwrap().success);
    }

    #[test]
    fn rhythm_hits_only_inside_window() {
        let mut rng = rng();
        let mut state = started(MinigameKind::RhythmMatch, 0.0, &mut rng);
        // speed 0.02 * 20 = 0.4 radius per ms; 125ms lands on 50.
        tick_minigame(&mut state, &MinigameInput::default(), 125, &mut rng);
        tick_minigame(&mut state, &MinigameInput::confirm(), 0, &mut rng);
        tick_minigame(&mut state, &MinigameInput::confirm(), 20, &mut rng);
        let session = state.session.as_ref().unwrap();
        match session.progress {
            MinigameProgress::RhythmMatch { hits, .. } => assert_eq!(hits, 1),
            _ => unreachable!(),
        }
        assert_eq!(session.combo, 0);

        for _ in 0..2 {
            tick_minigame(&mut state, &MinigameInput::default(), 105, &mut rng);
            tick_minigame(&mut state, &MinigameInput::confirm(), 20, &mut rng);
        }
        let outcome = state.take_outcome().unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.score, 3 + 2);
    }

    #[test]
    fn hold_fills_and_decays() {
        let mut rng = rng();
        let mut state = started(MinigameKind::HoldToFill, 0.0, &mut rng);
        for _ in 0..10 {
            tick_minigame(&mut state, &MinigameInput::default(), 10, &mut rng);
        }
        match state.session.as_ref().unwrap().progress {
            MinigameProgress::HoldToFill { value, .. } => assert_eq!(value, 0.0),
            _ => unreachable!(),
        }
        for _ in 0..250 {
            tick_minigame(&mut state, &MinigameInput::hold(), 10, &mut rng);
        }
        let outcome = state.take_outcome().unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.score, 300);
    }

    #[test]
    fn breath_off_window_fails_and_patience_wins() {
        let mut rng = rng();
        let mut state = started(MinigameKind::BreathTiming, 0.0, &mut rng);
        // phase 0.002 * 500 = 1.0, scale ~1.42: outside the window.
        tick_minigame(&mut state, &MinigameInput::default(), 500, &mut rng);
        tick_minigame(&mut state, &MinigameInput::confirm(), 0, &mut rng);
        assert!(!state.take_outcome().unwrap().success);

        let mut state = started(MinigameKind::BreathTiming, 0.0, &mut rng);
        tick_minigame(&mut state, &MinigameInput::confirm(), 10, &mut rng);
        tick_minigame(&mut state, &MinigameInput::default(), 5000, &mut rng);
        let outcome = state.take_outcome().unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.score, 100);
    }

    #[test]
    fn focus_scores_only_near_target() {
        let mut rng = rng();
        let mut state = started(MinigameKind::PursuitFocus, 0.0, &mut rng);
        let far = MinigameInput {
            pointer: Some((0.0, 0.0)),
            ..MinigameInput::default()
        };
        tick_minigame(&mut state, &far, 100, &mut rng);
        for _ in 0..20 {
            let target = match state.session.as_ref().map(|s| &s.progress) {
                Some(MinigameProgress::PursuitFocus { target, .. }) => *target,
                _ => break,
            };
            let near = MinigameInput {
                pointer: Some(target),
                ..MinigameInput::default()
            };
            tick_minigame(&mut state, &near, 100, &mut rng);
        }
        let outcome = state.take_outcome().unwrap();
        assert!(outcome.success);
        assert!(outcome.score >= 1000);
    }

    #[test]
    fn memory_mismatch_locks_then_flips_back() {
        let mut rng = rng();
        let mut state = started(MinigameKind::MemoryMatch, 0.0, &mut rng);
        let values = match &state.session.as_ref().unwrap().progress {
            MinigameProgress::MemoryMatch { values, .. } => values.clone(),
            _ => unreachable!(),
        };
        let first = 0;
        let wrong = (1..values.len()).find(|i| values[*i] != values[first]).unwrap();
        tick_minigame(&mut state, &MinigameInput::pick(first), 10, &mut rng);
        tick_minigame(&mut state, &MinigameInput::pick(wrong), 10, &mut rng);
        assert!(!accepts_pick(&state));
        tick_minigame(&mut state, &MinigameInput::pick(2), 400, &mut rng);
        assert!(!accepts_pick(&state));
        tick_minigame(&mut state, &MinigameInput::default(), 400, &mut rng);
        assert!(accepts_pick(&state));

        let mut remaining: Vec<usize> = (0..values.len()).collect();
        while let Some(a) = remaining.pop() {
            let pos = remaining.iter().position(|b| values[*b] == values[a]).unwrap();
            let b = remaining.remove(pos);
            tick_minigame(&mut state, &MinigameInput::pick(a), 10, &mut rng);
            tick_minigame(&mut state, &MinigameInput::pick(b), 10, &mut rng);
        }
        let outcome = state.take_outcome().unwrap();
        assert!(outcome.success);
        assert!(outcome.perfect);
        assert_eq!(outcome.karma_nudge, 2);
    }

    #[test]
    fn lane_dodge_collision_fails() {
        let mut rng = rng();
        let mut state = started(MinigameKind::LaneDodge, 0.0, &mut rng);
        if let Some(MinigameProgress::LaneDodge { obstacles, .. }) =
            state.session.as_mut().map(|s| &mut s.progress)
        {
            obstacles.push(Obstacle { lane: 1, y: 370.0 });
        }
        tick_minigame(&mut state, &MinigameInput::default(), 16, &mut rng);
        assert!(!state.take_outcome().unwrap().success);
    }

    #[test]
    fn lane_dodge_counts_passed_obstacles() {
        let mut rng = rng();
        let mut state = started(MinigameKind::LaneDodge, 0.0, &mut rng);
        if let Some(MinigameProgress::LaneDodge {
            obstacles,
            max_spawns,
            ..
        }) = state.session.as_mut().map(|s| &mut s.progress)
        {
            *max_spawns = 0;
            for _ in 0..5 {
                obstacles.push(Obstacle { lane: 0, y: 415.0 });
            }
        }
        tick_minigame(&mut state, &MinigameInput::default(), 20, &mut rng);
        let outcome = state.take_outcome().unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.score, 5);
    }

    #[test]
    fn sequence_repeat_accepts_exact_copy_only() {
        let mut rng = rng();
        let mut state = started(MinigameKind::SequenceRepeat, 0.0, &mut rng);
        let sequence = match &state.session.as_ref().unwrap().progress {
            MinigameProgress::SequenceRepeat { sequence, .. } => sequence.clone(),
            _ => unreachable!(),
        };
        assert_eq!(sequence.len(), 3);
        // Picks during the lead-in are ignored.
        tick_minigame(&mut state, &MinigameInput::pick(9), 500, &mut rng);
        assert!(state.is_active());
        tick_minigame(&mut state, &MinigameInput::default(), 500 + 3 * 500, &mut rng);
        assert!(state.session.as_ref().unwrap().timer.is_some());
        for symbol in &sequence {
            tick_minigame(&mut state, &MinigameInput::pick(*symbol as usize), 10, &mut rng);
        }
        let outcome = state.take_outcome().unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.score, 300 + 30);

        let mut state = started(MinigameKind::SequenceRepeat, 0.0, &mut rng);
        let first = match &state.session.as_ref().unwrap().progress {
            MinigameProgress::SequenceRepeat { sequence, .. } => sequence[0],
            _ => unreachable!(),
        };
        tick_minigame(&mut state, &MinigameInput::default(), 5000, &mut rng);
        let wrong = (first as usize + 1) % 4;
        tick_minigame(&mut state, &MinigameInput::pick(wrong), 10, &mut rng);
        assert!(!state.take_outcome().unwrap().success);
    }

    #[test]
    fn random_start_picks_a_known_kind() {
        let mut rng = rng();
        let mut state = MinigameState::default();
        let kind = start_random(&mut state, 1.0, &mut rng).unwrap();
        assert!(ALL_KINDS.contains(&kind));
        assert_eq!(state.session.as_ref().unwrap().kind, kind);
    }
}
