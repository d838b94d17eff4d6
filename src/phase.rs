use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::{AudioError, Tracks};
use crate::session::{Phase, Session, MAX_CYCLE_MINUTES};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PhaseError {
    #[error("a session is already running")]
    AlreadyRunning,

    #[error("durations can only be changed while idle")]
    SessionActive,
}

/// How a tick decides that a phase boundary has been reached.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryPolicy {
    /// Flip only when a tick lands exactly on the boundary second.
    /// A skipped tick or a clock jump misses the flip until the next wrap.
    Exact,
    /// Flip when a work boundary or a cycle wrap has been passed since the
    /// previous tick, even if the tick that would have hit it was skipped.
    #[default]
    Crossing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
}

/// Owns the session, the confirmation flag and both audio tracks.
///
/// Everything runs on the UI thread; audio calls return as soon as the
/// player has been told what to do.
#[derive(Debug)]
pub struct PhaseController {
    session: Session,
    policy: BoundaryPolicy,
    tracks: Tracks,
    confirmed: bool,
    last_audio_error: Option<String>,
    /// Elapsed seconds seen by the previous tick of the running session.
    last_elapsed: Option<u64>,
}

impl PhaseController {
    pub fn new(session: Session, policy: BoundaryPolicy, tracks: Tracks) -> Self {
        Self {
            session,
            policy,
            tracks,
            confirmed: false,
            last_audio_error: None,
            last_elapsed: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    pub fn policy(&self) -> BoundaryPolicy {
        self.policy
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Swap in freshly loaded tracks, silencing the ones being replaced.
    pub fn replace_tracks(&mut self, tracks: Tracks) {
        let stopped = self.tracks.stop_all();
        self.record_audio(stopped);
        self.tracks = tracks;
    }

    pub fn last_audio_error(&self) -> Option<&str> {
        self.last_audio_error.as_deref()
    }

    pub fn position_in_cycle(&self, now: DateTime<Local>) -> u64 {
        self.session.position_in_cycle(now)
    }

    pub fn progress(&self, now: DateTime<Local>) -> f64 {
        self.session.progress(now)
    }

    pub fn remaining_in_phase(&self, now: DateTime<Local>) -> u64 {
        self.session.remaining_in_phase(now)
    }

    pub fn cycles_completed(&self, now: DateTime<Local>) -> u64 {
        self.session.cycles_completed(now)
    }

    pub fn start_work(&mut self, now: DateTime<Local>) -> Result<(), PhaseError> {
        if self.session.phase.is_active() {
            return Err(PhaseError::AlreadyRunning);
        }
        self.session.phase = Phase::Working;
        self.session.started_at = Some(now);
        self.confirmed = true;
        self.last_elapsed = None;
        tracing::info!(
            work_minutes = self.session.work_minutes,
            cycle_minutes = self.session.cycle_minutes,
            "work started"
        );
        Ok(())
    }

    pub fn stop_work(&mut self) {
        let was = self.session.phase;
        self.session.phase = Phase::Idle;
        self.session.started_at = None;
        self.confirmed = false;
        self.last_elapsed = None;
        let stopped = self.tracks.stop_all();
        self.record_audio(stopped);
        tracing::info!(from = %was, "work stopped");
    }

    /// Acknowledge the current phase and silence its track.
    pub fn confirm(&mut self) {
        self.confirmed = true;
        let stopped = self.tracks.stop_all();
        self.record_audio(stopped);
    }

    /// Re-evaluate the phase against the wall clock.
    pub fn tick(&mut self, now: DateTime<Local>) -> Option<Transition> {
        if !self.session.phase.is_active() {
            return None;
        }
        let polled = self.tracks.poll();
        self.record_audio(polled);

        let elapsed = self.session.elapsed_secs(now);
        let prev = self.last_elapsed.replace(elapsed);
        let pos = elapsed % self.session.cycle_secs();
        let next = match self.policy {
            BoundaryPolicy::Exact => self.exact_next(pos),
            BoundaryPolicy::Crossing => self.crossing_next(prev, elapsed),
        }?;
        Some(self.enter(next, pos))
    }

    fn exact_next(&self, pos: u64) -> Option<Phase> {
        match self.session.phase {
            Phase::Working if pos == self.session.work_secs() => Some(Phase::Resting),
            Phase::Resting if pos == 0 => Some(Phase::Working),
            _ => None,
        }
    }

    /// Decide from the most recent boundary passed in `(prev, elapsed]`.
    ///
    /// Work boundaries sit at `k * cycle + work` and send the session to rest;
    /// wraps sit at `k * cycle` for `k >= 1` and send it back to work. With
    /// `work == cycle` the work boundary is the wrap itself, so there is none.
    /// When both land on the same second (`work == 0`) the phase alternates.
    fn crossing_next(&self, prev: Option<u64>, elapsed: u64) -> Option<Phase> {
        let cycle = self.session.cycle_secs();
        let work = self.session.work_secs();
        let passed = |at: u64| prev.map_or(true, |p| at > p);

        let work_boundary = (work < cycle && elapsed >= work)
            .then(|| (elapsed - work) / cycle * cycle + work)
            .filter(|&at| passed(at));
        let wrap = (elapsed >= cycle)
            .then(|| elapsed / cycle * cycle)
            .filter(|&at| passed(at));

        let due = match (work_boundary, wrap) {
            (Some(w), Some(c)) if w == c => match self.session.phase {
                Phase::Working => Phase::Resting,
                _ => Phase::Working,
            },
            (Some(w), Some(c)) if w > c => Phase::Resting,
            (Some(_), Some(_)) => Phase::Working,
            (Some(_), None) => Phase::Resting,
            (None, Some(_)) => Phase::Working,
            (None, None) => return None,
        };
        (due != self.session.phase).then_some(due)
    }

    fn enter(&mut self, to: Phase, pos: u64) -> Transition {
        let from = self.session.phase;
        let stopped = self.tracks.stop_all();
        self.record_audio(stopped);

        self.session.phase = to;
        self.confirmed = false;

        if let Some(track) = self.tracks.for_phase(to) {
            let played = track.play();
            self.record_audio(played);
        }
        tracing::info!(%from, %to, position = pos, "phase changed");
        Transition { from, to }
    }

    /// Set the work share of the cycle. Returns the clamped value applied.
    pub fn set_work_duration(&mut self, minutes: u32) -> Result<u32, PhaseError> {
        if self.session.phase.is_active() {
            return Err(PhaseError::SessionActive);
        }
        self.session.work_minutes = minutes.min(self.session.cycle_minutes);
        Ok(self.session.work_minutes)
    }

    /// Set the whole cycle length, pulling work minutes down if needed.
    pub fn set_cycle_duration(&mut self, minutes: u32) -> Result<u32, PhaseError> {
        if self.session.phase.is_active() {
            return Err(PhaseError::SessionActive);
        }
        self.session.cycle_minutes = minutes.clamp(1, MAX_CYCLE_MINUTES);
        self.session.work_minutes = self.session.work_minutes.min(self.session.cycle_minutes);
        Ok(self.session.cycle_minutes)
    }

    fn record_audio(&mut self, result: Result<(), AudioError>) {
        if let Err(err) = result {
            tracing::warn!(error = %err, "audio command failed");
            self.last_audio_error = Some(err.to_string());
        }
    }
}

impl Drop for PhaseController {
    fn drop(&mut self) {
        let _ = self.tracks.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{SilentTrack, Track};
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn controller(policy: BoundaryPolicy) -> PhaseController {
        PhaseController::new(Session::new(20, 60), policy, Tracks::silent())
    }

    /// Shares its call log with the test after being boxed into `Tracks`.
    #[derive(Clone, Default)]
    struct SharedTrack(Rc<RefCell<SilentTrack>>);

    impl Track for SharedTrack {
        fn play(&mut self) -> Result<(), AudioError> {
            self.0.borrow_mut().play()
        }
        fn stop(&mut self) -> Result<(), AudioError> {
            self.0.borrow_mut().stop()
        }
        fn is_playing(&mut self) -> bool {
            self.0.borrow().playing
        }
    }

    struct BrokenTrack;

    impl Track for BrokenTrack {
        fn play(&mut self) -> Result<(), AudioError> {
            Err(AudioError::Spawn {
                player: "broken".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            })
        }
        fn stop(&mut self) -> Result<(), AudioError> {
            Ok(())
        }
        fn is_playing(&mut self) -> bool {
            false
        }
    }

    fn shared_controller(policy: BoundaryPolicy) -> (PhaseController, SharedTrack, SharedTrack) {
        let work = SharedTrack::default();
        let rest = SharedTrack::default();
        let tracks = Tracks::new(Box::new(work.clone()), Box::new(rest.clone()));
        (
            PhaseController::new(Session::new(20, 60), policy, tracks),
            work,
            rest,
        )
    }

    #[test]
    fn test_start_work_from_idle() {
        let mut c = controller(BoundaryPolicy::Crossing);
        c.start_work(t0()).unwrap();
        assert_eq!(c.phase(), Phase::Working);
        assert_eq!(c.session().started_at(), Some(t0()));
        assert!(c.is_confirmed());
    }

    #[test]
    fn test_start_work_twice_is_rejected() {
        let mut c = controller(BoundaryPolicy::Crossing);
        c.start_work(t0()).unwrap();
        let later = t0() + Duration::minutes(5);
        assert_eq!(c.start_work(later), Err(PhaseError::AlreadyRunning));
        assert_eq!(c.session().started_at(), Some(t0()));
    }

    #[test]
    fn test_stop_work_resets_everything() {
        let (mut c, work, rest) = shared_controller(BoundaryPolicy::Exact);
        c.start_work(t0()).unwrap();
        c.tick(t0() + Duration::minutes(20));
        assert!(rest.0.borrow().playing);

        c.stop_work();
        assert_eq!(c.phase(), Phase::Idle);
        assert_eq!(c.session().started_at(), None);
        assert!(!c.is_confirmed());
        assert!(!work.0.borrow().playing);
        assert!(!rest.0.borrow().playing);
    }

    #[test]
    fn test_stop_from_idle_is_safe() {
        let mut c = controller(BoundaryPolicy::Exact);
        c.stop_work();
        c.stop_work();
        assert_eq!(c.phase(), Phase::Idle);
        assert_eq!(c.last_audio_error(), None);
    }

    #[test]
    fn test_exact_policy_flips_on_boundaries() {
        let (mut c, work, rest) = shared_controller(BoundaryPolicy::Exact);
        c.start_work(t0()).unwrap();

        assert_eq!(c.tick(t0() + Duration::seconds(1199)), None);
        let flip = c.tick(t0() + Duration::minutes(20));
        assert_eq!(
            flip,
            Some(Transition {
                from: Phase::Working,
                to: Phase::Resting
            })
        );
        assert!(!c.is_confirmed());
        assert!(rest.0.borrow().playing);
        assert_eq!(work.0.borrow().plays, 0);

        assert_eq!(c.tick(t0() + Duration::seconds(3599)), None);
        let flip = c.tick(t0() + Duration::minutes(60));
        assert_eq!(
            flip,
            Some(Transition {
                from: Phase::Resting,
                to: Phase::Working
            })
        );
        assert!(work.0.borrow().playing);
        assert!(!rest.0.borrow().playing);
    }

    #[test]
    fn test_exact_policy_misses_skipped_boundary() {
        let mut c = controller(BoundaryPolicy::Exact);
        c.start_work(t0()).unwrap();
        assert_eq!(c.tick(t0() + Duration::seconds(1201)), None);
        assert_eq!(c.phase(), Phase::Working);
        // the next chance is one full cycle later
        assert!(c.tick(t0() + Duration::minutes(80)).is_some());
        assert_eq!(c.phase(), Phase::Resting);
    }

    #[test]
    fn test_crossing_policy_recovers_after_clock_jump() {
        let mut c = controller(BoundaryPolicy::Crossing);
        c.start_work(t0()).unwrap();
        assert!(c.tick(t0() + Duration::seconds(1201)).is_some());
        assert_eq!(c.phase(), Phase::Resting);
        assert_eq!(c.tick(t0() + Duration::seconds(1202)), None);

        assert!(c.tick(t0() + Duration::seconds(3605)).is_some());
        assert_eq!(c.phase(), Phase::Working);
    }

    #[test]
    fn test_crossing_policy_follows_latest_of_two_skipped_boundaries() {
        let mut c = controller(BoundaryPolicy::Crossing);
        c.start_work(t0()).unwrap();
        assert_eq!(c.tick(t0() + Duration::seconds(1199)), None);
        // slept past both the 20m rest boundary and the 60m wrap
        assert_eq!(c.tick(t0() + Duration::seconds(3605)), None);
        assert_eq!(c.phase(), Phase::Working);
        assert!(c.tick(t0() + Duration::minutes(80)).is_some());
        assert_eq!(c.phase(), Phase::Resting);
    }

    fn flips_per_second(
        work: u32,
        cycle: u32,
        policy: BoundaryPolicy,
        secs: i64,
    ) -> Vec<(i64, Phase)> {
        let mut c = PhaseController::new(Session::new(work, cycle), policy, Tracks::silent());
        c.start_work(t0()).unwrap();
        (0..=secs)
            .filter_map(|s| c.tick(t0() + Duration::seconds(s)).map(|t| (s, t.to)))
            .collect()
    }

    #[test]
    fn test_zero_work_flips_back_to_work_on_every_wrap() {
        let expected = vec![
            (0, Phase::Resting),
            (60, Phase::Working),
            (120, Phase::Resting),
            (180, Phase::Working),
            (240, Phase::Resting),
            (300, Phase::Working),
        ];
        for policy in [BoundaryPolicy::Exact, BoundaryPolicy::Crossing] {
            assert_eq!(
                flips_per_second(0, 1, policy, 300),
                expected,
                "policy {:?}",
                policy
            );
        }
    }

    #[test]
    fn test_full_cycle_work_never_rests() {
        for policy in [BoundaryPolicy::Exact, BoundaryPolicy::Crossing] {
            assert!(
                flips_per_second(2, 2, policy, 600).is_empty(),
                "policy {:?}",
                policy
            );
        }
    }

    #[test]
    fn test_restart_forgets_previous_ticks() {
        let mut c = controller(BoundaryPolicy::Crossing);
        c.start_work(t0()).unwrap();
        c.tick(t0() + Duration::minutes(30));
        c.stop_work();

        let again = t0() + Duration::minutes(45);
        c.start_work(again).unwrap();
        assert_eq!(c.tick(again), None);
        assert!(c.tick(again + Duration::minutes(20)).is_some());
        assert_eq!(c.phase(), Phase::Resting);
    }

    #[test]
    fn test_one_flip_per_boundary_pass() {
        for policy in [BoundaryPolicy::Exact, BoundaryPolicy::Crossing] {
            let mut c = controller(policy);
            c.start_work(t0()).unwrap();
            let flips = (0..=2 * 3600)
                .filter_map(|s| c.tick(t0() + Duration::seconds(s)))
                .collect::<Vec<_>>();
            // 20m, 60m, 80m, 120m
            assert_eq!(flips.len(), 4, "policy {:?}", policy);
            assert_eq!(flips[0].to, Phase::Resting);
            assert_eq!(flips[1].to, Phase::Working);
        }
    }

    #[test]
    fn test_tick_while_idle_does_nothing() {
        let mut c = controller(BoundaryPolicy::Crossing);
        c.start_work(t0()).unwrap();
        c.tick(t0() + Duration::minutes(30));
        c.stop_work();
        for m in [0, 20, 60, 61] {
            assert_eq!(c.tick(t0() + Duration::minutes(m)), None);
        }
        assert_eq!(c.phase(), Phase::Idle);
    }

    #[test]
    fn test_confirm_is_idempotent() {
        let (mut c, _work, rest) = shared_controller(BoundaryPolicy::Exact);
        c.start_work(t0()).unwrap();
        c.tick(t0() + Duration::minutes(20));
        assert!(!c.is_confirmed());

        c.confirm();
        assert!(c.is_confirmed());
        assert!(!rest.0.borrow().playing);
        let stops = rest.0.borrow().stops;

        c.confirm();
        assert!(c.is_confirmed());
        assert_eq!(rest.0.borrow().plays, 1);
        assert_eq!(rest.0.borrow().stops, stops + 1);
    }

    #[test]
    fn test_durations_locked_while_active() {
        let mut c = controller(BoundaryPolicy::Crossing);
        c.start_work(t0()).unwrap();
        assert_matches!(c.set_work_duration(30), Err(PhaseError::SessionActive));
        assert_matches!(c.set_cycle_duration(30), Err(PhaseError::SessionActive));
        assert_eq!(c.session().work_minutes(), 20);
    }

    #[test]
    fn test_set_work_duration_clamps() {
        let mut c = controller(BoundaryPolicy::Crossing);
        assert_eq!(c.set_work_duration(75), Ok(60));
        assert_eq!(c.set_work_duration(0), Ok(0));
    }

    #[test]
    fn test_set_cycle_duration_pulls_work_down() {
        let mut c = controller(BoundaryPolicy::Crossing);
        assert_eq!(c.set_cycle_duration(15), Ok(15));
        assert_eq!(c.session().work_minutes(), 15);
        assert_eq!(c.set_cycle_duration(0), Ok(1));
    }

    #[test]
    fn test_audio_failure_is_recorded() {
        let tracks = Tracks::new(Box::new(BrokenTrack), Box::new(BrokenTrack));
        let mut c = PhaseController::new(Session::new(1, 2), BoundaryPolicy::Exact, tracks);
        c.start_work(t0()).unwrap();
        let flip = c.tick(t0() + Duration::minutes(1));
        assert!(flip.is_some());
        assert_eq!(c.phase(), Phase::Resting);
        assert!(c.last_audio_error().unwrap().contains("broken"));
    }

    #[test]
    fn test_drop_stops_tracks() {
        let (mut c, work, _rest) = shared_controller(BoundaryPolicy::Exact);
        c.start_work(t0()).unwrap();
        c.tick(t0() + Duration::minutes(20));
        c.tick(t0() + Duration::minutes(60));
        assert!(work.0.borrow().playing);
        drop(c);
        assert!(!work.0.borrow().playing);
    }
}
