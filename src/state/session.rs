use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};

/// Default duration of the main lift timer.
pub const DEFAULT_TIMER_MS: u64 = 60_000;
/// Delay before a revealed decision clears itself.
pub const AUTO_CLEAR_DELAY: Duration = Duration::from_millis(10_000);
/// Cadence of both countdown tickers. Elapsed time is always measured
/// against the stored last-tick instant, never assumed to equal this.
pub const TICK_PERIOD: Duration = Duration::from_millis(200);
/// Maximum number of distinct penalty cards a judge can hold.
pub const MAX_CARDS_PER_JUDGE: usize = 3;

/// One of the three fixed referee positions on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Judge {
    /// Left side referee.
    Left,
    /// Center (chief) referee; also controls the lift clock.
    Center,
    /// Right side referee.
    Right,
}

impl Judge {
    /// All positions, in wire order.
    pub const ALL: [Judge; 3] = [Judge::Left, Judge::Center, Judge::Right];
}

impl std::fmt::Display for Judge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Judge::Left => "left",
            Judge::Center => "center",
            Judge::Right => "right",
        };
        f.write_str(name)
    }
}

/// A referee's verdict for the current attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    /// Good lift.
    White,
    /// No lift.
    Red,
}

/// Penalty marker attached to a red vote. Serialized as `1`/`2`/`3` on
/// the wire, matching the card numbering the consoles display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Card {
    /// Card 1.
    Red,
    /// Card 2.
    Blue,
    /// Card 3.
    Yellow,
}

impl TryFrom<u8> for Card {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Card::Red),
            2 => Ok(Card::Blue),
            3 => Ok(Card::Yellow),
            other => Err(format!("card value out of range: {other}")),
        }
    }
}

impl From<Card> for u8 {
    fn from(card: Card) -> Self {
        match card {
            Card::Red => 1,
            Card::Blue => 2,
            Card::Yellow => 3,
        }
    }
}

/// Where the decision lights currently are in their cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionPhase {
    /// Accepting votes.
    Idle,
    /// Decision shown; auto-clears after [`AUTO_CLEAR_DELAY`].
    Revealed,
}

/// A value held per referee position. All three positions are always
/// present, so partial maps are unrepresentable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeMap<T> {
    /// Left referee's entry.
    pub left: T,
    /// Center referee's entry.
    pub center: T,
    /// Right referee's entry.
    pub right: T,
}

impl<T> JudgeMap<T> {
    /// Borrow the entry for a position.
    pub fn get(&self, judge: Judge) -> &T {
        match judge {
            Judge::Left => &self.left,
            Judge::Center => &self.center,
            Judge::Right => &self.right,
        }
    }

    /// Mutably borrow the entry for a position.
    pub fn get_mut(&mut self, judge: Judge) -> &mut T {
        match judge {
            Judge::Left => &mut self.left,
            Judge::Center => &mut self.center,
            Judge::Right => &mut self.right,
        }
    }

    /// Iterate over the three entries in wire order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        [&self.left, &self.center, &self.right].into_iter()
    }

    /// Build a map by evaluating `f` for each position.
    pub fn from_fn(mut f: impl FnMut(Judge) -> T) -> Self {
        Self {
            left: f(Judge::Left),
            center: f(Judge::Center),
            right: f(Judge::Right),
        }
    }
}

/// Deep, independently-mutable copy of a session's full live state,
/// broadcast to every client of the room after each mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// Current decision phase.
    pub phase: DecisionPhase,
    /// Votes cast so far; `None` until a referee decides.
    pub votes: JudgeMap<Option<Vote>>,
    /// Penalty cards per referee (meaningful alongside a red vote).
    pub cards: JudgeMap<Vec<Card>>,
    /// Remaining milliseconds on the main lift timer.
    pub timer_ms: u64,
    /// Whether the main timer is counting down.
    pub running: bool,
    /// Referee console presence, display-only.
    pub connected: JudgeMap<bool>,
    /// Remaining milliseconds on the interval countdown.
    pub interval_ms: u64,
    /// Configured total duration of the interval countdown.
    pub interval_configured_ms: u64,
    /// Whether the interval countdown is running.
    pub interval_running: bool,
    /// Whether the interval countdown replaces the lights on displays.
    pub interval_visible: bool,
}

/// Identifier handed out by [`Session::on_snapshot`], usable with
/// [`Session::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(StateSnapshot) + Send + Sync>;

#[derive(Debug, Default)]
struct Countdown {
    remaining_ms: u64,
    running: bool,
    last_tick: Option<Instant>,
}

#[derive(Debug, Default)]
struct IntervalCountdown {
    remaining_ms: u64,
    configured_ms: u64,
    running: bool,
    visible: bool,
    last_tick: Option<Instant>,
}

struct Core {
    phase: DecisionPhase,
    votes: JudgeMap<Option<Vote>>,
    cards: JudgeMap<Vec<Card>>,
    connected: JudgeMap<bool>,
    timer: Countdown,
    interval: IntervalCountdown,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
    timer_task: Option<JoinHandle<()>>,
    interval_task: Option<JoinHandle<()>>,
    auto_clear: Option<JoinHandle<()>>,
}

impl Core {
    fn new() -> Self {
        Self {
            phase: DecisionPhase::Idle,
            votes: JudgeMap::default(),
            cards: JudgeMap::default(),
            connected: JudgeMap::default(),
            timer: Countdown {
                remaining_ms: DEFAULT_TIMER_MS,
                ..Countdown::default()
            },
            interval: IntervalCountdown::default(),
            listeners: Vec::new(),
            next_subscription: 0,
            timer_task: None,
            interval_task: None,
            auto_clear: None,
        }
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            phase: self.phase,
            votes: self.votes.clone(),
            cards: self.cards.clone(),
            timer_ms: self.timer.remaining_ms,
            running: self.timer.running,
            connected: self.connected.clone(),
            interval_ms: self.interval.remaining_ms,
            interval_configured_ms: self.interval.configured_ms,
            interval_running: self.interval.running,
            interval_visible: self.interval.visible,
        }
    }

    fn all_votes_cast(&self) -> bool {
        self.votes.values().all(Option::is_some)
    }

    fn stop_main_timer(&mut self) {
        self.timer.running = false;
        self.timer.last_tick = None;
        if let Some(task) = self.timer_task.take() {
            task.abort();
        }
    }

    fn stop_interval_timer(&mut self) {
        self.interval.running = false;
        self.interval.last_tick = None;
        if let Some(task) = self.interval_task.take() {
            task.abort();
        }
    }

    fn cancel_auto_clear(&mut self) {
        if let Some(task) = self.auto_clear.take() {
            task.abort();
        }
    }

    /// Reset votes, cards, phase, and the main timer for the next attempt.
    fn reset_attempt(&mut self) {
        self.cancel_auto_clear();
        self.phase = DecisionPhase::Idle;
        self.votes = JudgeMap::default();
        self.cards = JudgeMap::default();
        self.stop_main_timer();
        self.timer.remaining_ms = DEFAULT_TIMER_MS;
    }
}

/// The live state machine for one room.
///
/// Cheap-to-clone handle over the shared core. Every mutation runs as a
/// synchronous critical section and then fans the fresh snapshot out to
/// all subscribers, so commands from concurrent connections are applied
/// in arrival order with no further locking.
#[derive(Clone)]
pub struct Session {
    core: Arc<Mutex<Core>>,
}

/// Snapshot plus the listeners to invoke once the core lock is released.
type Fanout = (StateSnapshot, Vec<Listener>);

impl Session {
    /// Create a fresh session in the idle phase with default timers.
    pub fn new() -> Self {
        Self {
            core: Arc::new(Mutex::new(Core::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fanout(core: &Core) -> Fanout {
        let listeners = core
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        (core.snapshot(), listeners)
    }

    fn dispatch(&self, (snapshot, listeners): Fanout) {
        for listener in listeners {
            listener(snapshot.clone());
        }
    }

    /// Register a listener invoked with the current snapshot immediately
    /// and again after every mutation.
    pub fn on_snapshot<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(StateSnapshot) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let (id, snapshot) = {
            let mut core = self.lock();
            let id = SubscriptionId(core.next_subscription);
            core.next_subscription += 1;
            core.listeners.push((id, Arc::clone(&listener)));
            (id, core.snapshot())
        };
        listener(snapshot);
        id
    }

    /// Remove a previously registered listener.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut core = self.lock();
        core.listeners.retain(|(existing, _)| *existing != id);
    }

    /// Deep copy of the full session state.
    pub fn snapshot(&self) -> StateSnapshot {
        self.lock().snapshot()
    }

    /// Record a referee's vote. Ignored while the decision is revealed.
    /// A non-red vote discards that referee's cards. Casting the third
    /// vote reveals the decision automatically.
    pub fn set_vote(&self, judge: Judge, vote: Vote) {
        let update = {
            let mut core = self.lock();
            if core.phase == DecisionPhase::Revealed {
                return;
            }
            *core.votes.get_mut(judge) = Some(vote);
            if vote != Vote::Red {
                core.cards.get_mut(judge).clear();
            }
            if core.all_votes_cast() {
                self.reveal_locked(&mut core);
            }
            Self::fanout(&core)
        };
        self.dispatch(update);
    }

    /// Toggle a penalty card for a referee, or clear the whole set with
    /// `None`. A card always forces that referee's vote to red. A fourth
    /// distinct card is silently ignored.
    pub fn set_card(&self, judge: Judge, card: Option<Card>) {
        let update = {
            let mut core = self.lock();
            match card {
                None => core.cards.get_mut(judge).clear(),
                Some(card) => {
                    *core.votes.get_mut(judge) = Some(Vote::Red);
                    let cards = core.cards.get_mut(judge);
                    if let Some(index) = cards.iter().position(|held| *held == card) {
                        cards.remove(index);
                    } else if cards.len() >= MAX_CARDS_PER_JUDGE {
                        return;
                    } else {
                        cards.push(card);
                    }
                }
            }
            Self::fanout(&core)
        };
        self.dispatch(update);
    }

    /// Reveal the decision if every vote is in, or unconditionally when
    /// forced. No-op while already revealed.
    pub fn trigger_reveal(&self, force: bool) {
        let update = {
            let mut core = self.lock();
            if core.phase == DecisionPhase::Revealed {
                return;
            }
            if !force && !core.all_votes_cast() {
                return;
            }
            self.reveal_locked(&mut core);
            Self::fanout(&core)
        };
        self.dispatch(update);
    }

    /// Admin-forced reveal, even with incomplete votes.
    pub fn release_decision(&self) {
        self.trigger_reveal(true);
    }

    /// Reset the room for the next attempt: idle phase, empty votes and
    /// cards, main timer stopped and restored to its default, any
    /// pending auto-clear defused.
    pub fn clear_decision(&self) {
        let update = {
            let mut core = self.lock();
            core.reset_attempt();
            Self::fanout(&core)
        };
        self.dispatch(update);
    }

    /// Same effect as [`Session::clear_decision`]; issued by the admin
    /// ahead of the next attempt.
    pub fn set_phase_ready(&self) {
        self.clear_decision();
    }

    fn reveal_locked(&self, core: &mut Core) {
        core.phase = DecisionPhase::Revealed;
        self.schedule_auto_clear(core);
    }

    fn schedule_auto_clear(&self, core: &mut Core) {
        core.cancel_auto_clear();
        let weak = Arc::downgrade(&self.core);
        core.auto_clear = Some(tokio::spawn(async move {
            tokio::time::sleep(AUTO_CLEAR_DELAY).await;
            if let Some(core) = weak.upgrade() {
                Session { core }.auto_clear_fired();
            }
        }));
    }

    fn auto_clear_fired(&self) {
        let update = {
            let mut core = self.lock();
            // A manual clear may have slipped in between the sleep
            // elapsing and this lock; only one reset per reveal cycle.
            if core.phase != DecisionPhase::Revealed {
                return;
            }
            core.reset_attempt();
            Self::fanout(&core)
        };
        self.dispatch(update);
    }

    /// Start the main lift timer. No-op while already running.
    pub fn start_timer(&self) {
        let update = {
            let mut core = self.lock();
            if core.timer.running {
                return;
            }
            core.timer.running = true;
            core.timer.last_tick = Some(Instant::now());
            core.timer_task = Some(self.spawn_main_ticker());
            Self::fanout(&core)
        };
        self.dispatch(update);
    }

    /// Set the remaining duration and start the timer if it is stopped.
    pub fn start_timer_with_seconds(&self, seconds: f64) {
        let update = {
            let mut core = self.lock();
            core.timer.remaining_ms = clamp_ms(seconds);
            if !core.timer.running {
                core.timer.running = true;
                core.timer.last_tick = Some(Instant::now());
                core.timer_task = Some(self.spawn_main_ticker());
            }
            Self::fanout(&core)
        };
        self.dispatch(update);
    }

    /// Pause the main timer. No-op while stopped.
    pub fn stop_timer(&self) {
        let update = {
            let mut core = self.lock();
            if !core.timer.running {
                return;
            }
            core.stop_main_timer();
            Self::fanout(&core)
        };
        self.dispatch(update);
    }

    /// Stop the main timer and restore the default duration.
    pub fn reset_timer(&self) {
        let update = {
            let mut core = self.lock();
            core.stop_main_timer();
            core.timer.remaining_ms = DEFAULT_TIMER_MS;
            Self::fanout(&core)
        };
        self.dispatch(update);
    }

    /// Configure the interval countdown: both the total and the
    /// remaining duration are set, and visibility follows whether the
    /// duration is positive. Stops any running tick first.
    pub fn configure_interval(&self, seconds: f64) {
        let update = {
            let mut core = self.lock();
            let ms = clamp_ms(seconds);
            core.stop_interval_timer();
            core.interval.configured_ms = ms;
            core.interval.remaining_ms = ms;
            core.interval.visible = ms > 0;
            Self::fanout(&core)
        };
        self.dispatch(update);
    }

    /// Start the interval countdown. No-op while running or exhausted.
    pub fn start_interval(&self) {
        let update = {
            let mut core = self.lock();
            if core.interval.running || core.interval.remaining_ms == 0 {
                return;
            }
            core.interval.running = true;
            core.interval.visible = true;
            core.interval.last_tick = Some(Instant::now());
            core.interval_task = Some(self.spawn_interval_ticker());
            Self::fanout(&core)
        };
        self.dispatch(update);
    }

    /// Pause the interval countdown. No-op while stopped.
    pub fn stop_interval(&self) {
        let update = {
            let mut core = self.lock();
            if !core.interval.running {
                return;
            }
            core.stop_interval_timer();
            Self::fanout(&core)
        };
        self.dispatch(update);
    }

    /// Stop the interval countdown and restore the configured duration.
    pub fn reset_interval(&self) {
        let update = {
            let mut core = self.lock();
            core.stop_interval_timer();
            core.interval.remaining_ms = core.interval.configured_ms;
            core.interval.visible = core.interval.configured_ms > 0;
            Self::fanout(&core)
        };
        self.dispatch(update);
    }

    /// Override interval visibility regardless of its running state.
    pub fn set_interval_visible(&self, visible: bool) {
        let update = {
            let mut core = self.lock();
            core.interval.visible = visible;
            Self::fanout(&core)
        };
        self.dispatch(update);
    }

    /// Record whether a referee console is currently bound to this room.
    /// Display bookkeeping only; never consulted for authorization.
    pub fn set_connected(&self, judge: Judge, connected: bool) {
        let update = {
            let mut core = self.lock();
            *core.connected.get_mut(judge) = connected;
            Self::fanout(&core)
        };
        self.dispatch(update);
    }

    /// Set presence for all three referee positions at once.
    pub fn set_all_connected(&self, connected: bool) {
        let update = {
            let mut core = self.lock();
            core.connected = JudgeMap::from_fn(|_| connected);
            Self::fanout(&core)
        };
        self.dispatch(update);
    }

    fn spawn_main_ticker(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.core);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK_PERIOD);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(core) = weak.upgrade() else { break };
                if !(Session { core }).tick_main() {
                    break;
                }
            }
        })
    }

    fn spawn_interval_ticker(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.core);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK_PERIOD);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(core) = weak.upgrade() else { break };
                if !(Session { core }).tick_interval() {
                    break;
                }
            }
        })
    }

    /// Advance the main timer by the wall-clock delta since the last
    /// tick. Returns whether the ticker should keep running.
    fn tick_main(&self) -> bool {
        let (update, keep_ticking) = {
            let mut core = self.lock();
            if !core.timer.running {
                return false;
            }
            let now = Instant::now();
            let delta = core
                .timer
                .last_tick
                .map(|last| now.duration_since(last))
                .unwrap_or_default();
            core.timer.last_tick = Some(now);
            core.timer.remaining_ms = core
                .timer
                .remaining_ms
                .saturating_sub(delta.as_millis() as u64);
            let keep_ticking = if core.timer.remaining_ms == 0 {
                core.stop_main_timer();
                false
            } else {
                true
            };
            (Self::fanout(&core), keep_ticking)
        };
        self.dispatch(update);
        keep_ticking
    }

    /// Advance the interval countdown; hitting zero stops and hides it.
    fn tick_interval(&self) -> bool {
        let (update, keep_ticking) = {
            let mut core = self.lock();
            if !core.interval.running {
                return false;
            }
            let now = Instant::now();
            let delta = core
                .interval
                .last_tick
                .map(|last| now.duration_since(last))
                .unwrap_or_default();
            core.interval.last_tick = Some(now);
            core.interval.remaining_ms = core
                .interval
                .remaining_ms
                .saturating_sub(delta.as_millis() as u64);
            let keep_ticking = if core.interval.remaining_ms == 0 {
                core.stop_interval_timer();
                core.interval.visible = false;
                false
            } else {
                true
            };
            (Self::fanout(&core), keep_ticking)
        };
        self.dispatch(update);
        keep_ticking
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a seconds value from the wire into clamped whole milliseconds.
fn clamp_ms(seconds: f64) -> u64 {
    let ms = seconds * 1000.0;
    if ms.is_finite() && ms > 0.0 {
        ms.round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn cast_all_votes(session: &Session) {
        session.set_vote(Judge::Left, Vote::White);
        session.set_vote(Judge::Center, Vote::White);
        session.set_vote(Judge::Right, Vote::Red);
    }

    #[tokio::test]
    async fn initial_snapshot_is_idle_with_default_timer() {
        let session = Session::new();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, DecisionPhase::Idle);
        assert_eq!(snapshot.votes, JudgeMap::default());
        assert_eq!(snapshot.timer_ms, DEFAULT_TIMER_MS);
        assert!(!snapshot.running);
        assert!(!snapshot.interval_visible);
    }

    #[tokio::test]
    async fn third_vote_reveals_regardless_of_order() {
        for order in [
            [Judge::Left, Judge::Center, Judge::Right],
            [Judge::Right, Judge::Left, Judge::Center],
            [Judge::Center, Judge::Right, Judge::Left],
        ] {
            let session = Session::new();
            for judge in order {
                assert_eq!(session.snapshot().phase, DecisionPhase::Idle);
                session.set_vote(judge, Vote::White);
            }
            assert_eq!(session.snapshot().phase, DecisionPhase::Revealed);
        }
    }

    #[tokio::test]
    async fn vote_while_revealed_is_a_no_op() {
        let session = Session::new();
        cast_all_votes(&session);
        let before = session.snapshot();
        session.set_vote(Judge::Left, Vote::Red);
        assert_eq!(session.snapshot(), before);
    }

    #[tokio::test]
    async fn card_toggles_and_forces_red_vote() {
        let session = Session::new();
        session.set_card(Judge::Right, Some(Card::Blue));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.votes.right, Some(Vote::Red));
        assert_eq!(snapshot.cards.right, vec![Card::Blue]);

        session.set_card(Judge::Right, Some(Card::Blue));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.cards.right, Vec::new());
        // Toggling off leaves the red vote in place.
        assert_eq!(snapshot.votes.right, Some(Vote::Red));
    }

    #[tokio::test]
    async fn card_capacity_is_three_distinct() {
        let session = Session::new();
        session.set_card(Judge::Left, Some(Card::Red));
        session.set_card(Judge::Left, Some(Card::Blue));
        session.set_card(Judge::Left, Some(Card::Yellow));
        assert_eq!(session.snapshot().cards.left.len(), 3);

        // Re-adding a held card toggles it off rather than exceeding capacity.
        session.set_card(Judge::Left, Some(Card::Red));
        assert_eq!(
            session.snapshot().cards.left,
            vec![Card::Blue, Card::Yellow]
        );
    }

    #[tokio::test]
    async fn non_red_vote_clears_cards() {
        let session = Session::new();
        session.set_card(Judge::Center, Some(Card::Red));
        session.set_vote(Judge::Center, Vote::White);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.votes.center, Some(Vote::White));
        assert_eq!(snapshot.cards.center, Vec::new());
    }

    #[tokio::test]
    async fn clearing_card_set_keeps_vote() {
        let session = Session::new();
        session.set_card(Judge::Left, Some(Card::Yellow));
        session.set_card(Judge::Left, None);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.cards.left, Vec::new());
        assert_eq!(snapshot.votes.left, Some(Vote::Red));
    }

    #[tokio::test]
    async fn force_reveal_with_incomplete_votes() {
        let session = Session::new();
        session.set_vote(Judge::Left, Vote::White);
        session.trigger_reveal(false);
        assert_eq!(session.snapshot().phase, DecisionPhase::Idle);
        session.release_decision();
        assert_eq!(session.snapshot().phase, DecisionPhase::Revealed);
    }

    #[tokio::test(start_paused = true)]
    async fn revealed_decision_auto_clears() {
        let session = Session::new();
        cast_all_votes(&session);
        assert_eq!(session.snapshot().phase, DecisionPhase::Revealed);

        tokio::time::sleep(AUTO_CLEAR_DELAY + Duration::from_millis(100)).await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, DecisionPhase::Idle);
        assert_eq!(snapshot.votes, JudgeMap::default());
        assert_eq!(snapshot.cards, JudgeMap::default());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_clear_defuses_pending_auto_clear() {
        let session = Session::new();
        session.start_timer();
        cast_all_votes(&session);
        session.clear_decision();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, DecisionPhase::Idle);
        assert_eq!(snapshot.timer_ms, DEFAULT_TIMER_MS);
        assert!(!snapshot.running);

        // Votes cast after the clear must survive the original deadline.
        session.set_vote(Judge::Left, Vote::Red);
        tokio::time::sleep(AUTO_CLEAR_DELAY + Duration::from_secs(1)).await;
        assert_eq!(session.snapshot().votes.left, Some(Vote::Red));
    }

    #[tokio::test(start_paused = true)]
    async fn main_timer_counts_down_to_zero_and_stops() {
        let session = Session::new();
        session.start_timer_with_seconds(5.0);
        assert!(session.snapshot().running);

        tokio::time::sleep(Duration::from_millis(5_200)).await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.timer_ms, 0);
        assert!(!snapshot.running);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_stop_freezes_remaining_time() {
        let session = Session::new();
        session.start_timer_with_seconds(10.0);
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        session.stop_timer();
        let frozen = session.snapshot().timer_ms;
        assert!(frozen < 10_000 && frozen > 0);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(session.snapshot().timer_ms, frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_start_is_idempotent() {
        let session = Session::new();
        session.start_timer();
        tokio::time::sleep(Duration::from_millis(600)).await;
        let before = session.snapshot().timer_ms;
        session.start_timer();
        // A second start must not rewind or reset elapsed progress.
        assert_eq!(session.snapshot().timer_ms, before);
    }

    #[tokio::test]
    async fn reset_timer_restores_default() {
        let session = Session::new();
        session.start_timer_with_seconds(7.0);
        session.reset_timer();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.timer_ms, DEFAULT_TIMER_MS);
        assert!(!snapshot.running);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_runs_out_and_hides() {
        let session = Session::new();
        session.configure_interval(3.0);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.interval_configured_ms, 3_000);
        assert!(snapshot.interval_visible);

        session.start_interval();
        tokio::time::sleep(Duration::from_millis(3_200)).await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.interval_ms, 0);
        assert!(!snapshot.interval_running);
        assert!(!snapshot.interval_visible);
    }

    #[tokio::test]
    async fn exhausted_interval_does_not_restart() {
        let session = Session::new();
        session.configure_interval(0.0);
        session.start_interval();
        let snapshot = session.snapshot();
        assert!(!snapshot.interval_running);
        assert!(!snapshot.interval_visible);
    }

    #[tokio::test]
    async fn interval_reset_restores_configured_duration() {
        let session = Session::new();
        session.configure_interval(120.0);
        session.start_interval();
        session.reset_interval();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.interval_ms, 120_000);
        assert!(!snapshot.interval_running);
        assert!(snapshot.interval_visible);
    }

    #[tokio::test]
    async fn interval_visibility_override() {
        let session = Session::new();
        session.configure_interval(60.0);
        session.set_interval_visible(false);
        assert!(!session.snapshot().interval_visible);
        session.set_interval_visible(true);
        assert!(session.snapshot().interval_visible);
    }

    #[tokio::test]
    async fn snapshot_listener_fires_immediately_and_per_mutation() {
        let session = Session::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let id = session.on_snapshot(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        session.set_vote(Judge::Left, Vote::White);
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        session.set_card(Judge::Left, Some(Card::Red));
        session.set_card(Judge::Left, Some(Card::Blue));
        session.set_card(Judge::Left, Some(Card::Yellow));
        let count = seen.load(Ordering::SeqCst);
        // Judge::Left already re-voted red via the first card.
        session.set_vote(Judge::Center, Vote::White);
        session.set_vote(Judge::Right, Vote::White);
        let after_reveal = seen.load(Ordering::SeqCst);
        assert_eq!(after_reveal, count + 2);
        session.set_vote(Judge::Center, Vote::Red);
        assert_eq!(seen.load(Ordering::SeqCst), after_reveal);

        session.unsubscribe(id);
        session.clear_decision();
        assert_eq!(seen.load(Ordering::SeqCst), after_reveal);
    }

    #[tokio::test]
    async fn snapshots_do_not_alias_internal_state() {
        let session = Session::new();
        session.set_card(Judge::Right, Some(Card::Red));
        let mut snapshot = session.snapshot();
        snapshot.cards.right.push(Card::Blue);
        snapshot.votes.left = Some(Vote::White);
        let fresh = session.snapshot();
        assert_eq!(fresh.cards.right, vec![Card::Red]);
        assert_eq!(fresh.votes.left, None);
    }

    #[test]
    fn card_wire_values_round_trip() {
        assert_eq!(serde_json::to_string(&Card::Red).unwrap(), "1");
        assert_eq!(serde_json::from_str::<Card>("3").unwrap(), Card::Yellow);
        assert!(serde_json::from_str::<Card>("4").is_err());
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let session = Session::new();
        let value = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(value["phase"], "idle");
        assert_eq!(value["timerMs"], 60_000);
        assert_eq!(value["intervalConfiguredMs"], 0);
        assert!(value["votes"]["center"].is_null());
        assert_eq!(value["connected"]["left"], false);
    }
}
