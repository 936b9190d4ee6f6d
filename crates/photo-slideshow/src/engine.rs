use std::collections::HashSet;
use std::time::Duration;

use config_model::{OrderMode, SlideshowSettings};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clock::{AdvanceTimer, Clock, ManualClock, TokioClock};
use crate::error::SequencingError;
use crate::events::ImageDescriptor;
use crate::ordering::{RandomCycle, RngShuffler, Shuffler, next_sequential, previous_sequential};
use crate::render::{RecordingSink, RenderSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// No active list.
    Empty,
    Paused,
    Playing,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

/// Owns playback state and the auto-advance timer.
///
/// Every public operation is total: guard conditions are logged and turned
/// into no-ops so a continuously running display never stalls on bad input.
/// The engine is the only writer of its state; collaborators only see what
/// it hands to the [`RenderSink`].
pub struct SequencingEngine<S, C = TokioClock> {
    /// Images exactly as loaded; the active list is derived from it per order.
    source: Vec<ImageDescriptor>,
    active: Vec<ImageDescriptor>,
    current_index: Option<usize>,
    current_image: Option<ImageDescriptor>,
    order: OrderMode,
    playing: bool,
    interval: Duration,
    random: RandomCycle,
    timer: AdvanceTimer,
    sink: S,
    clock: C,
}

impl<S: RenderSink, C: Clock> SequencingEngine<S, C> {
    pub fn new(
        sink: S,
        clock: C,
        shuffler: Box<dyn Shuffler>,
        settings: &SlideshowSettings,
    ) -> Self {
        let interval = settings.interval().unwrap_or_else(|| {
            let fallback = SlideshowSettings::default();
            warn!(
                speed = settings.speed,
                fallback = fallback.speed,
                "ignoring unusable speed setting"
            );
            fallback.interval().unwrap_or(Duration::from_secs(10))
        });
        Self {
            source: Vec::new(),
            active: Vec::new(),
            current_index: None,
            current_image: None,
            order: settings.order,
            playing: false,
            interval,
            random: RandomCycle::new(shuffler),
            timer: AdvanceTimer::default(),
            sink,
            clock,
        }
    }

    /// Replace the playable set and show its first image.
    ///
    /// Never starts playback by itself; when playback was already requested the
    /// timer is restarted for the new list.
    pub fn load_source(&mut self, images: Vec<ImageDescriptor>) {
        self.timer.disarm();
        self.source = images;
        self.current_index = None;
        self.current_image = None;
        self.random.reset();
        self.active = arrange(&self.source, self.order);

        if self.active.is_empty() {
            warn!(
                error = %SequencingError::EmptySource,
                "loaded empty source; showing placeholder"
            );
            self.sink.render_placeholder();
            return;
        }

        info!(
            images = self.active.len(),
            order = %self.order,
            playing = self.playing,
            "loaded playback source"
        );
        if let Err(err) = self.step(Direction::Forward) {
            warn!(error = %err, "failed to show first image of new source");
        }
    }

    /// Start auto-advance, moving forward once right away.
    pub fn play(&mut self) {
        if self.playing {
            debug!("play ignored; already playing");
            return;
        }
        if self.active.is_empty() {
            warn!(error = %SequencingError::EmptySource, "play ignored");
            return;
        }
        self.playing = true;
        info!(interval = ?self.interval, "playback started");
        self.advance();
    }

    /// Mark playback as wanted without moving; the timer starts with the next
    /// non-empty source.
    pub fn request_playback(&mut self) {
        self.playing = true;
        if !self.active.is_empty() && !self.timer.is_armed() {
            self.restart_timer();
        }
    }

    pub fn pause(&mut self) {
        if !self.playing {
            return;
        }
        self.timer.disarm();
        self.playing = false;
        info!("playback paused");
    }

    pub fn advance(&mut self) {
        if let Err(err) = self.step(Direction::Forward) {
            warn!(error = %err, "advance skipped");
        }
    }

    /// Step back. Manual back navigation overrides the autoplay cadence: the
    /// timer restarts from a full interval afterwards.
    pub fn retreat(&mut self) {
        self.timer.disarm();
        if let Err(err) = self.step(Direction::Backward) {
            warn!(error = %err, "retreat skipped");
        }
    }

    /// Show a specific image now.
    ///
    /// An image from the active list becomes the current position (and, in
    /// random order, the start of a fresh cycle). Anything else is shown once
    /// without touching the sequence.
    pub fn jump_to(&mut self, image: ImageDescriptor) {
        let Some(index) = self.active.iter().position(|c| c.id == image.id) else {
            let err = SequencingError::ImageNotFound { id: image.id };
            warn!(error = %err, "showing image outside the sequence");
            self.present(image);
            return;
        };

        if self.order == OrderMode::Random {
            self.random.restart_from(index, self.active.len());
        }
        debug!(id = image.id, index, "jumping to image");
        self.show_index(index);
        self.restart_timer_if_playing();
    }

    /// Switch order mode. Takes effect on the next lookup; nothing is shown.
    pub fn set_order(&mut self, mode: OrderMode) {
        if mode == self.order {
            return;
        }
        let previous = self.order;
        self.order = mode;

        if previous == OrderMode::Alphabetical || mode == OrderMode::Alphabetical {
            self.rearrange_preserving_current();
        }
        if mode == OrderMode::Random {
            self.random.mark_pending();
        }
        info!(from = %previous, to = %mode, "order changed");
    }

    pub fn set_interval(&mut self, interval: Duration) {
        if interval.is_zero() {
            let err = SequencingError::InvalidInterval { seconds: 0.0 };
            warn!(error = %err, "interval unchanged");
            return;
        }
        if interval == self.interval {
            return;
        }
        self.interval = interval;
        info!(interval = ?interval, "interval changed");
        if self.playing && !self.active.is_empty() {
            self.restart_timer();
        }
    }

    /// [`set_interval`](Self::set_interval) from a seconds value as sent by
    /// remote clients.
    pub fn set_interval_secs(&mut self, seconds: f64) {
        let interval = (seconds.is_finite() && seconds > 0.0)
            .then(|| Duration::try_from_secs_f64(seconds).ok())
            .flatten();
        match interval {
            Some(interval) => self.set_interval(interval),
            None => {
                let err = SequencingError::InvalidInterval { seconds };
                warn!(error = %err, "interval unchanged");
            }
        }
    }

    /// Advance if the timer deadline has passed. Returns whether it fired.
    pub fn on_timer(&mut self) -> bool {
        let now = self.clock.now();
        if !self.timer.is_due(now) {
            return false;
        }
        self.timer.disarm();
        if !self.playing {
            return false;
        }
        self.advance();
        true
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    pub fn status(&self) -> PlaybackStatus {
        if self.active.is_empty() {
            PlaybackStatus::Empty
        } else if self.playing {
            PlaybackStatus::Playing
        } else {
            PlaybackStatus::Paused
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn order(&self) -> OrderMode {
        self.order
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn active_list(&self) -> &[ImageDescriptor] {
        &self.active
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current_image(&self) -> Option<&ImageDescriptor> {
        self.current_image.as_ref()
    }

    pub fn randomized_order(&self) -> &[usize] {
        self.random.order()
    }

    pub fn used_indices(&self) -> &HashSet<usize> {
        self.random.used()
    }

    pub fn history(&self) -> &[usize] {
        self.random.history()
    }

    pub fn timer_arm_count(&self) -> u64 {
        self.timer.arm_count()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    fn step(&mut self, direction: Direction) -> Result<usize, SequencingError> {
        let len = self.active.len();
        if len == 0 {
            self.timer.disarm();
            return Err(SequencingError::EmptySource);
        }

        let random = self.order == OrderMode::Random;
        let next = match (direction, random) {
            (Direction::Forward, true) => self.random.next(self.current_index, len),
            (Direction::Forward, false) => next_sequential(self.current_index, len),
            (Direction::Backward, true) => self.random.previous(self.current_index, len),
            (Direction::Backward, false) => previous_sequential(self.current_index, len),
        }
        .ok_or(SequencingError::EmptySource)?;

        if let (Direction::Forward, true, Some(previous)) = (direction, random, self.current_index) {
            // A reshuffle can lead with the image already on screen.
            if previous != next {
                self.random.push_history(previous);
            }
        }
        self.show_index(next);
        self.restart_timer_if_playing();
        Ok(next)
    }

    fn show_index(&mut self, index: usize) {
        let Some(image) = self.active.get(index).cloned() else {
            return;
        };
        self.current_index = Some(index);
        self.present(image);
    }

    fn present(&mut self, image: ImageDescriptor) {
        debug!(id = image.id, title = %image.title, "now showing");
        self.sink.render(&image, &image.title, &image.description);
        self.current_image = Some(image);
    }

    fn restart_timer_if_playing(&mut self) {
        if self.playing {
            self.restart_timer();
        }
    }

    fn restart_timer(&mut self) {
        let now = self.clock.now();
        self.timer.arm(now, self.interval);
    }

    fn rearrange_preserving_current(&mut self) {
        let current_id = self
            .current_index
            .and_then(|index| self.active.get(index))
            .map(|image| image.id);
        self.active = arrange(&self.source, self.order);
        self.current_index =
            current_id.and_then(|id| self.active.iter().position(|image| image.id == id));
        // Indices moved, so any random memory refers to the old layout.
        self.random.reset();
    }
}

fn arrange(source: &[ImageDescriptor], order: OrderMode) -> Vec<ImageDescriptor> {
    let mut list = source.to_vec();
    if order == OrderMode::Alphabetical {
        list.sort_by_cached_key(|image| image.title.to_lowercase());
    }
    list
}

/// Images the engine would show for `iterations` frames of unattended
/// playback, starting from a fresh load.
pub fn simulate_show(
    images: Vec<ImageDescriptor>,
    settings: &SlideshowSettings,
    iterations: usize,
    seed: Option<u64>,
) -> Vec<ImageDescriptor> {
    let clock = ManualClock::new(Instant::now());
    let mut engine = SequencingEngine::new(
        RecordingSink::new(),
        clock.clone(),
        Box::new(RngShuffler::from_seed(seed)),
        settings,
    );
    engine.request_playback();
    engine.load_source(images);

    while engine.sink().rendered_ids().len() < iterations {
        let Some(deadline) = engine.next_deadline() else {
            break;
        };
        clock.advance(deadline.saturating_duration_since(clock.now()));
        if !engine.on_timer() {
            break;
        }
    }

    engine
        .sink()
        .rendered_images()
        .take(iterations)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering::ScriptedShuffler;
    use crate::render::RenderEvent;

    fn image(id: u64, title: &str) -> ImageDescriptor {
        ImageDescriptor {
            id,
            url: format!("file:///photos/{id}.jpg"),
            title: title.to_string(),
            description: format!("description {id}"),
            tags: Vec::new(),
        }
    }

    fn images(n: u64) -> Vec<ImageDescriptor> {
        (1..=n).map(|id| image(id, &format!("Photo {id}"))).collect()
    }

    fn settings(order: OrderMode, speed: f64) -> SlideshowSettings {
        SlideshowSettings {
            speed,
            order,
            overlay_visible: true,
        }
    }

    fn engine_with(
        order: OrderMode,
        scripts: Vec<Vec<usize>>,
    ) -> (SequencingEngine<RecordingSink, ManualClock>, ManualClock) {
        let clock = ManualClock::new(Instant::now());
        let engine = SequencingEngine::new(
            RecordingSink::new(),
            clock.clone(),
            Box::new(ScriptedShuffler::new(scripts)),
            &settings(order, 5.0),
        );
        (engine, clock)
    }

    #[test]
    fn starts_empty_and_paused() {
        let (engine, _) = engine_with(OrderMode::Sequential, vec![]);
        assert_eq!(engine.status(), PlaybackStatus::Empty);
        assert!(!engine.is_playing());
        assert_eq!(engine.current_index(), None);
        assert!(engine.next_deadline().is_none());
    }

    #[test]
    fn load_source_shows_first_image_without_playing() {
        let (mut engine, _) = engine_with(OrderMode::Sequential, vec![]);
        engine.load_source(images(3));
        assert_eq!(engine.status(), PlaybackStatus::Paused);
        assert_eq!(engine.current_index(), Some(0));
        assert_eq!(engine.current_image().map(|i| i.id), Some(1));
        assert_eq!(engine.sink().rendered_ids(), vec![1]);
        assert!(engine.next_deadline().is_none());
    }

    #[test]
    fn sequential_wraparound_both_ways() {
        let (mut engine, _) = engine_with(OrderMode::Sequential, vec![]);
        engine.load_source(images(3));
        engine.advance();
        engine.advance();
        assert_eq!(engine.current_index(), Some(2));
        engine.advance();
        assert_eq!(engine.current_index(), Some(0));
        engine.retreat();
        assert_eq!(engine.current_index(), Some(2));
        assert_eq!(engine.sink().rendered_ids(), vec![1, 2, 3, 1, 3]);
    }

    #[test]
    fn seeded_random_cycle_renders_in_permutation_order() {
        let (mut engine, _) = engine_with(OrderMode::Random, vec![vec![2, 0, 1], vec![1, 2, 0]]);
        engine.load_source(images(3));
        engine.advance();
        engine.advance();
        assert_eq!(engine.sink().rendered_ids(), vec![3, 1, 2]);
        assert_eq!(engine.used_indices().len(), 3);

        engine.advance();
        assert_eq!(engine.randomized_order(), &[1, 2, 0]);
        assert_eq!(engine.used_indices().len(), 1);
        assert_eq!(engine.sink().rendered_ids(), vec![3, 1, 2, 2]);
    }

    #[test]
    fn random_cycle_shows_every_image_once_per_cycle() {
        for n in 1..=12u64 {
            let clock = ManualClock::new(Instant::now());
            let mut engine = SequencingEngine::new(
                RecordingSink::new(),
                clock,
                Box::new(RngShuffler::from_seed(Some(n))),
                &settings(OrderMode::Random, 5.0),
            );
            engine.load_source(images(n));
            let mut cleared = false;
            for _ in 0..n {
                let before = engine.used_indices().len();
                engine.advance();
                if engine.used_indices().len() <= before {
                    cleared = true;
                }
            }
            assert!(cleared, "cycle of {n} never restarted");

            let mut first_cycle = engine.sink().rendered_ids();
            first_cycle.truncate(n as usize);
            first_cycle.sort_unstable();
            assert_eq!(first_cycle, (1..=n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn retreat_retraces_random_history() {
        let (mut engine, _) = engine_with(OrderMode::Random, vec![vec![3, 1, 4, 0, 2]]);
        engine.load_source(images(5));
        let start = engine.current_index();
        let mut path = vec![start];
        for _ in 0..3 {
            engine.advance();
            path.push(engine.current_index());
        }
        assert_eq!(engine.history(), &[3, 1, 4]);

        path.pop();
        while let Some(expected) = path.pop() {
            engine.retreat();
            assert_eq!(engine.current_index(), expected);
        }
        assert_eq!(engine.current_index(), start);
    }

    #[test]
    fn retreat_without_history_uses_sequential_predecessor() {
        let (mut engine, _) = engine_with(OrderMode::Random, vec![vec![2, 0, 1]]);
        engine.load_source(images(3));
        engine.retreat();
        assert_eq!(engine.current_index(), Some(1));
    }

    #[test]
    fn retreat_after_returning_to_random_ignores_old_history() {
        let (mut engine, _) = engine_with(OrderMode::Random, vec![vec![3, 1, 4, 0, 2]]);
        engine.load_source(images(5));
        engine.advance();
        engine.advance();
        assert_eq!(engine.history(), &[3, 1]);

        engine.set_order(OrderMode::Sequential);
        engine.advance();
        engine.advance();
        assert_eq!(engine.current_index(), Some(1));

        engine.set_order(OrderMode::Random);
        engine.retreat();
        assert_eq!(engine.current_index(), Some(0));
        assert!(engine.history().is_empty());
    }

    #[test]
    fn rollover_onto_the_current_image_leaves_history_clean() {
        let (mut engine, _) = engine_with(OrderMode::Random, vec![vec![0, 1, 2], vec![2, 0, 1]]);
        engine.load_source(images(3));
        engine.advance();
        engine.advance();
        assert_eq!(engine.current_index(), Some(2));

        engine.advance();
        assert_eq!(engine.current_index(), Some(2));
        assert!(engine.history().is_empty());

        engine.advance();
        assert_eq!(engine.current_index(), Some(0));
        assert_eq!(engine.history(), &[2]);
    }

    #[test]
    fn jump_to_restarts_random_cycle_at_target() {
        let (mut engine, _) =
            engine_with(OrderMode::Random, vec![vec![0, 1, 2, 3], vec![3, 0, 2, 1]]);
        engine.load_source(images(4));
        engine.advance();
        assert_eq!(engine.used_indices().len(), 2);

        engine.jump_to(image(3, "Photo 3"));
        assert_eq!(engine.current_index(), Some(2));
        assert_eq!(engine.randomized_order()[0], 2);
        assert_eq!(
            engine.used_indices().iter().copied().collect::<Vec<_>>(),
            vec![2]
        );
        assert!(engine.history().is_empty());
    }

    #[test]
    fn jump_to_unknown_image_shows_once_and_keeps_position() {
        let (mut engine, _) = engine_with(OrderMode::Sequential, vec![]);
        engine.load_source(images(3));
        engine.advance();

        engine.jump_to(image(99, "Visitor"));
        assert_eq!(engine.current_index(), Some(1));
        assert_eq!(engine.current_image().map(|i| i.id), Some(99));

        engine.advance();
        assert_eq!(engine.sink().rendered_ids(), vec![1, 2, 99, 3]);
    }

    #[test]
    fn play_advances_immediately_and_arms_one_timer() {
        let (mut engine, clock) = engine_with(OrderMode::Sequential, vec![]);
        engine.load_source(images(3));
        engine.play();
        assert_eq!(engine.sink().rendered_ids(), vec![1, 2]);
        assert_eq!(engine.next_deadline(), Some(clock.now() + Duration::from_secs(5)));

        engine.play();
        assert_eq!(engine.sink().rendered_ids(), vec![1, 2], "second play is a no-op");
    }

    #[test]
    fn timer_fires_only_when_due() {
        let (mut engine, clock) = engine_with(OrderMode::Sequential, vec![]);
        engine.load_source(images(3));
        engine.play();

        clock.advance(Duration::from_secs(4));
        assert!(!engine.on_timer());
        clock.advance(Duration::from_secs(1));
        assert!(engine.on_timer());
        assert!(!engine.on_timer(), "timer re-armed for a full interval");
        assert_eq!(engine.current_index(), Some(2));
    }

    #[test]
    fn reloading_while_playing_keeps_a_single_timer() {
        let (mut engine, clock) = engine_with(OrderMode::Sequential, vec![]);
        engine.load_source(images(3));
        engine.play();
        engine.load_source(images(4));
        engine.load_source(images(5));
        assert!(engine.is_playing());

        let mut fired = 0;
        for _ in 0..50 {
            clock.advance(Duration::from_millis(100));
            if engine.on_timer() {
                fired += 1;
            }
        }
        assert_eq!(fired, 1, "five seconds at a 5s interval is one advance");
        assert_eq!(engine.current_index(), Some(1));
    }

    #[test]
    fn pause_stops_the_timer_synchronously() {
        let (mut engine, clock) = engine_with(OrderMode::Sequential, vec![]);
        engine.load_source(images(3));
        engine.play();
        engine.pause();
        engine.pause();
        assert!(engine.next_deadline().is_none());
        clock.advance(Duration::from_secs(60));
        assert!(!engine.on_timer());
        assert_eq!(engine.status(), PlaybackStatus::Paused);
    }

    #[test]
    fn advance_resets_the_cadence() {
        let (mut engine, clock) = engine_with(OrderMode::Sequential, vec![]);
        engine.load_source(images(4));
        engine.play();
        clock.advance(Duration::from_secs(4));
        engine.advance();
        clock.advance(Duration::from_secs(4));
        assert!(!engine.on_timer(), "manual advance restarted the interval");
        clock.advance(Duration::from_secs(1));
        assert!(engine.on_timer());
    }

    #[test]
    fn empty_source_is_safe() {
        let (mut engine, _) = engine_with(OrderMode::Random, vec![]);
        engine.load_source(Vec::new());
        engine.play();
        engine.advance();
        engine.retreat();
        assert!(engine.next_deadline().is_none());
        assert!(!engine.is_playing());
        assert_eq!(engine.status(), PlaybackStatus::Empty);
        assert_eq!(engine.sink().events(), &[RenderEvent::Placeholder]);
    }

    #[test]
    fn emptying_while_playing_stops_timer_until_new_images() {
        let (mut engine, clock) = engine_with(OrderMode::Sequential, vec![]);
        engine.load_source(images(2));
        engine.play();
        engine.load_source(Vec::new());
        assert!(engine.next_deadline().is_none());
        assert_eq!(engine.status(), PlaybackStatus::Empty);

        engine.load_source(images(2));
        assert_eq!(engine.status(), PlaybackStatus::Playing);
        assert_eq!(
            engine.next_deadline(),
            Some(clock.now() + Duration::from_secs(5))
        );
    }

    #[test]
    fn set_interval_restarts_running_timer() {
        let (mut engine, clock) = engine_with(OrderMode::Sequential, vec![]);
        engine.load_source(images(3));
        engine.play();
        clock.advance(Duration::from_secs(3));
        engine.set_interval(Duration::from_secs(1));
        assert_eq!(
            engine.next_deadline(),
            Some(clock.now() + Duration::from_secs(1))
        );

        engine.set_interval_secs(-1.0);
        engine.set_interval_secs(f64::NAN);
        assert_eq!(engine.interval(), Duration::from_secs(1));
    }

    #[test]
    fn alphabetical_order_sorts_by_title() {
        let (mut engine, _) = engine_with(OrderMode::Alphabetical, vec![]);
        engine.load_source(vec![
            image(1, "zebra"),
            image(2, "Apple"),
            image(3, "mango"),
        ]);
        engine.advance();
        engine.advance();
        assert_eq!(engine.sink().rendered_ids(), vec![2, 3, 1]);
    }

    #[test]
    fn switching_to_alphabetical_keeps_current_image() {
        let (mut engine, _) = engine_with(OrderMode::Sequential, vec![]);
        engine.load_source(vec![
            image(1, "zebra"),
            image(2, "Apple"),
            image(3, "mango"),
        ]);
        engine.set_order(OrderMode::Alphabetical);
        assert_eq!(engine.current_index(), Some(2));
        assert_eq!(engine.current_image().map(|i| i.id), Some(1));
        assert_eq!(engine.sink().rendered_ids(), vec![1], "no transition on switch");

        engine.advance();
        assert_eq!(engine.current_image().map(|i| i.id), Some(2));
    }

    #[test]
    fn switching_to_random_is_lazy() {
        let (mut engine, _) = engine_with(OrderMode::Sequential, vec![vec![0, 2, 1]]);
        engine.load_source(images(3));
        engine.set_order(OrderMode::Random);
        assert!(engine.randomized_order().is_empty());
        assert_eq!(engine.sink().rendered_ids(), vec![1]);

        engine.advance();
        assert_eq!(engine.randomized_order(), &[0, 2, 1]);
        assert_eq!(engine.current_index(), Some(2), "current image is not repeated");
    }

    #[test]
    fn simulate_show_follows_seeded_random_order() {
        let list = images(6);
        let settings = settings(OrderMode::Random, 2.0);
        let first = simulate_show(list.clone(), &settings, 12, Some(42));
        let second = simulate_show(list, &settings, 12, Some(42));
        assert_eq!(first.len(), 12);
        assert_eq!(first, second);

        let mut cycle: Vec<u64> = first[..6].iter().map(|i| i.id).collect();
        cycle.sort_unstable();
        assert_eq!(cycle, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn simulate_show_on_empty_library_is_empty() {
        let shown = simulate_show(Vec::new(), &SlideshowSettings::default(), 5, Some(1));
        assert!(shown.is_empty());
    }
}
