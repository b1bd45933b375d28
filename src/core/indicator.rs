//! Indicator Lifecycle Manager - the "thinking" placeholder
//!
//! State machine `Absent -> Visible -> Absent`. While visible, a background
//! task emits [`ClientEvent::IndicatorTick`] at a fixed interval and each tick
//! cycles the trailing dots. The manager owns that timer: every path that
//! takes the placeholder away (`hide`, `force_teardown`, or a tick that finds
//! the placeholder already gone) cancels it, and the handle is taken on
//! cancellation so it can only be cancelled once.

use tokio::task::JoinHandle;

use super::events::{ClientEvent, EventSender};
use super::transcript::{EntryRef, Transcript};
use crate::config::IndicatorConfig;

#[derive(Debug)]
struct Visible {
    entry: EntryRef,
    generation: u64,
    dots: u8,
    timer: Option<JoinHandle<()>>,
}

#[derive(Debug)]
pub struct ThinkingIndicator {
    config: IndicatorConfig,
    visible: Option<Visible>,
    generation: u64,
    cancellations: u64,
}

impl ThinkingIndicator {
    pub fn new(config: IndicatorConfig) -> Self {
        Self {
            config,
            visible: None,
            generation: 0,
            cancellations: 0,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible.is_some()
    }

    /// Entry of the placeholder while visible
    pub fn placeholder(&self) -> Option<EntryRef> {
        self.visible.as_ref().map(|v| v.entry)
    }

    /// Whether the animation task is still scheduled
    pub fn timer_active(&self) -> bool {
        self.visible
            .as_ref()
            .and_then(|v| v.timer.as_ref())
            .is_some_and(|t| !t.is_finished())
    }

    /// Total number of timer cancellations so far
    pub fn timer_cancellations(&self) -> u64 {
        self.cancellations
    }

    fn frame(&self, dots: u8) -> String {
        format!("{}{}", self.config.label, ".".repeat(dots as usize))
    }

    /// Insert the placeholder and start animating it
    ///
    /// No-op (returns `false`) when already visible.
    pub fn show(&mut self, transcript: &mut Transcript, events: &EventSender) -> bool {
        if self.visible.is_some() {
            return false;
        }

        self.generation += 1;
        let generation = self.generation;
        let entry = transcript.append_placeholder(self.frame(0));

        let period = self.config.interval();
        let tx = events.clone();
        let timer = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(ClientEvent::IndicatorTick { generation }).is_err() {
                    break;
                }
            }
        });

        tracing::debug!("Thinking indicator shown (generation {})", generation);
        self.visible = Some(Visible {
            entry,
            generation,
            dots: 0,
            timer: Some(timer),
        });
        true
    }

    /// Remove the placeholder if present; idempotent
    ///
    /// Returns whether a placeholder was taken down.
    pub fn hide(&mut self, transcript: &mut Transcript) -> bool {
        match self.visible.take() {
            Some(mut visible) => {
                transcript.remove(visible.entry);
                self.cancel_timer(&mut visible);
                true
            }
            None => false,
        }
    }

    /// Tear down ahead of a bulk transcript clear
    ///
    /// Must be called before wiping the transcript so the timer never
    /// outlives the placeholder.
    pub fn force_teardown(&mut self, transcript: &mut Transcript) {
        if self.hide(transcript) {
            tracing::debug!("Thinking indicator torn down for bulk clear");
        }
    }

    /// Advance the animation by one frame
    pub fn on_tick(&mut self, generation: u64, transcript: &mut Transcript) {
        let Some(visible) = self.visible.as_mut() else {
            return;
        };
        if visible.generation != generation {
            // Stale tick from an earlier placeholder
            return;
        }

        if !transcript.contains(visible.entry) {
            tracing::debug!("Placeholder vanished without teardown; stopping animation");
            if let Some(mut visible) = self.visible.take() {
                self.cancel_timer(&mut visible);
            }
            return;
        }

        let cycle = u16::from(self.config.max_dots) + 1;
        visible.dots = ((u16::from(visible.dots) + 1) % cycle) as u8;
        let (entry, dots) = (visible.entry, visible.dots);
        let text = self.frame(dots);
        transcript.set_placeholder_text(entry, text);
    }

    fn cancel_timer(&mut self, visible: &mut Visible) {
        if let Some(timer) = visible.timer.take() {
            timer.abort();
            self.cancellations += 1;
        }
    }
}

impl Drop for ThinkingIndicator {
    fn drop(&mut self) {
        if let Some(timer) = self.visible.as_mut().and_then(|v| v.timer.take()) {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transcript::Role;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn fast_config() -> IndicatorConfig {
        IndicatorConfig {
            interval_ms: 5,
            ..IndicatorConfig::default()
        }
    }

    #[tokio::test]
    async fn show_is_singleton() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut transcript = Transcript::new();
        let mut indicator = ThinkingIndicator::new(fast_config());

        assert!(indicator.show(&mut transcript, &tx));
        assert!(!indicator.show(&mut transcript, &tx));
        assert_eq!(transcript.placeholder_count(), 1);
        assert_eq!(transcript.last().unwrap().text(), "I am thinking");
    }

    #[tokio::test]
    async fn hide_is_idempotent_and_cancels_once() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut transcript = Transcript::new();
        let mut indicator = ThinkingIndicator::new(fast_config());

        indicator.show(&mut transcript, &tx);
        assert!(indicator.timer_active());
        assert!(indicator.hide(&mut transcript));
        assert!(!indicator.hide(&mut transcript));

        assert_eq!(transcript.placeholder_count(), 0);
        assert_eq!(indicator.timer_cancellations(), 1);
        assert!(!indicator.timer_active());
    }

    #[tokio::test]
    async fn teardown_before_clear_cancels_once() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut transcript = Transcript::new();
        let mut indicator = ThinkingIndicator::new(fast_config());

        transcript.append(Role::User, "q");
        indicator.show(&mut transcript, &tx);
        indicator.force_teardown(&mut transcript);
        transcript.clear();
        indicator.force_teardown(&mut transcript);

        assert!(!indicator.is_visible());
        assert_eq!(indicator.timer_cancellations(), 1);
    }

    #[tokio::test]
    async fn ticks_cycle_dots() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transcript = Transcript::new();
        let mut indicator = ThinkingIndicator::new(fast_config());
        indicator.show(&mut transcript, &tx);

        let mut frames = Vec::new();
        for _ in 0..5 {
            let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            let ClientEvent::IndicatorTick { generation } = event else {
                panic!("unexpected event {:?}", event);
            };
            indicator.on_tick(generation, &mut transcript);
            frames.push(transcript.last().unwrap().text().to_string());
        }

        assert_eq!(
            frames,
            vec![
                "I am thinking.",
                "I am thinking..",
                "I am thinking...",
                "I am thinking",
                "I am thinking.",
            ]
        );
    }

    #[tokio::test]
    async fn tick_after_external_removal_stops_timer() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut transcript = Transcript::new();
        let mut indicator = ThinkingIndicator::new(fast_config());
        indicator.show(&mut transcript, &tx);

        // Wiped without going through the indicator
        transcript.clear();
        indicator.on_tick(1, &mut transcript);
        indicator.on_tick(1, &mut transcript);

        assert!(!indicator.is_visible());
        assert_eq!(indicator.timer_cancellations(), 1);
        assert!(transcript.is_empty());
    }

    #[tokio::test]
    async fn stale_generation_ticks_are_ignored() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut transcript = Transcript::new();
        let mut indicator = ThinkingIndicator::new(fast_config());

        indicator.show(&mut transcript, &tx);
        indicator.hide(&mut transcript);
        indicator.show(&mut transcript, &tx);
        transcript.drain_changes();

        indicator.on_tick(1, &mut transcript);
        assert!(transcript.drain_changes().is_empty());
        assert_eq!(transcript.last().unwrap().text(), "I am thinking");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Show,
            Hide,
            TeardownAndClear,
            ExternalClear,
            Tick,
            AppendUser,
        }

        fn arb_op() -> impl Strategy<Value = Op> {
            prop_oneof![
                Just(Op::Show),
                Just(Op::Hide),
                Just(Op::TeardownAndClear),
                Just(Op::ExternalClear),
                Just(Op::Tick),
                Just(Op::AppendUser),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            /// Whatever removes the placeholder, there is never more than one
            /// and every shown timer is cancelled exactly once.
            #[test]
            fn prop_single_placeholder_and_single_cancellation(
                ops in prop::collection::vec(arb_op(), 0..40)
            ) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .unwrap();
                rt.block_on(async {
                    let (tx, _rx) = mpsc::unbounded_channel();
                    let mut transcript = Transcript::new();
                    let mut indicator = ThinkingIndicator::new(IndicatorConfig {
                        interval_ms: 60_000,
                        ..IndicatorConfig::default()
                    });
                    let mut shown = 0u64;

                    for op in ops {
                        match op {
                            Op::Show => {
                                if indicator.show(&mut transcript, &tx) {
                                    shown += 1;
                                }
                            }
                            Op::Hide => {
                                indicator.hide(&mut transcript);
                            }
                            Op::TeardownAndClear => {
                                indicator.force_teardown(&mut transcript);
                                transcript.clear();
                            }
                            Op::ExternalClear => transcript.clear(),
                            Op::Tick => {
                                let generation = indicator.generation;
                                indicator.on_tick(generation, &mut transcript);
                            }
                            Op::AppendUser => {
                                transcript.append(Role::User, "q");
                            }
                        }
                        prop_assert!(transcript.placeholder_count() <= 1);
                        prop_assert!(indicator.timer_cancellations() <= shown);
                    }

                    indicator.force_teardown(&mut transcript);
                    prop_assert_eq!(transcript.placeholder_count(), 0);
                    prop_assert_eq!(indicator.timer_cancellations(), shown);
                    Ok(())
                })?;
            }
        }
    }
}
