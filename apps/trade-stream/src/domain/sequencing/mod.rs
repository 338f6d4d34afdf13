//! Publish Sequencing
//!
//! Merges the replay source and the live source into one publish order.
//!
//! # Rules
//!
//! - Replayed items are published as soon as they arrive, oldest first.
//! - Live items that arrive before replay completes are held in a FIFO queue.
//! - The first live item after replay completes releases the whole queue,
//!   followed by that item.
//! - Once the queue is drained, live items are released one at a time.
//!
//! The resulting order is every replayed item, then every live item in
//! arrival order.

use std::collections::VecDeque;

/// Outcome of a replayed item reaching the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayDisposition {
    /// Replay is still active; publish.
    InOrder,
    /// Replay was already marked complete. Still published, but it indicates
    /// the replay source emitted after its terminator.
    Late,
}

/// Outcome of a live item reaching the sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveDisposition<T> {
    /// Held until replay completes.
    Queued {
        /// Items now waiting, including this one.
        pending: usize,
    },
    /// Ready to publish: `flushed` first (arrival order), then `current`.
    Release {
        /// Items queued during replay. Empty after the first release.
        flushed: Vec<T>,
        /// The item that triggered the release.
        current: T,
    },
}

/// Ordering state machine for the orchestrator.
#[derive(Debug)]
pub struct PublishSequencer<T> {
    replay_done: bool,
    pending: VecDeque<T>,
}

impl<T> PublishSequencer<T> {
    /// Sequencer that waits for replay before releasing live items.
    #[must_use]
    pub const fn awaiting_replay() -> Self {
        Self {
            replay_done: false,
            pending: VecDeque::new(),
        }
    }

    /// Sequencer with no replay phase; live items are released immediately.
    #[must_use]
    pub const fn live_only() -> Self {
        Self {
            replay_done: true,
            pending: VecDeque::new(),
        }
    }

    /// Whether replay has completed.
    #[must_use]
    pub const fn is_replay_done(&self) -> bool {
        self.replay_done
    }

    /// Number of live items waiting for replay to complete.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Classify a replayed item. Replayed items are always published.
    #[must_use]
    pub const fn on_replayed(&self) -> ReplayDisposition {
        if self.replay_done {
            ReplayDisposition::Late
        } else {
            ReplayDisposition::InOrder
        }
    }

    /// Mark replay complete.
    ///
    /// Returns `false` if replay was already complete.
    pub const fn on_replay_complete(&mut self) -> bool {
        let was_active = !self.replay_done;
        self.replay_done = true;
        was_active
    }

    /// Accept a live item.
    pub fn on_live(&mut self, item: T) -> LiveDisposition<T> {
        if !self.replay_done {
            self.pending.push_back(item);
            return LiveDisposition::Queued {
                pending: self.pending.len(),
            };
        }

        LiveDisposition::Release {
            flushed: self.pending.drain(..).collect(),
            current: item,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Input {
        Replay(u32),
        Done,
        Live(u32),
    }

    fn run(sequencer: &mut PublishSequencer<u32>, inputs: &[Input]) -> Vec<u32> {
        let mut published = Vec::new();
        for input in inputs {
            match *input {
                Input::Replay(n) => {
                    let _ = sequencer.on_replayed();
                    published.push(n);
                }
                Input::Done => {
                    sequencer.on_replay_complete();
                }
                Input::Live(n) => {
                    if let LiveDisposition::Release { flushed, current } = sequencer.on_live(n) {
                        published.extend(flushed);
                        published.push(current);
                    }
                }
            }
        }
        published
    }

    #[test]
    fn live_only_releases_immediately() {
        let mut sequencer = PublishSequencer::live_only();
        assert_eq!(
            sequencer.on_live(1),
            LiveDisposition::Release {
                flushed: vec![],
                current: 1
            }
        );
        assert_eq!(sequencer.pending_len(), 0);
    }

    #[test]
    fn live_during_replay_is_queued() {
        let mut sequencer = PublishSequencer::awaiting_replay();
        assert_eq!(sequencer.on_live(1), LiveDisposition::Queued { pending: 1 });
        assert_eq!(sequencer.on_live(2), LiveDisposition::Queued { pending: 2 });
        assert!(!sequencer.is_replay_done());
    }

    #[test]
    fn queue_flushes_on_first_live_after_replay() {
        let mut sequencer = PublishSequencer::awaiting_replay();
        let _ = sequencer.on_live(1);
        let _ = sequencer.on_live(2);
        assert!(sequencer.on_replay_complete());

        // Terminator alone does not flush.
        assert_eq!(sequencer.pending_len(), 2);

        assert_eq!(
            sequencer.on_live(3),
            LiveDisposition::Release {
                flushed: vec![1, 2],
                current: 3
            }
        );
        assert_eq!(
            sequencer.on_live(4),
            LiveDisposition::Release {
                flushed: vec![],
                current: 4
            }
        );
    }

    #[test]
    fn replay_after_done_is_late() {
        let mut sequencer = PublishSequencer::<u32>::awaiting_replay();
        assert_eq!(sequencer.on_replayed(), ReplayDisposition::InOrder);
        sequencer.on_replay_complete();
        assert_eq!(sequencer.on_replayed(), ReplayDisposition::Late);
    }

    #[test]
    fn second_completion_is_reported() {
        let mut sequencer = PublishSequencer::<u32>::awaiting_replay();
        assert!(sequencer.on_replay_complete());
        assert!(!sequencer.on_replay_complete());
    }

    #[test]
    fn three_cached_two_live_during_replay() {
        let mut sequencer = PublishSequencer::awaiting_replay();
        let inputs = [
            Input::Replay(1),
            Input::Live(101),
            Input::Replay(2),
            Input::Live(102),
            Input::Replay(3),
            Input::Done,
            Input::Live(103),
            Input::Live(104),
        ];
        assert_eq!(run(&mut sequencer, &inputs), vec![1, 2, 3, 101, 102, 103, 104]);
    }

    /// Interleave a replay sequence (ending in Done) with a live sequence,
    /// preserving the order within each.
    fn interleavings() -> impl Strategy<Value = (Vec<u32>, Vec<u32>, Vec<Input>)> {
        (0u32..20, 1u32..20)
            .prop_flat_map(|(replayed, live)| {
                let total = replayed as usize + 1 + live as usize;
                (
                    Just(replayed),
                    Just(live),
                    proptest::collection::vec(any::<bool>(), total),
                )
            })
            .prop_map(|(replayed, live, picks)| {
                let mut replay_src: VecDeque<Input> = (0..replayed).map(Input::Replay).collect();
                replay_src.push_back(Input::Done);
                let mut live_src: VecDeque<Input> =
                    (0..live).map(|n| Input::Live(1000 + n)).collect();

                let mut inputs = Vec::new();
                for pick_replay in picks {
                    let next = if pick_replay {
                        replay_src.pop_front().or_else(|| live_src.pop_front())
                    } else {
                        live_src.pop_front().or_else(|| replay_src.pop_front())
                    };
                    inputs.extend(next);
                }
                // The final live item must arrive after Done to flush the queue.
                let last_live = Input::Live(1000 + live);
                inputs.push(last_live);

                let replay_ids: Vec<u32> = (0..replayed).collect();
                let live_ids: Vec<u32> = (0..=live).map(|n| 1000 + n).collect();
                (replay_ids, live_ids, inputs)
            })
    }

    proptest! {
        #[test]
        fn replayed_strictly_before_live((replay_ids, live_ids, inputs) in interleavings()) {
            let mut sequencer = PublishSequencer::awaiting_replay();
            let published = run(&mut sequencer, &inputs);

            let mut expected = replay_ids;
            expected.extend(live_ids);
            prop_assert_eq!(published, expected);
            prop_assert_eq!(sequencer.pending_len(), 0);
        }
    }
}
