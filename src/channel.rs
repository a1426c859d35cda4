/// Channel walker for the all-networks sweep.
///
/// Advances one channel per tick and wraps from [`CHANNEL_MAX`] back to
/// [`CHANNEL_MIN`]. The caller drives the cadence (one tick per
/// `hop_interval_ms`) and gets control back after every tick, so the main
/// loop can service its own deadlines between hops.
use embedded_hal::delay::DelayNs;

use crate::defaults::{CHANNEL_MAX, CHANNEL_MIN};
use crate::error::RadioFault;
use crate::radio::{Radio, RadioController};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelWalker {
    current: u8,
}

/// Channel that follows `channel` in the sweep order.
pub const fn next_channel(channel: u8) -> u8 {
    if channel >= CHANNEL_MAX || channel < CHANNEL_MIN {
        CHANNEL_MIN
    } else {
        channel + 1
    }
}

impl ChannelWalker {
    pub const fn new() -> Self {
        Self {
            current: CHANNEL_MIN,
        }
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    /// Rewind to the first channel without touching the radio.
    pub fn reset(&mut self) {
        self.current = CHANNEL_MIN;
    }

    /// Advance one channel and apply it. Only the channel is touched; mode
    /// and capture registration stay as they are. On a refused tune the
    /// walker keeps its previous position.
    pub fn tick<R: Radio, D: DelayNs>(
        &mut self,
        radio: &mut RadioController<R, D>,
    ) -> Result<u8, RadioFault> {
        let next = next_channel(self.current);
        radio.set_channel(next)?;
        self.current = next;
        Ok(next)
    }
}

impl Default for ChannelWalker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RadioOp;
    use crate::radio::RadioMode;
    use crate::testing::{MockDelay, MockRadio, RadioCall};

    fn monitor() -> RadioController<MockRadio, MockDelay> {
        let mut ctl = RadioController::new(MockRadio::new(), MockDelay::default(), 0);
        ctl.enter_monitor().unwrap();
        ctl.radio_mut().calls.clear();
        ctl
    }

    #[test]
    fn next_channel_wraps() {
        assert_eq!(next_channel(1), 2);
        assert_eq!(next_channel(12), 13);
        assert_eq!(next_channel(13), 1);
        assert_eq!(next_channel(0), 1);
        assert_eq!(next_channel(14), 1);
    }

    #[test]
    fn twelve_ticks_reach_channel_13() {
        let mut radio = monitor();
        let mut walker = ChannelWalker::new();
        for _ in 0..12 {
            walker.tick(&mut radio).unwrap();
        }
        assert_eq!(walker.current(), 13);
        assert_eq!(radio.channel(), 13);
    }

    #[test]
    fn thirteen_ticks_return_to_channel_1() {
        let mut radio = monitor();
        let mut walker = ChannelWalker::new();
        let mut last = 0;
        for _ in 0..13 {
            last = walker.tick(&mut radio).unwrap();
        }
        assert_eq!(last, 1);
        assert_eq!(walker.current(), 1);
    }

    #[test]
    fn tick_only_touches_channel() {
        let mut radio = monitor();
        let mut walker = ChannelWalker::new();
        walker.tick(&mut radio).unwrap();
        walker.tick(&mut radio).unwrap();
        assert_eq!(
            radio.radio().calls,
            vec![RadioCall::SetChannel(2), RadioCall::SetChannel(3)]
        );
        assert_eq!(radio.mode(), Some(RadioMode::Monitor));
    }

    #[test]
    fn refused_tune_keeps_position() {
        let mut radio = monitor();
        let mut walker = ChannelWalker::new();
        radio.radio_mut().fail_on = Some(RadioOp::SetChannel(2));
        assert!(walker.tick(&mut radio).is_err());
        assert_eq!(walker.current(), 1);
    }

    #[test]
    fn reset_rewinds() {
        let mut radio = monitor();
        let mut walker = ChannelWalker::new();
        walker.tick(&mut radio).unwrap();
        walker.reset();
        assert_eq!(walker.current(), 1);
    }
}
