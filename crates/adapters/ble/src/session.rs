//! Radio session state machine.
//!
//! [`SessionState::apply`] is the only way the session changes. It is
//! synchronous and performs no IO: it returns the [`Effect`]s the driver must
//! carry out. Once the shutdown flag is set every later event is ignored.

use hearthlink_domain::id::BleAddress;

use crate::error::WirelessError;
use crate::radio::RadioState;

/// Coarse phase derived from the session flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No power state reported yet.
    Unknown,
    /// The radio reported a state other than powered on.
    PoweringOn,
    Ready,
    Scanning,
    Connecting,
    Connected,
    /// Absorbing: the driver accepts no further operations.
    ShuttingDown,
}

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Power(RadioState),
    ScanStarted,
    /// Discovery was stopped on request; drops any pending resume.
    ScanStopped,
    /// A connection attempt to a peripheral begins.
    ConnectStarted,
    Connected(BleAddress),
    /// The connection attempt ended, successfully or not.
    ConnectionClosed,
    /// The deferred scan resume is about to run.
    ScanResuming,
    Shutdown,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Stop the running scan before connecting.
    StopScan,
    /// Restart the scan that was paused for a connection.
    ResumeScan,
    /// Drop the registered discovery callback.
    ClearCallback,
}

/// Flags describing the single radio session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    power: Option<RadioState>,
    scanning: bool,
    connecting: bool,
    connected: Option<BleAddress>,
    resume_scan: bool,
    shutdown: bool,
}

impl SessionState {
    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.shutdown {
            return Phase::ShuttingDown;
        }
        match self.power {
            None | Some(RadioState::Unknown) => Phase::Unknown,
            Some(RadioState::PoweredOff) => Phase::PoweringOn,
            Some(RadioState::PoweredOn) => {
                if self.connected.is_some() {
                    Phase::Connected
                } else if self.connecting {
                    Phase::Connecting
                } else if self.scanning {
                    Phase::Scanning
                } else {
                    Phase::Ready
                }
            }
        }
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown
    }

    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    #[must_use]
    pub fn is_connecting(&self) -> bool {
        self.connecting || self.connected.is_some()
    }

    #[must_use]
    pub fn wants_resume(&self) -> bool {
        self.resume_scan
    }

    /// Check the session can take a control write.
    ///
    /// # Errors
    ///
    /// Returns [`WirelessError::AdapterUnavailable`] unless the radio is
    /// ready or scanning, and [`WirelessError::Busy`] while another
    /// connection is open.
    pub fn check_writable(&self) -> Result<(), WirelessError> {
        match self.phase() {
            Phase::Ready | Phase::Scanning => Ok(()),
            Phase::Connecting | Phase::Connected => Err(WirelessError::Busy),
            Phase::Unknown | Phase::PoweringOn | Phase::ShuttingDown => {
                Err(WirelessError::AdapterUnavailable)
            }
        }
    }

    /// Apply `event`, returning the effects the driver must perform.
    pub fn apply(&mut self, event: SessionEvent) -> Vec<Effect> {
        if self.shutdown {
            return Vec::new();
        }

        match event {
            SessionEvent::Power(RadioState::PoweredOn) => {
                self.power = Some(RadioState::PoweredOn);
                Vec::new()
            }
            SessionEvent::Power(state) => {
                self.power = Some(state);
                let busy = self.scanning || self.connecting || self.connected.is_some();
                self.scanning = false;
                self.connecting = false;
                self.connected = None;
                self.resume_scan = false;
                if busy { vec![Effect::ClearCallback] } else { Vec::new() }
            }
            SessionEvent::ScanStarted => {
                self.scanning = true;
                Vec::new()
            }
            SessionEvent::ScanStopped => {
                self.scanning = false;
                self.resume_scan = false;
                Vec::new()
            }
            SessionEvent::ConnectStarted => {
                self.connecting = true;
                if self.scanning {
                    self.scanning = false;
                    self.resume_scan = true;
                    vec![Effect::StopScan]
                } else {
                    Vec::new()
                }
            }
            SessionEvent::Connected(address) => {
                if self.connecting {
                    self.connecting = false;
                    self.connected = Some(address);
                }
                Vec::new()
            }
            SessionEvent::ConnectionClosed => {
                self.connecting = false;
                self.connected = None;
                if self.resume_scan { vec![Effect::ResumeScan] } else { Vec::new() }
            }
            SessionEvent::ScanResuming => {
                self.resume_scan = false;
                Vec::new()
            }
            SessionEvent::Shutdown => {
                *self = Self {
                    shutdown: true,
                    ..Self::default()
                };
                vec![Effect::ClearCallback]
            }
        }
    }
}
