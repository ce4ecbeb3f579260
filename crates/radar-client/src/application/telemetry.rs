//! Telemetry use case: turn simulator samples into position updates.
//!
//! The simulator side of OpenRadar produces a [`PlaneTelemetry`] record
//! whenever it observes new aircraft state.  [`PositionReporter`] converts
//! each record into a wire-level [`PositionUpdate`] and hands it to an
//! [`OutboundPublisher`] (in production the TLS client driver).
//!
//! The real simulator bridge is not part of this crate; [`SyntheticFlight`]
//! stands in for it by flying a constant track and speed.

use std::sync::Arc;
use std::time::Duration;

use radar_core::{CallSign, LatLng, LinkError, PositionUpdate, ProtocolError, Squawk};
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ── Telemetry record ──────────────────────────────────────────────────────────

/// One observation of the user's aircraft, as the simulator reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneTelemetry {
    pub flight_number: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_ft: f64,
    /// Active COM1 frequency in kHz.
    pub com_frequency_khz: i32,
    /// Raw transponder register; only the low 16 bits carry the code.
    pub transponder: i32,
    pub ground_track_deg: f64,
    pub ground_speed_kt: f64,
}

impl PlaneTelemetry {
    /// Builds the wire packet for this sample.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::MalformedPayload`] if the flight number is not a valid
    /// call sign (longer than 8 bytes, non-ASCII or containing NUL).
    pub fn to_position_update(&self) -> Result<PositionUpdate, ProtocolError> {
        Ok(PositionUpdate {
            call_sign: CallSign::new(&self.flight_number)?,
            squawk: Squawk::from_register(self.transponder),
            frequency_khz: self.com_frequency_khz,
            coords: LatLng::new(self.latitude, self.longitude),
            altitude_ft: self.altitude_ft,
            ground_speed_kt: self.ground_speed_kt,
            ground_track_deg: self.ground_track_deg,
        })
    }
}

// ── Ports ─────────────────────────────────────────────────────────────────────

/// Produces successive telemetry samples.
pub trait TelemetrySource: Send {
    /// Returns the aircraft state `elapsed` after the previous sample.
    fn next_sample(&mut self, elapsed: Duration) -> PlaneTelemetry;
}

/// Accepts position updates for delivery to the radar.
#[cfg_attr(test, mockall::automock)]
pub trait OutboundPublisher: Send + Sync {
    /// Queues `update` for sending.  Must not block.
    ///
    /// # Errors
    ///
    /// [`LinkError::Closed`] when there is no open connection.
    fn publish(&self, update: PositionUpdate) -> Result<(), LinkError>;
}

// ── Synthetic flight ──────────────────────────────────────────────────────────

/// Dead-reckoned aircraft flying a constant track, speed and altitude.
#[derive(Debug, Clone)]
pub struct SyntheticFlight {
    state: PlaneTelemetry,
}

impl SyntheticFlight {
    pub fn new(initial: PlaneTelemetry) -> Self {
        Self { state: initial }
    }

    pub fn current(&self) -> &PlaneTelemetry {
        &self.state
    }
}

impl TelemetrySource for SyntheticFlight {
    fn next_sample(&mut self, elapsed: Duration) -> PlaneTelemetry {
        let distance_nm = self.state.ground_speed_kt * elapsed.as_secs_f64() / 3600.0;
        if distance_nm > 0.0 {
            let next = LatLng::new(self.state.latitude, self.state.longitude)
                .destination(self.state.ground_track_deg, distance_nm);
            self.state.latitude = next.latitude;
            self.state.longitude = next.longitude;
        }
        self.state.clone()
    }
}

// ── PositionReporter ──────────────────────────────────────────────────────────

/// Why a telemetry sample was not published.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("telemetry cannot be encoded: {0}")]
    Invalid(#[from] ProtocolError),

    #[error("link unavailable: {0}")]
    Link(#[from] LinkError),
}

/// Feeds telemetry samples to an [`OutboundPublisher`].
pub struct PositionReporter<P: ?Sized> {
    publisher: Arc<P>,
}

impl<P: OutboundPublisher + ?Sized> PositionReporter<P> {
    pub fn new(publisher: Arc<P>) -> Self {
        Self { publisher }
    }

    /// Converts and publishes one sample.
    ///
    /// # Errors
    ///
    /// [`ReportError::Invalid`] if the sample cannot be encoded,
    /// [`ReportError::Link`] if the publisher refused it.
    pub fn report(&self, telemetry: &PlaneTelemetry) -> Result<(), ReportError> {
        let update = telemetry.to_position_update()?;
        self.publisher.publish(update)?;
        debug!(call_sign = %update.call_sign, squawk = %update.squawk, "position update queued");
        Ok(())
    }

    /// Samples `source` every `period` and reports each sample until `cancel`
    /// fires or the publisher reports the link closed.
    ///
    /// Samples that cannot be encoded are logged and skipped.
    pub async fn run<S: TelemetrySource>(&self, source: &mut S, period: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; report the initial position.
        let mut elapsed = Duration::ZERO;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let sample = source.next_sample(elapsed);
            elapsed = period;
            match self.report(&sample) {
                Ok(()) => {}
                Err(ReportError::Invalid(e)) => warn!("skipping telemetry sample: {e}"),
                Err(ReportError::Link(e)) => {
                    info!("stopping position reports: {e}");
                    break;
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::function;

    fn telemetry() -> PlaneTelemetry {
        PlaneTelemetry {
            flight_number: "UAL1549".into(),
            latitude: 40.7769,
            longitude: -73.8740,
            altitude_ft: 2_800.0,
            com_frequency_khz: 120_400,
            transponder: 0x2712,
            ground_track_deg: 0.0,
            ground_speed_kt: 600.0,
        }
    }

    #[test]
    fn test_to_position_update_masks_transponder_to_sixteen_bits() {
        // Arrange
        let mut t = telemetry();
        t.transponder = 0x0001_7500;

        // Act
        let update = t.to_position_update().unwrap();

        // Assert
        assert_eq!(update.squawk, Squawk::UNLAWFUL_INTERFERENCE);
        assert_eq!(update.call_sign.as_str(), "UAL1549");
        assert_eq!(update.frequency_khz, 120_400);
        assert_eq!(update.coords, LatLng::new(40.7769, -73.8740));
    }

    #[test]
    fn test_to_position_update_rejects_long_flight_number() {
        let mut t = telemetry();
        t.flight_number = "TOOLONGCS".into();

        assert!(matches!(t.to_position_update(), Err(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn test_synthetic_flight_advances_along_track() {
        // Arrange: 600 kt due north for 6 minutes is 60 nm, about one degree
        let mut flight = SyntheticFlight::new(telemetry());

        // Act
        let sample = flight.next_sample(Duration::from_secs(360));

        // Assert
        assert!((sample.latitude - 41.7763).abs() < 0.01, "got {}", sample.latitude);
        assert!((sample.longitude - -73.8740).abs() < 1e-9);
        assert_eq!(flight.current(), &sample);
    }

    #[test]
    fn test_synthetic_flight_zero_elapsed_keeps_position() {
        let mut flight = SyntheticFlight::new(telemetry());
        let sample = flight.next_sample(Duration::ZERO);
        assert_eq!(sample, telemetry());
    }

    #[test]
    fn test_report_publishes_converted_update() {
        // Arrange
        let mut publisher = MockOutboundPublisher::new();
        publisher
            .expect_publish()
            .with(function(|u: &PositionUpdate| u.call_sign.as_str() == "UAL1549" && u.squawk == Squawk(0x2712)))
            .times(1)
            .returning(|_| Ok(()));
        let reporter = PositionReporter::new(Arc::new(publisher));

        // Act / Assert
        reporter.report(&telemetry()).unwrap();
    }

    #[test]
    fn test_report_invalid_sample_never_reaches_publisher() {
        let mut publisher = MockOutboundPublisher::new();
        publisher.expect_publish().times(0);
        let reporter = PositionReporter::new(Arc::new(publisher));
        let mut t = telemetry();
        t.flight_number = "BAD\0".into();

        assert!(matches!(reporter.report(&t), Err(ReportError::Invalid(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_link_closes() {
        // Arrange: the third publish finds the link closed
        let mut publisher = MockOutboundPublisher::new();
        let mut calls = 0;
        publisher.expect_publish().times(3).returning(move |_| {
            calls += 1;
            if calls < 3 {
                Ok(())
            } else {
                Err(LinkError::Closed)
            }
        });
        let reporter = PositionReporter::new(Arc::new(publisher));
        let mut flight = SyntheticFlight::new(telemetry());

        // Act
        reporter
            .run(&mut flight, Duration::from_millis(100), CancellationToken::new())
            .await;

        // Assert: every sample after the first moved the aircraft north
        assert!(flight.current().latitude > telemetry().latitude);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_on_cancel() {
        let mut publisher = MockOutboundPublisher::new();
        publisher.expect_publish().returning(|_| Ok(()));
        let reporter = PositionReporter::new(Arc::new(publisher));
        let cancel = CancellationToken::new();
        cancel.cancel();

        reporter
            .run(&mut SyntheticFlight::new(telemetry()), Duration::from_secs(1), cancel)
            .await;
    }
}
