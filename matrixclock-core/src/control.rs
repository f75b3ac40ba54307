//! Main control loop
//!
//! One call to [`Devices::run_once`] is one housekeeping pass: uptime,
//! link state, OTA and HTTP, orientation, NTP and the clock face, the
//! button, restart policy and finally the adaptive sleep that holds the
//! loop near its time budget. All state shared with the web handlers
//! lives in [`ClockContext`]; all hardware sits behind the trait seams
//! in [`Devices`].

use matrixclock_display::{DisplayError, MatrixPanel, Orientation, Renderer, ScrollText};
use matrixclock_protocol::ntp::{build_request, parse_response};
use matrixclock_protocol::NtpError;

use crate::config::ClockConfig;
use crate::net::{ConnectivityMonitor, CredentialError, LinkTransition};
use crate::ota::{self, OtaError};
use crate::sensor::OrientationSensor;
use crate::time::{ClockState, DateTime, IntervalTimer, UptimeCounter, SYNC_FAILED};
use crate::traits::{
    AngleSensor, ButtonInput, CredentialStore, NetworkLink, NtpTransport, OtaPort, RestartReason, SensorError,
    SystemControl, Timebase, WebPort,
};
use crate::web;

/// Text scrolled when the button is pressed
pub const BUTTON_MESSAGE: &str = "Let go of me!";

/// Frame period of the button marquee
pub const SCROLL_FRAME_MS: u32 = 30;

/// Pause around the credential wipe
pub const WIPE_DELAY_MS: u32 = 200;

/// Exponentially weighted loop utilisation in percent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadAverage {
    value: u32,
}

impl LoadAverage {
    pub const fn new() -> Self {
        Self { value: 0 }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Fold in one pass that was busy for `active_ms` of a `budget_ms` budget
    pub fn update(&mut self, active_ms: u32, budget_ms: u32) {
        let budget = budget_ms.max(1);
        let loops_per_second = (1000 / budget).max(1);
        let ratio = active_ms.max(1).saturating_mul(100) / budget;
        self.value = self.value - self.value / loops_per_second + ratio / loops_per_second;
    }
}

/// Loop state shared with the web handlers
#[derive(Debug, Clone)]
pub struct ClockContext {
    pub config: ClockConfig,
    pub clock: ClockState,
    pub connectivity: ConnectivityMonitor,
    pub uptime: UptimeCounter,
    pub load: LoadAverage,
    /// Set by a handler; acted on at the end of the pass
    pub restart: Option<RestartReason>,
    /// Credential wipe requested through `/resetWifi`
    pub wipe_credentials: bool,
    pub orientation_timer: IntervalTimer,
}

impl ClockContext {
    pub fn new(config: ClockConfig) -> Self {
        Self {
            clock: ClockState::new(config.sync_interval_s),
            orientation_timer: IntervalTimer::new(config.orientation_poll_ms),
            connectivity: ConnectivityMonitor::new(),
            uptime: UptimeCounter::new(),
            load: LoadAverage::new(),
            restart: None,
            wipe_credentials: false,
            config,
        }
    }
}

/// What happened during one pass, for the caller to log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationReport {
    pub uptime_ticked: bool,
    pub link: Option<LinkTransition>,
    pub web_served: bool,
    pub ota: Option<Result<(), OtaError>>,
    pub orientation: Option<Orientation>,
    /// Local epoch seconds from a sync attempt made this pass
    pub sync: Option<Result<i64, NtpError>>,
    pub redrawn: Option<DateTime>,
    pub scrolled: bool,
    pub restart: Option<RestartReason>,
    pub active_ms: u32,
    pub slept_ms: u32,
    pub display_error: Option<DisplayError>,
    pub sensor_error: Option<SensorError>,
    pub credential_error: Option<CredentialError>,
}

impl IterationReport {
    fn display(&mut self, result: Result<(), DisplayError>) {
        if let Err(e) = result {
            self.display_error = Some(e);
        }
    }
}

/// Every collaborator the loop drives
pub struct Devices<T, P, S, B, L, N, W, O, C, Y> {
    pub timebase: T,
    pub renderer: Renderer<P>,
    pub sensor: OrientationSensor<S>,
    pub button: B,
    pub link: L,
    pub ntp: N,
    pub web: W,
    pub ota: O,
    pub credentials: C,
    pub system: Y,
}

impl<T, P, S, B, L, N, W, O, C, Y> Devices<T, P, S, B, L, N, W, O, C, Y>
where
    T: Timebase,
    P: MatrixPanel,
    S: AngleSensor,
    B: ButtonInput,
    L: NetworkLink,
    N: NtpTransport,
    W: WebPort,
    O: OtaPort,
    C: CredentialStore,
    Y: SystemControl,
{
    /// Bring the display up after the network is joined
    ///
    /// Applies the configured brightness, takes the settled boot-time
    /// orientation reading and shows "Ready".
    pub async fn start(&mut self, ctx: &ClockContext) -> Result<Orientation, DisplayError> {
        self.renderer.set_intensity(ctx.config.intensity)?;
        let angle = self.sensor.sample(&mut self.timebase, true).await.unwrap_or(0.0);
        let orientation = self.renderer.set_orientation(angle);
        self.renderer.show_message("Ready")?;
        Ok(orientation)
    }

    /// Run passes until a restart is issued
    pub async fn run<F>(&mut self, ctx: &mut ClockContext, mut on_report: F) -> RestartReason
    where
        F: FnMut(&IterationReport),
    {
        loop {
            let report = self.run_once(ctx).await;
            on_report(&report);
            if let Some(reason) = report.restart {
                return reason;
            }
        }
    }

    /// One housekeeping pass
    pub async fn run_once(&mut self, ctx: &mut ClockContext) -> IterationReport {
        let mut report = IterationReport::default();
        let start_ms = self.timebase.now_ms();

        report.uptime_ticked = ctx.uptime.tick(start_ms);

        report.link = ctx
            .connectivity
            .update(self.link.is_connected(), ctx.uptime.seconds());

        if ctx.connectivity.is_connected() {
            self.service_network(ctx, &mut report).await;
            if report.restart.is_some() {
                return report;
            }
        }

        if ctx.orientation_timer.poll(self.timebase.now_ms()) {
            match self.sensor.sample(&mut self.timebase, false).await {
                Ok(angle) => report.orientation = Some(self.renderer.set_orientation(angle)),
                Err(e) => report.sensor_error = Some(e),
            }
        }

        self.update_clock(ctx, &mut report).await;

        if self.button.pressed(self.timebase.now_ms()) {
            let result = self.scroll(BUTTON_MESSAGE, SCROLL_FRAME_MS).await;
            report.display(result);
            report.scrolled = true;
        }

        let restart = ctx.restart.or_else(|| {
            ctx.connectivity
                .downtime_exceeded(ctx.uptime.seconds(), ctx.config.downtime_limit_s)
                .then_some(RestartReason::DowntimeExceeded)
        });
        if let Some(reason) = restart {
            report.restart = Some(reason);
            self.system.restart(reason);
            return report;
        }

        let active_ms = self.timebase.now_ms().saturating_sub(start_ms);
        report.active_ms = u32::try_from(active_ms).unwrap_or(u32::MAX);
        report.slept_ms = adaptive_sleep(
            &mut self.timebase,
            report.active_ms,
            ctx.config.loop_budget_ms,
            ctx.connectivity.is_connected(),
        )
        .await;
        ctx.load.update(report.active_ms, ctx.config.loop_budget_ms);

        report
    }

    /// Show a marquee, one frame every `frame_ms`; blocks for its full length
    pub async fn scroll(&mut self, text: &str, frame_ms: u32) -> Result<(), DisplayError> {
        let scroll = ScrollText::new(text);
        for i in 0..scroll.frame_count() {
            self.renderer.show_scroll_frame(&scroll, i)?;
            self.timebase.delay_ms(frame_ms).await;
        }
        Ok(())
    }

    /// Wipe stored credentials, leave the network and restart
    pub async fn wipe_credentials(&mut self) -> Result<(), CredentialError> {
        let _ = self.renderer.show_message("CLR WiFi");
        self.timebase.delay_ms(WIPE_DELAY_MS).await;
        let erased = self.credentials.erase().await;
        self.link.disconnect().await;
        self.timebase.delay_ms(WIPE_DELAY_MS).await;
        self.system.restart(RestartReason::CredentialsCleared);
        erased
    }

    async fn service_network(&mut self, ctx: &mut ClockContext, report: &mut IterationReport) {
        let renderer = &mut self.renderer;
        let mut display_error = None;
        let ota = self
            .ota
            .service(|event| {
                if let Err(e) = ota::show_event(renderer, &event) {
                    display_error = Some(e);
                }
            })
            .await;
        if let Some(e) = display_error {
            report.display_error = Some(e);
        }
        if let Some(result) = ota {
            report.ota = Some(result);
            let reason = match result {
                Ok(()) => RestartReason::OtaFinished,
                Err(_) => RestartReason::OtaFailed,
            };
            report.restart = Some(reason);
            self.system.restart(reason);
            return;
        }

        let link = self.link.info();
        let diagnostics = self.system.diagnostics();
        let snapshot = web::Snapshot {
            now_ms: self.timebase.now_ms(),
            link: &link,
            diagnostics: &diagnostics,
        };
        report.web_served = self
            .web
            .poll(|request| web::handle(request, ctx, &snapshot))
            .await;

        if ctx.wipe_credentials {
            if let Err(e) = self.wipe_credentials().await {
                report.credential_error = Some(e);
            }
            report.restart = Some(RestartReason::CredentialsCleared);
        }
    }

    async fn update_clock(&mut self, ctx: &mut ClockContext, report: &mut IterationReport) {
        if ctx.connectivity.is_connected() && ctx.clock.sync_due(self.timebase.now_ms()) {
            let request = build_request();
            let result = self
                .ntp
                .exchange(&ctx.config.ntp_server, &request, ctx.config.ntp_timeout_ms)
                .await
                .and_then(|packet| parse_response(&packet, ctx.config.timezone_hours));
            ctx.clock
                .record_sync(result.unwrap_or(SYNC_FAILED), self.timebase.now_ms());
            report.sync = Some(result);
        }

        if let Some(now) = ctx.clock.second_changed(self.timebase.now_ms()) {
            let result = self
                .renderer
                .show_clock(now.hour12(), now.minute, now.second, now.is_am());
            report.display(result);
            report.redrawn = Some(now);
        }
    }
}

/// Sleep out the rest of the loop budget
///
/// Under budget the remainder is slept; over budget the loop only backs
/// off (by half the active time) while disconnected. Returns the time
/// actually slept.
pub async fn adaptive_sleep<T: Timebase>(timebase: &mut T, active_ms: u32, budget_ms: u32, connected: bool) -> u32 {
    let ms = if active_ms < budget_ms {
        budget_ms - active_ms
    } else if !connected {
        active_ms / 2
    } else {
        0
    };
    interruptible_delay(timebase, ms).await
}

/// Wait in 1 ms steps, returning early when console input is pending
///
/// A zero delay still yields once.
pub async fn interruptible_delay<T: Timebase>(timebase: &mut T, ms: u32) -> u32 {
    if ms == 0 {
        timebase.delay_ms(0).await;
        return 0;
    }
    let mut waited = 0;
    while waited < ms {
        timebase.delay_ms(1).await;
        waited += 1;
        if timebase.input_pending() {
            break;
        }
    }
    waited
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::future::Future;
    use embassy_futures::block_on;
    use heapless::Vec;
    use matrixclock_display::TileRows;
    use matrixclock_protocol::{NtpPacket, Request, Response, NTP_PACKET_SIZE};
    use proptest::prelude::*;

    use crate::net::WifiCredentials;
    use crate::ota::OtaEvent;
    use crate::time::SyncStatus;
    use crate::traits::{Diagnostics, LinkInfo};

    struct FakeTime {
        now: u64,
        delays: u32,
        /// Input shows up after this many polls
        pending_input_after: Option<u32>,
    }

    impl Timebase for FakeTime {
        fn now_ms(&self) -> u64 {
            self.now
        }

        fn delay_ms(&mut self, ms: u32) -> impl Future<Output = ()> {
            self.now += ms as u64;
            self.delays += 1;
            core::future::ready(())
        }

        fn input_pending(&mut self) -> bool {
            match self.pending_input_after {
                Some(0) => true,
                Some(ref mut n) => {
                    *n -= 1;
                    false
                }
                None => false,
            }
        }
    }

    #[derive(Default)]
    struct FakePanel {
        writes: u32,
        intensity: Option<u8>,
    }

    impl MatrixPanel for FakePanel {
        fn write(&mut self, _rows: &TileRows) -> Result<(), DisplayError> {
            self.writes += 1;
            Ok(())
        }

        fn set_intensity(&mut self, level: u8) -> Result<(), DisplayError> {
            self.intensity = Some(level);
            Ok(())
        }
    }

    struct FixedAngle(f32);

    impl AngleSensor for FixedAngle {
        fn update(&mut self, _now_ms: u64) -> Result<(), SensorError> {
            Ok(())
        }

        fn angle_y(&self) -> f32 {
            self.0
        }
    }

    struct FakeButton(bool);

    impl ButtonInput for FakeButton {
        fn pressed(&mut self, _now_ms: u64) -> bool {
            core::mem::take(&mut self.0)
        }
    }

    struct FakeLink {
        connected: bool,
        disconnects: u32,
    }

    impl NetworkLink for FakeLink {
        fn is_connected(&self) -> bool {
            self.connected
        }

        fn info(&self) -> LinkInfo {
            LinkInfo::default()
        }

        fn disconnect(&mut self) -> impl Future<Output = ()> {
            self.connected = false;
            self.disconnects += 1;
            core::future::ready(())
        }
    }

    struct FakeNtp {
        /// Seconds since 1900 to answer with, `None` to time out
        answer: Option<u32>,
        queries: u32,
    }

    impl NtpTransport for FakeNtp {
        fn exchange(
            &mut self,
            _server: &str,
            request: &NtpPacket,
            _timeout_ms: u32,
        ) -> impl Future<Output = Result<NtpPacket, NtpError>> {
            assert_eq!(request[0], 0xE3);
            self.queries += 1;
            let result = match self.answer {
                Some(secs) => {
                    let mut packet = [0u8; NTP_PACKET_SIZE];
                    packet[40..44].copy_from_slice(&secs.to_be_bytes());
                    Ok(packet)
                }
                None => Err(NtpError::Timeout),
            };
            core::future::ready(result)
        }
    }

    #[derive(Default)]
    struct FakeWeb {
        queue: Vec<&'static [u8], 4>,
        bodies: Vec<Response, 4>,
    }

    impl WebPort for FakeWeb {
        fn poll<F>(&mut self, mut handler: F) -> impl Future<Output = bool>
        where
            F: FnMut(&Request<'_>) -> Response,
        {
            let served = if self.queue.is_empty() {
                false
            } else {
                let raw = self.queue.remove(0);
                let request = Request::parse(raw).unwrap();
                let _ = self.bodies.push(handler(&request));
                true
            };
            core::future::ready(served)
        }
    }

    #[derive(Default)]
    struct FakeOta {
        push: Option<Result<(), OtaError>>,
        events: u32,
    }

    impl OtaPort for FakeOta {
        fn service<F>(&mut self, mut on_event: F) -> impl Future<Output = Option<Result<(), OtaError>>>
        where
            F: FnMut(OtaEvent),
        {
            let result = self.push.take();
            if let Some(outcome) = result {
                on_event(OtaEvent::Started { total: 200 });
                on_event(OtaEvent::Progress { done: 200, total: 200 });
                on_event(match outcome {
                    Ok(()) => OtaEvent::Finished,
                    Err(e) => OtaEvent::Failed(e),
                });
                self.events += 3;
            }
            core::future::ready(result)
        }
    }

    #[derive(Default)]
    struct FakeStore {
        stored: Option<WifiCredentials>,
        erased: bool,
    }

    impl CredentialStore for FakeStore {
        fn load(&mut self) -> impl Future<Output = Result<Option<WifiCredentials>, CredentialError>> {
            core::future::ready(Ok(self.stored.clone()))
        }

        fn store(&mut self, credentials: &WifiCredentials) -> impl Future<Output = Result<(), CredentialError>> {
            self.stored = Some(credentials.clone());
            core::future::ready(Ok(()))
        }

        fn erase(&mut self) -> impl Future<Output = Result<(), CredentialError>> {
            self.stored = None;
            self.erased = true;
            core::future::ready(Ok(()))
        }
    }

    #[derive(Default)]
    struct FakeSystem {
        restarts: Vec<RestartReason, 4>,
    }

    impl SystemControl for FakeSystem {
        fn restart(&mut self, reason: RestartReason) {
            let _ = self.restarts.push(reason);
        }

        fn diagnostics(&mut self) -> Diagnostics {
            Diagnostics {
                platform: "test",
                reset_reason: "power-on",
                free_memory: 0,
                chip_id: 0,
                flash_size: 0,
                image_size: 0,
            }
        }
    }

    type TestDevices =
        Devices<FakeTime, FakePanel, FixedAngle, FakeButton, FakeLink, FakeNtp, FakeWeb, FakeOta, FakeStore, FakeSystem>;

    /// 2024-01-01T00:00:00 UTC in NTP seconds
    const NTP_2024: u32 = 3_913_056_000;

    fn devices() -> TestDevices {
        Devices {
            timebase: FakeTime {
                now: 0,
                delays: 0,
                pending_input_after: None,
            },
            renderer: Renderer::new(FakePanel::default()),
            sensor: OrientationSensor::new(FixedAngle(0.0), true),
            button: FakeButton(false),
            link: FakeLink {
                connected: true,
                disconnects: 0,
            },
            ntp: FakeNtp {
                answer: Some(NTP_2024),
                queries: 0,
            },
            web: FakeWeb::default(),
            ota: FakeOta::default(),
            credentials: FakeStore::default(),
            system: FakeSystem::default(),
        }
    }

    fn context() -> ClockContext {
        ClockContext::new(ClockConfig::default())
    }

    #[test]
    fn test_first_pass_syncs_and_draws() {
        let mut dev = devices();
        let mut ctx = context();
        let report = block_on(dev.run_once(&mut ctx));

        // 00:00 UTC is 10:00 in the default +10 zone
        let expected = 1_704_067_200 + 10 * 3600;
        assert_eq!(report.sync, Some(Ok(expected)));
        assert_eq!(ctx.clock.status(), SyncStatus::Set);
        let shown = report.redrawn.unwrap();
        assert_eq!((shown.hour, shown.minute), (10, 0));
        assert_eq!(report.orientation, Some(Orientation::Up));
        assert!(report.uptime_ticked);
        assert_eq!(report.slept_ms, 50);
        assert_eq!(dev.ntp.queries, 1);
    }

    #[test]
    fn test_redraw_only_on_new_second() {
        let mut dev = devices();
        let mut ctx = context();
        block_on(dev.run_once(&mut ctx));
        let writes = dev.renderer.panel().writes;

        // 50 ms later: same second, nothing to draw
        let report = block_on(dev.run_once(&mut ctx));
        assert_eq!(report.redrawn, None);
        assert_eq!(report.sync, None);
        assert_eq!(dev.renderer.panel().writes, writes);

        dev.timebase.now += 1000;
        let report = block_on(dev.run_once(&mut ctx));
        assert!(report.redrawn.is_some());
    }

    #[test]
    fn test_failed_sync_retries_next_interval() {
        let mut dev = devices();
        dev.ntp.answer = None;
        let mut ctx = context();
        let report = block_on(dev.run_once(&mut ctx));
        assert_eq!(report.sync, Some(Err(NtpError::Timeout)));
        assert_eq!(ctx.clock.status(), SyncStatus::NotSet);
        assert_eq!(report.redrawn, None);

        block_on(dev.run_once(&mut ctx));
        assert_eq!(dev.ntp.queries, 1);

        dev.timebase.now += 28_800 * 1000;
        block_on(dev.run_once(&mut ctx));
        assert_eq!(dev.ntp.queries, 2);
    }

    #[test]
    fn test_no_sync_while_disconnected() {
        let mut dev = devices();
        dev.link.connected = false;
        let mut ctx = context();
        let report = block_on(dev.run_once(&mut ctx));
        assert_eq!(report.sync, None);
        assert_eq!(dev.ntp.queries, 0);
        assert_eq!(report.link, Some(LinkTransition::Lost { at_s: 1 }));
    }

    #[test]
    fn test_web_request_served_in_pass() {
        let mut dev = devices();
        let _ = dev.web.queue.push(b"GET /restart HTTP/1.1\r\n\r\n");
        let mut ctx = context();
        let report = block_on(dev.run_once(&mut ctx));
        assert!(report.web_served);
        assert_eq!(dev.web.bodies[0].body(), "Restart!");
        assert_eq!(report.restart, Some(RestartReason::Requested));
        assert_eq!(dev.system.restarts.as_slice(), &[RestartReason::Requested]);
    }

    #[test]
    fn test_reset_wifi_wipes_and_restarts() {
        let mut dev = devices();
        dev.credentials.stored = Some(WifiCredentials::new("home", "password").unwrap());
        let _ = dev.web.queue.push(b"GET /resetWifi HTTP/1.1\r\n\r\n");
        let mut ctx = context();
        let report = block_on(dev.run_once(&mut ctx));
        assert_eq!(report.restart, Some(RestartReason::CredentialsCleared));
        assert!(dev.credentials.erased);
        assert_eq!(dev.credentials.stored, None);
        assert_eq!(dev.link.disconnects, 1);
        assert_eq!(dev.timebase.now, 400);
        assert_eq!(
            dev.system.restarts.as_slice(),
            &[RestartReason::CredentialsCleared]
        );
    }

    #[test]
    fn test_ota_restarts_on_finish_and_failure() {
        let mut dev = devices();
        dev.ota.push = Some(Ok(()));
        let mut ctx = context();
        let report = block_on(dev.run_once(&mut ctx));
        assert_eq!(report.ota, Some(Ok(())));
        assert_eq!(report.restart, Some(RestartReason::OtaFinished));
        assert_eq!(dev.ota.events, 3);
        assert_eq!(dev.renderer.panel().writes, 3);

        let mut dev = devices();
        dev.ota.push = Some(Err(OtaError::Receive));
        let report = block_on(dev.run_once(&mut context()));
        assert_eq!(report.restart, Some(RestartReason::OtaFailed));
    }

    #[test]
    fn test_downtime_restart_while_disconnected() {
        let mut dev = devices();
        dev.link.connected = false;
        let mut ctx = context();
        let report = block_on(dev.run_once(&mut ctx));
        assert_eq!(report.link, Some(LinkTransition::Lost { at_s: 1 }));

        // Each pass is a little over a second, so uptime advances by one;
        // the outage reaches 300 s at uptime 301
        let mut restarted_at = None;
        for _ in 0..400 {
            dev.timebase.now += 1000;
            let report = block_on(dev.run_once(&mut ctx));
            if let Some(reason) = report.restart {
                assert_eq!(reason, RestartReason::DowntimeExceeded);
                restarted_at = Some(ctx.uptime.seconds());
                break;
            }
        }
        assert_eq!(restarted_at, Some(301));
        assert_eq!(ctx.connectivity.downtime_s(), 0);
        assert_eq!(
            dev.system.restarts.as_slice(),
            &[RestartReason::DowntimeExceeded]
        );
    }

    #[test]
    fn test_reconnect_does_not_restart() {
        let mut dev = devices();
        dev.link.connected = false;
        let mut ctx = context();
        block_on(dev.run_once(&mut ctx));

        // Down from uptime 1 to 300: 299 s, just under the limit
        for _ in 0..299 {
            dev.timebase.now += 1000;
            let report = block_on(dev.run_once(&mut ctx));
            assert_eq!(report.restart, None);
        }

        dev.link.connected = true;
        dev.timebase.now += 1000;
        let report = block_on(dev.run_once(&mut ctx));
        assert_eq!(report.link, Some(LinkTransition::Restored { outage_s: 300 }));
        assert_eq!(ctx.connectivity.downtime_s(), 300);
        assert_eq!(report.restart, None);

        dev.timebase.now += 1000;
        let report = block_on(dev.run_once(&mut ctx));
        assert_eq!(report.restart, None);
        assert!(dev.system.restarts.is_empty());
    }

    #[test]
    fn test_button_scrolls_message() {
        let mut dev = devices();
        dev.ntp.answer = None;
        dev.button.0 = true;
        let mut ctx = context();
        let before = dev.timebase.now;
        let report = block_on(dev.run_once(&mut ctx));
        assert!(report.scrolled);
        // 108 frames at 30 ms; over budget and connected, so no sleep
        assert_eq!(dev.timebase.now - before, 108 * 30);
        assert_eq!(report.slept_ms, 0);
        assert_eq!(dev.renderer.panel().writes, 108);
    }

    #[test]
    fn test_orientation_flips() {
        let mut dev = devices();
        dev.sensor = OrientationSensor::new(FixedAngle(55.0), true);
        let mut ctx = context();
        let report = block_on(dev.run_once(&mut ctx));
        assert_eq!(report.orientation, Some(Orientation::Down));

        // Within the 500 ms polling interval nothing is sampled
        let report = block_on(dev.run_once(&mut ctx));
        assert_eq!(report.orientation, None);
    }

    #[test]
    fn test_start_applies_intensity() {
        let mut dev = devices();
        let mut ctx = context();
        ctx.config.intensity = 7;
        let orientation = block_on(dev.start(&ctx)).unwrap();
        assert_eq!(orientation, Orientation::Up);
        assert_eq!(dev.renderer.panel().intensity, Some(7));
        // ten settling updates, 5 ms apart
        assert_eq!(dev.timebase.now, 50);
    }

    #[test]
    fn test_sleep_rules() {
        let mut tb = FakeTime {
            now: 0,
            delays: 0,
            pending_input_after: None,
        };
        assert_eq!(block_on(adaptive_sleep(&mut tb, 20, 50, true)), 30);
        assert_eq!(block_on(adaptive_sleep(&mut tb, 80, 50, true)), 0);
        assert_eq!(block_on(adaptive_sleep(&mut tb, 80, 50, false)), 40);

        tb.pending_input_after = Some(4);
        assert_eq!(block_on(interruptible_delay(&mut tb, 50)), 5);
    }

    #[test]
    fn test_zero_delay_still_yields() {
        let mut tb = FakeTime {
            now: 0,
            delays: 0,
            pending_input_after: None,
        };
        assert_eq!(block_on(interruptible_delay(&mut tb, 0)), 0);
        assert_eq!(tb.delays, 1);
    }

    #[test]
    fn test_load_average_converges() {
        let mut load = LoadAverage::new();
        for _ in 0..200 {
            load.update(25, 50);
        }
        // integer truncation settles below the true 50%
        assert_eq!(load.value(), 40);

        let mut idle = LoadAverage::new();
        idle.update(0, 50);
        assert_eq!(idle.value(), 0);
    }

    proptest! {
        #[test]
        fn prop_load_average_bounded(samples in prop::collection::vec(0u32..=50, 1..300)) {
            let mut load = LoadAverage::new();
            for active in samples {
                load.update(active, 50);
                prop_assert!(load.value() <= 100);
            }
        }
    }
}
