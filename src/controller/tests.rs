//! State machine tests driven by fake providers and injected time.

use super::*;
use crate::color::Rgb;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::mpsc::Sender;

#[derive(Default)]
struct Counters {
    inits: Cell<u32>,
    disposes: Cell<u32>,
    frame_reads: Cell<u32>,
}

#[derive(Clone)]
struct FakeSetup {
    name: &'static str,
    init_error: Option<&'static str>,
    /// Ticks after initialize before a frame shows up; `None` never.
    frame_after_ticks: Option<u32>,
    counters: Rc<Counters>,
}

impl FakeSetup {
    fn ready(name: &'static str) -> Self {
        Self {
            name,
            init_error: None,
            frame_after_ticks: Some(1),
            counters: Rc::default(),
        }
    }

    fn silent(name: &'static str) -> Self {
        Self {
            frame_after_ticks: None,
            ..Self::ready(name)
        }
    }

    fn broken(name: &'static str, reason: &'static str) -> Self {
        Self {
            init_error: Some(reason),
            ..Self::ready(name)
        }
    }
}

const FRAME_COLOR: Rgb = Rgb::new(0.8, 0.1, 0.1);

struct FakeProvider {
    setup: FakeSetup,
    initialized: bool,
    ticks: u32,
    frame: Option<CameraFrame>,
}

impl CameraProvider for FakeProvider {
    fn name(&self) -> &str {
        self.setup.name
    }

    fn initialize(&mut self, _config: &ProviderConfig) -> Result<(), String> {
        let counters = &self.setup.counters;
        counters.inits.set(counters.inits.get() + 1);
        if let Some(reason) = self.setup.init_error {
            return Err(reason.to_string());
        }
        self.initialized = true;
        Ok(())
    }

    fn tick(&mut self) {
        if !self.initialized {
            return;
        }
        self.ticks += 1;
        if matches!(self.setup.frame_after_ticks, Some(n) if self.ticks >= n) {
            self.frame = Some(CameraFrame::filled(32, 24, FRAME_COLOR));
        }
    }

    fn current_frame(&self) -> Option<&CameraFrame> {
        let counters = &self.setup.counters;
        counters.frame_reads.set(counters.frame_reads.get() + 1);
        self.frame.as_ref()
    }

    fn dispose(&mut self) {
        let counters = &self.setup.counters;
        counters.disposes.set(counters.disposes.get() + 1);
        self.initialized = false;
        self.frame = None;
    }
}

fn factory(setups: Vec<FakeSetup>) -> ProviderFactory {
    Box::new(move || {
        setups
            .iter()
            .map(|setup| {
                Box::new(FakeProvider {
                    setup: setup.clone(),
                    initialized: false,
                    ticks: 0,
                    frame: None,
                }) as Box<dyn CameraProvider>
            })
            .collect()
    })
}

fn controller(setups: Vec<FakeSetup>, granted: bool) -> ModeController {
    ModeController::new(
        ControllerConfig::default(),
        factory(setups),
        Box::new(StaticPermissions::new(granted)),
    )
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[test]
fn permission_denied_never_reaches_advanced() {
    let good = FakeSetup::ready("good");
    let mut ctl = controller(vec![good.clone()], false);
    let t0 = Instant::now();

    ctl.start(t0, true);
    assert_eq!(ctl.mode(), RuntimeMode::BasicStyling);
    assert_eq!(ctl.last_failure(), Some(&FinderError::PermissionDenied));
    assert_eq!(good.counters.inits.get(), 0);

    assert_eq!(ctl.request_advanced(t0), Err(FinderError::PermissionDenied));
    for i in 0..10 {
        ctl.tick(t0 + secs(i));
        assert_ne!(ctl.mode(), RuntimeMode::AdvancedCameraMask);
    }
    assert_eq!(good.counters.inits.get(), 0);

    let events = ctl.drain_events();
    assert!(events.contains(&ControllerEvent::Failed(FinderError::PermissionDenied)));
}

/// Broker whose dialogs stay open until a test answers them.
#[derive(Clone, Default)]
struct OpenDialogs(Rc<RefCell<Vec<Sender<PermissionOutcome>>>>);

impl OpenDialogs {
    fn answer(&self, index: usize, outcome: PermissionOutcome) {
        self.0.borrow()[index].send(outcome).unwrap();
    }

    fn asked(&self) -> usize {
        self.0.borrow().len()
    }
}

impl PermissionBroker for OpenDialogs {
    fn has_permission(&self, _id: &str) -> bool {
        false
    }

    fn request_permission(&mut self, _id: &str) -> PermissionRequest {
        let (tx, request) = PermissionRequest::channel();
        self.0.borrow_mut().push(tx);
        request
    }
}

fn controller_with_dialogs(setups: Vec<FakeSetup>) -> (ModeController, OpenDialogs) {
    let dialogs = OpenDialogs::default();
    let ctl = ModeController::new(
        ControllerConfig::default(),
        factory(setups),
        Box::new(dialogs.clone()),
    );
    (ctl, dialogs)
}

#[test]
fn stays_uninitialized_while_permission_is_pending() {
    let good = FakeSetup::ready("good");
    let (mut ctl, _dialogs) = controller_with_dialogs(vec![good.clone()]);
    let t0 = Instant::now();
    ctl.start(t0, true);
    ctl.tick(t0 + secs(1));
    assert_eq!(ctl.mode(), RuntimeMode::Uninitialized);
    assert_eq!(good.counters.inits.get(), 0);

    // both requests time out unanswered
    ctl.tick(t0 + secs(8));
    ctl.tick(t0 + secs(16));
    assert_eq!(ctl.mode(), RuntimeMode::BasicStyling);
    assert!(!ctl.permission_granted());
}

#[test]
fn basic_during_pending_permission_keeps_the_request_open() {
    let good = FakeSetup::ready("good");
    let (mut ctl, dialogs) = controller_with_dialogs(vec![good.clone()]);
    let t0 = Instant::now();
    ctl.start(t0, true);

    ctl.request_basic();
    assert_eq!(ctl.mode(), RuntimeMode::BasicStyling);
    assert!(ctl.permission_pending());
    assert_eq!(ctl.permission_state(), PermissionState::Unresolved);

    assert_eq!(ctl.request_advanced(t0 + secs(1)), Ok(()));
    assert_eq!(ctl.last_failure(), None);
    assert_eq!(ctl.mode(), RuntimeMode::BasicStyling);
    // the open dialog is reused, not asked again
    assert_eq!(dialogs.asked(), 1);

    dialogs.answer(0, PermissionOutcome::Granted);
    ctl.tick(t0 + secs(2));
    assert!(ctl.permission_granted());
    assert_eq!(ctl.mode(), RuntimeMode::AdvancedCameraMask);
    assert_eq!(ctl.bound_provider(), Some("good"));
}

#[test]
fn grant_while_in_basic_waits_for_advanced() {
    let good = FakeSetup::ready("good");
    let (mut ctl, dialogs) = controller_with_dialogs(vec![good.clone()]);
    let t0 = Instant::now();
    ctl.start(t0, true);
    ctl.request_basic();

    dialogs.answer(0, PermissionOutcome::Granted);
    ctl.tick(t0 + secs(1));
    assert!(ctl.permission_granted());
    assert!(!ctl.permission_pending());
    assert_eq!(ctl.mode(), RuntimeMode::BasicStyling);
    assert_eq!(good.counters.inits.get(), 0);

    assert_eq!(ctl.request_advanced(t0 + secs(2)), Ok(()));
    assert_eq!(ctl.mode(), RuntimeMode::AdvancedCameraMask);
}

#[test]
fn permission_timeouts_run_on_while_in_basic() {
    let good = FakeSetup::ready("good");
    let (mut ctl, dialogs) = controller_with_dialogs(vec![good.clone()]);
    let t0 = Instant::now();
    ctl.start(t0, true);
    ctl.request_basic();

    // the choice of Basic does not stop the timeouts
    ctl.tick(t0 + secs(8));
    ctl.tick(t0 + secs(16));
    assert_eq!(ctl.permission_state(), PermissionState::Denied);
    assert_eq!(ctl.last_failure(), Some(&FinderError::PermissionDenied));
    assert_eq!(ctl.request_advanced(t0 + secs(17)), Err(FinderError::PermissionDenied));
    assert_eq!(dialogs.asked(), 2);
}

#[test]
fn denial_keeps_its_own_mode_status() {
    let mut ctl = controller(vec![FakeSetup::ready("good")], false);
    ctl.start(Instant::now(), true);

    let events = ctl.drain_events();
    let mode_status = events.iter().find_map(|event| match event {
        ControllerEvent::ModeChanged { mode, status } if *mode == RuntimeMode::BasicStyling => {
            Some(status.clone())
        }
        _ => None,
    });
    assert_eq!(
        mode_status.as_deref(),
        Some("Camera permission denied. Using Basic styling.")
    );
    assert_eq!(
        events.last(),
        Some(&ControllerEvent::Status(
            "Grant headset camera permission for true color masking.".to_string()
        ))
    );
}

#[test]
fn binds_first_candidate_that_yields_a_frame() {
    let a = FakeSetup::ready("A");
    let b = FakeSetup::ready("B");
    let mut ctl = controller(vec![a.clone(), b.clone()], true);

    ctl.start(Instant::now(), true);
    assert_eq!(ctl.mode(), RuntimeMode::AdvancedCameraMask);
    assert_eq!(ctl.bound_provider(), Some("A"));
    assert_eq!(b.counters.inits.get(), 0);
    assert!(ctl.current_frame().is_some());
}

#[test]
fn timed_out_candidate_is_disposed_once_and_next_is_bound() {
    let a = FakeSetup::silent("A");
    let b = FakeSetup::ready("B");
    let mut ctl = controller(vec![a.clone(), b.clone()], true);
    let t0 = Instant::now();

    ctl.start(t0, true);
    assert_eq!(ctl.mode(), RuntimeMode::ProbingProviders);

    ctl.tick(t0 + secs(1));
    ctl.tick(t0 + Duration::from_millis(3999));
    assert_eq!(ctl.mode(), RuntimeMode::ProbingProviders);
    assert_eq!(a.counters.disposes.get(), 0);

    ctl.tick(t0 + secs(4));
    assert_eq!(ctl.mode(), RuntimeMode::AdvancedCameraMask);
    assert_eq!(ctl.bound_provider(), Some("B"));
    assert_eq!(a.counters.disposes.get(), 1);
    assert_eq!(b.counters.disposes.get(), 0);
    assert_eq!(
        ctl.probe_log(),
        &[
            ProbeRecord {
                provider: "A".into(),
                outcome: CandidateOutcome::TimedOut
            },
            ProbeRecord {
                provider: "B".into(),
                outcome: CandidateOutcome::Bound
            },
        ]
    );

    // later ticks never touch the discarded candidate again
    ctl.tick(t0 + secs(30));
    drop(ctl);
    assert_eq!(a.counters.disposes.get(), 1);
    assert_eq!(b.counters.disposes.get(), 1);
}

#[test]
fn init_failure_records_reason_and_moves_on() {
    let a = FakeSetup::broken("A", "capability missing");
    let b = FakeSetup::ready("B");
    let mut ctl = controller(vec![a.clone(), b], true);

    ctl.start(Instant::now(), true);
    assert_eq!(ctl.bound_provider(), Some("B"));
    assert_eq!(
        ctl.probe_log()[0].outcome,
        CandidateOutcome::InitFailed("capability missing".into())
    );
    assert_eq!(a.counters.disposes.get(), 1);
    assert!(ctl.last_failure().is_none());
}

#[test]
fn exhausted_candidates_fall_back_with_last_reason() {
    let a = FakeSetup::broken("A", "capability missing");
    let b = FakeSetup::silent("B");
    let mut ctl = controller(vec![a, b.clone()], true);
    let t0 = Instant::now();

    ctl.start(t0, true);
    ctl.drain_events();
    ctl.tick(t0 + secs(5));

    assert_eq!(ctl.mode(), RuntimeMode::BasicStyling);
    let expected = FinderError::ProviderTimedOut {
        provider: "B".into(),
    };
    assert_eq!(ctl.last_failure(), Some(&expected));
    assert_eq!(b.counters.disposes.get(), 1);

    let events = ctl.drain_events();
    assert_eq!(
        events.last(),
        Some(&ControllerEvent::Failed(expected)),
        "failure reason must be the final status"
    );
}

#[test]
fn no_candidates_is_a_recoverable_fallback() {
    let mut ctl = controller(vec![], true);
    ctl.start(Instant::now(), true);
    assert_eq!(ctl.mode(), RuntimeMode::BasicStyling);
    assert!(matches!(
        ctl.last_failure(),
        Some(FinderError::ProviderInitFailed(_))
    ));
}

#[test]
fn missing_compositor_pins_basic() {
    let good = FakeSetup::ready("good");
    let mut ctl = controller(vec![good.clone()], true);
    let t0 = Instant::now();

    ctl.start(t0, false);
    assert_eq!(ctl.mode(), RuntimeMode::BasicStyling);
    assert!(ctl.is_pinned_to_basic());
    assert_eq!(ctl.request_advanced(t0), Err(FinderError::CompositorUnavailable));
    ctl.tick(t0 + secs(1));
    assert_eq!(ctl.mode(), RuntimeMode::BasicStyling);
    assert_eq!(good.counters.inits.get(), 0);
}

#[test]
fn calibration_outside_advanced_reads_no_frame() {
    let good = FakeSetup::ready("good");
    let mut ctl = controller(vec![good.clone()], true);

    assert_eq!(ctl.request_calibration(), Err(FinderError::CalibrationNotActive));

    ctl.start(Instant::now(), true);
    ctl.request_basic();
    let reads = good.counters.frame_reads.get();

    assert_eq!(ctl.request_calibration(), Err(FinderError::CalibrationNotActive));
    assert_eq!(good.counters.frame_reads.get(), reads);
    assert_eq!(
        FinderError::CalibrationNotActive.to_string(),
        "Advanced mode is not active."
    );
}

#[test]
fn calibration_sample_arrives_after_one_tick() {
    let mut ctl = controller(vec![FakeSetup::ready("A")], true);
    let t0 = Instant::now();
    ctl.start(t0, true);
    ctl.drain_events();

    assert_eq!(ctl.request_calibration(), Ok(()));
    assert!(ctl.calibration_in_progress());
    assert!(!ctl
        .drain_events()
        .iter()
        .any(|e| matches!(e, ControllerEvent::Calibrated(_))));

    ctl.tick(t0 + Duration::from_millis(16));
    assert!(!ctl.calibration_in_progress());

    let expected = Rgb::from_pixel(&FRAME_COLOR.to_pixel()).to_hsv();
    let sample = ctl
        .drain_events()
        .into_iter()
        .find_map(|e| match e {
            ControllerEvent::Calibrated(hsv) => Some(hsv),
            _ => None,
        })
        .expect("calibration event");
    assert!((sample.h - expected.h).abs() < 1e-3);
    assert!((sample.s - expected.s).abs() < 1e-3);
    assert!((sample.v - expected.v).abs() < 1e-3);
}

#[test]
fn switching_to_basic_mid_probe_disposes_candidate() {
    let a = FakeSetup::silent("A");
    let b = FakeSetup::ready("B");
    let mut ctl = controller(vec![a.clone(), b.clone()], true);
    let t0 = Instant::now();

    ctl.start(t0, true);
    assert_eq!(ctl.mode(), RuntimeMode::ProbingProviders);

    ctl.request_basic();
    assert_eq!(ctl.mode(), RuntimeMode::BasicStyling);
    assert_eq!(a.counters.disposes.get(), 1);
    assert_eq!(
        ctl.probe_log().last().map(|r| &r.outcome),
        Some(&CandidateOutcome::Cancelled)
    );

    ctl.tick(t0 + secs(10));
    assert_eq!(ctl.mode(), RuntimeMode::BasicStyling);
    assert_eq!(a.counters.disposes.get(), 1);
    assert_eq!(b.counters.inits.get(), 0);
}

#[test]
fn mode_requests_unbind_and_rebind() {
    let a = FakeSetup::ready("A");
    let mut ctl = controller(vec![a.clone()], true);
    let t0 = Instant::now();

    ctl.start(t0, true);
    assert_eq!(ctl.mode(), RuntimeMode::AdvancedCameraMask);

    ctl.request_basic();
    assert_eq!(ctl.mode(), RuntimeMode::BasicStyling);
    assert_eq!(ctl.bound_provider(), None);
    assert_eq!(a.counters.disposes.get(), 1);
    assert!(ctl.current_frame().is_none());

    assert_eq!(ctl.request_advanced(t0 + secs(1)), Ok(()));
    assert_eq!(ctl.mode(), RuntimeMode::AdvancedCameraMask);
    assert_eq!(a.counters.inits.get(), 2);
}

#[test]
fn leaving_advanced_cancels_calibration() {
    let mut ctl = controller(vec![FakeSetup::ready("A")], true);
    let t0 = Instant::now();
    ctl.start(t0, true);

    ctl.request_calibration().unwrap();
    ctl.request_basic();
    assert!(!ctl.calibration_in_progress());

    ctl.tick(t0 + secs(1));
    let events = ctl.drain_events();
    assert!(!events
        .iter()
        .any(|e| matches!(e, ControllerEvent::Calibrated(_))));
    assert!(events.contains(&ControllerEvent::Status("Calibration cancelled.".into())));
}
