//! FSM unit tests

use sitedrop::deploy::fsm::{JobFsm, JobPhase, PhaseEvent};

#[test]
fn test_fsm_initial_state() {
    let fsm = JobFsm::new();
    assert_eq!(fsm.phase(), JobPhase::Initialized);
    assert_eq!(fsm.phase().label(), "Initialized");
    assert!(fsm.error().is_none());
}

#[test]
fn test_fsm_build_flow() {
    let mut fsm = JobFsm::new();

    // Initialized -> Extracting -> Classifying
    fsm.process(PhaseEvent::Extract).unwrap();
    assert_eq!(fsm.phase(), JobPhase::Extracting);
    fsm.process(PhaseEvent::Classify).unwrap();
    assert_eq!(fsm.phase(), JobPhase::Classifying);

    // Classifying -> Building -> Uploading
    fsm.process(PhaseEvent::Build).unwrap();
    assert_eq!(fsm.phase(), JobPhase::Building);
    fsm.process(PhaseEvent::Upload).unwrap();
    assert_eq!(fsm.phase(), JobPhase::Uploading);

    // Uploading -> Completed
    fsm.process(PhaseEvent::Succeed).unwrap();
    assert_eq!(fsm.phase(), JobPhase::Completed);
    assert!(fsm.phase().is_terminal());
}

#[test]
fn test_fsm_failure_flow() {
    let mut fsm = JobFsm::new();

    fsm.process(PhaseEvent::Extract).unwrap();
    fsm.process(PhaseEvent::Fail("archive is corrupt".to_string())).unwrap();

    assert_eq!(fsm.phase(), JobPhase::Failed);
    assert_eq!(fsm.phase().label(), "Failed");
    assert_eq!(fsm.error(), Some("archive is corrupt"));
}

#[test]
fn test_fsm_terminal_phases_are_final() {
    let mut fsm = JobFsm::new();
    fsm.process(PhaseEvent::Fail("clone failed".to_string())).unwrap();

    assert!(fsm.process(PhaseEvent::Extract).is_err());
    assert!(fsm.process(PhaseEvent::Fail("again".to_string())).is_err());
    assert_eq!(fsm.error(), Some("clone failed"));
}

#[test]
fn test_fsm_invalid_transition() {
    let mut fsm = JobFsm::new();

    // Cannot upload before extracting
    let result = fsm.process(PhaseEvent::Upload);
    assert!(result.is_err());
    assert_eq!(fsm.phase(), JobPhase::Initialized);
}
