//! End-to-end traversal properties against scripted tapes

use crate::error::ErrorKind;
use crate::tape::{Boundary, RecordEvent, ScriptedTape, SkipOutcome, TapeSession};
use crate::traverse::{traverse, TraversalEvent, TraversalPolicy};
use std::sync::atomic::AtomicBool;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Data(usize),
    FileMark,
    EndOfMedium,
}

/// Drive the session by hand, the way a caller composes the operations,
/// recording every event with the file index it was observed at.
fn walk(tape: ScriptedTape) -> Vec<(Step, u64)> {
    let mut session = TapeSession::with_device(tape);
    let mut buf = [0u8; 256];
    let mut steps = Vec::new();

    loop {
        match session.read_record(&mut buf).unwrap() {
            RecordEvent::Data(n) => steps.push((Step::Data(n), session.position().file_index)),
            RecordEvent::FileMark => {
                steps.push((Step::FileMark, session.position().file_index));
                if session.skip_files(1).unwrap() == SkipOutcome::EndOfMedium {
                    steps.push((Step::EndOfMedium, session.position().file_index));
                    break;
                }
            }
            RecordEvent::EndOfMedium => {
                steps.push((Step::EndOfMedium, session.position().file_index));
                break;
            }
        }
    }

    assert_eq!(session.position().boundary, Boundary::AtEndOfMedium);
    steps
}

#[test]
fn test_traversal_with_empty_middle_file() {
    let steps = walk(ScriptedTape::with_record_counts(&[2, 0, 1], 32));

    let kinds: Vec<Step> = steps.iter().map(|(s, _)| s.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            Step::Data(32),
            Step::Data(32),
            Step::FileMark,
            Step::FileMark,
            Step::Data(32),
            Step::FileMark,
            Step::EndOfMedium,
        ]
    );

    // The empty file is counted exactly once; end of medium keeps the last index
    let indices: Vec<u64> = steps.iter().map(|(_, i)| *i).collect();
    assert_eq!(indices, vec![0, 0, 0, 1, 2, 2, 2]);
}

#[test]
fn test_traverse_matches_manual_walk() {
    let mut session = TapeSession::with_device(ScriptedTape::with_record_counts(&[2, 0, 1], 32));
    let mut buf = vec![0u8; 256];
    let stop = AtomicBool::new(false);
    let mut events = Vec::new();

    let report = traverse(&mut session, &mut buf, &TraversalPolicy::default(), &stop, |event| {
        events.push(match event {
            TraversalEvent::Record { file_index, data, .. } => (Step::Data(data.len()), file_index),
            TraversalEvent::FileMark(summary) => (Step::FileMark, summary.file_index),
            TraversalEvent::EndOfMedium(position) => (Step::EndOfMedium, position.file_index),
        });
        Ok(())
    })
    .unwrap();

    assert_eq!(events, walk(ScriptedTape::with_record_counts(&[2, 0, 1], 32)));
    let records: Vec<u64> = report.files.iter().map(|f| f.records).collect();
    assert_eq!(records, vec![2, 0, 1]);
}

#[test]
fn test_traversal_is_deterministic() {
    let tape = ScriptedTape::new(vec![
        vec![b"alpha".to_vec(), b"beta".to_vec(), vec![9u8; 200]],
        vec![],
        vec![],
        vec![b"omega".to_vec()],
    ]);

    let first = walk(tape.clone());
    let second = walk(tape);
    assert_eq!(first, second);
}

#[test]
fn test_consecutive_empty_files_each_counted() {
    let steps = walk(ScriptedTape::with_record_counts(&[0, 0, 0], 8));
    let marks: Vec<u64> = steps
        .iter()
        .filter(|(s, _)| *s == Step::FileMark)
        .map(|(_, i)| *i)
        .collect();
    assert_eq!(marks, vec![0, 1, 2]);
}

#[test]
fn test_fault_then_desync_never_overwrites() {
    let tape = ScriptedTape::with_record_counts(&[3, 3], 16).fail_read(2);
    let mut session = TapeSession::with_device(tape);
    let mut buf = [0u8; 64];

    session.read_record(&mut buf).unwrap();
    let before = session.position();
    assert_eq!(session.read_record(&mut buf).unwrap_err().kind(), ErrorKind::ReadFault);
    assert_eq!(session.position(), before);

    session.device_mut().report_file_number(Some(1));
    assert_eq!(session.current_status().unwrap_err().kind(), ErrorKind::PositionDesync);
    assert_eq!(session.position(), before);

    // Once the device agrees again the caller can carry on
    session.device_mut().report_file_number(Some(0));
    assert!(session.current_status().is_ok());
    assert_eq!(session.read_record(&mut buf).unwrap(), RecordEvent::Data(16));
}

#[test]
fn test_terminal_state_is_idempotent() {
    let mut session = TapeSession::with_device(ScriptedTape::with_record_counts(&[1], 8));
    let mut buf = [0u8; 8];
    session.read_record(&mut buf).unwrap();
    session.read_record(&mut buf).unwrap();
    assert_eq!(session.skip_files(1).unwrap(), SkipOutcome::EndOfMedium);

    let calls = session.device().calls().total();
    for _ in 0..5 {
        assert_eq!(session.read_record(&mut buf).unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(session.skip_files(2).unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(session.current_status().unwrap_err().kind(), ErrorKind::InvalidState);
    }
    assert_eq!(session.device().calls().total(), calls);
    assert!(session.position().is_terminal());
}
