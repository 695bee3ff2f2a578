use controller::ControllerMachine;
use gcode::{format_error, format_ok, LineEvent, LineReader};
use settings::SettingsRecord;

fn run_program(program: &str) -> Vec<String> {
    let mut machine = ControllerMachine::new(SettingsRecord::default());
    let mut reader = LineReader::new();
    let mut responses = Vec::new();

    for byte in program.bytes().chain(std::iter::once(b'\n')) {
        let LineEvent::Complete(line) = reader.feed(byte) else {
            continue;
        };
        if line == "?" {
            responses.push(machine.status_report().to_string());
            continue;
        }
        match machine.execute_line(&line) {
            Ok(_) => responses.push(format_ok().to_string()),
            Err(e) => responses.push(format_error(e).to_string()),
        }
    }
    responses
}

#[test]
fn a_square_completes_with_all_oks() {
    let responses = run_program(
        "G21\nG90\nG1 X10 Y0 F600\nG1 X10 Y10\nG1 X0 Y10\nG1 X0 Y0\n",
    );
    assert_eq!(responses.len(), 5);
    assert!(responses.iter().all(|r| r.starts_with("ok")));
}

#[test]
fn an_unknown_word_reports_an_error_and_does_not_stop_the_session() {
    let responses = run_program("G1 X1 F600\nG200\nG1 X2\n");
    assert_eq!(responses.len(), 3);
    assert!(responses[0].starts_with("ok"));
    assert!(responses[1].starts_with("error"));
    assert!(responses[2].starts_with("ok"));
}

#[test]
fn homing_zeroes_the_reported_position() {
    let responses = run_program("G1 X5 Y5 F600\nG28\n");
    assert!(responses.iter().all(|r| r.starts_with("ok")));
}
