//! Modal state and the per-line word dispatcher, grounded in
//! `original_source/motion_control.c`'s `mc_line`/`mc_arc`/`mc_dwell`/
//! `mc_go_home`, `spindle_control.c`, and `coolant_control.c`.

#[cfg(not(feature = "std"))]
use libm::{hypotf, sqrtf};
#[cfg(feature = "std")]
fn hypotf(x: f32, y: f32) -> f32 {
    x.hypot(y)
}
#[cfg(feature = "std")]
fn sqrtf(x: f32) -> f32 {
    x.sqrt()
}

use planner::{CartesianPoint, MotionPlanner};
use settings::SettingsRecord;

use motion_control::{mc_arc, mc_dwell, mc_go_home, mc_line, synchronize, HomingRoutine, RuntimeEnvironment, SoftLimits, SystemState};

use crate::error::GCodeError;
use crate::word::{tokenize, Word};

const INCHES_TO_MM: f32 = 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionMode {
    Rapid,
    Linear,
    ArcCw,
    ArcCcw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Xy,
    Zx,
    Yz,
}

impl Plane {
    /// `(axis_0, axis_1, axis_linear)`, 0=X, 1=Y, 2=Z.
    fn axes(self) -> (usize, usize, usize) {
        match self {
            Plane::Xy => (0, 1, 2),
            Plane::Zx => (2, 0, 1),
            Plane::Yz => (1, 2, 0),
        }
    }

    /// `(offset_0, offset_1)` indices into `[I, J, K]`.
    fn offset_axes(self) -> (usize, usize) {
        match self {
            Plane::Xy => (0, 1),
            Plane::Zx => (2, 0),
            Plane::Yz => (1, 2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMode {
    Absolute,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    Millimeters,
    Inches,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedRateMode {
    UnitsPerMinute,
    InverseTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpindleState {
    Off,
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoolantState {
    Off,
    Mist,
    Flood,
}

/// Which modal group a word belongs to, used to detect more than one word
/// from the same group appearing on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupId {
    Motion,
    Plane,
    Distance,
    Units,
    NonModal,
    FeedRateMode,
    CoordSystem,
    Stop,
    Spindle,
    Coolant,
}

/// Toggles the spindle and coolant GPIO outputs. Both upstream routines
/// synchronize the planner before changing state, since a direction or
/// solenoid change mid-cut would be unsafe; [`execute_line`] performs that
/// synchronization before calling these.
pub trait Auxiliary {
    fn set_spindle(&mut self, state: SpindleState);
    fn set_coolant(&mut self, state: CoolantState);
}

/// Persistent modal state carried between lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpreter {
    pub motion_mode: MotionMode,
    pub plane: Plane,
    pub distance_mode: DistanceMode,
    pub units: Units,
    pub feed_rate_mode: FeedRateMode,
    pub feed_rate: f32,
    pub spindle: SpindleState,
    pub coolant: CoolantState,
    pub coord_select: usize,
    pub program_stopped: bool,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter {
            motion_mode: MotionMode::Rapid,
            plane: Plane::Xy,
            distance_mode: DistanceMode::Absolute,
            units: Units::Millimeters,
            feed_rate_mode: FeedRateMode::UnitsPerMinute,
            feed_rate: 0.0,
            spindle: SpindleState::Off,
            coolant: CoolantState::Off,
            coord_select: 0,
            program_stopped: false,
        }
    }
}

fn classify_g(code: u32) -> Result<GroupId, GCodeError> {
    match code {
        0 | 1 | 2 | 3 => Ok(GroupId::Motion),
        17 | 18 | 19 => Ok(GroupId::Plane),
        20 | 21 => Ok(GroupId::Units),
        90 | 91 => Ok(GroupId::Distance),
        93 | 94 => Ok(GroupId::FeedRateMode),
        54 | 55 | 56 | 57 | 58 | 59 => Ok(GroupId::CoordSystem),
        4 | 28 | 92 => Ok(GroupId::NonModal),
        _ => Err(GCodeError::UnsupportedStatement),
    }
}

fn classify_m(code: u32) -> Result<GroupId, GCodeError> {
    match code {
        0 | 1 | 2 | 30 => Ok(GroupId::Stop),
        3 | 4 | 5 => Ok(GroupId::Spindle),
        7 | 8 | 9 => Ok(GroupId::Coolant),
        _ => Err(GCodeError::UnsupportedStatement),
    }
}

fn note_group(seen: &mut heapless::Vec<GroupId, 8>, group: GroupId) -> Result<(), GCodeError> {
    if seen.contains(&group) {
        return Err(GCodeError::ModalGroupViolation);
    }
    let _ = seen.push(group);
    Ok(())
}

/// Converts an R-word arc (radius) to the I/J center offset used
/// internally, following the classic two-point/radius construction: the
/// chord from `position` to `target` subtends the arc, and the perpendicular
/// bisector at distance `h` locates the center on the side the direction and
/// sign of `r` select.
fn radius_to_offset(position: [f32; 2], target: [f32; 2], mut r: f32, clockwise: bool) -> Result<[f32; 2], GCodeError> {
    let x = target[0] - position[0];
    let y = target[1] - position[1];
    let mut h_x2_div_d = 4.0 * r * r - x * x - y * y;
    if h_x2_div_d < 0.0 {
        return Err(GCodeError::FloatingPointError);
    }
    h_x2_div_d = -sqrtf(h_x2_div_d) / hypotf(x, y);
    if clockwise {
        h_x2_div_d = -h_x2_div_d;
    }
    if r < 0.0 {
        h_x2_div_d = -h_x2_div_d;
        r = -r;
    }
    let _ = r;
    Ok([0.5 * (x - y * h_x2_div_d), 0.5 * (y + x * h_x2_div_d)])
}

/// Executes one already-tokenizable line against the motion-control and
/// planner layers, updating `interp`'s modal state in place.
#[allow(clippy::too_many_arguments)]
pub fn execute_line<const N: usize, E, H, C, A>(
    interp: &mut Interpreter,
    line: &str,
    planner: &mut MotionPlanner<N>,
    state: &mut SystemState,
    settings: &SettingsRecord,
    env: &mut E,
    homing: &mut H,
    clock: &mut C,
    aux: &mut A,
    soft_limits: Option<&SoftLimits>,
) -> Result<(), GCodeError>
where
    E: RuntimeEnvironment,
    H: HomingRoutine,
    C: hal::SystemClock,
    A: Auxiliary,
{
    let words = tokenize(line)?;
    if words.is_empty() {
        return Ok(());
    }

    let mut seen_groups: heapless::Vec<GroupId, 8> = heapless::Vec::new();
    let mut target_word = [None; 3];
    let mut offset_words = [0.0f32; 3];
    let mut radius_word: Option<f32> = None;
    let mut dwell_seconds: Option<f32> = None;
    let mut motion_word: Option<MotionMode> = None;
    let mut plane_word: Option<Plane> = None;
    let mut distance_word: Option<DistanceMode> = None;
    let mut units_word: Option<Units> = None;
    let mut feed_mode_word: Option<FeedRateMode> = None;
    let mut coord_select_word: Option<usize> = None;
    let mut nonmodal_word: Option<u32> = None;
    let mut stop_word: Option<u32> = None;
    let mut spindle_word: Option<SpindleState> = None;
    let mut coolant_word: Option<CoolantState> = None;

    for Word { letter, value } in words.iter().copied() {
        match letter {
            'X' => target_word[0] = Some(value),
            'Y' => target_word[1] = Some(value),
            'Z' => target_word[2] = Some(value),
            'I' => offset_words[0] = value,
            'J' => offset_words[1] = value,
            'K' => offset_words[2] = value,
            'R' => radius_word = Some(value),
            'F' => interp.feed_rate = value.max(0.0),
            'P' => dwell_seconds = Some(value),
            'S' | 'N' => {}
            'G' => {
                let code = value as u32;
                let group = classify_g(code)?;
                note_group(&mut seen_groups, group)?;
                match group {
                    GroupId::Motion => {
                        motion_word = Some(match code {
                            0 => MotionMode::Rapid,
                            1 => MotionMode::Linear,
                            2 => MotionMode::ArcCw,
                            3 => MotionMode::ArcCcw,
                            _ => unreachable!(),
                        });
                    }
                    GroupId::Plane => {
                        plane_word = Some(match code {
                            17 => Plane::Xy,
                            18 => Plane::Zx,
                            19 => Plane::Yz,
                            _ => unreachable!(),
                        });
                    }
                    GroupId::Units => units_word = Some(if code == 20 { Units::Inches } else { Units::Millimeters }),
                    GroupId::Distance => distance_word = Some(if code == 90 { DistanceMode::Absolute } else { DistanceMode::Incremental }),
                    GroupId::FeedRateMode => feed_mode_word = Some(if code == 93 { FeedRateMode::InverseTime } else { FeedRateMode::UnitsPerMinute }),
                    GroupId::CoordSystem => coord_select_word = Some((code - 54) as usize),
                    GroupId::NonModal => nonmodal_word = Some(code),
                    _ => unreachable!(),
                }
            }
            'M' => {
                let code = value as u32;
                let group = classify_m(code)?;
                note_group(&mut seen_groups, group)?;
                match group {
                    GroupId::Stop => stop_word = Some(code),
                    GroupId::Spindle => {
                        spindle_word = Some(match code {
                            3 => SpindleState::Clockwise,
                            4 => SpindleState::CounterClockwise,
                            _ => SpindleState::Off,
                        });
                    }
                    GroupId::Coolant => {
                        coolant_word = Some(match code {
                            7 => CoolantState::Mist,
                            8 => CoolantState::Flood,
                            _ => CoolantState::Off,
                        });
                    }
                    _ => unreachable!(),
                }
            }
            _ => return Err(GCodeError::InvalidCommand),
        }
    }

    if let Some(units) = units_word {
        interp.units = units;
    }
    if let Some(plane) = plane_word {
        interp.plane = plane;
    }
    if let Some(distance) = distance_word {
        interp.distance_mode = distance;
    }
    if let Some(mode) = feed_mode_word {
        interp.feed_rate_mode = mode;
    }
    if let Some(select) = coord_select_word {
        state.coord_select = select;
    }
    if let Some(motion) = motion_word {
        interp.motion_mode = motion;
    }

    let unit_scale = if interp.units == Units::Inches { INCHES_TO_MM } else { 1.0 };
    let current = planner.position();
    let current_arr = [current.x, current.y, current.z];

    let mut target_arr = current_arr;
    for axis in 0..3 {
        if let Some(raw) = target_word[axis] {
            let scaled = raw * unit_scale;
            target_arr[axis] = match interp.distance_mode {
                DistanceMode::Absolute => scaled,
                DistanceMode::Incremental => current_arr[axis] + scaled,
            };
        }
    }
    let offset_arr = [
        offset_words[0] * unit_scale,
        offset_words[1] * unit_scale,
        offset_words[2] * unit_scale,
    ];

    if let Some(code) = nonmodal_word {
        match code {
            4 => {
                let seconds = dwell_seconds.unwrap_or(0.0).max(0.0);
                mc_dwell(planner, state, settings, env, clock, seconds);
                return Ok(());
            }
            28 => {
                mc_go_home(state, homing);
                return Ok(());
            }
            92 => {
                for axis in 0..3 {
                    if let Some(raw) = target_word[axis] {
                        state.coord_offset[axis] = current_arr[axis] - raw * unit_scale;
                    }
                }
                return Ok(());
            }
            _ => unreachable!(),
        }
    }

    if let Some(code) = stop_word {
        interp.program_stopped = true;
        if code == 2 || code == 30 {
            *interp = Interpreter::default();
        }
        return Ok(());
    }

    if let Some(spindle) = spindle_word {
        synchronize(planner, state, settings, env);
        interp.spindle = spindle;
        aux.set_spindle(spindle);
    }
    if let Some(coolant) = coolant_word {
        synchronize(planner, state, settings, env);
        interp.coolant = coolant;
        aux.set_coolant(coolant);
    }

    if target_word.iter().any(Option::is_some) || matches!(interp.motion_mode, MotionMode::ArcCw | MotionMode::ArcCcw) && radius_word.is_some() {
        let invert_feed_rate = interp.feed_rate_mode == FeedRateMode::InverseTime;
        match interp.motion_mode {
            MotionMode::Rapid => {
                mc_line(planner, state, settings, env, CartesianPoint::new(target_arr[0], target_arr[1], target_arr[2]), settings.default_seek_rate, false, soft_limits);
            }
            MotionMode::Linear => {
                mc_line(planner, state, settings, env, CartesianPoint::new(target_arr[0], target_arr[1], target_arr[2]), interp.feed_rate, invert_feed_rate, soft_limits);
            }
            MotionMode::ArcCw | MotionMode::ArcCcw => {
                let clockwise = interp.motion_mode == MotionMode::ArcCw;
                let (axis_0, axis_1, axis_linear) = interp.plane.axes();
                let (off_0, off_1) = interp.plane.offset_axes();
                let mut offset = [0.0f32; 3];
                offset[axis_0] = offset_arr[off_0];
                offset[axis_1] = offset_arr[off_1];

                if let Some(r) = radius_word {
                    let computed = radius_to_offset([current_arr[axis_0], current_arr[axis_1]], [target_arr[axis_0], target_arr[axis_1]], r * unit_scale, clockwise)?;
                    offset[axis_0] = computed[0];
                    offset[axis_1] = computed[1];
                }

                mc_arc(
                    planner,
                    state,
                    settings,
                    env,
                    current_arr,
                    target_arr,
                    offset,
                    axis_0,
                    axis_1,
                    axis_linear,
                    interp.feed_rate,
                    invert_feed_rate,
                    clockwise,
                    soft_limits,
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopEnv;
    impl RuntimeEnvironment for NoopEnv {
        fn hard_stop(&mut self) {}
        fn feed_hold(&mut self) {}
        fn cycle_reinitialize(&mut self) {}
        fn cycle_start(&mut self) {}
        fn emit_line(&mut self, _line: &str) {}
    }

    struct NoopHoming;
    impl HomingRoutine for NoopHoming {
        fn home(&mut self) -> [i64; 3] {
            [0, 0, 0]
        }
    }

    struct NoopClock;
    impl hal::SystemClock for NoopClock {
        fn delay_ms(&mut self, _ms: u32) {}
        fn delay_us(&mut self, _us: u32) {}
        fn micros(&self) -> u64 {
            0
        }
    }

    #[derive(Default)]
    struct RecordingAux {
        spindle: Option<SpindleState>,
        coolant: Option<CoolantState>,
    }
    impl Auxiliary for RecordingAux {
        fn set_spindle(&mut self, state: SpindleState) {
            self.spindle = Some(state);
        }
        fn set_coolant(&mut self, state: CoolantState) {
            self.coolant = Some(state);
        }
    }

    fn harness() -> (MotionPlanner<8>, SystemState, SettingsRecord, NoopEnv, NoopHoming, NoopClock, RecordingAux) {
        (
            MotionPlanner::new([200.0, 200.0, 200.0], 36_000.0, 0.05),
            SystemState::default(),
            SettingsRecord::default(),
            NoopEnv,
            NoopHoming,
            NoopClock,
            RecordingAux::default(),
        )
    }

    #[test]
    fn g1_move_enqueues_a_block() {
        let (mut planner, mut state, settings, mut env, mut homing, mut clock, mut aux) = harness();
        let mut interp = Interpreter::default();
        execute_line(&mut interp, "G1X10F600", &mut planner, &mut state, &settings, &mut env, &mut homing, &mut clock, &mut aux, None).unwrap();
        assert_eq!(planner.buffer.len(), 1);
        assert_eq!(interp.motion_mode, MotionMode::Linear);
    }

    #[test]
    fn motion_mode_is_modal_across_lines() {
        let (mut planner, mut state, settings, mut env, mut homing, mut clock, mut aux) = harness();
        let mut interp = Interpreter::default();
        execute_line(&mut interp, "G1X10F600", &mut planner, &mut state, &settings, &mut env, &mut homing, &mut clock, &mut aux, None).unwrap();
        execute_line(&mut interp, "X20", &mut planner, &mut state, &settings, &mut env, &mut homing, &mut clock, &mut aux, None).unwrap();
        assert_eq!(planner.buffer.len(), 2);
    }

    #[test]
    fn two_motion_words_on_one_line_is_a_modal_group_violation() {
        let (mut planner, mut state, settings, mut env, mut homing, mut clock, mut aux) = harness();
        let mut interp = Interpreter::default();
        let err = execute_line(&mut interp, "G0G1X10", &mut planner, &mut state, &settings, &mut env, &mut homing, &mut clock, &mut aux, None).unwrap_err();
        assert_eq!(err, GCodeError::ModalGroupViolation);
    }

    #[test]
    fn g92_sets_coordinate_offset() {
        let (mut planner, mut state, settings, mut env, mut homing, mut clock, mut aux) = harness();
        let mut interp = Interpreter::default();
        execute_line(&mut interp, "G92X5", &mut planner, &mut state, &settings, &mut env, &mut homing, &mut clock, &mut aux, None).unwrap();
        assert!((state.coord_offset[0] - (-5.0)).abs() < 1e-6);
    }

    #[test]
    fn m3_synchronizes_and_reports_spindle_state() {
        let (mut planner, mut state, settings, mut env, mut homing, mut clock, mut aux) = harness();
        let mut interp = Interpreter::default();
        execute_line(&mut interp, "M3S1000", &mut planner, &mut state, &settings, &mut env, &mut homing, &mut clock, &mut aux, None).unwrap();
        assert_eq!(interp.spindle, SpindleState::Clockwise);
        assert_eq!(aux.spindle, Some(SpindleState::Clockwise));
    }

    #[test]
    fn m30_resets_modal_state() {
        let (mut planner, mut state, settings, mut env, mut homing, mut clock, mut aux) = harness();
        let mut interp = Interpreter::default();
        interp.units = Units::Inches;
        execute_line(&mut interp, "M30", &mut planner, &mut state, &settings, &mut env, &mut homing, &mut clock, &mut aux, None).unwrap();
        assert_eq!(interp.units, Units::Millimeters);
    }
}
