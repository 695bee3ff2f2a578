//! The process-wide system state: machine position, work-coordinate
//! offsets, and the asynchronous runtime-command flags.

/// Bits of the `execute` word, in the priority order `execute_runtime`
/// services them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecuteFlags(u8);

impl ExecuteFlags {
    pub const RESET: Self = Self(1 << 0);
    pub const STATUS_REPORT: Self = Self(1 << 1);
    pub const FEED_HOLD: Self = Self(1 << 2);
    pub const CYCLE_STOP: Self = Self(1 << 3);
    pub const CYCLE_START: Self = Self(1 << 4);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn set(&mut self, bit: Self) {
        self.0 |= bit.0;
    }

    pub fn clear(&mut self, bit: Self) {
        self.0 &= !bit.0;
    }

    pub fn contains(&self, bit: Self) -> bool {
        self.0 & bit.0 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// One of the six work coordinate systems, G54-G59.
pub type CoordinateSystem = [f32; 3];

/// Process-wide state shared between the input context, the motion
/// front-end, and the step generator.
#[derive(Debug, Clone, Copy)]
pub struct SystemState {
    /// Machine position, in steps, updated only by the step generator.
    pub position: [i64; 3],
    /// The six work coordinate system origins (G54-G59), in millimeters.
    pub coord_system: [CoordinateSystem; 6],
    /// Index into `coord_system`, selected by `G54`-`G59`.
    pub coord_select: usize,
    /// The `G92` offset, in millimeters.
    pub coord_offset: [f32; 3],
    pub abort: bool,
    pub feed_hold: bool,
    pub auto_start: bool,
    pub cycle_start: bool,
    pub execute: ExecuteFlags,
}

impl Default for SystemState {
    fn default() -> Self {
        SystemState {
            position: [0; 3],
            coord_system: [[0.0; 3]; 6],
            coord_select: 0,
            coord_offset: [0.0; 3],
            abort: false,
            feed_hold: false,
            auto_start: true,
            cycle_start: false,
            execute: ExecuteFlags::empty(),
        }
    }
}

impl SystemState {
    /// Machine position of axis `axis`, in millimeters.
    pub fn machine_position_mm(&self, axis: usize, steps_per_mm: f32) -> f32 {
        self.position[axis] as f32 / steps_per_mm
    }

    /// Work position of axis `axis`: machine position minus the active
    /// coordinate-system origin and the `G92` offset.
    pub fn work_position_mm(&self, axis: usize, steps_per_mm: f32) -> f32 {
        self.machine_position_mm(axis, steps_per_mm)
            - self.coord_system[self.coord_select][axis]
            - self.coord_offset[axis]
    }
}
