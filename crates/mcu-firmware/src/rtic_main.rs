//! # Firmware Entry Point
//!
//! Binds the planner/step-generator/interpreter core to real STM32F407
//! timers, GPIO, and USART via RTIC. The step-rate timer's compare
//! interrupt is the only hard real-time context; everything else —
//! G-code dispatch, settings, homing — runs from the idle task under a
//! single short-lived lock per line, matching the ownership split the
//! core's own `BlockBuffer` already documents (main owns head, the
//! generator owns tail).

#![allow(unused_imports)]

#[rtic::app(device = stm32f4xx_hal::pac, dispatchers = [EXTI0, EXTI1])]
mod app {
    use stm32f4xx_hal::{
        pac::{TIM2, TIM3, USART1},
        prelude::*,
        serial::{Config as SerialConfig, Event as SerialEvent, Rx, Serial, Tx},
        timer::{CounterUs, Event as TimerEvent},
        watchdog::IndependentWatchdog,
        gpio::{Input, Output, PushPull, ErasedPin},
    };
    use embedded_hal::digital::InputPin;
    use rtic_monotonics::systick::*;

    use gcode::{Auxiliary, CoolantState, GCodeError, Interpreter, LineEvent, LineReader, SpindleState};
    use hal::{FunctionGenerator, WaveShape};
    use motion_control::{HomingRoutine, RuntimeEnvironment, SystemState};
    use planner::MotionPlanner;
    use settings::SettingsRecord;
    use step_gen::{AtomicGpioPort, PulseResetTimer, StepGenerator, StepTimer};

    use crate::boards::stm32f407::pins::AxisPins;
    use crate::safety::{SafetyError, SafetyMonitor};

    /// The charge pump a servo drive or safety relay watches to confirm the
    /// controller is alive; driven as a plain high/low level rather than a
    /// real PWM waveform, matching `hal_sim::SimFunctionGenerator`'s fidelity.
    struct ChargePump {
        pin: ErasedPin<Output<PushPull>>,
    }

    impl FunctionGenerator for ChargePump {
        fn start(&mut self, _frequency_hz: u32, _duty_percent: u8, _shape: WaveShape) {
            self.pin.set_high();
        }

        fn stop(&mut self) {
            self.pin.set_low();
        }
    }

    const BUFFER_CAPACITY: usize = 64;

    /// Three step or three direction lines addressed as a single byte mask,
    /// mirroring the invert-mask convention the settings record already
    /// uses for these same three bits.
    struct AxisLineSet {
        pins: [ErasedPin<Output<PushPull>>; 3],
    }

    impl AtomicGpioPort for AxisLineSet {
        fn set_and_clear_atomic(&mut self, set_mask: u8, clear_mask: u8) {
            for (axis, pin) in self.pins.iter_mut().enumerate() {
                let bit = 1 << axis;
                if set_mask & bit != 0 {
                    pin.set_high();
                } else if clear_mask & bit != 0 {
                    pin.set_low();
                }
            }
        }

        fn write(&mut self, mask: u8) {
            for (axis, pin) in self.pins.iter_mut().enumerate() {
                if mask & (1 << axis) != 0 {
                    pin.set_high();
                } else {
                    pin.set_low();
                }
            }
        }
    }

    struct StepRateTimer<'a> {
        timer: &'a mut CounterUs<TIM2>,
    }

    impl StepTimer for StepRateTimer<'_> {
        fn set_reload(&mut self, cycles: u32) {
            let _ = self.timer.start((cycles.max(1)).micros());
        }

        fn stop(&mut self) {
            let _ = self.timer.cancel();
        }
    }

    struct PulseResetHardware<'a> {
        timer: &'a mut CounterUs<TIM3>,
    }

    impl PulseResetTimer for PulseResetHardware<'_> {
        fn arm(&mut self, pulse_microseconds: u16) {
            let _ = self.timer.start((pulse_microseconds.max(1) as u32).micros());
        }
    }

    /// The planner, interpreter, and generator bound together as one RTIC
    /// resource; the idle task locks it for one line at a time, the
    /// step-rate ISR locks it for one tick at a time.
    struct Machine {
        interpreter: Interpreter,
        planner: MotionPlanner<BUFFER_CAPACITY>,
        state: SystemState,
        settings: SettingsRecord,
        generator: StepGenerator,
        position: [i64; 3],
    }

    /// Captures console output queued by the dispatcher; the ISR-facing
    /// cycle-start/hard-stop transitions are driven directly by the idle
    /// task after the call returns, not from inside this callback, since
    /// both would otherwise need the same lock held twice.
    struct ConsoleEnvironment {
        out: heapless::Vec<heapless::String<128>, 4>,
    }

    impl RuntimeEnvironment for ConsoleEnvironment {
        fn hard_stop(&mut self) {}
        fn feed_hold(&mut self) {}
        fn cycle_reinitialize(&mut self) {}
        fn cycle_start(&mut self) {}
        fn emit_line(&mut self, line: &str) {
            let mut s = heapless::String::new();
            let _ = s.push_str(line);
            let _ = self.out.push(s);
        }
    }

    struct ZeroHoming;
    impl HomingRoutine for ZeroHoming {
        fn home(&mut self) -> [i64; 3] {
            [0, 0, 0]
        }
    }

    struct RelayAux;
    impl Auxiliary for RelayAux {
        fn set_spindle(&mut self, state: SpindleState) {
            defmt::info!("spindle: {:?}", defmt::Debug2Format(&state));
        }
        fn set_coolant(&mut self, state: CoolantState) {
            defmt::info!("coolant: {:?}", defmt::Debug2Format(&state));
        }
    }

    struct FirmwareClock;
    impl hal::SystemClock for FirmwareClock {
        fn delay_ms(&mut self, ms: u32) {
            cortex_m::asm::delay(ms * 16_000);
        }
        fn delay_us(&mut self, us: u32) {
            cortex_m::asm::delay(us * 16);
        }
        fn micros(&self) -> u64 {
            Systick::now().ticks() as u64
        }
    }

    #[shared]
    struct Shared {
        machine: Machine,
        safety: SafetyMonitor<'static>,
        charge_pump: ChargePump,
    }

    #[local]
    struct Local {
        step_timer: CounterUs<TIM2>,
        pulse_timer: CounterUs<TIM3>,
        step_lines: AxisLineSet,
        dir_lines: AxisLineSet,
        limit_switches: [ErasedPin<Input>; 3],
        usart_tx: Tx<USART1>,
        usart_rx: Rx<USART1>,
        line_reader: LineReader,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        defmt::info!("firmware init");
        let dp = cx.device;
        let rcc = dp.RCC.constrain();
        let clocks = rcc.cfgr.use_hse(8.MHz()).sysclk(168.MHz()).freeze();

        let systick_token = rtic_monotonics::create_systick_token!();
        Systick::start(cx.core.SYST, clocks.hclk().0, systick_token);

        let pins = AxisPins::new(dp.GPIOA, dp.GPIOB, dp.GPIOC);
        let serial_config = SerialConfig::default().baudrate(9600.bps());
        let (usart_tx, mut usart_rx) = Serial::new(dp.USART1, (pins.uart_tx, pins.uart_rx), serial_config, &clocks)
            .unwrap()
            .split();
        usart_rx.listen(SerialEvent::Rxne);

        let mut step_timer = dp.TIM2.counter_us(&clocks);
        step_timer.listen(TimerEvent::Update);
        let mut pulse_timer = dp.TIM3.counter_us(&clocks);
        pulse_timer.listen(TimerEvent::Update);

        let watchdog = IndependentWatchdog::new(dp.IWDG);
        let safety = SafetyMonitor::new(watchdog);

        let settings = SettingsRecord::default();
        let generator = StepGenerator::new(168_000_000, 0, settings.invert_mask as u8, settings.pulse_microseconds as u16);
        let machine = Machine {
            interpreter: Interpreter::default(),
            planner: MotionPlanner::new(settings.steps_per_mm, settings.acceleration, settings.junction_deviation),
            state: SystemState::default(),
            settings,
            generator,
            position: [0; 3],
        };

        watchdog_task::spawn().ok();

        (
            Shared { machine, safety, charge_pump: ChargePump { pin: pins.charge_pump } },
            Local {
                step_timer,
                pulse_timer,
                step_lines: AxisLineSet { pins: pins.step },
                dir_lines: AxisLineSet { pins: pins.direction },
                limit_switches: pins.limit_switches,
                usart_tx,
                usart_rx,
                line_reader: LineReader::new(),
            },
        )
    }

    #[idle(shared = [machine])]
    fn idle(_cx: idle::Context) -> ! {
        loop {
            cortex_m::asm::wfi();
        }
    }

    /// Step-rate timer compare interrupt: the only hard real-time context.
    #[task(binds = TIM2, shared = [machine, safety, charge_pump], local = [step_timer, step_lines, dir_lines, pulse_timer, limit_switches], priority = 4)]
    fn step_isr(mut cx: step_isr::Context) {
        cx.local.step_timer.clear_interrupt(TimerEvent::Update);

        let triggered_axis = cx
            .local
            .limit_switches
            .iter_mut()
            .position(|pin| pin.is_low().unwrap_or(false));

        if let Some(axis) = triggered_axis {
            cx.shared.safety.lock(|safety| safety.trigger_emergency_stop(SafetyError::HardLimitTriggered { axis }));
            cx.shared.charge_pump.lock(|pump| pump.stop());
            cx.shared.machine.lock(|m| {
                m.generator.reset(&mut m.planner.buffer);
                m.state.abort = true;
                m.state.position = m.position;
            });
            return;
        }

        cx.shared.machine.lock(|m| {
            let mut timer = StepRateTimer { timer: cx.local.step_timer };
            let mut pulse = PulseResetHardware { timer: cx.local.pulse_timer };
            m.generator.on_timer_interrupt(
                &mut m.planner.buffer,
                cx.local.step_lines,
                cx.local.dir_lines,
                &mut pulse,
                &mut timer,
                &mut m.position,
            );
            m.state.position = m.position;
        });
    }

    /// Pulse-reset timer: returns the step lines to idle after one pulse width.
    #[task(binds = TIM3, local = [pulse_timer], priority = 4)]
    fn pulse_reset_isr(cx: pulse_reset_isr::Context) {
        cx.local.pulse_timer.clear_interrupt(TimerEvent::Update);
        let _ = cx.local.pulse_timer.cancel();
    }

    /// USART receive: assembles one line at a time and dispatches it.
    #[task(binds = USART1, shared = [machine, safety, charge_pump], local = [usart_rx, usart_tx, line_reader], priority = 2)]
    fn usart_task(mut cx: usart_task::Context) {
        let byte = match cx.local.usart_rx.read() {
            Ok(b) => b,
            Err(_) => return,
        };

        match cx.local.line_reader.feed(byte) {
            LineEvent::Pending => {}
            LineEvent::Blank => write_response(cx.local.usart_tx, &gcode::format_ok()),
            LineEvent::Complete(line) => {
                if line == "?" {
                    let report = cx
                        .shared
                        .machine
                        .lock(|m| motion_control::format_status_report(&m.state, m.settings.steps_per_mm));
                    write_response(cx.local.usart_tx, &report);
                    return;
                }
                dispatch_line(&mut cx, &line);
            }
        }
    }

    fn dispatch_line(cx: &mut usart_task::Context, line: &str) {
        // A line reaching the dispatcher after a hard-limit stop is the
        // operator asking to recover: clear the latch before trying to run it.
        if cx.shared.safety.lock(|safety| safety.is_emergency_stop_active()) {
            cx.shared.safety.lock(|safety| safety.clear_emergency_stop());
            cx.shared.machine.lock(|m| m.state.abort = false);
        }

        let (outcome, echoed, start_pump, stop_pump) = cx.shared.machine.lock(|m| {
            let mut env = ConsoleEnvironment { out: heapless::Vec::new() };
            let outcome = gcode::execute_line(
                &mut m.interpreter,
                line,
                &mut m.planner,
                &mut m.state,
                &m.settings,
                &mut env,
                &mut ZeroHoming,
                &mut FirmwareClock,
                &mut RelayAux,
                None,
            );
            let mut start_pump = false;
            if !m.planner.buffer.is_empty() {
                m.generator.cycle_start();
                start_pump = true;
            }
            let stop_pump = m.state.abort;
            if stop_pump {
                m.generator.reset(&mut m.planner.buffer);
            }
            (outcome, env.out, start_pump && !stop_pump, stop_pump)
        });

        if start_pump {
            cx.shared.charge_pump.lock(|pump| pump.start(1000, 50, WaveShape::Square));
        }
        if stop_pump {
            cx.shared.charge_pump.lock(|pump| pump.stop());
        }

        for echoed in &echoed {
            write_response(cx.local.usart_tx, echoed);
        }
        match outcome {
            Ok(()) => write_response(cx.local.usart_tx, &gcode::format_ok()),
            Err(error) => write_response(cx.local.usart_tx, &gcode::format_error(error)),
        }
    }

    fn write_response<const N: usize>(tx: &mut Tx<USART1>, line: &heapless::String<N>) {
        for byte in line.as_bytes() {
            let _ = nb::block!(tx.write(*byte));
        }
    }

    #[task(shared = [safety], priority = 1)]
    async fn watchdog_task(mut cx: watchdog_task::Context) {
        loop {
            cx.shared.safety.lock(|safety| safety.feed_watchdog());
            Systick::delay(250.millis()).await;
        }
    }
}
