//! Step response of an RC-filtered PWM output under the anti-windup PID loop, with a setpoint
//! change sent over the simulated serial link halfway through.
//! This example requires the `--features simulation` flag to be enabled.
// Copyright © 2025 Hs293Go
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES
// OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE
// OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

pub fn main() {
    use std::cell::RefCell;
    use std::io::Write as _;
    use std::rc::Rc;
    use std::time::Duration;

    use pid_loop::config::LoopConfigBuilder;
    use pid_loop::control::ControlLoop;
    use pid_loop::report::ReportStyle;
    use pid_loop::sim::{PlantActuator, PlantSensor, RcPlant, ScriptedSerial};
    use pid_loop::time::TickClock;

    const STEP: Duration = Duration::from_millis(1);
    const RUN_TIME_MS: u32 = 4000;

    static CLOCK: TickClock = TickClock::new();

    let plant = Rc::new(RefCell::new(RcPlant::new(Duration::from_millis(50))));
    let config = LoopConfigBuilder::<f64>::default()
        .report_style(ReportStyle::Chart { scale: 20 })
        .build()
        .unwrap();
    let mut control = ControlLoop::new(
        &CLOCK,
        PlantSensor(Rc::clone(&plant)),
        PlantActuator(Rc::clone(&plant)),
        ScriptedSerial::default(),
        config,
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for t in 0..RUN_TIME_MS {
        if t == RUN_TIME_MS / 2 {
            control.serial_mut().send(b"S700\n");
        }
        CLOCK.tick();
        plant.borrow_mut().advance(STEP);
        control.poll().unwrap();
        out.write_all(&control.serial_mut().take_output()).unwrap();
    }
}
