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

use fixtures::test_serial::{MockSerial, MockSerialError};

use pid_loop::command::{Command, CommandInterpreter, ParserState, DEFAULT_LINE_CAPACITY};
use pid_loop::pid::ControllerConfig;

/// Feeds `bytes` one at a time and collects every completed command.
fn feed(interpreter: &mut CommandInterpreter, bytes: &[u8]) -> Vec<Command<f64>> {
    bytes
        .iter()
        .filter_map(|&byte| interpreter.push(byte))
        .collect()
}

mod test_line_assembly {
    use super::*;

    #[test]
    fn test_command_completes_on_terminator_only() {
        let mut interpreter: CommandInterpreter = CommandInterpreter::new();

        for &byte in b"P1.25" {
            assert_eq!(interpreter.push::<f64>(byte), None);
        }
        assert_eq!(interpreter.state(), ParserState::Collecting);
        assert_eq!(interpreter.pending(), b"1.25");

        assert_eq!(interpreter.push::<f64>(b'\n'), Some(Command::Kp(1.25)));
        assert_eq!(interpreter.state(), ParserState::Idle);
        assert!(interpreter.pending().is_empty());
    }

    #[test]
    fn test_every_tag() {
        let mut interpreter: CommandInterpreter = CommandInterpreter::new();
        let commands = feed(&mut interpreter, b"S512\nP0.6\nI0.05\nD0.02\n");
        assert_eq!(
            commands,
            vec![
                Command::Setpoint(512.0),
                Command::Kp(0.6),
                Command::Ki(0.05),
                Command::Kd(0.02),
            ]
        );
    }

    #[test]
    fn test_carriage_return_terminates() {
        let mut interpreter: CommandInterpreter = CommandInterpreter::new();
        assert_eq!(feed(&mut interpreter, b"S100\r"), vec![Command::Setpoint(100.0)]);
    }

    #[test]
    fn test_crlf_yields_one_command() {
        let mut interpreter: CommandInterpreter = CommandInterpreter::new();
        let commands = feed(&mut interpreter, b"I0.1\r\nD0.5\r\n");
        assert_eq!(commands, vec![Command::Ki(0.1), Command::Kd(0.5)]);
        assert_eq!(interpreter.state(), ParserState::Idle);
    }

    #[test]
    fn test_leading_terminators_are_discarded() {
        let mut interpreter: CommandInterpreter = CommandInterpreter::new();
        assert!(feed(&mut interpreter, b"\n\r\n").is_empty());
        assert_eq!(interpreter.state(), ParserState::Idle);

        assert_eq!(feed(&mut interpreter, b"P2\n"), vec![Command::Kp(2.0)]);
    }

    #[test]
    fn test_bare_tag_applies_zero() {
        let mut interpreter: CommandInterpreter = CommandInterpreter::new();
        assert_eq!(feed(&mut interpreter, b"P\n"), vec![Command::Kp(0.0)]);
    }

    #[test]
    fn test_malformed_number_applies_zero() {
        let mut interpreter: CommandInterpreter = CommandInterpreter::new();
        let commands = feed(&mut interpreter, b"Pabc\nI-\nD.\n");
        assert_eq!(
            commands,
            vec![Command::Kp(0.0), Command::Ki(0.0), Command::Kd(0.0)]
        );
    }

    #[test]
    fn test_trailing_garbage_is_ignored() {
        let mut interpreter: CommandInterpreter = CommandInterpreter::new();
        assert_eq!(feed(&mut interpreter, b"S250 volts\n"), vec![Command::Setpoint(250.0)]);
    }

    #[test]
    fn test_unknown_and_lowercase_tags() {
        let mut interpreter: CommandInterpreter = CommandInterpreter::new();
        let commands = feed(&mut interpreter, b"X5\np0.5\n");
        assert_eq!(
            commands,
            vec![
                Command::Unknown {
                    tag: b'X',
                    value: 5.0
                },
                Command::Unknown {
                    tag: b'p',
                    value: 0.5
                },
            ]
        );
        assert_eq!(commands[1].tag(), b'p');
    }

    #[test]
    fn test_overlong_line_truncates_and_resyncs() {
        let mut interpreter: CommandInterpreter = CommandInterpreter::new();

        // Twenty digits of number text, four more than the line holds
        let commands = feed(&mut interpreter, b"S12345678901234567890\n");
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].value(), 1_234_567_890_123_456.0);
        assert_eq!(interpreter.pending().len(), 0);

        assert_eq!(feed(&mut interpreter, b"I0.5\n"), vec![Command::Ki(0.5)]);
    }

    #[test]
    fn test_endless_line_saturates_drop_count() {
        let mut interpreter: CommandInterpreter = CommandInterpreter::new();

        assert_eq!(interpreter.push::<f64>(b'D'), None);
        for _ in 0..70_000 {
            assert_eq!(interpreter.push::<f64>(b'1'), None);
        }
        assert_eq!(interpreter.pending().len(), DEFAULT_LINE_CAPACITY);
        assert_eq!(interpreter.dropped(), u16::MAX);

        assert_eq!(
            interpreter.push::<f64>(b'\n'),
            Some(Command::Kd(1_111_111_111_111_111.0))
        );
        assert_eq!(interpreter.dropped(), 0);
        assert_eq!(interpreter.state(), ParserState::Idle);
    }

    #[test]
    fn test_line_capacity_is_configurable() {
        let mut interpreter = CommandInterpreter::<4>::new();
        let mut commands = vec![];
        for &byte in b"P1.2345\n" {
            commands.extend(interpreter.push::<f64>(byte));
        }
        assert_eq!(commands, vec![Command::Kp(1.23)]);
        assert_eq!(DEFAULT_LINE_CAPACITY, 16);
    }
}

mod test_apply {
    use super::*;

    #[test]
    fn test_gain_commands_write_gains() {
        let mut config = ControllerConfig::<f64>::default();

        assert!(Command::Kp(1.25).apply(&mut config));
        assert!(Command::Ki(-0.5).apply(&mut config));
        assert!(Command::Kd(0.0).apply(&mut config));
        assert_eq!(config.gains(), (1.25, -0.5, 0.0));
        assert_eq!(config.setpoint(), 300);
    }

    #[test]
    fn test_setpoint_command_clamps() {
        let mut config = ControllerConfig::<f64>::default();

        assert!(Command::Setpoint(9999.0).apply(&mut config));
        assert_eq!(config.setpoint(), 1023);

        assert!(Command::Setpoint(-5.0).apply(&mut config));
        assert_eq!(config.setpoint(), 0);

        assert!(Command::Setpoint(412.7).apply(&mut config));
        assert_eq!(config.setpoint(), 412);
    }

    #[test]
    fn test_unknown_command_changes_nothing() {
        let mut config = ControllerConfig::<f64>::default();
        let before = config;

        assert!(!Command::Unknown {
            tag: b'Q',
            value: 3.0
        }
        .apply(&mut config));
        assert_eq!(config, before);
    }

    #[test]
    fn test_parsed_line_reaches_config() {
        let mut interpreter: CommandInterpreter = CommandInterpreter::new();
        let mut config = ControllerConfig::<f64>::default();

        for command in feed(&mut interpreter, b"S9999\nP1.25\n") {
            command.apply(&mut config);
        }
        assert_eq!(config.setpoint(), 1023);
        assert_eq!(config.kp(), 1.25);
    }
}

mod test_poll {
    use super::*;

    #[test]
    fn test_poll_consumes_one_byte_per_call() {
        let mut interpreter: CommandInterpreter = CommandInterpreter::new();
        let mut serial = MockSerial::default();
        serial.send(b"D3\n");

        assert_eq!(interpreter.poll::<f64, _>(&mut serial), Ok(None));
        assert_eq!(serial.rx.len(), 2);
        assert_eq!(interpreter.poll::<f64, _>(&mut serial), Ok(None));
        assert_eq!(
            interpreter.poll::<f64, _>(&mut serial),
            Ok(Some(Command::Kd(3.0)))
        );
        assert!(serial.rx.is_empty());
    }

    #[test]
    fn test_poll_without_input_returns_none() {
        let mut interpreter: CommandInterpreter = CommandInterpreter::new();
        let mut serial = MockSerial::default();

        for _ in 0..5 {
            assert_eq!(interpreter.poll::<f64, _>(&mut serial), Ok(None));
        }
        assert_eq!(interpreter.state(), ParserState::Idle);
    }

    #[test]
    fn test_poll_surfaces_read_errors() {
        let mut interpreter: CommandInterpreter = CommandInterpreter::new();
        let mut serial = MockSerial::default();
        serial.send(b"P1\n");
        serial.fail_next_read = true;

        assert_eq!(
            interpreter.poll::<f64, _>(&mut serial),
            Err(MockSerialError)
        );

        // Nothing was lost; the line still assembles
        let mut parsed = None;
        for _ in 0..3 {
            parsed = interpreter.poll::<f64, _>(&mut serial).unwrap().or(parsed);
        }
        assert_eq!(parsed, Some(Command::Kp(1.0)));
    }
}

mod test_interpreter_invariants {
    use super::*;

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn terminator_always_returns_to_idle(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut interpreter: CommandInterpreter = CommandInterpreter::new();
            for byte in bytes {
                let _ = interpreter.push::<f64>(byte);
                prop_assert!(interpreter.pending().len() <= DEFAULT_LINE_CAPACITY);
            }
            let _ = interpreter.push::<f64>(b'\n');
            prop_assert_eq!(interpreter.state(), ParserState::Idle);
            prop_assert!(interpreter.pending().is_empty());
        }

        #[test]
        fn completed_values_are_finite(text in "[SPID][-+0-9.eE]{0,24}") {
            let mut interpreter: CommandInterpreter = CommandInterpreter::new();
            let mut line = text.into_bytes();
            line.push(b'\n');

            let commands = feed(&mut interpreter, &line);
            prop_assert_eq!(commands.len(), 1);
            prop_assert!(commands[0].value().is_finite());
        }

        #[test]
        fn setpoint_lines_stay_in_sensor_range(value in -1.0e6f64..1.0e6) {
            let mut interpreter: CommandInterpreter = CommandInterpreter::new();
            let mut config = ControllerConfig::<f64>::default();

            for command in feed(&mut interpreter, format!("S{value}\n").as_bytes()) {
                command.apply(&mut config);
            }
            prop_assert!(config.setpoint() <= 1023);
        }
    }
}
