//! Translate writes to the impersonated A1000's register space into CFW-11
//! parameter writes. Pure function of `(register, value, params)`, per the
//! translation-determinism invariant.

/// Values that vary the translation: the A1000-side frequency scale and the
/// CFW-11 motor's synchronous frequency.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TranslatorParams {
    /// A1000 frequency-reference full scale (default 6000 = 60.00 Hz).
    pub max_freq_yaskawa: u16,
    /// CFW-11 motor sync frequency that maps to the 8192 speed-reference
    /// full scale (default 60.0 Hz).
    pub weg_max_freq_hz: f64,
}

impl Default for TranslatorParams {
    fn default() -> Self {
        Self {
            max_freq_yaskawa: 6000,
            weg_max_freq_hz: 60.0,
        }
    }
}

/// A CFW-11 parameter write produced by the translator, destined for C5.
#[derive(Clone, Debug, PartialEq)]
pub struct WegCommand {
    pub register: u16,
    pub value: u16,
    pub label: String,
}

const P0682_CONTROL_WORD: u16 = 682;
const P0683_SPEED_REFERENCE: u16 = 683;

/// CFW-11 P0682 control-word bits.
mod weg_bits {
    pub const START_STOP: u16 = 0x0001;
    pub const GENERAL_ENABLE: u16 = 0x0002;
    pub const DIRECTION_FWD: u16 = 0x0004;
    pub const REMOTE: u16 = 0x0010;
    pub const FAULT_RESET: u16 = 0x0080;
}

/// Translate an A1000 register write into zero or more CFW-11 writes.
///
/// The direction bit is intentionally inverted between the two drives:
/// Yaskawa bit 1 set means REVERSE, while WEG P0682 bit 2 set means FORWARD.
/// This mirrors the source comment it was distilled from; it has not been
/// independently verified against the CFW-11 manual.
pub fn translate(reg: u16, value: u16, params: &TranslatorParams) -> Vec<WegCommand> {
    match reg {
        0x0001 => vec![translate_command_word(value)],
        0x0002 => vec![translate_frequency_hz(value as f64 / 100.0, params)],
        0x0009 => vec![translate_motor_speed_rpm(value)],
        0x0102 | 0x0202 => vec![translate_frequency_hz(value as f64 / 100.0, params)],
        _ => Vec::new(),
    }
}

fn translate_command_word(value: u16) -> WegCommand {
    let mut ctrl = weg_bits::REMOTE;
    if value & 0x01 != 0 {
        ctrl |= weg_bits::START_STOP | weg_bits::GENERAL_ENABLE;
    }
    if value & 0x02 == 0 {
        ctrl |= weg_bits::DIRECTION_FWD;
    }
    if value & 0x08 != 0 {
        ctrl |= weg_bits::FAULT_RESET;
    }
    WegCommand {
        register: P0682_CONTROL_WORD,
        value: ctrl,
        label: "CONTROL".to_string(),
    }
}

fn translate_frequency_hz(freq_hz: f64, params: &TranslatorParams) -> WegCommand {
    let scaled = (freq_hz / params.weg_max_freq_hz) * 8192.0;
    WegCommand {
        register: P0683_SPEED_REFERENCE,
        value: clamp_u16(scaled),
        label: format!("SPEED {:.1}Hz", freq_hz),
    }
}

fn translate_motor_speed_rpm(rpm: u16) -> WegCommand {
    // Fixed 4-pole, 60 Hz sync speed; carried over unchanged from the
    // source rather than parameterized, since no pole-count config exists.
    const SYNC_RPM: f64 = 1800.0;
    let scaled = (rpm as f64 / SYNC_RPM) * 8192.0;
    WegCommand {
        register: P0683_SPEED_REFERENCE,
        value: clamp_u16(scaled),
        label: format!("SPEED {}RPM", rpm),
    }
}

fn clamp_u16(value: f64) -> u16 {
    if value.is_sign_negative() || value < 0.0 {
        0
    } else if value > 65535.0 {
        65535
    } else {
        value.round() as u16
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn params() -> TranslatorParams {
        TranslatorParams::default()
    }

    #[test]
    fn run_forward_sets_remote_start_enable_and_fwd() {
        let cmds = translate(0x0001, 0x0001, &params());
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].register, P0682_CONTROL_WORD);
        assert_eq!(cmds[0].value, 0x0017);
        assert_eq!(cmds[0].label, "CONTROL");
    }

    #[test]
    fn reverse_bit_clears_weg_forward_bit() {
        let cmds = translate(0x0001, 0x0003, &params());
        assert_eq!(cmds[0].value & 0x0004, 0);
    }

    #[test]
    fn fault_reset_bit_passes_through() {
        let cmds = translate(0x0001, 0x0008, &params());
        assert_eq!(cmds[0].value & 0x0080, 0x0080);
    }

    #[test]
    fn frequency_reference_scaling() {
        let cmds = translate(0x0002, 3000, &params());
        assert_eq!(cmds[0].register, P0683_SPEED_REFERENCE);
        assert_eq!(cmds[0].value, 4096);
        assert_eq!(cmds[0].label, "SPEED 30.0Hz");
    }

    #[test]
    fn alternate_frequency_registers_scale_the_same_way() {
        let a = translate(0x0002, 1500, &params());
        let b = translate(0x0102, 1500, &params());
        let c = translate(0x0202, 1500, &params());
        assert_eq!(a[0].value, b[0].value);
        assert_eq!(b[0].value, c[0].value);
    }

    #[test]
    fn unmapped_register_has_no_translation() {
        assert!(translate(0x0025, 1, &params()).is_empty());
        assert!(translate(0x0010, 6000, &params()).is_empty());
    }

    #[quickcheck_macros::quickcheck]
    fn translation_is_a_pure_function_of_its_inputs(reg: u16, value: u16) -> bool {
        let params = TranslatorParams::default();
        translate(reg, value, &params) == translate(reg, value, &params)
    }

}
