//! Compile-time register-definition table, shared by the slave engine (for
//! DECODE events) and the raw monitor (for best-effort frame annotation).
//!
//! Redesigned from the original's dynamic string-keyed dictionary into
//! tagged-variant decoders, so both consumers share one decode path instead
//! of re-implementing bit/scale formatting at each call site.

/// How to turn a raw register value into something a human reads.
#[derive(Clone, Copy, Debug)]
pub enum Decode {
    /// Each entry is `(bit, label)`; bits set in the value are "on".
    Bitfield(&'static [(u8, &'static str)]),
    /// `value / divisor`, formatted with `unit` appended.
    Scaled { divisor: f64, unit: &'static str },
    /// No special interpretation beyond the raw integer.
    Passthrough,
}

#[derive(Clone, Copy, Debug)]
pub struct RegisterDef {
    pub name: &'static str,
    pub description: &'static str,
    pub decode: Decode,
}

const COMMAND_BITS: &[(u8, &str)] = &[
    (0, "RUN/STOP"),
    (1, "DIRECTION (0=FWD, 1=REV)"),
    (2, "EXTERNAL FAULT"),
    (3, "FAULT RESET"),
    (4, "JOG"),
    (5, "ACCEL/DECEL INHIBIT"),
    (6, "RAMP HOLD"),
    (7, "DC BRAKING"),
    (8, "MULTISPEED 1"),
    (9, "MULTISPEED 2"),
    (10, "MULTISPEED 3"),
    (11, "MULTISPEED 4"),
];

const STATUS_BITS: &[(u8, &str)] = &[
    (0, "DRIVE READY"),
    (1, "RUNNING"),
    (2, "DIRECTION (0=FWD, 1=REV)"),
    (3, "FAULT ACTIVE"),
    (4, "REFERENCE FROM KEYPAD"),
    (5, "AT FREQUENCY"),
    (6, "BELOW BASE SPEED"),
    (7, "RUNNING AT ZERO SPEED"),
    (8, "DC INJECTION"),
    (9, "OVERLOAD WARNING"),
    (10, "UNDERVOLTAGE WARNING"),
    (11, "TORQUE LIMITED"),
];

/// `(addr, def)` pairs, searched linearly — the table is small and static,
/// and this keeps the duplicate-0x0020 resolution a single visible entry
/// rather than two dictionary insertions where the second silently wins.
const TABLE: &[(u16, RegisterDef)] = &[
    (
        0x0000,
        RegisterDef {
            name: "STATUS",
            description: "Drive Status Word",
            decode: Decode::Bitfield(STATUS_BITS),
        },
    ),
    (
        0x0001,
        RegisterDef {
            name: "COMMAND",
            description: "Run/Stop Command Word",
            decode: Decode::Bitfield(COMMAND_BITS),
        },
    ),
    (
        0x0002,
        RegisterDef {
            name: "FREQ_REF",
            description: "Frequency Reference",
            decode: Decode::Scaled { divisor: 100.0, unit: "Hz" },
        },
    ),
    (
        0x0003,
        RegisterDef {
            name: "OUTPUT_FREQ",
            description: "Output Frequency",
            decode: Decode::Scaled { divisor: 100.0, unit: "Hz" },
        },
    ),
    (
        0x0004,
        RegisterDef {
            name: "OUTPUT_CURRENT",
            description: "Output Current",
            decode: Decode::Scaled { divisor: 100.0, unit: "A" },
        },
    ),
    (
        0x0005,
        RegisterDef {
            name: "OUTPUT_VOLTAGE",
            description: "Output Voltage",
            decode: Decode::Scaled { divisor: 1.0, unit: "V" },
        },
    ),
    (
        0x0006,
        RegisterDef {
            name: "DC_BUS_VOLTAGE",
            description: "DC Bus Voltage",
            decode: Decode::Scaled { divisor: 1.0, unit: "V" },
        },
    ),
    (
        0x0009,
        RegisterDef {
            name: "MOTOR_SPEED",
            description: "Motor Speed",
            decode: Decode::Scaled { divisor: 1.0, unit: "RPM" },
        },
    ),
    (
        0x000D,
        RegisterDef {
            name: "FAULT_CODE",
            description: "Active Fault Code",
            decode: Decode::Passthrough,
        },
    ),
    (
        0x000E,
        RegisterDef {
            name: "ALARM_CODE",
            description: "Active Alarm Code",
            decode: Decode::Passthrough,
        },
    ),
    (
        0x000F,
        RegisterDef {
            name: "DRIVE_TEMP",
            description: "Drive Temperature",
            decode: Decode::Scaled { divisor: 1.0, unit: "C" },
        },
    ),
    (
        0x0010,
        RegisterDef {
            name: "ACCEL_TIME",
            description: "Acceleration Time",
            decode: Decode::Scaled { divisor: 10.0, unit: "s" },
        },
    ),
    (
        0x0011,
        RegisterDef {
            name: "DECEL_TIME",
            description: "Deceleration Time",
            decode: Decode::Scaled { divisor: 10.0, unit: "s" },
        },
    ),
    (
        // Sullair-specific interpretation wins over the generic
        // FREQ_UPPER_LIMIT meaning some A1000 documentation assigns this
        // address — see the open question this resolves in SPEC_FULL.md.
        0x0020,
        RegisterDef {
            name: "YASK_STATUS_WORD",
            description: "Status Word for Sullair (read)",
            decode: Decode::Bitfield(STATUS_BITS),
        },
    ),
    (
        0x0021,
        RegisterDef {
            name: "YASK_GENL_STATUS",
            description: "General Status Word for Sullair",
            decode: Decode::Passthrough,
        },
    ),
    (
        0x0023,
        RegisterDef {
            name: "YASK_ACTUAL_PCT",
            description: "Actual Speed %",
            decode: Decode::Scaled { divisor: 100.0, unit: "%" },
        },
    ),
    (
        0x0024,
        RegisterDef {
            name: "YASK_ACTUAL_FREQ",
            description: "Actual Frequency",
            decode: Decode::Scaled { divisor: 100.0, unit: "Hz" },
        },
    ),
    (
        0x0026,
        RegisterDef {
            name: "YASK_MOTOR_CURRENT",
            description: "Motor Current",
            decode: Decode::Scaled { divisor: 10.0, unit: "A" },
        },
    ),
    (
        0x0027,
        RegisterDef {
            name: "YASK_POWER_OUT",
            description: "Output Power",
            decode: Decode::Scaled { divisor: 10.0, unit: "kW" },
        },
    ),
    (
        0x0031,
        RegisterDef {
            name: "YASK_DC_VOLTAGE",
            description: "DC Link Voltage",
            decode: Decode::Scaled { divisor: 1.0, unit: "V" },
        },
    ),
    (
        0x0068,
        RegisterDef {
            name: "YASK_UNIT_TEMP",
            description: "Unit Temperature",
            decode: Decode::Scaled { divisor: 1.0, unit: "deg" },
        },
    ),
    (
        0x007F,
        RegisterDef {
            name: "YASK_ALARM_FAULT",
            description: "Alarm / Active Fault (0=none)",
            decode: Decode::Passthrough,
        },
    ),
    (
        0x07D8,
        RegisterDef {
            name: "YASK_MOTOR_TEMP",
            description: "Motor Temperature",
            decode: Decode::Scaled { divisor: 10.0, unit: "%" },
        },
    ),
];

/// Look up the definition for `addr`, if any.
pub fn lookup(addr: u16) -> Option<&'static RegisterDef> {
    TABLE.iter().find(|(a, _)| *a == addr).map(|(_, def)| def)
}

/// A bit decoded against a [`Decode::Bitfield`] table.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedBit {
    pub bit: u8,
    pub description: &'static str,
    pub on: bool,
}

/// The result of decoding one register access, for DECODE events and the
/// decoded-message ring.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedValue {
    pub register: u16,
    pub name: &'static str,
    pub description: &'static str,
    pub value: u16,
    pub is_write: bool,
    pub bits: Vec<DecodedBit>,
    pub interpreted: Option<String>,
}

/// Decode `value` at `addr` using the compile-time table, falling back to
/// an "UNKNOWN" description when `addr` has no entry.
pub fn decode_value(addr: u16, value: u16, is_write: bool) -> DecodedValue {
    let def = lookup(addr);
    let name = def.map(|d| d.name).unwrap_or("UNKNOWN");
    let description = def.map(|d| d.description).unwrap_or("Unknown Register");

    let (bits, interpreted) = match def.map(|d| d.decode) {
        Some(Decode::Bitfield(table)) => {
            let bits: Vec<DecodedBit> = table
                .iter()
                .map(|(bit, desc)| DecodedBit {
                    bit: *bit,
                    description: desc,
                    on: value & (1 << bit) != 0,
                })
                .collect();
            let interpreted = if addr == crate::register::REG_COMMAND {
                Some(format!(
                    "{} ({})",
                    if value & 0x01 != 0 { "RUN COMMAND ACTIVE" } else { "STOP COMMAND" },
                    if value & 0x02 != 0 { "REVERSE" } else { "FORWARD" }
                ))
            } else {
                None
            };
            (bits, interpreted)
        }
        Some(Decode::Scaled { divisor, unit }) => {
            let scaled = value as f64 / divisor;
            (Vec::new(), Some(format!("{:.2} {}", scaled, unit)))
        }
        Some(Decode::Passthrough) | None => (Vec::new(), None),
    };

    DecodedValue {
        register: addr,
        name,
        description,
        value,
        is_write,
        bits,
        interpreted,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn duplicate_address_resolves_to_sullair_entry() {
        let def = lookup(0x0020).unwrap();
        assert_eq!(def.name, "YASK_STATUS_WORD");
    }

    #[test]
    fn command_word_decodes_run_forward() {
        let decoded = decode_value(0x0001, 0x0001, true);
        assert_eq!(decoded.interpreted.as_deref(), Some("RUN COMMAND ACTIVE (FORWARD)"));
        assert!(decoded.bits.iter().any(|b| b.bit == 0 && b.on));
    }

    #[test]
    fn frequency_reference_scales() {
        let decoded = decode_value(0x0002, 3000, true);
        assert_eq!(decoded.interpreted.as_deref(), Some("30.00 Hz"));
    }

    #[test]
    fn unknown_register_has_no_panic_and_no_interpretation() {
        let decoded = decode_value(0x0500, 42, false);
        assert_eq!(decoded.name, "UNKNOWN");
        assert!(decoded.interpreted.is_none());
    }
}
